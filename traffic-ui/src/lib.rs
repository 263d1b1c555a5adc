pub mod api;
pub mod components;
pub mod config;
pub mod interop;
pub mod sync;

pub use api::{ApiError, HttpBackend};
pub use components::TrafficDashboard;
pub use config::{api_base, SyncConfig};
pub use interop::BrowserClock;
pub use sync::{Coordinator, SyncChange, TracingSink};
