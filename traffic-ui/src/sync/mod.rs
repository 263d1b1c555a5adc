//! Client-side state synchronization for the traffic console.
//!
//! The engine is transport- and timer-agnostic: everything that suspends goes
//! through [`TrafficBackend`] or [`Clock`], so the same code runs against the
//! browser (`HttpBackend` + `BrowserClock`) and against the fakes in tests.
//! All of it is single-threaded; shared state is `Rc<RefCell<_>>`.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dioxus_logger::tracing::{error, warn};
use futures::future::LocalBoxFuture;
use shared_types::{LaneId, StatusSnapshot};

use crate::api::ApiError;

pub mod chat;
pub mod coordinator;
pub mod countdown;
pub mod emergency;
pub mod poller;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{ChatSession, ChatSessionState, PendingExchange};
pub use coordinator::{Coordinator, SyncChange};
pub use countdown::{
    CountdownHandle, CountdownReconciler, CountdownTimer, Reconciled, TickOutcome,
};
pub use emergency::EmergencyDispatcher;
pub use poller::{PublishedSnapshot, RefreshHandle, RefreshReason, RefreshRequests, StatusPoller};
pub use state::DisplayState;

/// The three controller endpoints the console talks to.
#[allow(async_fn_in_trait)]
pub trait TrafficBackend {
    /// `GET /api/status`
    async fn fetch_status(&self) -> Result<StatusSnapshot, ApiError>;

    /// `POST /api/emergency`; the response body is ignored.
    async fn trigger_emergency(&self, lane: &LaneId) -> Result<(), ApiError>;

    /// `POST /api/ai-chat`, returning the assistant's reply text.
    async fn send_chat(&self, message: &str) -> Result<String, ApiError>;
}

/// Timer source for the poll schedule and the countdown.
pub trait Clock {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureSource {
    StatusPoll,
    Emergency(LaneId),
    Chat,
}

impl fmt::Display for FailureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureSource::StatusPoll => f.write_str("status poll"),
            FailureSource::Emergency(lane) => write!(f, "emergency override for {lane}"),
            FailureSource::Chat => f.write_str("AI chat"),
        }
    }
}

/// Where recovered network failures are reported.
pub trait ObservabilitySink {
    fn record_failure(&self, source: &FailureSource, error: &ApiError);
}

/// Reports failures through the console log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn record_failure(&self, source: &FailureSource, err: &ApiError) {
        match source {
            // Retried on the next tick, so not worth an error.
            FailureSource::StatusPoll => warn!("API Error: {} failed: {}", source, err),
            _ => error!("API Error: {} failed: {}", source, err),
        }
    }
}

/// Shared teardown flag. Tasks check it after every await and before
/// touching state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Returns a guard that cancels the token when dropped.
    pub fn guard(&self) -> CancelGuard {
        CancelGuard {
            token: self.clone(),
        }
    }
}

#[derive(Debug)]
pub struct CancelGuard {
    token: CancelToken,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
