use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use gloo_timers::future::TimeoutFuture;
use web_sys::{window, ScrollBehavior, ScrollIntoViewOptions};

use crate::sync::Clock;

/// Id of the empty element kept at the bottom of the chat transcript.
pub const CHAT_END_ID: &str = "chat-end";

/// `setTimeout`-backed clock for the browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(TimeoutFuture::new(timeout_millis(duration)))
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

fn timeout_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Smooth-scrolls the chat transcript to its newest message.
pub fn scroll_chat_to_end() {
    let Some(element) = window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(CHAT_END_ID))
    else {
        return;
    };

    let options = ScrollIntoViewOptions::new();
    options.set_behavior(ScrollBehavior::Smooth);
    element.scroll_into_view_with_scroll_into_view_options(&options);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_saturates_instead_of_wrapping() {
        assert_eq!(timeout_millis(Duration::from_secs(5)), 5_000);
        assert_eq!(timeout_millis(Duration::from_secs(u64::MAX)), u32::MAX);
    }
}
