//! Deterministic fakes for driving the sync engine in tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures::channel::oneshot;
use futures::future::{self, LocalBoxFuture};
use shared_types::{
    Congestion, CongestionLevel, LaneId, LaneState, SignalLight, StatusSnapshot,
};

use crate::api::ApiError;
use crate::sync::{CancelToken, Clock, FailureSource, ObservabilitySink, TrafficBackend};

pub(crate) fn snapshot_with(lanes: &[&str], remaining_time: i64) -> StatusSnapshot {
    let lanes: BTreeMap<LaneId, LaneState> = lanes
        .iter()
        .enumerate()
        .map(|(i, id)| {
            (
                LaneId::new(*id),
                LaneState {
                    count: i as u32 * 3,
                    density: i as u8,
                    light: if i == 0 {
                        SignalLight::Green
                    } else {
                        SignalLight::Red
                    },
                },
            )
        })
        .collect();

    StatusSnapshot {
        active_lane: lanes
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| LaneId::new("NORTH")),
        lanes,
        emergency_active: false,
        congestion: Congestion {
            level: CongestionLevel::Low,
            confidence: 0.8,
        },
        remaining_time,
    }
}

/// Snapshot from the controller scenario: NORTH green, SOUTH red, 12s left.
pub(crate) fn scenario_snapshot() -> StatusSnapshot {
    serde_json::from_value(serde_json::json!({
        "active_lane": "NORTH",
        "lanes": {
            "NORTH": {"count": 5, "density": 2, "light": "GREEN"},
            "SOUTH": {"count": 0, "density": 0, "light": "RED"}
        },
        "emergency_active": false,
        "congestion": {"level": "LOW", "confidence": 0.8},
        "remaining_time": 12
    }))
    .expect("scenario snapshot")
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    statuses: RefCell<VecDeque<Result<StatusSnapshot, ApiError>>>,
    on_fetch: RefCell<Option<Box<dyn Fn(usize)>>>,
    pub status_calls: Cell<usize>,
    emergency_failure: RefCell<Option<ApiError>>,
    pub emergency_calls: RefCell<Vec<LaneId>>,
    chat_replies: RefCell<VecDeque<Result<String, ApiError>>>,
    held_chat: RefCell<Option<oneshot::Receiver<Result<String, ApiError>>>>,
    pub chat_calls: RefCell<Vec<String>>,
}

impl FakeBackend {
    pub fn push_status(&self, result: Result<StatusSnapshot, ApiError>) {
        self.statuses.borrow_mut().push_back(result);
    }

    /// Runs `hook` with the 1-based call number while a status fetch is in flight.
    pub fn on_fetch(&self, hook: impl Fn(usize) + 'static) {
        *self.on_fetch.borrow_mut() = Some(Box::new(hook));
    }

    pub fn fail_emergency(&self, err: ApiError) {
        *self.emergency_failure.borrow_mut() = Some(err);
    }

    pub fn push_chat_reply(&self, result: Result<String, ApiError>) {
        self.chat_replies.borrow_mut().push_back(result);
    }

    /// Keeps the next chat request pending until the returned sender fires.
    pub fn hold_next_chat(&self) -> oneshot::Sender<Result<String, ApiError>> {
        let (tx, rx) = oneshot::channel();
        *self.held_chat.borrow_mut() = Some(rx);
        tx
    }
}

impl TrafficBackend for FakeBackend {
    async fn fetch_status(&self) -> Result<StatusSnapshot, ApiError> {
        let call = self.status_calls.get() + 1;
        self.status_calls.set(call);
        if let Some(hook) = self.on_fetch.borrow().as_ref() {
            hook(call);
        }
        self.statuses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transport("no scripted status".to_string())))
    }

    async fn trigger_emergency(&self, lane: &LaneId) -> Result<(), ApiError> {
        self.emergency_calls.borrow_mut().push(lane.clone());
        match self.emergency_failure.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn send_chat(&self, message: &str) -> Result<String, ApiError> {
        self.chat_calls.borrow_mut().push(message.to_string());
        let held = self.held_chat.borrow_mut().take();
        if let Some(rx) = held {
            return rx
                .await
                .unwrap_or_else(|_| Err(ApiError::Transport("held reply dropped".to_string())));
        }
        self.chat_replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("re: {message}")))
    }
}

/// Clock whose sleeps complete immediately up to a limit and never beyond it.
pub(crate) struct FakeClock {
    pub sleeps: RefCell<Vec<Duration>>,
    wakes_up_to: Option<Duration>,
    cancel_after: RefCell<Option<(usize, CancelToken)>>,
}

impl FakeClock {
    pub fn instant() -> Self {
        Self::wakes_up_to(Duration::MAX)
    }

    pub fn frozen() -> Self {
        Self {
            sleeps: RefCell::new(Vec::new()),
            wakes_up_to: None,
            cancel_after: RefCell::new(None),
        }
    }

    /// Countdown ticks fire at once while the poll interval never elapses.
    pub fn wakes_up_to(limit: Duration) -> Self {
        Self {
            wakes_up_to: Some(limit),
            ..Self::frozen()
        }
    }

    /// Cancels `token` when the `n`th sleep starts, so looping tasks terminate.
    pub fn cancel_after(self, n: usize, token: &CancelToken) -> Self {
        *self.cancel_after.borrow_mut() = Some((n, token.clone()));
        self
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps.borrow().len()
    }
}

impl Clock for FakeClock {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let count = {
            let mut sleeps = self.sleeps.borrow_mut();
            sleeps.push(duration);
            sleeps.len()
        };
        if let Some((n, token)) = self.cancel_after.borrow().as_ref() {
            if count >= *n {
                token.cancel();
            }
        }
        match self.wakes_up_to {
            Some(limit) if duration <= limit => Box::pin(future::ready(())),
            _ => Box::pin(future::pending()),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap()
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub failures: RefCell<Vec<(FailureSource, ApiError)>>,
}

impl ObservabilitySink for RecordingSink {
    fn record_failure(&self, source: &FailureSource, err: &ApiError) {
        self.failures
            .borrow_mut()
            .push((source.clone(), err.clone()));
    }
}
