use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dioxus_logger::tracing::debug;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::future::{self, Either};
use futures::StreamExt;
use shared_types::{LaneId, StatusSnapshot};

use crate::api::ApiError;
use crate::sync::{CancelToken, Clock, FailureSource, ObservabilitySink, TrafficBackend};

/// Why a poll was run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshReason {
    Startup,
    Scheduled,
    CountdownExpired,
    Emergency(LaneId),
    Manual,
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshReason::Startup => f.write_str("startup"),
            RefreshReason::Scheduled => f.write_str("scheduled"),
            RefreshReason::CountdownExpired => f.write_str("countdown expired"),
            RefreshReason::Emergency(lane) => write!(f, "emergency on {lane}"),
            RefreshReason::Manual => f.write_str("manual"),
        }
    }
}

/// A snapshot as published by the poller.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedSnapshot {
    pub seq: u64,
    pub snapshot: StatusSnapshot,
    pub synced_at: DateTime<Utc>,
}

/// Sending side for on-demand refreshes.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: UnboundedSender<RefreshReason>,
}

/// Receiving side, consumed by [`StatusPoller::run`].
#[derive(Debug)]
pub struct RefreshRequests {
    rx: UnboundedReceiver<RefreshReason>,
}

pub fn refresh_channel() -> (RefreshHandle, RefreshRequests) {
    let (tx, rx) = mpsc::unbounded();
    (RefreshHandle { tx }, RefreshRequests { rx })
}

impl RefreshHandle {
    pub fn request(&self, reason: RefreshReason) {
        if self.tx.unbounded_send(reason).is_err() {
            debug!("Refresh requested after poller shut down");
        }
    }

    /// Closes the channel for every clone; the poll loop exits on its next wake.
    pub fn close(&self) {
        self.tx.close_channel();
    }
}

impl RefreshRequests {
    /// Drains queued requests, returning the latest one. Several requests that
    /// piled up while a poll was in flight collapse into one follow-up poll.
    pub(crate) fn take_pending(&mut self) -> Option<RefreshReason> {
        let mut latest = None;
        while let Ok(Some(reason)) = self.rx.try_next() {
            latest = Some(reason);
        }
        latest
    }
}

/// Fetches the controller status on a fixed interval and on demand.
///
/// Scheduled and on-demand polls share one loop, so they never overlap and a
/// slow response can never overwrite a newer one. An on-demand poll restarts
/// the interval.
pub struct StatusPoller<B, C> {
    backend: Rc<B>,
    clock: Rc<C>,
    sink: Rc<dyn ObservabilitySink>,
    interval: Duration,
    cancel: CancelToken,
    seq: u64,
}

impl<B: TrafficBackend, C: Clock> StatusPoller<B, C> {
    pub fn new(
        backend: Rc<B>,
        clock: Rc<C>,
        sink: Rc<dyn ObservabilitySink>,
        interval: Duration,
        cancel: CancelToken,
    ) -> Self {
        Self {
            backend,
            clock,
            sink,
            interval,
            cancel,
            seq: 0,
        }
    }

    /// One fetch. Failures are reported to the sink and returned.
    pub async fn poll(&mut self) -> Result<PublishedSnapshot, ApiError> {
        match self.backend.fetch_status().await {
            Ok(snapshot) => {
                self.seq += 1;
                Ok(PublishedSnapshot {
                    seq: self.seq,
                    snapshot,
                    synced_at: self.clock.now(),
                })
            }
            Err(err) => {
                if !self.cancel.is_cancelled() {
                    self.sink.record_failure(&FailureSource::StatusPoll, &err);
                }
                Err(err)
            }
        }
    }

    /// Polls immediately, then every `interval` or whenever a refresh is
    /// requested, until cancelled or every [`RefreshHandle`] is closed.
    pub async fn run(
        mut self,
        mut requests: RefreshRequests,
        mut publish: impl FnMut(PublishedSnapshot),
    ) {
        let mut reason = RefreshReason::Startup;

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            debug!("Polling status ({})", reason);
            let result = self.poll().await;
            if self.cancel.is_cancelled() {
                return;
            }
            if let Ok(published) = result {
                publish(published);
            }

            if let Some(pending) = requests.take_pending() {
                reason = pending;
                continue;
            }

            let wait = self.clock.sleep(self.interval);
            match future::select(wait, requests.rx.next()).await {
                Either::Left(_) => reason = RefreshReason::Scheduled,
                Either::Right((Some(requested), _)) => reason = requested,
                Either::Right((None, _)) => return,
            }
        }
    }
}
