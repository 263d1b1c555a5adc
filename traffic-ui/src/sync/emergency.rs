use std::rc::Rc;

use dioxus_logger::tracing::info;
use shared_types::LaneId;

use crate::api::ApiError;
use crate::sync::poller::{RefreshHandle, RefreshReason};
use crate::sync::{CancelToken, FailureSource, ObservabilitySink, TrafficBackend};

/// Sends emergency overrides. Nothing changes locally until the follow-up
/// refresh brings back the controller's view.
pub struct EmergencyDispatcher<B> {
    backend: Rc<B>,
    refresh: RefreshHandle,
    sink: Rc<dyn ObservabilitySink>,
    cancel: CancelToken,
}

impl<B> Clone for EmergencyDispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            refresh: self.refresh.clone(),
            sink: self.sink.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<B: TrafficBackend> EmergencyDispatcher<B> {
    pub fn new(
        backend: Rc<B>,
        refresh: RefreshHandle,
        sink: Rc<dyn ObservabilitySink>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            backend,
            refresh,
            sink,
            cancel,
        }
    }

    /// Fire-and-forget: the outcome is returned for callers that care, but
    /// either way exactly one refresh is requested afterwards.
    pub async fn trigger(&self, lane: LaneId) -> Result<(), ApiError> {
        let result = self.backend.trigger_emergency(&lane).await;
        if self.cancel.is_cancelled() {
            return result;
        }

        match &result {
            Ok(()) => info!("Emergency override sent for {}", lane),
            Err(err) => self
                .sink
                .record_failure(&FailureSource::Emergency(lane.clone()), err),
        }

        self.refresh.request(RefreshReason::Emergency(lane));
        result
    }
}
