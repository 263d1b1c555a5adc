use std::cell::RefCell;
use std::rc::Rc;

use dioxus_logger::tracing::{debug, warn};
use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use shared_types::LaneId;

use crate::api::ApiError;
use crate::config::SyncConfig;
use crate::sync::chat::{complete_exchange, ChatSession};
use crate::sync::countdown::{countdown_channel, CountdownHandle, CountdownTimer};
use crate::sync::emergency::EmergencyDispatcher;
use crate::sync::poller::{
    refresh_channel, PublishedSnapshot, RefreshHandle, RefreshReason, RefreshRequests,
    StatusPoller,
};
use crate::sync::state::DisplayState;
use crate::sync::{CancelGuard, CancelToken, Clock, ObservabilitySink, TrafficBackend};

/// What changed, so the view knows to re-render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncChange {
    Snapshot,
    Countdown,
    Selection,
    Chat,
}

type ChangeListener = Rc<dyn Fn(SyncChange)>;

struct Background<B, C> {
    poller: StatusPoller<B, C>,
    requests: RefreshRequests,
    countdown: CountdownTimer<C>,
}

/// Single owner of the dashboard's shared state.
///
/// The poller and countdown write through callbacks wired up here, chat and
/// emergency requests go through the methods below, and the view only reads.
/// Dropping the coordinator (or calling [`shutdown`](Self::shutdown)) cancels
/// every task before it can touch state again.
pub struct Coordinator<B, C> {
    config: SyncConfig,
    backend: Rc<B>,
    sink: Rc<dyn ObservabilitySink>,
    display: Rc<RefCell<DisplayState>>,
    chat: Rc<RefCell<ChatSession>>,
    countdown: CountdownHandle,
    refresh: RefreshHandle,
    emergency: EmergencyDispatcher<B>,
    background: RefCell<Option<Background<B, C>>>,
    on_change: ChangeListener,
    cancel: CancelToken,
    _teardown: CancelGuard,
}

impl<B, C> Coordinator<B, C>
where
    B: TrafficBackend + 'static,
    C: Clock + 'static,
{
    pub fn new(
        config: SyncConfig,
        backend: Rc<B>,
        clock: Rc<C>,
        sink: Rc<dyn ObservabilitySink>,
        on_change: impl Fn(SyncChange) + 'static,
    ) -> Self {
        let cancel = CancelToken::new();
        let (refresh, requests) = refresh_channel();
        let (countdown, countdown_timer) = countdown_channel(
            clock.clone(),
            config.tick_interval,
            refresh.clone(),
            cancel.clone(),
        );
        let poller = StatusPoller::new(
            backend.clone(),
            clock,
            sink.clone(),
            config.poll_interval,
            cancel.clone(),
        );
        let emergency =
            EmergencyDispatcher::new(backend.clone(), refresh.clone(), sink.clone(), cancel.clone());

        Self {
            chat: Rc::new(RefCell::new(ChatSession::new(config.chat_fallback.clone()))),
            config,
            backend,
            sink,
            display: Rc::new(RefCell::new(DisplayState::default())),
            countdown,
            refresh,
            emergency,
            background: RefCell::new(Some(Background {
                poller,
                requests,
                countdown: countdown_timer,
            })),
            on_change: Rc::new(on_change),
            _teardown: cancel.guard(),
            cancel,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Poll loop and countdown together. Meant to be spawned once; later
    /// calls return a finished future.
    pub fn run(&self) -> LocalBoxFuture<'static, ()> {
        let Some(Background {
            poller,
            requests,
            countdown,
        }) = self.background.borrow_mut().take()
        else {
            warn!("Traffic sync already started");
            return future::ready(()).boxed_local();
        };

        let publish_snapshot = {
            let display = self.display.clone();
            let countdown = self.countdown.clone();
            let on_change = self.on_change.clone();
            let cancel = self.cancel.clone();
            move |published: PublishedSnapshot| {
                if cancel.is_cancelled() {
                    return;
                }
                let remaining = published.snapshot.remaining_time;
                let seq = published.seq;
                if display.borrow_mut().apply_snapshot(published) {
                    debug!("Applied status snapshot #{}", seq);
                    countdown.reconcile(remaining);
                    on_change(SyncChange::Snapshot);
                }
            }
        };

        let publish_tick = {
            let on_change = self.on_change.clone();
            let cancel = self.cancel.clone();
            move |_count: u64| {
                if !cancel.is_cancelled() {
                    on_change(SyncChange::Countdown);
                }
            }
        };

        future::join(
            poller.run(requests, publish_snapshot),
            countdown.run(publish_tick),
        )
        .map(|_| ())
        .boxed_local()
    }

    /// Cancels all tasks and closes their channels. Idempotent.
    pub fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.refresh.close();
        self.countdown.close();
        self.background.borrow_mut().take();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn refresh_now(&self) {
        if !self.is_shut_down() {
            self.refresh.request(RefreshReason::Manual);
        }
    }

    pub fn display(&self) -> DisplayState {
        self.display.borrow().clone()
    }

    pub fn countdown(&self) -> u64 {
        self.countdown.count()
    }

    pub fn chat(&self) -> ChatSession {
        self.chat.borrow().clone()
    }

    pub fn select_lane(&self, lane: LaneId) {
        if self.is_shut_down() {
            return;
        }
        if self.display.borrow_mut().select_lane(lane) {
            (self.on_change)(SyncChange::Selection);
        }
    }

    pub fn clear_selection(&self) {
        if self.is_shut_down() {
            return;
        }
        self.display.borrow_mut().clear_selection();
        (self.on_change)(SyncChange::Selection);
    }

    pub fn set_chat_input(&self, text: String) {
        if self.is_shut_down() {
            return;
        }
        self.chat.borrow_mut().set_input(text);
        (self.on_change)(SyncChange::Chat);
    }

    /// Echoes the input immediately and returns the request to spawn, or
    /// `None` if the submission was rejected.
    pub fn submit_chat(&self) -> Option<LocalBoxFuture<'static, ()>> {
        if self.is_shut_down() {
            return None;
        }
        let pending = self.chat.borrow_mut().begin_submit()?;
        (self.on_change)(SyncChange::Chat);

        let chat = self.chat.clone();
        let backend = self.backend.clone();
        let sink = self.sink.clone();
        let cancel = self.cancel.clone();
        let on_change = self.on_change.clone();
        Some(
            async move {
                if complete_exchange(&chat, pending, backend.as_ref(), sink.as_ref(), &cancel).await
                {
                    on_change(SyncChange::Chat);
                }
            }
            .boxed_local(),
        )
    }

    /// Sends an emergency override for `lane`; a refresh follows either way.
    /// Nothing is sent once shut down.
    pub fn trigger_emergency(&self, lane: LaneId) -> LocalBoxFuture<'static, Result<(), ApiError>> {
        if self.is_shut_down() {
            debug!("Ignoring emergency override for {} after shutdown", lane);
            return future::ready(Ok(())).boxed_local();
        }
        let emergency = self.emergency.clone();
        async move { emergency.trigger(lane).await }.boxed_local()
    }
}
