use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use dioxus_logger::tracing::debug;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::future::{self, Either};
use futures::StreamExt;

use crate::sync::poller::{RefreshHandle, RefreshReason};
use crate::sync::{CancelToken, Clock};

/// Local countdown to the next signal change.
///
/// `Idle(0) -> Ticking(n) -> Idle(0)`. A snapshot always wins over the local
/// tick: [`reconcile`](Self::reconcile) bumps the epoch, and a tick armed under
/// an older epoch is discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountdownReconciler {
    count: u64,
    epoch: u64,
}

/// Result of applying a snapshot's `remaining_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub count: u64,
    /// A running countdown was cut to zero; the caller owes one refresh.
    pub expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ticking(u64),
    /// Reached zero; the caller owes the poller one refresh.
    Expired,
    Superseded,
    Idle,
}

impl CountdownReconciler {
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_ticking(&self) -> bool {
        self.count > 0
    }

    pub fn has_synced(&self) -> bool {
        self.epoch > 0
    }

    /// Overrides the count with server truth. Only a non-zero to zero
    /// transition counts as expiry; a snapshot reporting 0 while already idle
    /// stays silent.
    pub fn reconcile(&mut self, remaining_time: i64) -> Reconciled {
        let was_ticking = self.is_ticking();
        self.count = remaining_time.max(0) as u64;
        self.epoch += 1;
        Reconciled {
            count: self.count,
            expired: was_ticking && self.count == 0,
        }
    }

    pub fn tick(&mut self, armed_epoch: u64) -> TickOutcome {
        if armed_epoch != self.epoch {
            return TickOutcome::Superseded;
        }
        if self.count == 0 {
            return TickOutcome::Idle;
        }

        self.count -= 1;
        if self.count == 0 && self.has_synced() {
            TickOutcome::Expired
        } else {
            TickOutcome::Ticking(self.count)
        }
    }
}

/// Writer side used when a snapshot arrives.
#[derive(Debug, Clone)]
pub struct CountdownHandle {
    state: Rc<RefCell<CountdownReconciler>>,
    wake: UnboundedSender<()>,
    refresh: RefreshHandle,
}

impl CountdownHandle {
    /// Resets the count from server truth and restarts the one-second wait.
    /// A snapshot that cuts a running countdown to zero requests a refresh.
    pub fn reconcile(&self, remaining_time: i64) -> u64 {
        let reconciled = self.state.borrow_mut().reconcile(remaining_time);
        if reconciled.expired {
            debug!("Snapshot ended the countdown, requesting fresh status");
            self.refresh.request(RefreshReason::CountdownExpired);
        }
        let _ = self.wake.unbounded_send(());
        reconciled.count
    }

    pub fn count(&self) -> u64 {
        self.state.borrow().count()
    }

    pub fn close(&self) {
        self.wake.close_channel();
    }
}

/// Drives the per-second decrement.
pub struct CountdownTimer<C> {
    state: Rc<RefCell<CountdownReconciler>>,
    wakes: UnboundedReceiver<()>,
    clock: Rc<C>,
    tick: Duration,
    refresh: RefreshHandle,
    cancel: CancelToken,
}

pub fn countdown_channel<C: Clock>(
    clock: Rc<C>,
    tick: Duration,
    refresh: RefreshHandle,
    cancel: CancelToken,
) -> (CountdownHandle, CountdownTimer<C>) {
    let state = Rc::new(RefCell::new(CountdownReconciler::default()));
    let (wake, wakes) = mpsc::unbounded();
    (
        CountdownHandle {
            state: state.clone(),
            wake,
            refresh: refresh.clone(),
        },
        CountdownTimer {
            state,
            wakes,
            clock,
            tick,
            refresh,
            cancel,
        },
    )
}

impl<C: Clock> CountdownTimer<C> {
    /// Runs until cancelled or the handle is closed. `on_tick` sees every
    /// locally decremented value; resets are published by whoever reconciles.
    pub async fn run(mut self, mut on_tick: impl FnMut(u64)) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            if !self.state.borrow().is_ticking() {
                match self.wakes.next().await {
                    Some(()) => continue,
                    None => return,
                }
            }

            let armed = self.state.borrow().epoch();
            match future::select(self.clock.sleep(self.tick), self.wakes.next()).await {
                Either::Left(_) => {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                    let outcome = self.state.borrow_mut().tick(armed);
                    match outcome {
                        TickOutcome::Ticking(count) => on_tick(count),
                        TickOutcome::Expired => {
                            on_tick(0);
                            debug!("Countdown reached zero, requesting fresh status");
                            self.refresh.request(RefreshReason::CountdownExpired);
                        }
                        TickOutcome::Superseded | TickOutcome::Idle => {}
                    }
                }
                // Snapshot arrived mid-wait: drop the pending tick and re-arm.
                Either::Right((Some(()), _)) => {}
                Either::Right((None, _)) => return,
            }
        }
    }
}
