use chrono::{DateTime, Utc};
use shared_types::{LaneId, LaneState, StatusSnapshot};

use crate::sync::poller::PublishedSnapshot;

/// What the dashboard shows, apart from the countdown and the chat transcript.
///
/// Only the coordinator writes it; the view reads clones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub snapshot: Option<StatusSnapshot>,
    /// Sequence number of the snapshot currently shown (0 before the first sync).
    pub sync_seq: u64,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub selection: Option<LaneId>,
}

impl DisplayState {
    pub fn is_loading(&self) -> bool {
        self.snapshot.is_none()
    }

    /// Replaces the snapshot wholesale. Older sequence numbers are dropped;
    /// returns whether the snapshot was applied.
    pub fn apply_snapshot(&mut self, published: PublishedSnapshot) -> bool {
        if published.seq <= self.sync_seq {
            return false;
        }

        if let Some(selected) = &self.selection {
            if !published.snapshot.has_lane(selected) {
                self.selection = None;
            }
        }

        self.snapshot = Some(published.snapshot);
        self.sync_seq = published.seq;
        self.last_synced_at = Some(published.synced_at);
        true
    }

    /// Selects a lane present in the current snapshot; anything else is ignored.
    pub fn select_lane(&mut self, lane: LaneId) -> bool {
        let present = self
            .snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot.has_lane(&lane));
        if present {
            self.selection = Some(lane);
        }
        present
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selected_lane(&self) -> Option<(&LaneId, &LaneState)> {
        let lane = self.selection.as_ref()?;
        let state = self.snapshot.as_ref()?.lane(lane)?;
        Some((lane, state))
    }
}
