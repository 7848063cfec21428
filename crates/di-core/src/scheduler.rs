//! Delayed one-shot actions
//!
//! Tick-keyed queue for work that must happen later on the same thread:
//! expiring unclaimed runs and removing temporary spawn-point markers.

use crate::geometry::BlockPos;
use crate::host::PlayerId;

/// What to do when a timer fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledAction {
    /// Shut down a cleared run whose reward was never claimed
    CompletionTimeout(PlayerId),
    /// Remove a spawn-point marker block if it is still there
    RemoveMarker { space: String, pos: BlockPos },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled {
    pub due: u64,
    pub action: ScheduledAction,
}

/// Timer queue, kept sorted by due tick
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    pending: Vec<Scheduled>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to fire `delay` ticks after `now`
    pub fn schedule_after(&mut self, now: u64, delay: u64, action: ScheduledAction) {
        let due = now.saturating_add(delay);
        // Insert after anything due at the same tick to keep FIFO order
        let pos = self
            .pending
            .iter()
            .position(|s| s.due > due)
            .unwrap_or(self.pending.len());
        self.pending.insert(pos, Scheduled { due, action });
    }

    /// Drop every timer belonging to a player's run
    pub fn cancel_session(&mut self, player: PlayerId) {
        self.pending
            .retain(|s| s.action != ScheduledAction::CompletionTimeout(player));
    }

    /// Pop every action due at or before `now`, in due order
    pub fn tick(&mut self, now: u64) -> Vec<ScheduledAction> {
        let split = self
            .pending
            .iter()
            .position(|s| s.due > now)
            .unwrap_or(self.pending.len());
        self.pending.drain(..split).map(|s| s.action).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.pending.first().map(|s| s.due)
    }
}
