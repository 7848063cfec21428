//! Reward and audit collaborators

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::host::{ItemStack, PlayerId};

/// Produces the loot for a cleared run
pub trait RewardRoller {
    /// Items to present, in order. Called once per boss clear.
    fn roll(&mut self, player: PlayerId) -> Vec<ItemStack>;
}

/// Always hands out the same items
#[derive(Debug, Clone, Default)]
pub struct FixedRewards {
    items: Vec<ItemStack>,
    rolls: usize,
}

impl FixedRewards {
    pub fn new(items: Vec<ItemStack>) -> Self {
        Self { items, rolls: 0 }
    }

    pub fn rolls(&self) -> usize {
        self.rolls
    }
}

impl RewardRoller for FixedRewards {
    fn roll(&mut self, _player: PlayerId) -> Vec<ItemStack> {
        self.rolls += 1;
        self.items.clone()
    }
}

/// Receives human-readable event lines.
///
/// Delivery is best effort; implementations swallow their own failures.
pub trait AuditSink {
    fn record(&self, line: &str);
}

/// Writes audit lines to the `audit` tracing target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, line: &str) {
        info!(target: "audit", "{}", line);
    }
}

/// Keeps audit lines in memory; clones share the buffer
#[derive(Debug, Clone, Default)]
pub struct RecordingAudit {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl AuditSink for RecordingAudit {
    fn record(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
