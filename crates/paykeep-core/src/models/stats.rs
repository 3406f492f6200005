use serde::{Deserialize, Serialize};

/// Row counts of the durable queue, by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.pending + self.failed
    }
}

/// Queue statistics published with every `QueueUpdated` event.
///
/// `completed` counts the entries delivered by the current (or most
/// recent) sweep and resets when the next sweep starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub failed: usize,
    pub completed: usize,
    pub in_progress: bool,
}

impl QueueStats {
    pub fn from_counts(counts: QueueCounts, completed: usize, in_progress: bool) -> Self {
        Self {
            total: counts.total(),
            pending: counts.pending,
            failed: counts.failed,
            completed,
            in_progress,
        }
    }

    /// Sweep progress in percent. Capped at 99 while the sweep runs so
    /// that 100 is only reported once it has finished.
    pub fn progress_percent(&self) -> u8 {
        if !self.in_progress {
            return 100;
        }
        let denominator = self.completed + self.pending;
        if denominator == 0 {
            return 0;
        }
        let percent = self.completed * 100 / denominator;
        percent.min(99) as u8
    }
}
