// src/miner/activity.rs
//! Tracks activity-state changes between control loop iterations

use crate::stats::StatsTracker;
use crate::types::ActivityState;

/// Remembers the last observed [`ActivityState`]
///
/// Crossing between active and paused restarts the stats window; changing
/// reason while staying paused does not.
#[derive(Debug, Default)]
pub struct ActivityMonitor {
    last: Option<ActivityState>,
}

impl ActivityMonitor {
    /// Creates a monitor that has observed nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed state.
    pub fn last(&self) -> Option<ActivityState> {
        self.last
    }

    /// Records `state`, resetting recent stats on an active/paused crossing.
    ///
    /// Returns true when the crossing happened.
    pub fn observe(&mut self, state: ActivityState, stats: &StatsTracker) -> bool {
        let previous = self.last.replace(state);
        if previous == Some(state) {
            return false;
        }
        log::info!("New activity state: {}", state);

        match previous {
            Some(previous) if previous.is_paused() != state.is_paused() => {
                stats.reset_recent();
                true
            }
            _ => false,
        }
    }
}
