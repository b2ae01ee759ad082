//! Workload window features
//!
//! Tracks match density over calendar-day windows to approximate fatigue,
//! and the rest gap since the previous match.

use std::collections::VecDeque;

use chrono::NaiveDate;

use super::{FeatureRow, PlayerTracker};
use crate::data::sequencer::PlayerMatchView;

/// Computes workload features from one player's match history
pub struct WorkloadTracker {
    /// Calendar windows in days
    windows: Vec<i64>,
    /// Dates of prior matches, oldest first, trimmed to the widest window
    recent: VecDeque<NaiveDate>,
    last_match: Option<NaiveDate>,
}

impl WorkloadTracker {
    pub fn new(windows: &[i64]) -> Self {
        WorkloadTracker {
            windows: windows.to_vec(),
            recent: VecDeque::new(),
            last_match: None,
        }
    }

    /// Prior matches dated within `days` of `current_date`
    ///
    /// Same-day earlier matches count; they precede the current one in the
    /// player's order.
    pub fn matches_in_window(&self, current_date: NaiveDate, days: i64) -> u32 {
        self.recent
            .iter()
            .filter(|d| {
                let diff = (current_date - **d).num_days();
                (0..=days).contains(&diff)
            })
            .count() as u32
    }

    /// Days since the previous match, None for a first match
    pub fn days_since_last(&self, current_date: NaiveDate) -> Option<i64> {
        self.last_match.map(|last| (current_date - last).num_days())
    }

    fn widest(&self) -> i64 {
        self.windows.iter().copied().max().unwrap_or(0)
    }
}

impl PlayerTracker for WorkloadTracker {
    fn emit(&mut self, view: &PlayerMatchView, row: &mut FeatureRow) {
        for &days in &self.windows {
            row.set(
                format!("matches_{}d", days),
                Some(self.matches_in_window(view.date, days) as f64),
            );
        }
        row.set(
            "days_since_last",
            self.days_since_last(view.date).map(|d| d as f64),
        );
    }

    fn absorb(&mut self, view: &PlayerMatchView) {
        let widest = self.widest();
        self.recent.push_back(view.date);
        while let Some(front) = self.recent.front() {
            if (view.date - *front).num_days() > widest {
                self.recent.pop_front();
            } else {
                break;
            }
        }
        self.last_match = Some(view.date);
    }
}
