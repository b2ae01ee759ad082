//! Strength of recent opposition
//!
//! Mean pre-match global rating of the player's last N opponents, centered on
//! the initial rating so that baseline opposition reads as zero.

use super::elo::SnapshotLog;
use super::rolling::{Aggregate, TrailingWindow};
use super::{FeatureRow, PlayerTracker};
use crate::data::sequencer::PlayerMatchView;

pub struct OpponentStrengthTracker<'a> {
    snapshots: &'a SnapshotLog,
    baseline: f64,
    size: usize,
    window: TrailingWindow,
}

impl<'a> OpponentStrengthTracker<'a> {
    pub fn new(snapshots: &'a SnapshotLog, size: usize, baseline: f64) -> Self {
        OpponentStrengthTracker {
            snapshots,
            baseline,
            size,
            window: TrailingWindow::new(size, Aggregate::Mean),
        }
    }
}

impl PlayerTracker for OpponentStrengthTracker<'_> {
    fn emit(&mut self, _view: &PlayerMatchView, row: &mut FeatureRow) {
        row.set(
            format!("opp_elo_{}", self.size),
            self.window.value().map(|mean| mean - self.baseline),
        );
    }

    fn absorb(&mut self, view: &PlayerMatchView) {
        let opp_rating = self
            .snapshots
            .get(&view.match_id, &view.opponent)
            .map(|s| s.global);
        self.window.push(opp_rating);
    }
}
