//! Rolling feature aggregation
//!
//! Runs every per-player tracker over each player's history in canonical
//! order. Players are independent, so histories are processed in parallel.

use rayon::prelude::*;

use super::bio::BioTable;
use super::elo::SnapshotLog;
use super::form::FormTracker;
use super::head_to_head::HeadToHeadTracker;
use super::opponent::OpponentStrengthTracker;
use super::serve::ServeTracker;
use super::tournament::TournamentTracker;
use super::workload::WorkloadTracker;
use super::{FeatureRow, FeatureStore, PlayerTracker};
use crate::data::sequencer::{MatchSequence, PlayerMatchView, ViewKey};
use crate::FeatureConfig;

pub struct RollingAggregator {
    config: FeatureConfig,
    /// Rating that centers the opponent-strength feature
    baseline: f64,
}

impl RollingAggregator {
    pub fn new(config: FeatureConfig, baseline: f64) -> Self {
        RollingAggregator { config, baseline }
    }

    /// Compute per-(match, player) features for the whole sequence
    pub fn run(&self, sequence: &MatchSequence, snapshots: &SnapshotLog, bios: &BioTable) -> FeatureStore {
        let histories = sequence.histories();
        log::info!("Aggregating rolling features for {} players", histories.len());

        let per_player: Vec<Vec<(ViewKey, FeatureRow)>> = histories
            .par_iter()
            .map(|(_, history)| self.player_rows(history, snapshots, bios))
            .collect();

        let mut store = FeatureStore::new();
        for rows in per_player {
            for (key, row) in rows {
                store.insert(key, row);
            }
        }
        store
    }

    fn trackers<'a>(&self, snapshots: &'a SnapshotLog) -> Vec<Box<dyn PlayerTracker + 'a>> {
        vec![
            Box::new(FormTracker::new(&self.config.form_windows)),
            Box::new(ServeTracker::new(self.config.stats_window)),
            Box::new(HeadToHeadTracker::new()),
            Box::new(TournamentTracker::new(self.config.tournament_window)),
            Box::new(WorkloadTracker::new(&self.config.workload_days)),
            Box::new(OpponentStrengthTracker::new(
                snapshots,
                self.config.opponent_window,
                self.baseline,
            )),
        ]
    }

    /// Features for one player's history, which must be in per-player order
    pub fn player_rows(
        &self,
        history: &[&PlayerMatchView],
        snapshots: &SnapshotLog,
        bios: &BioTable,
    ) -> Vec<(ViewKey, FeatureRow)> {
        let mut trackers = self.trackers(snapshots);

        history
            .iter()
            .map(|view| {
                let mut row = FeatureRow::new();
                write_match_context(view, &mut row);
                bios.write_features(&view.player, &mut row);
                for tracker in trackers.iter_mut() {
                    tracker.emit(view, &mut row);
                }
                for tracker in trackers.iter_mut() {
                    tracker.absorb(view);
                }
                (view.key(), row)
            })
            .collect()
    }
}

/// Ranking context pre-joined on the player's side of the match
fn write_match_context(view: &PlayerMatchView, row: &mut FeatureRow) {
    row.set("rank", view.own.rank.map(f64::from));
    row.set("rank_points", view.own.rank_points.map(f64::from));
    row.set("seed", view.own.seed.map(f64::from));
    row.set("age", view.own.age);
}
