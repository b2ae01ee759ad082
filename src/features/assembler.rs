//! Training row assembly
//!
//! Sides are assigned by identity order (p1 = lower id) rather than by
//! outcome, and every per-player feature becomes a `p1 - p2` difference.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::elo::SnapshotLog;
use super::round::round_stage;
use super::{FeatureRow, FeatureStore, FillPolicy};
use crate::data::sequencer::MatchSequence;
use crate::{MatchId, MatchRecord, PlayerId};

/// One output row per match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub match_id: MatchId,
    pub date: NaiveDate,
    pub surface: String,
    pub level: String,
    pub round: String,
    pub best_of: Option<u8>,
    pub round_stage: u8,
    pub p1_id: PlayerId,
    pub p2_id: PlayerId,
    /// 1 if p1 won
    pub y: u8,
    /// `<feature>_diff` → value
    pub diffs: BTreeMap<String, Option<f64>>,
}

impl TrainingRow {
    pub fn diff(&self, column: &str) -> Option<f64> {
        self.diffs.get(column).copied().flatten()
    }
}

/// The wide output table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingTable {
    /// Difference columns in output order
    pub columns: Vec<String>,
    pub rows: Vec<TrainingRow>,
}

impl TrainingTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, match_id: &MatchId) -> Option<&TrainingRow> {
        self.rows.iter().find(|r| &r.match_id == match_id)
    }

    /// Share of rows where p1 won
    pub fn label_balance(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.rows.iter().map(|r| r.y as f64).sum::<f64>() / self.rows.len() as f64
    }
}

/// Canonical (p1, p2) ordering for a pair of identities
pub fn canonical_pair<'a>(a: &'a PlayerId, b: &'a PlayerId) -> (&'a PlayerId, &'a PlayerId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Difference of two sides under a fill policy
pub fn difference(p1: Option<f64>, p2: Option<f64>, policy: FillPolicy) -> Option<f64> {
    match policy {
        FillPolicy::Zero => Some(p1.unwrap_or(0.0) - p2.unwrap_or(0.0)),
        FillPolicy::Propagate => Some(p1? - p2?),
    }
}

/// Joins rating snapshots and rolling features into training rows
pub struct FeatureAssembler<'a> {
    snapshots: &'a SnapshotLog,
    features: &'a FeatureStore,
}

impl<'a> FeatureAssembler<'a> {
    pub fn new(snapshots: &'a SnapshotLog, features: &'a FeatureStore) -> Self {
        FeatureAssembler {
            snapshots,
            features,
        }
    }

    /// All per-player features for one side of a match
    fn side(&self, match_id: &MatchId, player: &PlayerId) -> FeatureRow {
        let mut row = self
            .features
            .get(match_id, player)
            .cloned()
            .unwrap_or_default();
        let snapshot = self.snapshots.get(match_id, player);
        row.set("elo", snapshot.map(|s| s.global));
        row.set("surface_elo", snapshot.map(|s| s.surface));
        row
    }

    /// Build the row for one match; None when either identity is missing
    pub fn row(&self, record: &MatchRecord) -> Option<TrainingRow> {
        let (winner, loser) = record.players()?;
        let (p1, p2) = canonical_pair(winner, loser);

        let left = self.side(&record.id, p1);
        let right = self.side(&record.id, p2);

        let names: BTreeSet<&str> = left.names().chain(right.names()).collect();
        let diffs = names
            .into_iter()
            .map(|name| {
                let policy = left
                    .feature(name)
                    .or_else(|| right.feature(name))
                    .map(|f| f.policy)
                    .unwrap_or(FillPolicy::Zero);
                (
                    format!("{}_diff", name),
                    difference(left.get(name), right.get(name), policy),
                )
            })
            .collect();

        Some(TrainingRow {
            match_id: record.id.clone(),
            date: record.date,
            surface: record.surface.code().to_string(),
            level: record.level.code().to_string(),
            round: record.round.clone(),
            best_of: record.best_of,
            round_stage: round_stage(&record.round),
            p1_id: p1.clone(),
            p2_id: p2.clone(),
            y: u8::from(winner == p1),
            diffs,
        })
    }

    /// One row per match, in canonical order
    pub fn assemble(&self, sequence: &MatchSequence) -> TrainingTable {
        let rows: Vec<TrainingRow> = sequence
            .matches()
            .iter()
            .filter_map(|m| self.row(m))
            .collect();

        let columns: BTreeSet<&String> = rows.iter().flat_map(|r| r.diffs.keys()).collect();
        let columns = columns.into_iter().cloned().collect();

        TrainingTable { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::elo::{EloConfig, RatingEngine};
    use crate::{Competitor, Surface, TourneyLevel};

    fn make_match(num: u32, winner: &str, loser: &str) -> MatchRecord {
        MatchRecord {
            id: MatchId::new("T", num),
            date: NaiveDate::from_ymd_opt(2024, 7, num).unwrap(),
            tourney_name: None,
            surface: Surface::Clay,
            level: TourneyLevel::Masters,
            round: "SF".to_string(),
            best_of: Some(3),
            winner: Competitor::new(winner),
            loser: Competitor::new(loser),
        }
    }

    #[test]
    fn test_difference_policies() {
        assert_eq!(difference(Some(3.0), None, FillPolicy::Zero), Some(3.0));
        assert_eq!(difference(None, None, FillPolicy::Zero), Some(0.0));
        assert_eq!(difference(Some(3.0), None, FillPolicy::Propagate), None);
        assert_eq!(difference(Some(0.5), Some(0.25), FillPolicy::Propagate), Some(0.25));
    }

    #[test]
    fn test_canonical_pairing_and_label() {
        let seq = MatchSequence::new(vec![make_match(1, "Z", "M"), make_match(2, "M", "Z")]);
        let engine = RatingEngine::replay(EloConfig::default(), seq.matches());
        let store = FeatureStore::new();
        let table = FeatureAssembler::new(engine.snapshots(), &store).assemble(&seq);

        for row in &table.rows {
            assert!(row.p1_id < row.p2_id);
            assert_eq!(row.p1_id, PlayerId::new("M"));
        }
        assert_eq!(table.rows[0].y, 0);
        assert_eq!(table.rows[1].y, 1);
        assert_eq!(table.rows[0].round_stage, 6);
    }

    #[test]
    fn test_elo_diff_is_p1_minus_p2() {
        let seq = MatchSequence::new(vec![make_match(1, "B", "A"), make_match(2, "A", "B")]);
        let engine = RatingEngine::replay(EloConfig::default(), seq.matches());
        let store = FeatureStore::new();
        let table = FeatureAssembler::new(engine.snapshots(), &store).assemble(&seq);

        assert_eq!(table.rows[0].diff("elo_diff"), Some(0.0));
        // A lost the first match: 1490 - 1510
        let d = table.rows[1].diff("elo_diff").unwrap();
        assert!((d + 20.0).abs() < 1e-9);
        assert!(table.columns.contains(&"surface_elo_diff".to_string()));
    }
}
