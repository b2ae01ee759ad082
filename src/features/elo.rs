//! Elo rating engine
//!
//! Replays matches in global order and records every player's rating
//! *before* each match, overall and on the match surface.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::data::sequencer::ViewKey;
use crate::{KFactors, MatchId, MatchRecord, PlayerId, Surface};

/// Partition over which a separate rating is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Surface(Surface),
}

/// Elo rating configuration
#[derive(Debug, Clone, Copy)]
pub struct EloConfig {
    /// Starting rating for unseen players
    pub initial_rating: f64,
    /// K-factor by tournament level
    pub k_factors: KFactors,
}

impl Default for EloConfig {
    fn default() -> Self {
        EloConfig {
            initial_rating: 1500.0,
            k_factors: KFactors::default(),
        }
    }
}

impl From<&crate::EloSettings> for EloConfig {
    fn from(settings: &crate::EloSettings) -> Self {
        EloConfig {
            initial_rating: settings.initial_rating,
            k_factors: settings.k_factors,
        }
    }
}

/// Pre-match ratings for one player at one match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSnapshot {
    pub global: f64,
    pub surface: f64,
}

/// Append-only log of pre-match ratings keyed by (match, player)
#[derive(Debug, Clone, Default)]
pub struct SnapshotLog {
    entries: HashMap<ViewKey, RatingSnapshot>,
}

impl SnapshotLog {
    /// Record a snapshot; an existing entry is never overwritten
    fn record(&mut self, key: ViewKey, snapshot: RatingSnapshot) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(e) => {
                log::warn!("Rating snapshot for {} at {} already recorded", e.key().1, e.key().0);
                false
            }
            Entry::Vacant(e) => {
                e.insert(snapshot);
                true
            }
        }
    }

    pub fn get(&self, match_id: &MatchId, player: &PlayerId) -> Option<&RatingSnapshot> {
        self.entries.get(&(match_id.clone(), player.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Expected score of a player rated `rating` against `opponent`
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((opponent - rating) / 400.0))
}

/// Sequential Elo state machine
///
/// Must be fed matches in canonical order; feeding them out of order silently
/// produces a different rating trajectory.
pub struct RatingEngine {
    ratings: HashMap<(PlayerId, Scope), f64>,
    snapshots: SnapshotLog,
    config: EloConfig,
}

impl Default for RatingEngine {
    fn default() -> Self {
        Self::new(EloConfig::default())
    }
}

impl RatingEngine {
    pub fn new(config: EloConfig) -> Self {
        RatingEngine {
            ratings: HashMap::new(),
            snapshots: SnapshotLog::default(),
            config,
        }
    }

    /// Replay a full ordered match log from empty state
    pub fn replay<'a>(config: EloConfig, matches: impl IntoIterator<Item = &'a MatchRecord>) -> Self {
        let mut engine = Self::new(config);
        for m in matches {
            engine.process(m);
        }
        log::debug!(
            "Rating replay finished: {} snapshots, {} rating entries",
            engine.snapshots.len(),
            engine.ratings.len()
        );
        engine
    }

    /// Current rating (initial if unseen)
    pub fn rating(&self, player: &PlayerId, scope: Scope) -> f64 {
        self.ratings
            .get(&(player.clone(), scope))
            .copied()
            .unwrap_or(self.config.initial_rating)
    }

    /// Apply one match. Returns false if the match was skipped.
    pub fn process(&mut self, record: &MatchRecord) -> bool {
        let Some((winner, loser)) = record.players() else {
            return false;
        };

        let k = self.config.k_factors.for_level(&record.level);
        let scopes = [Scope::Global, Scope::Surface(record.surface)];

        let pre: Vec<(f64, f64)> = scopes
            .iter()
            .map(|&s| (self.rating(winner, s), self.rating(loser, s)))
            .collect();

        self.snapshots.record(
            (record.id.clone(), winner.clone()),
            RatingSnapshot {
                global: pre[0].0,
                surface: pre[1].0,
            },
        );
        self.snapshots.record(
            (record.id.clone(), loser.clone()),
            RatingSnapshot {
                global: pre[0].1,
                surface: pre[1].1,
            },
        );

        for (&scope, &(r_w, r_l)) in scopes.iter().zip(pre.iter()) {
            let delta = k * (1.0 - expected_score(r_w, r_l));
            self.ratings.insert((winner.clone(), scope), r_w + delta);
            self.ratings.insert((loser.clone(), scope), r_l - delta);
        }

        true
    }

    pub fn snapshots(&self) -> &SnapshotLog {
        &self.snapshots
    }

    /// Consume the engine, keeping only the immutable snapshot log
    pub fn into_snapshots(self) -> SnapshotLog {
        self.snapshots
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{Competitor, TourneyLevel};

    fn make_match(num: u32, winner: &str, loser: &str, surface: Surface) -> MatchRecord {
        MatchRecord {
            id: MatchId::new("T", num),
            date: NaiveDate::from_ymd_opt(2024, 1, num).unwrap(),
            tourney_name: None,
            surface,
            level: TourneyLevel::Masters,
            round: "R32".to_string(),
            best_of: Some(3),
            winner: Competitor::new(winner),
            loser: Competitor::new(loser),
        }
    }

    fn pid(s: &str) -> PlayerId {
        PlayerId::new(s)
    }

    #[test]
    fn test_initial_ratings() {
        let engine = RatingEngine::default();
        assert_eq!(engine.rating(&pid("A"), Scope::Global), 1500.0);
        assert_eq!(engine.rating(&pid("Z"), Scope::Surface(Surface::Clay)), 1500.0);
    }

    #[test]
    fn test_expected_scores_sum_to_one() {
        for (a, b) in [(1500.0, 1500.0), (1620.0, 1480.0), (1300.0, 1900.0)] {
            let sum = expected_score(a, b) + expected_score(b, a);
            assert!((sum - 1.0).abs() < 1e-12);
        }
        assert!((expected_score(1500.0, 1500.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_is_pre_match() {
        let mut engine = RatingEngine::default();
        let m1 = make_match(1, "A", "B", Surface::Hard);
        engine.process(&m1);

        let snap = engine.snapshots().get(&m1.id, &pid("A")).unwrap();
        assert_eq!(snap.global, 1500.0);
        assert_eq!(snap.surface, 1500.0);
        assert!((engine.rating(&pid("A"), Scope::Global) - 1510.0).abs() < 1e-9);
        assert!((engine.rating(&pid("B"), Scope::Global) - 1490.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_sum_per_scope() {
        let mut engine = RatingEngine::default();
        let matches = [
            make_match(1, "A", "B", Surface::Hard),
            make_match(2, "B", "C", Surface::Clay),
            make_match(3, "C", "A", Surface::Hard),
        ];
        for m in &matches {
            let (w, l) = m.players().unwrap();
            let scopes = [Scope::Global, Scope::Surface(m.surface)];
            let before: Vec<(f64, f64)> =
                scopes.iter().map(|&s| (engine.rating(w, s), engine.rating(l, s))).collect();
            engine.process(m);
            for (&s, &(w0, l0)) in scopes.iter().zip(before.iter()) {
                let dw = engine.rating(w, s) - w0;
                let dl = engine.rating(l, s) - l0;
                assert!((dw + dl).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_surface_scopes_are_independent() {
        let mut engine = RatingEngine::default();
        engine.process(&make_match(1, "A", "B", Surface::Clay));
        let m2 = make_match(2, "A", "B", Surface::Grass);
        engine.process(&m2);

        let snap = engine.snapshots().get(&m2.id, &pid("A")).unwrap();
        assert!(snap.global > 1500.0);
        assert_eq!(snap.surface, 1500.0);
    }

    #[test]
    fn test_missing_identity_skipped() {
        let mut engine = RatingEngine::default();
        let mut m = make_match(1, "A", "B", Surface::Hard);
        m.loser.id = None;

        assert!(!engine.process(&m));
        assert!(engine.snapshots().is_empty());
        assert_eq!(engine.rating(&pid("A"), Scope::Global), 1500.0);
    }

    #[test]
    fn test_k_factor_by_level() {
        let mut engine = RatingEngine::default();
        let mut m = make_match(1, "A", "B", Surface::Hard);
        m.level = TourneyLevel::GrandSlam;
        engine.process(&m);
        assert!((engine.rating(&pid("A"), Scope::Global) - 1508.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_surface_is_its_own_scope() {
        let mut engine = RatingEngine::default();
        engine.process(&make_match(1, "A", "B", Surface::Hard));
        let m2 = make_match(2, "A", "B", Surface::Unknown);
        engine.process(&m2);

        let snap = engine.snapshots().get(&m2.id, &pid("A")).unwrap();
        assert!((snap.global - 1510.0).abs() < 1e-9);
        assert_eq!(snap.surface, 1500.0);

        assert!((engine.rating(&pid("A"), Scope::Surface(Surface::Unknown)) - 1510.0).abs() < 1e-9);
        assert!((engine.rating(&pid("A"), Scope::Surface(Surface::Hard)) - 1510.0).abs() < 1e-9);
        let total = engine.rating(&pid("A"), Scope::Surface(Surface::Unknown))
            + engine.rating(&pid("B"), Scope::Surface(Surface::Unknown));
        assert!((total - 3000.0).abs() < 1e-9);
    }
}
