//! K-factor grid search
//!
//! Each grid point replays the full history with its own K table and scores
//! the pre-match global rating difference on a validation date range.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;

use crate::data::sequencer::MatchSequence;
use crate::features::assembler::canonical_pair;
use crate::features::elo::{EloConfig, RatingEngine};
use crate::{KFactors, Result, TennisError};

/// Probability clip for log-loss
pub const LOG_LOSS_EPS: f64 = 1e-15;

/// Win probability implied by a rating difference
pub fn elo_prob(diff: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf(-diff / 400.0))
}

/// Binary cross-entropy of one prediction, with `p` clipped to [eps, 1 - eps]
pub fn log_loss(y: u8, p: f64) -> f64 {
    let p = p.clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS);
    if y == 1 {
        -p.ln()
    } else {
        -(1.0 - p).ln()
    }
}

/// Candidate K values per tournament level
#[derive(Debug, Clone)]
pub struct KGrid {
    pub grand_slam: Vec<f64>,
    pub tour_finals: Vec<f64>,
    pub masters: Vec<f64>,
    pub tour_a: Vec<f64>,
    pub tour_b: Vec<f64>,
}

impl Default for KGrid {
    fn default() -> Self {
        KGrid {
            grand_slam: vec![14.0, 16.0],
            tour_finals: vec![18.0],
            masters: vec![18.0, 20.0, 22.0],
            tour_a: vec![20.0, 22.0, 24.0],
            tour_b: vec![22.0, 24.0, 26.0],
        }
    }
}

impl KGrid {
    /// Cartesian product of all candidates; unknown levels follow `masters`
    pub fn points(&self) -> Vec<KFactors> {
        let mut points = Vec::new();
        for &grand_slam in &self.grand_slam {
            for &tour_finals in &self.tour_finals {
                for &masters in &self.masters {
                    for &tour_a in &self.tour_a {
                        for &tour_b in &self.tour_b {
                            points.push(KFactors {
                                grand_slam,
                                tour_finals,
                                masters,
                                tour_a,
                                tour_b,
                                default: masters,
                            });
                        }
                    }
                }
            }
        }
        points
    }
}

/// Score of one grid point
#[derive(Debug, Clone, Serialize)]
pub struct TuningResult {
    pub k_factors: KFactors,
    pub log_loss: f64,
    pub accuracy: f64,
    pub matches: usize,
}

pub struct EloTuner<'a> {
    sequence: &'a MatchSequence,
    initial_rating: f64,
    from: NaiveDate,
    to: NaiveDate,
}

impl<'a> EloTuner<'a> {
    /// Tuner scoring matches dated within `from..=to`
    pub fn new(sequence: &'a MatchSequence, initial_rating: f64, from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(TennisError::Config(format!(
                "validation range is empty: {} is after {}",
                from, to
            )));
        }
        Ok(EloTuner {
            sequence,
            initial_rating,
            from,
            to,
        })
    }

    fn in_range(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }

    /// Replay with one K table and score the validation matches
    pub fn evaluate(&self, k_factors: KFactors) -> TuningResult {
        let config = EloConfig {
            initial_rating: self.initial_rating,
            k_factors,
        };
        let engine = RatingEngine::replay(config, self.sequence.matches());
        let snapshots = engine.snapshots();

        let mut total_loss = 0.0;
        let mut correct = 0usize;
        let mut n = 0usize;

        for record in self.sequence.matches().iter().filter(|m| self.in_range(m.date)) {
            let Some((winner, loser)) = record.players() else {
                continue;
            };
            let (p1, p2) = canonical_pair(winner, loser);
            let (Some(s1), Some(s2)) = (snapshots.get(&record.id, p1), snapshots.get(&record.id, p2)) else {
                continue;
            };

            let p = elo_prob(s1.global - s2.global);
            let y = u8::from(winner == p1);
            total_loss += log_loss(y, p);
            if (p >= 0.5) == (y == 1) {
                correct += 1;
            }
            n += 1;
        }

        let (log_loss, accuracy) = if n == 0 {
            (f64::NAN, f64::NAN)
        } else {
            (total_loss / n as f64, correct as f64 / n as f64)
        };

        TuningResult {
            k_factors,
            log_loss,
            accuracy,
            matches: n,
        }
    }

    /// Evaluate every grid point, best log-loss first
    pub fn search(&self, grid: &KGrid) -> Result<Vec<TuningResult>> {
        let validation = self
            .sequence
            .matches()
            .iter()
            .filter(|m| self.in_range(m.date))
            .count();
        if validation == 0 {
            return Err(TennisError::NoMatches);
        }

        let points = grid.points();
        log::info!(
            "Tuning {} K-factor combinations on {} validation matches ({} to {})",
            points.len(),
            validation,
            self.from,
            self.to
        );

        let mut results: Vec<TuningResult> = points
            .into_par_iter()
            .map(|k| self.evaluate(k))
            .collect();

        for r in &results {
            log::info!(
                "G={} F={} M={} A={} B={} -> logloss {:.5}, acc {:.4}",
                r.k_factors.grand_slam,
                r.k_factors.tour_finals,
                r.k_factors.masters,
                r.k_factors.tour_a,
                r.k_factors.tour_b,
                r.log_loss,
                r.accuracy
            );
        }

        results.sort_by(|a, b| a.log_loss.total_cmp(&b.log_loss));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Competitor, MatchId, MatchRecord, Surface, TourneyLevel};

    fn make_match(num: u32, day: u32, level: TourneyLevel, winner: &str, loser: &str) -> MatchRecord {
        MatchRecord {
            id: MatchId::new("T", num),
            date: NaiveDate::from_ymd_opt(2022, 3, day).unwrap(),
            tourney_name: None,
            surface: Surface::Hard,
            level,
            round: "R32".to_string(),
            best_of: Some(3),
            winner: Competitor::new(winner),
            loser: Competitor::new(loser),
        }
    }

    fn sequence() -> MatchSequence {
        let mut matches = Vec::new();
        for day in 1..=20 {
            let level = if day % 2 == 0 { TourneyLevel::Masters } else { TourneyLevel::TourA };
            // A mostly beats B, B mostly beats C
            let (w, l) = match day % 5 {
                0 => ("B", "A"),
                1 | 2 => ("A", "B"),
                3 => ("B", "C"),
                _ => ("A", "C"),
            };
            matches.push(make_match(day, day, level, w, l));
        }
        MatchSequence::new(matches)
    }

    #[test]
    fn test_elo_prob() {
        assert!((elo_prob(0.0) - 0.5).abs() < 1e-12);
        assert!((elo_prob(400.0) - 10.0 / 11.0).abs() < 1e-12);
        assert!((elo_prob(100.0) + elo_prob(-100.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_log_loss_is_clipped() {
        assert!((log_loss(1, 0.5) - std::f64::consts::LN_2).abs() < 1e-12);
        let worst = log_loss(1, 0.0);
        assert!(worst.is_finite());
        assert!((worst - (-LOG_LOSS_EPS.ln())).abs() < 1e-9);
        assert!(log_loss(0, 0.0) < 1e-12);
    }

    #[test]
    fn test_default_grid_size() {
        let points = KGrid::default().points();
        assert_eq!(points.len(), 54);
        assert!(points.iter().all(|k| k.default == k.masters));
    }

    #[test]
    fn test_search_is_sorted() {
        let seq = sequence();
        let from = NaiveDate::from_ymd_opt(2022, 3, 11).unwrap();
        let to = NaiveDate::from_ymd_opt(2022, 3, 20).unwrap();
        let tuner = EloTuner::new(&seq, 1500.0, from, to).unwrap();
        let results = tuner.search(&KGrid::default()).unwrap();

        assert_eq!(results.len(), 54);
        assert!(results.iter().all(|r| r.matches == 10));
        for pair in results.windows(2) {
            assert!(pair[0].log_loss <= pair[1].log_loss);
        }
    }

    #[test]
    fn test_empty_range_is_rejected() {
        let seq = sequence();
        let late = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let early = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        assert!(EloTuner::new(&seq, 1500.0, late, early).is_err());

        let tuner = EloTuner::new(&seq, 1500.0, late, late).unwrap();
        assert!(matches!(tuner.search(&KGrid::default()), Err(TennisError::NoMatches)));
    }
}
