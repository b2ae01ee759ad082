//! Serve and return box-score rates
//!
//! Each metric is a per-match rate derived from the player's own serve
//! counters or, for the return side, from the opponent's. Rates are averaged
//! over a trailing window overall and per surface.

use super::rolling::{Aggregate, KeyedWindows, TrailingWindow};
use super::{ratio, FeatureRow, PlayerTracker};
use crate::data::sequencer::PlayerMatchView;
use crate::{ServeStats, Surface};

/// Per-match serve/return rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMetric {
    ServePointsWon,
    ReturnPointsWon,
    AcesPerGame,
    DoubleFaultsPerGame,
    FirstServeIn,
    FirstServeWon,
    SecondServeWon,
    BreakPointsSaved,
    /// Opponent aces per opponent service game
    AcesAgainstPerGame,
    /// Points won against the opponent's first serve
    FirstReturnWon,
    /// Points won against the opponent's second serve
    SecondReturnWon,
    /// Break points converted on the opponent's serve
    BreakPointsConverted,
}

impl ServeMetric {
    pub const ALL: [ServeMetric; 12] = [
        ServeMetric::ServePointsWon,
        ServeMetric::ReturnPointsWon,
        ServeMetric::AcesPerGame,
        ServeMetric::DoubleFaultsPerGame,
        ServeMetric::FirstServeIn,
        ServeMetric::FirstServeWon,
        ServeMetric::SecondServeWon,
        ServeMetric::BreakPointsSaved,
        ServeMetric::AcesAgainstPerGame,
        ServeMetric::FirstReturnWon,
        ServeMetric::SecondReturnWon,
        ServeMetric::BreakPointsConverted,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ServeMetric::ServePointsWon => "serve_pts_won",
            ServeMetric::ReturnPointsWon => "return_pts_won",
            ServeMetric::AcesPerGame => "aces_per_game",
            ServeMetric::DoubleFaultsPerGame => "df_per_game",
            ServeMetric::FirstServeIn => "first_in",
            ServeMetric::FirstServeWon => "first_won",
            ServeMetric::SecondServeWon => "second_won",
            ServeMetric::BreakPointsSaved => "bp_saved",
            ServeMetric::AcesAgainstPerGame => "aces_against_per_game",
            ServeMetric::FirstReturnWon => "first_return_won",
            ServeMetric::SecondReturnWon => "second_return_won",
            ServeMetric::BreakPointsConverted => "bp_converted",
        }
    }

    /// Rate for one match, null when a counter is missing or a denominator is 0
    pub fn value(&self, own: &ServeStats, opp: &ServeStats) -> Option<f64> {
        match self {
            ServeMetric::ServePointsWon => ratio(serve_points_won(own), own.serve_points),
            ServeMetric::ReturnPointsWon => {
                let opp_won = serve_points_won(opp)?;
                let total = opp.serve_points?;
                ratio(total.checked_sub(opp_won), Some(total))
            }
            ServeMetric::AcesPerGame => ratio(own.aces, own.serve_games),
            ServeMetric::DoubleFaultsPerGame => ratio(own.double_faults, own.serve_games),
            ServeMetric::FirstServeIn => ratio(own.first_in, own.serve_points),
            ServeMetric::FirstServeWon => ratio(own.first_won, own.first_in),
            ServeMetric::SecondServeWon => ratio(own.second_won, second_serves(own)),
            ServeMetric::BreakPointsSaved => ratio(own.bp_saved, own.bp_faced),
            ServeMetric::AcesAgainstPerGame => ratio(opp.aces, opp.serve_games),
            ServeMetric::FirstReturnWon => {
                let in_play = opp.first_in?;
                ratio(in_play.checked_sub(opp.first_won?), Some(in_play))
            }
            ServeMetric::SecondReturnWon => {
                let in_play = second_serves(opp)?;
                ratio(in_play.checked_sub(opp.second_won?), Some(in_play))
            }
            ServeMetric::BreakPointsConverted => {
                let faced = opp.bp_faced?;
                ratio(faced.checked_sub(opp.bp_saved?), Some(faced))
            }
        }
    }
}

fn serve_points_won(stats: &ServeStats) -> Option<u32> {
    Some(stats.first_won? + stats.second_won?)
}

fn second_serves(stats: &ServeStats) -> Option<u32> {
    stats.serve_points?.checked_sub(stats.first_in?)
}

/// Rolling serve/return rates, overall and on the current surface
pub struct ServeTracker {
    size: usize,
    overall: Vec<TrailingWindow>,
    by_surface: Vec<KeyedWindows<Surface>>,
}

impl ServeTracker {
    pub fn new(size: usize) -> Self {
        ServeTracker {
            size,
            overall: ServeMetric::ALL
                .iter()
                .map(|_| TrailingWindow::new(size, Aggregate::Mean))
                .collect(),
            by_surface: ServeMetric::ALL
                .iter()
                .map(|_| KeyedWindows::new(size, Aggregate::Mean))
                .collect(),
        }
    }
}

impl PlayerTracker for ServeTracker {
    fn emit(&mut self, view: &PlayerMatchView, row: &mut FeatureRow) {
        for (i, metric) in ServeMetric::ALL.iter().enumerate() {
            row.set(format!("{}_{}", metric.name(), self.size), self.overall[i].value());
            row.set(
                format!("surface_{}_{}", metric.name(), self.size),
                self.by_surface[i].value(&view.surface),
            );
        }
    }

    fn absorb(&mut self, view: &PlayerMatchView) {
        for (i, metric) in ServeMetric::ALL.iter().enumerate() {
            let value = metric.value(view.own_stats(), view.opp_stats());
            self.overall[i].push(value);
            self.by_surface[i].push(view.surface, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{Competitor, MatchId, PlayerId, TourneyLevel};

    fn stats(svpt: u32, first_in: u32, first_won: u32, second_won: u32) -> ServeStats {
        ServeStats {
            aces: Some(6),
            double_faults: Some(2),
            serve_points: Some(svpt),
            first_in: Some(first_in),
            first_won: Some(first_won),
            second_won: Some(second_won),
            serve_games: Some(12),
            bp_saved: Some(3),
            bp_faced: Some(4),
        }
    }

    fn make_view(num: u32, surface: Surface, own: ServeStats, opp: ServeStats) -> PlayerMatchView {
        PlayerMatchView {
            match_id: MatchId::new("T", num),
            date: NaiveDate::from_ymd_opt(2024, 2, num).unwrap(),
            surface,
            level: TourneyLevel::TourA,
            round: "R16".to_string(),
            player: PlayerId::new("A"),
            opponent: PlayerId::new("B"),
            won: true,
            own: Competitor { stats: own, ..Competitor::new("A") },
            opp: Competitor { stats: opp, ..Competitor::new("B") },
            position: num,
        }
    }

    #[test]
    fn test_metric_values() {
        let own = stats(80, 50, 40, 15);
        let opp = stats(70, 40, 28, 12);

        let serve = ServeMetric::ServePointsWon.value(&own, &opp).unwrap();
        assert!((serve - 55.0 / 80.0).abs() < 1e-12);
        let ret = ServeMetric::ReturnPointsWon.value(&own, &opp).unwrap();
        assert!((ret - 30.0 / 70.0).abs() < 1e-12);
        assert_eq!(ServeMetric::AcesPerGame.value(&own, &opp), Some(0.5));
        assert_eq!(ServeMetric::SecondServeWon.value(&own, &opp), Some(0.5));
        assert_eq!(ServeMetric::BreakPointsSaved.value(&own, &opp), Some(0.75));
        assert_eq!(ServeMetric::BreakPointsConverted.value(&own, &opp), Some(0.25));
        let first_ret = ServeMetric::FirstReturnWon.value(&own, &opp).unwrap();
        assert!((first_ret - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_missing_counters_are_null() {
        let own = ServeStats::default();
        let mut opp = stats(70, 40, 28, 12);
        opp.bp_faced = Some(0);

        assert_eq!(ServeMetric::ServePointsWon.value(&own, &opp), None);
        assert_eq!(ServeMetric::BreakPointsConverted.value(&own, &opp), None);
        assert!(ServeMetric::ReturnPointsWon.value(&own, &opp).is_some());
    }

    #[test]
    fn test_surface_window_only_sees_same_surface() {
        let mut tracker = ServeTracker::new(10);
        let clay = make_view(1, Surface::Clay, stats(80, 40, 30, 20), stats(80, 40, 30, 20));
        let mut row = FeatureRow::new();
        tracker.emit(&clay, &mut row);
        tracker.absorb(&clay);

        let grass = make_view(2, Surface::Grass, stats(80, 40, 30, 20), stats(80, 40, 30, 20));
        let mut row = FeatureRow::new();
        tracker.emit(&grass, &mut row);

        assert_eq!(row.get("serve_pts_won_10"), Some(50.0 / 80.0));
        assert_eq!(row.get("surface_serve_pts_won_10"), None);
    }
}
