//! Tournament-level form
//!
//! Two-stage rollup: wins are summed within each tournament a player enters,
//! then averaged over the player's previous N completed tournaments (overall
//! and on the current surface). The tournament in progress never counts.

use super::rolling::{Aggregate, KeyedWindows, TrailingWindow};
use super::{FeatureRow, PlayerTracker};
use crate::data::sequencer::PlayerMatchView;
use crate::Surface;

/// Tournament currently being accumulated
#[derive(Debug, Clone)]
struct OpenTournament {
    tourney_id: String,
    surface: Surface,
    wins: f64,
}

pub struct TournamentTracker {
    size: usize,
    overall: TrailingWindow,
    by_surface: KeyedWindows<Surface>,
    open: Option<OpenTournament>,
}

impl TournamentTracker {
    pub fn new(size: usize) -> Self {
        TournamentTracker {
            size,
            overall: TrailingWindow::new(size, Aggregate::Mean),
            by_surface: KeyedWindows::new(size, Aggregate::Mean),
            open: None,
        }
    }

    /// Close the open tournament if `view` belongs to a different one
    fn close_if_finished(&mut self, view: &PlayerMatchView) {
        let finished = matches!(&self.open, Some(t) if t.tourney_id != view.match_id.tourney_id);
        if finished {
            if let Some(t) = self.open.take() {
                self.overall.push(Some(t.wins));
                self.by_surface.push(t.surface, Some(t.wins));
            }
        }
    }
}

impl PlayerTracker for TournamentTracker {
    fn emit(&mut self, view: &PlayerMatchView, row: &mut FeatureRow) {
        self.close_if_finished(view);
        row.set(format!("tourney_wins_{}", self.size), self.overall.value());
        row.set(
            format!("surface_tourney_wins_{}", self.size),
            self.by_surface.value(&view.surface),
        );
    }

    fn absorb(&mut self, view: &PlayerMatchView) {
        self.close_if_finished(view);
        let open = self.open.get_or_insert_with(|| OpenTournament {
            tourney_id: view.match_id.tourney_id.clone(),
            surface: view.surface,
            wins: 0.0,
        });
        if view.won {
            open.wins += 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{Competitor, MatchId, PlayerId, TourneyLevel};

    fn make_view(tourney: &str, num: u32, surface: Surface, won: bool) -> PlayerMatchView {
        PlayerMatchView {
            match_id: MatchId::new(tourney, num),
            date: NaiveDate::from_ymd_opt(2024, 4, num).unwrap(),
            surface,
            level: TourneyLevel::TourB,
            round: "R32".to_string(),
            player: PlayerId::new("A"),
            opponent: PlayerId::new("B"),
            won,
            own: Competitor::new("A"),
            opp: Competitor::new("B"),
            position: num,
        }
    }

    fn run(views: &[PlayerMatchView]) -> Vec<FeatureRow> {
        let mut tracker = TournamentTracker::new(5);
        views
            .iter()
            .map(|v| {
                let mut row = FeatureRow::new();
                tracker.emit(v, &mut row);
                tracker.absorb(v);
                row
            })
            .collect()
    }

    #[test]
    fn test_current_tournament_excluded() {
        let rows = run(&[
            make_view("T1", 1, Surface::Clay, true),
            make_view("T1", 2, Surface::Clay, true),
            make_view("T1", 3, Surface::Clay, false),
            make_view("T2", 4, Surface::Hard, true),
            make_view("T3", 5, Surface::Clay, false),
        ]);

        // Inside the first tournament nothing is completed yet
        assert_eq!(rows[1].get("tourney_wins_5"), None);
        assert_eq!(rows[2].get("tourney_wins_5"), None);
        // T1 completed with 2 wins
        assert_eq!(rows[3].get("tourney_wins_5"), Some(2.0));
        assert_eq!(rows[3].get("surface_tourney_wins_5"), None);
        // T1 (2) and T2 (1) completed; only T1 on clay
        assert_eq!(rows[4].get("tourney_wins_5"), Some(1.5));
        assert_eq!(rows[4].get("surface_tourney_wins_5"), Some(2.0));
    }
}
