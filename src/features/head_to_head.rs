//! Head-to-head history against the current opponent

use std::collections::HashMap;

use chrono::NaiveDate;

use super::rolling::{Aggregate, KeyedWindows};
use super::{FeatureRow, PlayerTracker};
use crate::data::sequencer::PlayerMatchView;
use crate::PlayerId;

/// Prior meetings, prior wins, and days since the last meeting, per opponent
pub struct HeadToHeadTracker {
    played: KeyedWindows<PlayerId>,
    wins: KeyedWindows<PlayerId>,
    last_met: HashMap<PlayerId, NaiveDate>,
}

impl Default for HeadToHeadTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadToHeadTracker {
    pub fn new() -> Self {
        HeadToHeadTracker {
            played: KeyedWindows::unbounded(Aggregate::Count),
            wins: KeyedWindows::unbounded(Aggregate::Sum),
            last_met: HashMap::new(),
        }
    }
}

impl PlayerTracker for HeadToHeadTracker {
    fn emit(&mut self, view: &PlayerMatchView, row: &mut FeatureRow) {
        row.set("h2h_played", self.played.value(&view.opponent));
        row.set("h2h_wins", self.wins.value(&view.opponent));
        row.set(
            "h2h_days_since",
            self.last_met
                .get(&view.opponent)
                .map(|last| (view.date - *last).num_days() as f64),
        );
    }

    fn absorb(&mut self, view: &PlayerMatchView) {
        let won = if view.won { 1.0 } else { 0.0 };
        self.played.push(view.opponent.clone(), Some(1.0));
        self.wins.push(view.opponent.clone(), Some(won));
        self.last_met.insert(view.opponent.clone(), view.date);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Competitor, MatchId, Surface, TourneyLevel};

    fn make_view(num: u32, day: u32, opponent: &str, won: bool) -> PlayerMatchView {
        PlayerMatchView {
            match_id: MatchId::new("T", num),
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            surface: Surface::Hard,
            level: TourneyLevel::TourB,
            round: "R32".to_string(),
            player: PlayerId::new("A"),
            opponent: PlayerId::new(opponent),
            won,
            own: Competitor::new("A"),
            opp: Competitor::new(opponent),
            position: num,
        }
    }

    fn run(views: &[PlayerMatchView]) -> Vec<FeatureRow> {
        let mut tracker = HeadToHeadTracker::new();
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
    fn test_first_meeting_is_null() {
        let rows = run(&[make_view(1, 1, "B", true)]);
        assert_eq!(rows[0].get("h2h_played"), None);
        assert_eq!(rows[0].get("h2h_wins"), None);
        assert_eq!(rows[0].get("h2h_days_since"), None);
    }

    #[test]
    fn test_counts_only_this_opponent() {
        let rows = run(&[
            make_view(1, 1, "B", true),
            make_view(2, 4, "C", false),
            make_view(3, 10, "B", false),
            make_view(4, 10, "B", true),
        ]);

        assert_eq!(rows[2].get("h2h_played"), Some(1.0));
        assert_eq!(rows[2].get("h2h_wins"), Some(1.0));
        assert_eq!(rows[2].get("h2h_days_since"), Some(9.0));

        // Same-day rematch keeps a gap of 0
        assert_eq!(rows[3].get("h2h_played"), Some(2.0));
        assert_eq!(rows[3].get("h2h_wins"), Some(1.0));
        assert_eq!(rows[3].get("h2h_days_since"), Some(0.0));
    }
}
