//! Recent form: win rate over the last N matches

use super::rolling::{Aggregate, TrailingWindow};
use super::{FeatureRow, PlayerTracker};
use crate::data::sequencer::PlayerMatchView;

/// Win rate over one or more trailing windows
pub struct FormTracker {
    windows: Vec<(usize, TrailingWindow)>,
}

impl FormTracker {
    pub fn new(sizes: &[usize]) -> Self {
        FormTracker {
            windows: sizes
                .iter()
                .map(|&n| (n, TrailingWindow::new(n, Aggregate::Mean)))
                .collect(),
        }
    }

    pub fn feature_name(size: usize) -> String {
        format!("win_rate_{}", size)
    }
}

impl PlayerTracker for FormTracker {
    fn emit(&mut self, _view: &PlayerMatchView, row: &mut FeatureRow) {
        for (size, window) in &self.windows {
            row.set_ratio(Self::feature_name(*size), window.value());
        }
    }

    fn absorb(&mut self, view: &PlayerMatchView) {
        let won = if view.won { 1.0 } else { 0.0 };
        for (_, window) in &mut self.windows {
            window.push(Some(won));
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{Competitor, MatchId, PlayerId, Surface, TourneyLevel};

    fn make_view(num: u32, won: bool) -> PlayerMatchView {
        PlayerMatchView {
            match_id: MatchId::new("T", num),
            date: NaiveDate::from_ymd_opt(2024, 1, num).unwrap(),
            surface: Surface::Hard,
            level: TourneyLevel::Masters,
            round: "R32".to_string(),
            player: PlayerId::new("A"),
            opponent: PlayerId::new("B"),
            won,
            own: Competitor::new("A"),
            opp: Competitor::new("B"),
            position: num,
        }
    }

    #[test]
    fn test_win_rate_excludes_current() {
        let mut tracker = FormTracker::new(&[5]);
        let pattern = [true, false, true, true, false, true];

        let mut last = FeatureRow::new();
        for (i, &won) in pattern.iter().enumerate() {
            let view = make_view(i as u32 + 1, won);
            let mut row = FeatureRow::new();
            tracker.emit(&view, &mut row);
            tracker.absorb(&view);
            last = row;
        }

        // Only the first five results count at the sixth match
        assert_eq!(last.get("win_rate_5"), Some(3.0 / 5.0));
    }

    #[test]
    fn test_first_match_is_null() {
        let mut tracker = FormTracker::new(&[5, 10]);
        let mut row = FeatureRow::new();
        tracker.emit(&make_view(1, true), &mut row);

        assert!(row.contains("win_rate_5"));
        assert_eq!(row.get("win_rate_5"), None);
        assert_eq!(row.get("win_rate_10"), None);
    }
}
