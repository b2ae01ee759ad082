//! Canonical match ordering
//!
//! Imposes the single global order (date, match id) on the match log and
//! splits every match into two player-perspective views with a gapless
//! per-player sequence position.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::{Competitor, MatchId, MatchRecord, PlayerId, ServeStats, Surface, TourneyLevel};

/// Key for anything computed per (match, player)
pub type ViewKey = (MatchId, PlayerId);

/// One match seen from one player's side
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMatchView {
    pub match_id: MatchId,
    pub date: NaiveDate,
    pub surface: Surface,
    pub level: TourneyLevel,
    pub round: String,
    pub player: PlayerId,
    pub opponent: PlayerId,
    pub won: bool,
    /// This player's side of the match
    pub own: Competitor,
    /// The opponent's side of the match
    pub opp: Competitor,
    /// 1-based rank within the player's history
    pub position: u32,
}

impl PlayerMatchView {
    pub fn key(&self) -> ViewKey {
        (self.match_id.clone(), self.player.clone())
    }

    pub fn own_stats(&self) -> &ServeStats {
        &self.own.stats
    }

    pub fn opp_stats(&self) -> &ServeStats {
        &self.opp.stats
    }
}

/// Matches in canonical order with per-player histories
#[derive(Debug, Clone, Default)]
pub struct MatchSequence {
    matches: Vec<MatchRecord>,
    views: Vec<PlayerMatchView>,
    /// Indices into `views`, in per-player order
    by_player: HashMap<PlayerId, Vec<usize>>,
    skipped: usize,
}

impl MatchSequence {
    /// Order matches and build player views
    ///
    /// Records sharing a `MatchId` collapse to the last one given. Matches
    /// without both identities, or with a player facing themself, are
    /// dropped. Both kinds of drop are counted in `skipped`.
    pub fn new(records: Vec<MatchRecord>) -> Self {
        let total = records.len();
        let mut latest: HashMap<MatchId, MatchRecord> = HashMap::with_capacity(total);
        for record in records {
            latest.insert(record.id.clone(), record);
        }
        let duplicates = total - latest.len();
        if duplicates > 0 {
            log::warn!(
                "Dropped {} of {} matches repeating an earlier match id",
                duplicates,
                total
            );
        }

        let unique = latest.len();
        let mut matches: Vec<MatchRecord> = latest
            .into_values()
            .filter(|m| match m.players() {
                Some((w, l)) => w != l,
                None => false,
            })
            .collect();
        let invalid = unique - matches.len();
        if invalid > 0 {
            log::warn!(
                "Dropped {} of {} matches with a missing or repeated player identity",
                invalid,
                unique
            );
        }
        let skipped = duplicates + invalid;

        matches.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

        let mut views = Vec::with_capacity(matches.len() * 2);
        let mut by_player: HashMap<PlayerId, Vec<usize>> = HashMap::new();

        for m in &matches {
            for (own, opp, won) in [(&m.winner, &m.loser, true), (&m.loser, &m.winner, false)] {
                let (Some(player), Some(opponent)) = (&own.id, &opp.id) else {
                    continue;
                };
                let history = by_player.entry(player.clone()).or_default();
                let idx = views.len();
                views.push(PlayerMatchView {
                    match_id: m.id.clone(),
                    date: m.date,
                    surface: m.surface,
                    level: m.level.clone(),
                    round: m.round.clone(),
                    player: player.clone(),
                    opponent: opponent.clone(),
                    won,
                    own: own.clone(),
                    opp: opp.clone(),
                    position: history.len() as u32 + 1,
                });
                history.push(idx);
            }
        }

        MatchSequence {
            matches,
            views,
            by_player,
            skipped,
        }
    }

    /// Matches in global order
    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    pub fn views(&self) -> &[PlayerMatchView] {
        &self.views
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Number of input records that were dropped
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn player_count(&self) -> usize {
        self.by_player.len()
    }

    /// A player's views in per-player order
    pub fn history(&self, player: &PlayerId) -> Vec<&PlayerMatchView> {
        self.by_player
            .get(player)
            .map(|idx| idx.iter().map(|&i| &self.views[i]).collect())
            .unwrap_or_default()
    }

    /// Every player's history, sorted by player id for a stable iteration order
    pub fn histories(&self) -> Vec<(&PlayerId, Vec<&PlayerMatchView>)> {
        let mut players: Vec<&PlayerId> = self.by_player.keys().collect();
        players.sort();
        players
            .into_iter()
            .map(|p| (p, self.history(p)))
            .collect()
    }
}
