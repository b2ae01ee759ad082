//! Tennis match feature replay
//!
//! Replays a chronological log of match results and produces a leakage-free
//! training table: every feature of a match is computed only from matches that
//! were played before it.

pub mod data;
pub mod features;
pub mod tuning;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier for a player
///
/// Identities are compared lexicographically; this ordering decides which
/// side of a match becomes `p1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        PlayerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a match: tournament plus match number within it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchId {
    pub tourney_id: String,
    pub match_num: u32,
}

impl MatchId {
    pub fn new(tourney_id: impl Into<String>, match_num: u32) -> Self {
        MatchId {
            tourney_id: tourney_id.into(),
            match_num,
        }
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tourney_id, self.match_num)
    }
}

/// Court surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Surface {
    Hard,
    Clay,
    Grass,
    Carpet,
    Unknown,
}

impl Surface {
    pub fn code(&self) -> &'static str {
        match self {
            Surface::Hard => "Hard",
            Surface::Clay => "Clay",
            Surface::Grass => "Grass",
            Surface::Carpet => "Carpet",
            Surface::Unknown => "Unknown",
        }
    }

    /// Parse a surface name; anything unrecognized (including empty) is `Unknown`
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "hard" => Surface::Hard,
            "clay" => Surface::Clay,
            "grass" => Surface::Grass,
            "carpet" => Surface::Carpet,
            _ => Surface::Unknown,
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Tournament level
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TourneyLevel {
    /// G
    GrandSlam,
    /// F
    TourFinals,
    /// M
    Masters,
    /// A
    TourA,
    /// B
    TourB,
    /// Any other code, kept verbatim
    Other(String),
}

impl TourneyLevel {
    pub fn code(&self) -> &str {
        match self {
            TourneyLevel::GrandSlam => "G",
            TourneyLevel::TourFinals => "F",
            TourneyLevel::Masters => "M",
            TourneyLevel::TourA => "A",
            TourneyLevel::TourB => "B",
            TourneyLevel::Other(code) => code,
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "G" => TourneyLevel::GrandSlam,
            "F" => TourneyLevel::TourFinals,
            "M" => TourneyLevel::Masters,
            "A" => TourneyLevel::TourA,
            "B" => TourneyLevel::TourB,
            other => TourneyLevel::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TourneyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Box-score serve counters for one side of a match
///
/// Every counter is nullable: absence propagates as a null feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ServeStats {
    pub aces: Option<u32>,
    pub double_faults: Option<u32>,
    pub serve_points: Option<u32>,
    pub first_in: Option<u32>,
    pub first_won: Option<u32>,
    pub second_won: Option<u32>,
    pub serve_games: Option<u32>,
    pub bp_saved: Option<u32>,
    pub bp_faced: Option<u32>,
}

/// One side of a match: identity, box score, and pre-joined ranking context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub id: Option<PlayerId>,
    pub stats: ServeStats,
    pub seed: Option<u32>,
    pub rank: Option<u32>,
    pub rank_points: Option<u32>,
    pub age: Option<f64>,
}

impl Competitor {
    pub fn new(id: impl Into<String>) -> Self {
        Competitor {
            id: Some(PlayerId::new(id)),
            ..Default::default()
        }
    }
}

/// A single completed match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub date: NaiveDate,
    pub tourney_name: Option<String>,
    pub surface: Surface,
    pub level: TourneyLevel,
    pub round: String,
    pub best_of: Option<u8>,
    pub winner: Competitor,
    pub loser: Competitor,
}

impl MatchRecord {
    /// Both identities, or None when either side is missing
    pub fn players(&self) -> Option<(&PlayerId, &PlayerId)> {
        match (&self.winner.id, &self.loser.id) {
            (Some(w), Some(l)) => Some((w, l)),
            _ => None,
        }
    }

    /// Check if the given player won this match
    pub fn did_win(&self, player: &PlayerId) -> Option<bool> {
        if self.winner.id.as_ref() == Some(player) {
            Some(true)
        } else if self.loser.id.as_ref() == Some(player) {
            Some(false)
        } else {
            None
        }
    }

    /// Get the opponent for a given player
    pub fn opponent(&self, player: &PlayerId) -> Option<&PlayerId> {
        if self.winner.id.as_ref() == Some(player) {
            self.loser.id.as_ref()
        } else if self.loser.id.as_ref() == Some(player) {
            self.winner.id.as_ref()
        } else {
            None
        }
    }

    /// Get the competitor record for a given player
    pub fn side(&self, player: &PlayerId) -> Option<&Competitor> {
        if self.winner.id.as_ref() == Some(player) {
            Some(&self.winner)
        } else if self.loser.id.as_ref() == Some(player) {
            Some(&self.loser)
        } else {
            None
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum TennisError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown player: {0}")]
    UnknownPlayer(String),

    #[error("No matches in database - run `tennis data import` first")]
    NoMatches,

    #[error("No training table stored - run `tennis build` first")]
    NoTrainingTable,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, TennisError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub elo: EloSettings,
    pub features: FeatureConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EloSettings {
    pub initial_rating: f64,
    pub k_factors: KFactors,
}

/// K-factor per tournament level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KFactors {
    pub grand_slam: f64,
    pub tour_finals: f64,
    pub masters: f64,
    pub tour_a: f64,
    pub tour_b: f64,
    /// Used for any unrecognized level; equal to `masters` unless configured
    pub default: f64,
}

impl Default for KFactors {
    fn default() -> Self {
        KFactors {
            grand_slam: 16.0,
            tour_finals: 18.0,
            masters: 20.0,
            tour_a: 22.0,
            tour_b: 24.0,
            default: 20.0,
        }
    }
}

impl KFactors {
    pub fn for_level(&self, level: &TourneyLevel) -> f64 {
        match level {
            TourneyLevel::GrandSlam => self.grand_slam,
            TourneyLevel::TourFinals => self.tour_finals,
            TourneyLevel::Masters => self.masters,
            TourneyLevel::TourA => self.tour_a,
            TourneyLevel::TourB => self.tour_b,
            TourneyLevel::Other(_) => self.default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Win-rate windows (last N matches)
    pub form_windows: Vec<usize>,
    /// Window for serve/return statistics, overall and per surface
    pub stats_window: usize,
    /// Window over prior tournaments for the tournament rollup
    pub tournament_window: usize,
    /// Calendar-day workload windows
    pub workload_days: Vec<i64>,
    /// Window for the opponent-strength mean
    pub opponent_window: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            elo: EloSettings {
                initial_rating: 1500.0,
                k_factors: KFactors::default(),
            },
            features: FeatureConfig {
                form_windows: vec![5, 10],
                stats_window: 10,
                tournament_window: 5,
                workload_days: vec![14, 30],
                opponent_window: 10,
            },
            data: DataConfig {
                database_path: "data/tennis.db".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TennisError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| TennisError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TennisError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_codes() {
        assert_eq!(Surface::from_code("Hard"), Surface::Hard);
        assert_eq!(Surface::from_code(" clay "), Surface::Clay);
        assert_eq!(Surface::from_code(""), Surface::Unknown);
        assert_eq!(Surface::from_code("ice"), Surface::Unknown);
    }

    #[test]
    fn test_k_factor_table() {
        let k = KFactors::default();
        assert_eq!(k.for_level(&TourneyLevel::from_code("G")), 16.0);
        assert_eq!(k.for_level(&TourneyLevel::from_code("F")), 18.0);
        assert_eq!(k.for_level(&TourneyLevel::from_code("M")), 20.0);
        assert_eq!(k.for_level(&TourneyLevel::from_code("A")), 22.0);
        assert_eq!(k.for_level(&TourneyLevel::from_code("B")), 24.0);
        // Unknown levels share the Masters value
        assert_eq!(k.for_level(&TourneyLevel::from_code("D")), 20.0);
    }

    #[test]
    fn test_player_id_ordering() {
        assert!(PlayerId::new("A") < PlayerId::new("B"));
        assert!(PlayerId::new("104925") < PlayerId::new("9"));
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_table_points_to_build() {
        let message = TennisError::NoTrainingTable.to_string();
        assert!(message.contains("tennis build"));
        assert!(!TennisError::NoMatches.to_string().contains("tennis build"));
    }
}
