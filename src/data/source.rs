//! CSV match and player sources
//!
//! Reads Sackmann/TML style `atp_matches_*.csv` files and player files.
//! Columns are matched by header name; missing columns and unparseable
//! numbers read as null.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::features::bio::{Hand, PlayerBio};
use crate::{Competitor, MatchId, MatchRecord, PlayerId, Result, ServeStats, Surface, TourneyLevel};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MatchRow {
    tourney_id: Option<String>,
    tourney_name: Option<String>,
    surface: Option<String>,
    tourney_level: Option<String>,
    tourney_date: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    match_num: Option<f64>,
    round: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    best_of: Option<f64>,

    winner_id: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    winner_seed: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    winner_rank: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    winner_rank_points: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    winner_age: Option<f64>,

    loser_id: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    loser_seed: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    loser_rank: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    loser_rank_points: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    loser_age: Option<f64>,

    #[serde(deserialize_with = "csv::invalid_option")]
    w_ace: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    w_df: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    w_svpt: Option<f64>,
    #[serde(rename = "w_1stIn", deserialize_with = "csv::invalid_option")]
    w_first_in: Option<f64>,
    #[serde(rename = "w_1stWon", deserialize_with = "csv::invalid_option")]
    w_first_won: Option<f64>,
    #[serde(rename = "w_2ndWon", deserialize_with = "csv::invalid_option")]
    w_second_won: Option<f64>,
    #[serde(rename = "w_SvGms", deserialize_with = "csv::invalid_option")]
    w_serve_games: Option<f64>,
    #[serde(rename = "w_bpSaved", deserialize_with = "csv::invalid_option")]
    w_bp_saved: Option<f64>,
    #[serde(rename = "w_bpFaced", deserialize_with = "csv::invalid_option")]
    w_bp_faced: Option<f64>,

    #[serde(deserialize_with = "csv::invalid_option")]
    l_ace: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    l_df: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    l_svpt: Option<f64>,
    #[serde(rename = "l_1stIn", deserialize_with = "csv::invalid_option")]
    l_first_in: Option<f64>,
    #[serde(rename = "l_1stWon", deserialize_with = "csv::invalid_option")]
    l_first_won: Option<f64>,
    #[serde(rename = "l_2ndWon", deserialize_with = "csv::invalid_option")]
    l_second_won: Option<f64>,
    #[serde(rename = "l_SvGms", deserialize_with = "csv::invalid_option")]
    l_serve_games: Option<f64>,
    #[serde(rename = "l_bpSaved", deserialize_with = "csv::invalid_option")]
    l_bp_saved: Option<f64>,
    #[serde(rename = "l_bpFaced", deserialize_with = "csv::invalid_option")]
    l_bp_faced: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlayerRow {
    #[serde(alias = "id")]
    player_id: Option<String>,
    hand: Option<String>,
    #[serde(alias = "height_cm", deserialize_with = "csv::invalid_option")]
    height: Option<f64>,
}

/// Result of reading one source file
#[derive(Debug, Default)]
pub struct SourceBatch {
    pub matches: Vec<MatchRecord>,
    /// Rows dropped for lacking tourney id, date, or match number
    pub dropped: usize,
}

/// Non-negative whole count, None otherwise
fn count(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u32)
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse `YYYYMMDD`, falling back to ISO `YYYY-MM-DD`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

impl MatchRow {
    fn into_record(self) -> Option<MatchRecord> {
        let tourney_id = text(self.tourney_id)?;
        let date = self.tourney_date.as_deref().and_then(parse_date)?;
        let match_num = count(self.match_num)?;

        let winner = Competitor {
            id: text(self.winner_id).map(PlayerId),
            stats: ServeStats {
                aces: count(self.w_ace),
                double_faults: count(self.w_df),
                serve_points: count(self.w_svpt),
                first_in: count(self.w_first_in),
                first_won: count(self.w_first_won),
                second_won: count(self.w_second_won),
                serve_games: count(self.w_serve_games),
                bp_saved: count(self.w_bp_saved),
                bp_faced: count(self.w_bp_faced),
            },
            seed: count(self.winner_seed),
            rank: count(self.winner_rank),
            rank_points: count(self.winner_rank_points),
            age: self.winner_age.filter(|a| a.is_finite()),
        };
        let loser = Competitor {
            id: text(self.loser_id).map(PlayerId),
            stats: ServeStats {
                aces: count(self.l_ace),
                double_faults: count(self.l_df),
                serve_points: count(self.l_svpt),
                first_in: count(self.l_first_in),
                first_won: count(self.l_first_won),
                second_won: count(self.l_second_won),
                serve_games: count(self.l_serve_games),
                bp_saved: count(self.l_bp_saved),
                bp_faced: count(self.l_bp_faced),
            },
            seed: count(self.loser_seed),
            rank: count(self.loser_rank),
            rank_points: count(self.loser_rank_points),
            age: self.loser_age.filter(|a| a.is_finite()),
        };

        Some(MatchRecord {
            id: MatchId::new(tourney_id, match_num),
            date,
            tourney_name: text(self.tourney_name),
            surface: Surface::from_code(self.surface.as_deref().unwrap_or("")),
            level: TourneyLevel::from_code(self.tourney_level.as_deref().unwrap_or("")),
            round: text(self.round).unwrap_or_default(),
            best_of: count(self.best_of).and_then(|b| u8::try_from(b).ok()),
            winner,
            loser,
        })
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Read match records from CSV data
pub fn read_matches<R: Read>(reader: R) -> Result<SourceBatch> {
    let mut batch = SourceBatch::default();
    for row in csv_reader(reader).deserialize::<MatchRow>() {
        match row?.into_record() {
            Some(record) => batch.matches.push(record),
            None => batch.dropped += 1,
        }
    }
    if batch.dropped > 0 {
        log::warn!(
            "Dropped {} rows with missing tourney id, date, or match number",
            batch.dropped
        );
    }
    Ok(batch)
}

pub fn read_matches_file<P: AsRef<Path>>(path: P) -> Result<SourceBatch> {
    let path = path.as_ref();
    let batch = read_matches(File::open(path)?)?;
    log::info!("{}: {} matches", path.display(), batch.matches.len());
    Ok(batch)
}

/// Read player bios from CSV data; rows without an id are skipped
pub fn read_players<R: Read>(reader: R) -> Result<Vec<(PlayerId, PlayerBio)>> {
    let mut players = Vec::new();
    for row in csv_reader(reader).deserialize::<PlayerRow>() {
        let row = row?;
        let Some(id) = text(row.player_id) else {
            continue;
        };
        let bio = PlayerBio {
            hand: row.hand.as_deref().and_then(Hand::from_code),
            height_cm: count(row.height),
        };
        players.push((PlayerId(id), bio));
    }
    Ok(players)
}

pub fn read_players_file<P: AsRef<Path>>(path: P) -> Result<Vec<(PlayerId, PlayerBio)>> {
    let path = path.as_ref();
    let players = read_players(File::open(path)?)?;
    log::info!("{}: {} players", path.display(), players.len());
    Ok(players)
}
