//! End-to-end training table construction
//!
//! Replays the full match history in canonical order: ratings first, then
//! rolling features (which read the rating snapshots), then one difference
//! row per match.

use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::data::sequencer::MatchSequence;
use crate::data::Database;
use crate::features::bio::BioTable;
use crate::features::elo::{EloConfig, RatingEngine, SnapshotLog};
use crate::features::{FeatureAssembler, RollingAggregator, TrainingTable};
use crate::{Config, MatchId, MatchRecord, PlayerId, Result, TennisError};

/// Fixed leading columns of the exported table
const KEY_COLUMNS: [&str; 11] = [
    "tourney_id",
    "match_num",
    "date",
    "surface",
    "tourney_level",
    "round",
    "best_of",
    "round_stage",
    "p1_id",
    "p2_id",
    "y",
];

/// Result of a full rebuild
pub struct TrainingDataset {
    sequence: MatchSequence,
    snapshots: SnapshotLog,
    table: TrainingTable,
}

impl TrainingDataset {
    /// Build the training table from scratch
    pub fn build(matches: Vec<MatchRecord>, bios: &BioTable, config: &Config) -> Self {
        let sequence = MatchSequence::new(matches);
        log::info!(
            "Sequenced {} matches across {} players ({} skipped)",
            sequence.len(),
            sequence.player_count(),
            sequence.skipped()
        );

        let elo_config = EloConfig::from(&config.elo);
        let baseline = elo_config.initial_rating;
        let snapshots = RatingEngine::replay(elo_config, sequence.matches()).into_snapshots();
        log::info!("Recorded {} rating snapshots", snapshots.len());

        let features = RollingAggregator::new(config.features.clone(), baseline).run(
            &sequence,
            &snapshots,
            bios,
        );
        log::info!(
            "Computed {} feature rows with {} features each",
            features.len(),
            features.feature_names().len()
        );

        let table = FeatureAssembler::new(&snapshots, &features).assemble(&sequence);
        log::info!(
            "Assembled {} training rows, {} difference columns (p1 win share {:.3})",
            table.len(),
            table.columns.len(),
            table.label_balance()
        );

        TrainingDataset {
            sequence,
            snapshots,
            table,
        }
    }

    /// Build from everything stored in the database
    pub fn from_database(db: &Database, config: &Config) -> Result<Self> {
        let matches = db.get_all_matches()?;
        if matches.is_empty() {
            return Err(TennisError::NoMatches);
        }
        let bios = db.get_bios()?;
        Ok(Self::build(matches, &bios, config))
    }

    pub fn table(&self) -> &TrainingTable {
        &self.table
    }

    pub fn into_table(self) -> TrainingTable {
        self.table
    }

    pub fn sequence(&self) -> &MatchSequence {
        &self.sequence
    }

    pub fn snapshots(&self) -> &SnapshotLog {
        &self.snapshots
    }

    /// Pre-match rating history of one player, oldest first
    pub fn rating_trajectory(&self, player: &PlayerId) -> Result<Vec<RatingPoint>> {
        let history = self.sequence.history(player);
        if history.is_empty() {
            return Err(TennisError::UnknownPlayer(player.to_string()));
        }

        Ok(history
            .into_iter()
            .filter_map(|view| {
                let snapshot = self.snapshots.get(&view.match_id, player)?;
                Some(RatingPoint {
                    match_id: view.match_id.clone(),
                    date: view.date,
                    surface: view.surface.code().to_string(),
                    opponent: view.opponent.clone(),
                    won: view.won,
                    elo: snapshot.global,
                    surface_elo: snapshot.surface,
                })
            })
            .collect())
    }
}

/// One entry of a player's rating trajectory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingPoint {
    pub match_id: MatchId,
    pub date: NaiveDate,
    pub surface: String,
    pub opponent: PlayerId,
    pub won: bool,
    pub elo: f64,
    pub surface_elo: f64,
}

/// Write the table as CSV; missing values become empty fields
pub fn write_csv<W: Write>(table: &TrainingTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let header: Vec<&str> = KEY_COLUMNS
        .iter()
        .copied()
        .chain(table.columns.iter().map(String::as_str))
        .collect();
    wtr.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![
            row.match_id.tourney_id.clone(),
            row.match_id.match_num.to_string(),
            row.date.format("%Y-%m-%d").to_string(),
            row.surface.clone(),
            row.level.clone(),
            row.round.clone(),
            row.best_of.map(|b| b.to_string()).unwrap_or_default(),
            row.round_stage.to_string(),
            row.p1_id.to_string(),
            row.p2_id.to_string(),
            row.y.to_string(),
        ];
        record.extend(
            table
                .columns
                .iter()
                .map(|c| row.diff(c).map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write the table to a CSV file
pub fn export_csv<P: AsRef<Path>>(table: &TrainingTable, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::File::create(path)?;
    write_csv(table, file)?;
    log::info!("Exported {} rows to {}", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Competitor, Surface, TourneyLevel};

    fn make_match(num: u32, day: u32, winner: &str, loser: &str) -> MatchRecord {
        MatchRecord {
            id: MatchId::new("2023-520", num),
            date: NaiveDate::from_ymd_opt(2023, 5, day).unwrap(),
            tourney_name: Some("Roland Garros".to_string()),
            surface: Surface::Clay,
            level: TourneyLevel::GrandSlam,
            round: "R32".to_string(),
            best_of: Some(5),
            winner: Competitor::new(winner),
            loser: Competitor::new(loser),
        }
    }

    fn sample() -> Vec<MatchRecord> {
        vec![
            make_match(1, 28, "A", "B"),
            make_match(2, 29, "C", "A"),
            make_match(3, 30, "B", "C"),
            make_match(4, 31, "A", "B"),
        ]
    }

    #[test]
    fn test_build_one_row_per_match() {
        let dataset = TrainingDataset::build(sample(), &BioTable::new(), &Config::default());
        let table = dataset.table();
        assert_eq!(table.len(), 4);
        assert!(table.columns.contains(&"elo_diff".to_string()));
        assert!(table.columns.contains(&"win_rate_5_diff".to_string()));
        for row in &table.rows {
            assert!(row.p1_id < row.p2_id);
            assert!(row.y <= 1);
        }
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let config = Config::default();
        let first = TrainingDataset::build(sample(), &BioTable::new(), &config).into_table();
        let mut shuffled = sample();
        shuffled.reverse();
        let second = TrainingDataset::build(shuffled, &BioTable::new(), &config).into_table();
        assert_eq!(first, second);
    }

    #[test]
    fn test_from_empty_database() {
        let db = Database::in_memory().unwrap();
        let result = TrainingDataset::from_database(&db, &Config::default());
        assert!(matches!(result, Err(TennisError::NoMatches)));
    }

    #[test]
    fn test_rating_trajectory() {
        let dataset = TrainingDataset::build(sample(), &BioTable::new(), &Config::default());
        let points = dataset.rating_trajectory(&PlayerId::new("A")).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].elo, 1500.0);
        assert!(points[0].won);
        assert!(points[1].elo > 1500.0);

        let missing = dataset.rating_trajectory(&PlayerId::new("Z"));
        assert!(matches!(missing, Err(TennisError::UnknownPlayer(_))));
    }

    #[test]
    fn test_csv_export() {
        let dataset = TrainingDataset::build(sample(), &BioTable::new(), &Config::default());
        let mut buf = Vec::new();
        write_csv(dataset.table(), &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("tourney_id,match_num,date"));
        assert!(header.contains("elo_diff"));
        assert_eq!(lines.count(), 4);
    }
}
