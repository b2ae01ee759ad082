//! SQLite storage for matches, player bios, and the training table

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::features::bio::{BioTable, Hand, PlayerBio};
use crate::features::{TrainingRow, TrainingTable};
use crate::{Competitor, MatchId, MatchRecord, PlayerId, Result, ServeStats, Surface, TourneyLevel};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                player_id TEXT PRIMARY KEY,
                hand TEXT,
                height_cm INTEGER
            );

            CREATE TABLE IF NOT EXISTS matches (
                tourney_id TEXT NOT NULL,
                match_num INTEGER NOT NULL,
                tourney_date TEXT NOT NULL,
                tourney_name TEXT,
                surface TEXT NOT NULL,
                tourney_level TEXT NOT NULL,
                round TEXT NOT NULL,
                best_of INTEGER,
                winner_id TEXT,
                winner_seed INTEGER,
                winner_rank INTEGER,
                winner_rank_points INTEGER,
                winner_age REAL,
                w_ace INTEGER, w_df INTEGER, w_svpt INTEGER, w_1st_in INTEGER,
                w_1st_won INTEGER, w_2nd_won INTEGER, w_sv_gms INTEGER,
                w_bp_saved INTEGER, w_bp_faced INTEGER,
                loser_id TEXT,
                loser_seed INTEGER,
                loser_rank INTEGER,
                loser_rank_points INTEGER,
                loser_age REAL,
                l_ace INTEGER, l_df INTEGER, l_svpt INTEGER, l_1st_in INTEGER,
                l_1st_won INTEGER, l_2nd_won INTEGER, l_sv_gms INTEGER,
                l_bp_saved INTEGER, l_bp_faced INTEGER,
                PRIMARY KEY (tourney_id, match_num)
            );

            CREATE TABLE IF NOT EXISTS training_rows (
                tourney_id TEXT NOT NULL,
                match_num INTEGER NOT NULL,
                match_date TEXT NOT NULL,
                surface TEXT NOT NULL,
                tourney_level TEXT NOT NULL,
                round TEXT NOT NULL,
                best_of INTEGER,
                round_stage INTEGER NOT NULL,
                p1_id TEXT NOT NULL,
                p2_id TEXT NOT NULL,
                y INTEGER NOT NULL,
                PRIMARY KEY (tourney_id, match_num)
            );

            CREATE TABLE IF NOT EXISTS training_values (
                tourney_id TEXT NOT NULL,
                match_num INTEGER NOT NULL,
                feature TEXT NOT NULL,
                value REAL,
                PRIMARY KEY (tourney_id, match_num, feature)
            );

            CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(tourney_date);
            "#,
        )?;
        Ok(())
    }

    // ==================== Player Operations ====================

    /// Insert or replace player bios
    pub fn upsert_players(&mut self, players: &[(PlayerId, PlayerBio)]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO players (player_id, hand, height_cm) VALUES (?1, ?2, ?3)
                 ON CONFLICT(player_id) DO UPDATE SET
                    hand = excluded.hand,
                    height_cm = excluded.height_cm",
            )?;
            for (id, bio) in players {
                stmt.execute(params![id.0, bio.hand.map(|h| h.code()), bio.height_cm])?;
            }
        }
        tx.commit()?;
        Ok(players.len())
    }

    /// All player bios
    pub fn get_bios(&self) -> Result<BioTable> {
        let mut stmt = self
            .conn
            .prepare("SELECT player_id, hand, height_cm FROM players")?;
        let bios = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let hand: Option<String> = row.get(1)?;
                Ok((
                    PlayerId(id),
                    PlayerBio {
                        hand: hand.as_deref().and_then(Hand::from_code),
                        height_cm: row.get(2)?,
                    },
                ))
            })?
            .collect::<std::result::Result<BioTable, _>>()?;
        Ok(bios)
    }

    // ==================== Match Operations ====================

    /// Insert or update match records, keyed by (tourney_id, match_num)
    pub fn upsert_matches(&mut self, records: &[MatchRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO matches (
                    tourney_id, match_num, tourney_date, tourney_name, surface,
                    tourney_level, round, best_of,
                    winner_id, winner_seed, winner_rank, winner_rank_points, winner_age,
                    w_ace, w_df, w_svpt, w_1st_in, w_1st_won, w_2nd_won, w_sv_gms,
                    w_bp_saved, w_bp_faced,
                    loser_id, loser_seed, loser_rank, loser_rank_points, loser_age,
                    l_ace, l_df, l_svpt, l_1st_in, l_1st_won, l_2nd_won, l_sv_gms,
                    l_bp_saved, l_bp_faced
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                    ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22,
                    ?23, ?24, ?25, ?26, ?27,
                    ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36
                )
                "#,
            )?;
            for m in records {
                let (w, l) = (&m.winner, &m.loser);
                let (ws, ls) = (&w.stats, &l.stats);
                stmt.execute(params![
                    m.id.tourney_id,
                    m.id.match_num,
                    m.date.format(DATE_FORMAT).to_string(),
                    m.tourney_name,
                    m.surface.code(),
                    m.level.code(),
                    m.round,
                    m.best_of,
                    w.id.as_ref().map(PlayerId::as_str),
                    w.seed,
                    w.rank,
                    w.rank_points,
                    w.age,
                    ws.aces,
                    ws.double_faults,
                    ws.serve_points,
                    ws.first_in,
                    ws.first_won,
                    ws.second_won,
                    ws.serve_games,
                    ws.bp_saved,
                    ws.bp_faced,
                    l.id.as_ref().map(PlayerId::as_str),
                    l.seed,
                    l.rank,
                    l.rank_points,
                    l.age,
                    ls.aces,
                    ls.double_faults,
                    ls.serve_points,
                    ls.first_in,
                    ls.first_won,
                    ls.second_won,
                    ls.serve_games,
                    ls.bp_saved,
                    ls.bp_faced,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// All matches, oldest first
    pub fn get_all_matches(&self) -> Result<Vec<MatchRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM matches ORDER BY tourney_date, tourney_id, match_num")?;
        let matches = stmt
            .query_map([], Self::row_to_match)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(matches)
    }

    fn row_to_match(row: &Row) -> rusqlite::Result<MatchRecord> {
        let surface: String = row.get("surface")?;
        let level: String = row.get("tourney_level")?;
        Ok(MatchRecord {
            id: MatchId::new(row.get::<_, String>("tourney_id")?, row.get("match_num")?),
            date: parse_stored_date(row, "tourney_date")?,
            tourney_name: row.get("tourney_name")?,
            surface: Surface::from_code(&surface),
            level: TourneyLevel::from_code(&level),
            round: row.get("round")?,
            best_of: row.get("best_of")?,
            winner: Self::row_to_competitor(row, "winner", "w")?,
            loser: Self::row_to_competitor(row, "loser", "l")?,
        })
    }

    fn row_to_competitor(row: &Row, side: &str, prefix: &str) -> rusqlite::Result<Competitor> {
        let stat = |name: &str| row.get::<_, Option<u32>>(format!("{}_{}", prefix, name).as_str());
        let id: Option<String> = row.get(format!("{}_id", side).as_str())?;
        Ok(Competitor {
            id: id.map(PlayerId),
            stats: ServeStats {
                aces: stat("ace")?,
                double_faults: stat("df")?,
                serve_points: stat("svpt")?,
                first_in: stat("1st_in")?,
                first_won: stat("1st_won")?,
                second_won: stat("2nd_won")?,
                serve_games: stat("sv_gms")?,
                bp_saved: stat("bp_saved")?,
                bp_faced: stat("bp_faced")?,
            },
            seed: row.get(format!("{}_seed", side).as_str())?,
            rank: row.get(format!("{}_rank", side).as_str())?,
            rank_points: row.get(format!("{}_rank_points", side).as_str())?,
            age: row.get(format!("{}_age", side).as_str())?,
        })
    }

    // ==================== Training Table ====================

    /// Replace the stored training table in one transaction
    ///
    /// If anything fails the transaction rolls back and the previous table
    /// stays in place.
    pub fn replace_training_table(&mut self, table: &TrainingTable) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM training_values", [])?;
        tx.execute("DELETE FROM training_rows", [])?;
        {
            let mut row_stmt = tx.prepare(
                "INSERT INTO training_rows (tourney_id, match_num, match_date, surface,
                    tourney_level, round, best_of, round_stage, p1_id, p2_id, y)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            let mut value_stmt = tx.prepare(
                "INSERT INTO training_values (tourney_id, match_num, feature, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in &table.rows {
                row_stmt.execute(params![
                    row.match_id.tourney_id,
                    row.match_id.match_num,
                    row.date.format(DATE_FORMAT).to_string(),
                    row.surface,
                    row.level,
                    row.round,
                    row.best_of,
                    row.round_stage,
                    row.p1_id.0,
                    row.p2_id.0,
                    row.y,
                ])?;
                for (feature, value) in &row.diffs {
                    value_stmt.execute(params![
                        row.match_id.tourney_id,
                        row.match_id.match_num,
                        feature,
                        value,
                    ])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load the stored training table, rows in canonical order
    pub fn load_training_table(&self) -> Result<TrainingTable> {
        let mut value_stmt = self
            .conn
            .prepare("SELECT tourney_id, match_num, feature, value FROM training_values")?;
        let mut values: BTreeMap<MatchId, BTreeMap<String, Option<f64>>> = BTreeMap::new();
        let mut rows_iter = value_stmt.query([])?;
        while let Some(row) = rows_iter.next()? {
            let id = MatchId::new(row.get::<_, String>(0)?, row.get(1)?);
            values
                .entry(id)
                .or_default()
                .insert(row.get(2)?, row.get(3)?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT tourney_id, match_num, match_date, surface, tourney_level, round,
                    best_of, round_stage, p1_id, p2_id, y
             FROM training_rows
             ORDER BY match_date, tourney_id, match_num",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let match_id = MatchId::new(row.get::<_, String>(0)?, row.get(1)?);
                Ok(TrainingRow {
                    diffs: values.get(&match_id).cloned().unwrap_or_default(),
                    match_id,
                    date: parse_stored_date(row, "match_date")?,
                    surface: row.get(3)?,
                    level: row.get(4)?,
                    round: row.get(5)?,
                    best_of: row.get(6)?,
                    round_stage: row.get(7)?,
                    p1_id: PlayerId(row.get(8)?),
                    p2_id: PlayerId(row.get(9)?),
                    y: row.get(10)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut columns: Vec<String> = values
            .values()
            .flat_map(|v| v.keys().cloned())
            .collect();
        columns.sort();
        columns.dedup();

        Ok(TrainingTable { columns, rows })
    }

    // ==================== Statistics ====================

    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let count = |sql: &str| -> Result<i64> { Ok(self.conn.query_row(sql, [], |row| row.get(0))?) };
        let player_count = count("SELECT COUNT(*) FROM players")?;
        let match_count = count("SELECT COUNT(*) FROM matches")?;
        let training_rows = count("SELECT COUNT(*) FROM training_rows")?;

        let (min_date, max_date): (Option<String>, Option<String>) = self
            .conn
            .query_row(
                "SELECT MIN(tourney_date), MAX(tourney_date) FROM matches",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .unwrap_or((None, None));

        Ok(DatabaseStats {
            player_count: player_count as usize,
            match_count: match_count as usize,
            training_rows: training_rows as usize,
            earliest_match: min_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
            latest_match: max_date.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
        })
    }
}

fn parse_stored_date(row: &Row, column: &str) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(column)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
        let idx = row.as_ref().column_index(column).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub player_count: usize,
    pub match_count: usize,
    pub training_rows: usize,
    pub earliest_match: Option<NaiveDate>,
    pub latest_match: Option<NaiveDate>,
}
