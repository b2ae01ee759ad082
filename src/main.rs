//! Tennis training-table CLI
//!
//! Imports match history, replays it to build leak-free pre-match features,
//! and exports the resulting training table.

use clap::{Parser, Subcommand};
use tennis::{Config, Result};

#[derive(Parser)]
#[command(name = "tennis")]
#[command(about = "Leak-free Elo and rolling-form features for tennis match prediction", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Rebuild the training table from all stored matches
    Build,
    /// Write the stored training table as CSV
    Export {
        /// Output path
        output: String,
    },
    /// Show a player's pre-match rating trajectory
    Ratings {
        /// Player id
        player: String,
        /// Output format: table, json, csv
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
        /// Only show the last N matches
        #[arg(long)]
        last: Option<usize>,
    },
    /// Grid-search K-factors against a validation date range
    TuneK {
        /// First validation date (YYYY-MM-DD)
        #[arg(long)]
        from: String,
        /// Last validation date (YYYY-MM-DD)
        #[arg(long)]
        to: String,
        /// Number of results to print
        #[arg(long, default_value = "10")]
        top: usize,
    },
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import match and player CSV files
    Import {
        /// Match CSV files
        #[arg(long, required = true, num_args = 1..)]
        matches: Vec<String>,
        /// Player bio CSV file
        #[arg(long)]
        players: Option<String>,
    },
    /// Show database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config, &config),
        Commands::Data { action } => match action {
            DataCommands::Import { matches, players } => {
                commands::data_import(&config, &matches, players.as_deref())
            }
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Build => commands::build(&config),
        Commands::Export { output } => commands::export(&config, &output),
        Commands::Ratings {
            player,
            format,
            last,
        } => commands::ratings(&config, &player, format, last),
        Commands::TuneK { from, to, top } => commands::tune_k(&config, &from, &to, top),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use tennis::data::dataset::{self, TrainingDataset};
    use tennis::data::source;
    use tennis::data::{Database, MatchSequence};
    use tennis::tuning::{EloTuner, KGrid};
    use tennis::{PlayerId, TennisError};

    pub fn init(config_path: &str, config: &Config) -> Result<()> {
        let defaults = Config::default();
        defaults.save(config_path)?;
        println!("Created default config at {}", config_path);

        if let Some(parent) = std::path::Path::new(&config.data.database_path).parent() {
            std::fs::create_dir_all(parent)?;
            println!("Created {}/ directory", parent.display());
        }

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'tennis data import --matches atp_matches_*.csv' to load matches");
        println!("  3. Run 'tennis build' to compute the training table");
        println!("  4. Run 'tennis export training.csv' to write it out");

        Ok(())
    }

    pub fn data_import(config: &Config, match_files: &[String], players: Option<&str>) -> Result<()> {
        let mut db = Database::open(&config.data.database_path)?;

        let mut imported = 0;
        let mut dropped = 0;
        for path in match_files {
            let batch = source::read_matches_file(path)?;
            let count = db.upsert_matches(&batch.matches)?;
            println!("  {}: {} matches ({} dropped)", path, count, batch.dropped);
            imported += count;
            dropped += batch.dropped;
        }
        println!("Stored {} matches ({} rows dropped)", imported, dropped);

        if let Some(path) = players {
            let bios = source::read_players_file(path)?;
            let count = db.upsert_players(&bios)?;
            println!("Stored {} player bios", count);
        }

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:          {}", config.data.database_path);
        println!("  Players:       {}", stats.player_count);
        println!("  Matches:       {}", stats.match_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_match, stats.latest_match) {
            println!("  Range:         {} to {}", earliest, latest);
        }
        println!("  Training rows: {}", stats.training_rows);

        Ok(())
    }

    pub fn build(config: &Config) -> Result<()> {
        let mut db = Database::open(&config.data.database_path)?;
        let dataset = TrainingDataset::from_database(&db, config)?;
        db.replace_training_table(dataset.table())?;

        println!(
            "Built {} training rows with {} features",
            dataset.table().len(),
            dataset.table().columns.len()
        );
        Ok(())
    }

    pub fn export(config: &Config, output: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let table = db.load_training_table()?;
        if table.is_empty() {
            return Err(TennisError::NoTrainingTable);
        }
        dataset::export_csv(&table, output)?;
        println!("Wrote {} rows to {}", table.len(), output);
        Ok(())
    }

    pub fn ratings(config: &Config, player: &str, format: OutputFormat, last: Option<usize>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let dataset = TrainingDataset::from_database(&db, config)?;
        let mut points = dataset.rating_trajectory(&PlayerId::new(player))?;
        if let Some(n) = last {
            let skip = points.len().saturating_sub(n);
            points.drain(..skip);
        }

        match format {
            OutputFormat::Table => {
                println!("Rating history for {}", player);
                println!("───────────────────────────────────────────────────────────────");
                println!(
                    "{:<12} {:<18} {:<7} {:<10} {:>4} {:>8} {:>8}",
                    "Date", "Match", "Surface", "Opponent", "W/L", "Elo", "Surface"
                );
                for p in &points {
                    println!(
                        "{:<12} {:<18} {:<7} {:<10} {:>4} {:>8.1} {:>8.1}",
                        p.date,
                        p.match_id,
                        p.surface,
                        p.opponent,
                        if p.won { "W" } else { "L" },
                        p.elo,
                        p.surface_elo
                    );
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&points)?);
            }
            OutputFormat::Csv => {
                println!("date,tourney_id,match_num,surface,opponent,won,elo,surface_elo");
                for p in &points {
                    println!(
                        "{},{},{},{},{},{},{:.3},{:.3}",
                        p.date,
                        p.match_id.tourney_id,
                        p.match_id.match_num,
                        p.surface,
                        p.opponent,
                        u8::from(p.won),
                        p.elo,
                        p.surface_elo
                    );
                }
            }
        }

        Ok(())
    }

    pub fn tune_k(config: &Config, from: &str, to: &str, top: usize) -> Result<()> {
        let parse = |raw: &str| {
            source::parse_date(raw).ok_or_else(|| TennisError::Parse(format!("invalid date: {}", raw)))
        };
        let (from, to) = (parse(from)?, parse(to)?);

        let db = Database::open(&config.data.database_path)?;
        let matches = db.get_all_matches()?;
        if matches.is_empty() {
            return Err(TennisError::NoMatches);
        }
        let sequence = MatchSequence::new(matches);

        let tuner = EloTuner::new(&sequence, config.elo.initial_rating, from, to)?;
        let results = tuner.search(&KGrid::default())?;

        println!("K-factor tuning ({} to {})", from, to);
        println!("─────────────────────────────────────────────────────");
        println!(
            "{:>4} {:>4} {:>4} {:>4} {:>4} {:>10} {:>8} {:>7}",
            "G", "F", "M", "A", "B", "LogLoss", "Acc", "N"
        );
        for r in results.iter().take(top) {
            let k = &r.k_factors;
            println!(
                "{:>4} {:>4} {:>4} {:>4} {:>4} {:>10.5} {:>8.4} {:>7}",
                k.grand_slam, k.tour_finals, k.masters, k.tour_a, k.tour_b, r.log_loss, r.accuracy, r.matches
            );
        }

        Ok(())
    }
}
