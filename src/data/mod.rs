//! Data ingestion and storage
//!
//! CSV match sources, the canonical match sequence, and SQLite storage.

pub mod database;
pub mod dataset;
pub mod sequencer;
pub mod source;

pub use database::Database;
pub use dataset::TrainingDataset;
pub use sequencer::{MatchSequence, PlayerMatchView};
