//! Feature extraction
//!
//! Per-player pre-match features are stored as a name → value map keyed by
//! (match, player). Every producer writes into the same map; the assembler
//! turns the two sides of a match into one difference row.

pub mod aggregator;
pub mod assembler;
pub mod bio;
pub mod elo;
pub mod form;
pub mod head_to_head;
pub mod opponent;
pub mod rolling;
pub mod round;
pub mod serve;
pub mod tournament;
pub mod workload;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::data::sequencer::{PlayerMatchView, ViewKey};
use crate::{MatchId, PlayerId};

pub use aggregator::RollingAggregator;
pub use assembler::{FeatureAssembler, TrainingRow, TrainingTable};
pub use elo::{RatingEngine, RatingSnapshot, SnapshotLog};

/// What the assembler substitutes for a missing side before differencing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Missing → 0.0
    Zero,
    /// Missing on either side → missing difference (wins/played ratios)
    Propagate,
}

/// One feature value and its fill policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureValue {
    pub value: Option<f64>,
    pub policy: FillPolicy,
}

/// Wide per-player record for one match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.set_with(name, value, FillPolicy::Zero);
    }

    /// Set a wins/played ratio, whose null survives differencing
    pub fn set_ratio(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.set_with(name, value, FillPolicy::Propagate);
    }

    pub fn set_with(&mut self, name: impl Into<String>, value: Option<f64>, policy: FillPolicy) {
        self.values.insert(name.into(), FeatureValue { value, policy });
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(|f| f.value)
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Merge another row in; its values win on name clashes
    pub fn merge(&mut self, other: FeatureRow) {
        self.values.extend(other.values);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// All per-player feature rows, keyed by (match, player)
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    rows: HashMap<ViewKey, FeatureRow>,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row, merging with whatever is already stored under the key
    pub fn insert(&mut self, key: ViewKey, row: FeatureRow) {
        self.rows.entry(key).or_default().merge(row);
    }

    pub fn get(&self, match_id: &MatchId, player: &PlayerId) -> Option<&FeatureRow> {
        self.rows.get(&(match_id.clone(), player.clone()))
    }

    /// Union of feature names, sorted
    pub fn feature_names(&self) -> BTreeSet<String> {
        self.rows
            .values()
            .flat_map(|r| r.names().map(str::to_string))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A per-player state machine fed one player's history in order
///
/// `emit` writes features for the view from prior state only; `absorb` then
/// folds the view into the state.
pub trait PlayerTracker: Send {
    fn emit(&mut self, view: &PlayerMatchView, row: &mut FeatureRow);

    fn absorb(&mut self, view: &PlayerMatchView);
}

/// Ratio guarded against missing or zero denominators
pub(crate) fn ratio(num: Option<u32>, den: Option<u32>) -> Option<f64> {
    match (num, den) {
        (Some(n), Some(d)) if d > 0 => Some(n as f64 / d as f64),
        _ => None,
    }
}
