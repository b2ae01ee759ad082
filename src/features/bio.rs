//! Player bio snapshot: dominant hand and height
//!
//! Height outside a plausible human range, or missing, is replaced by a
//! fixed fallback so no sentinel magnitude reaches the model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::FeatureRow;
use crate::PlayerId;

pub const MIN_HEIGHT_CM: u32 = 150;
pub const MAX_HEIGHT_CM: u32 = 215;
pub const FALLBACK_HEIGHT_CM: u32 = 185;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hand {
    Right,
    Left,
    Ambidextrous,
}

impl Hand {
    /// Normalize a raw hand code; empty or unknown codes give None
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "R" | "RIGHT" => Some(Hand::Right),
            "L" | "LEFT" => Some(Hand::Left),
            "A" | "AMBIDEXTROUS" => Some(Hand::Ambidextrous),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Hand::Right => "R",
            Hand::Left => "L",
            Hand::Ambidextrous => "A",
        }
    }
}

/// External bio record for one player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerBio {
    pub hand: Option<Hand>,
    pub height_cm: Option<u32>,
}

impl PlayerBio {
    /// Height within range, otherwise the fallback
    pub fn height_or_fallback(&self) -> u32 {
        match self.height_cm {
            Some(h) if (MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(&h) => h,
            _ => FALLBACK_HEIGHT_CM,
        }
    }

    /// 1.0 for left-handed, 0.0 for right-handed or ambidextrous, None if unknown
    pub fn left_handed(&self) -> Option<f64> {
        self.hand.map(|h| if h == Hand::Left { 1.0 } else { 0.0 })
    }
}

/// Bio records by player
#[derive(Debug, Clone, Default)]
pub struct BioTable {
    players: HashMap<PlayerId, PlayerBio>,
}

impl BioTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, player: PlayerId, bio: PlayerBio) {
        self.players.insert(player, bio);
    }

    pub fn get(&self, player: &PlayerId) -> Option<&PlayerBio> {
        self.players.get(player)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Write the bio features for `player`; unknown players get the defaults
    pub fn write_features(&self, player: &PlayerId, row: &mut FeatureRow) {
        let bio = self.get(player).cloned().unwrap_or_default();
        row.set("left_handed", bio.left_handed());
        row.set("height", Some(bio.height_or_fallback() as f64));
    }
}

impl FromIterator<(PlayerId, PlayerBio)> for BioTable {
    fn from_iter<T: IntoIterator<Item = (PlayerId, PlayerBio)>>(iter: T) -> Self {
        BioTable {
            players: iter.into_iter().collect(),
        }
    }
}
