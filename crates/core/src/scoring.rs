//! Completion score of a checked-out cart against the reference "perfect cart".

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::product::ItemId;

/// Reference item ids the score is computed against. Loaded from configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfectCart {
    item_ids: BTreeSet<ItemId>,
}

impl PerfectCart {
    pub fn new(item_ids: impl IntoIterator<Item = ItemId>) -> Self {
        Self { item_ids: item_ids.into_iter().collect() }
    }

    pub fn item_ids(&self) -> &BTreeSet<ItemId> {
        &self.item_ids
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }
}

impl Default for PerfectCart {
    fn default() -> Self {
        Self::new((1..=7).map(ItemId))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Each tier has an inclusive lower bound.
    pub fn from_percentage(percentage: u8) -> Self {
        match percentage {
            90..=u8::MAX => Self::APlus,
            80..=89 => Self::A,
            70..=79 => Self::B,
            60..=69 => Self::C,
            50..=59 => Self::D,
            _ => Self::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub matched_count: usize,
    pub target_count: usize,
    pub percentage: u8,
    pub grade: Grade,
}

/// Counts cart ids (duplicates included) that appear in the perfect cart.
/// The percentage is rounded half-up and capped at 100; an empty perfect cart
/// scores 0.
pub fn score(cart_item_ids: &[ItemId], perfect: &PerfectCart) -> ScoreResult {
    let matched_count = cart_item_ids.iter().filter(|id| perfect.item_ids.contains(id)).count();
    let target_count = perfect.len();
    let percentage = rounded_percentage(matched_count, target_count);

    ScoreResult { matched_count, target_count, percentage, grade: Grade::from_percentage(percentage) }
}

fn rounded_percentage(matched: usize, target: usize) -> u8 {
    if target == 0 {
        return 0;
    }

    let matched = matched as u128;
    let target = target as u128;
    let rounded = (200 * matched + target) / (2 * target);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}
