//! Profile completeness score.
//!
//! This is coverage, not statistical confidence: a category counts once any
//! of its fields is non-zero.

use crate::catalog::CategoryTable;
use crate::models::{Eligibility, Profile};
use crate::profile::has_category_data;

pub const ELIGIBILITY_BONUS: u32 = 5;
pub const SCORE_CAP: u32 = 100;

#[derive(Debug, Clone)]
pub struct ScoringTable {
    pub categories: CategoryTable,
    /// Added when income, employment status and pincode are all known.
    pub eligibility_bonus: u32,
    pub cap: u32,
}

impl ScoringTable {
    pub fn new(categories: CategoryTable) -> Self {
        Self {
            categories,
            eligibility_bonus: ELIGIBILITY_BONUS,
            cap: SCORE_CAP,
        }
    }
}

impl Default for ScoringTable {
    fn default() -> Self {
        Self::new(CategoryTable::standard())
    }
}

/// Weighted coverage plus the eligibility bonus, clamped to the cap.
///
/// All categories plus the bonus add up to 105 with the standard table, so
/// the clamp is reached by a fully answered journey.
pub fn profile_completeness(
    profile: &Profile,
    eligibility: &Eligibility,
    table: &ScoringTable,
) -> u32 {
    let mut score: u32 = table
        .categories
        .categories()
        .iter()
        .filter(|category| has_category_data(profile, &category.fields))
        .map(|category| category.weight)
        .sum();

    if eligibility.is_complete() {
        score += table.eligibility_bonus;
    }

    score.min(table.cap)
}
