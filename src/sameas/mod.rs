//! Same-as aggregation: deduplicate equivalent candidates in one result list.
//!
//! Backing datasets frequently hold several records for the same real-world
//! entity, linked by `owl:sameAs`-style assertions. Aggregation folds such
//! duplicates under one primary, nudges rounded-score ties apart so ordering
//! is deterministic, and pins folded secondaries directly beneath their
//! primary in rank order.

pub mod aggregator;
pub mod error;


pub use aggregator::SameAsAggregator;
pub use error::AggregationError;

use crate::model::EntityId;

/// Settings for one aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Decimal digits considered significant when grouping near-equal scores.
    pub score_digits: u32,
    /// Drop folded secondaries instead of pinning them beneath the primary.
    /// The primary still absorbs the group's best score.
    pub filter_secondaries: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            score_digits: 2,
            filter_secondaries: false,
        }
    }
}

impl AggregatorConfig {
    /// Offset separating members of one rounded-score tie.
    ///
    /// Four orders of magnitude below the significant digits, so nudged
    /// scores still round back to the value they were grouped under.
    #[inline]
    pub fn tie_step(&self) -> f64 {
        10f64.powi(-(self.score_digits as i32 + 4))
    }

    /// Offset pinning a folded secondary beneath its primary.
    ///
    /// One order of magnitude finer than [`tie_step`](Self::tie_step), so a
    /// pinned secondary can never cross into an adjacent tie slot.
    #[inline]
    pub fn pin_step(&self) -> f64 {
        10f64.powi(-(self.score_digits as i32 + 5))
    }

    /// Integer key of `score` rounded to the significant digits.
    #[inline]
    pub fn rounded_key(&self, score: f64) -> i64 {
        (score * 10f64.powi(self.score_digits as i32)).round() as i64
    }
}

/// An equivalence group: one primary plus every candidate asserted equal to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SameAsGroup {
    primary: EntityId,
    members: Vec<EntityId>,
}

impl SameAsGroup {
    /// Creates a group containing only its primary.
    pub fn new(primary: EntityId) -> Self {
        let members = vec![primary.clone()];
        Self { primary, members }
    }

    /// Adds a member unless already present.
    pub fn add(&mut self, member: EntityId) {
        if !self.members.contains(&member) {
            self.members.push(member);
        }
    }

    #[inline]
    pub fn primary(&self) -> &EntityId {
        &self.primary
    }

    /// Members in insertion order, primary first.
    #[inline]
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.members.contains(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
