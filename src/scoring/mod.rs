//! Linear score adjustment applied after candidates are resolved.
//!
//! Federation members often score on different scales; a per-member
//! `factor`/`offset` pair brings them onto one axis before merging.

use crate::model::Candidate;

/// Linear transform over candidate scores: `score * factor + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreOptions {
    pub factor: f64,
    pub offset: f64,
}

impl ScoreOptions {
    /// The no-op transform.
    pub const IDENTITY: ScoreOptions = ScoreOptions {
        factor: 1.0,
        offset: 0.0,
    };

    pub fn new(factor: f64, offset: f64) -> Self {
        Self { factor, offset }
    }

    /// Whether applying this transform would leave every score untouched.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.factor == 1.0 && self.offset == 0.0
    }

    #[inline]
    pub fn adjust(&self, score: f64) -> f64 {
        score * self.factor + self.offset
    }

    /// Adjusts all candidate scores in place.
    ///
    /// The identity transform is skipped entirely so cached candidates keep
    /// their bit-exact scores.
    pub fn apply(&self, candidates: &mut [Candidate]) {
        if self.is_identity() {
            return;
        }
        for candidate in candidates {
            candidate.score = self.adjust(candidate.score);
        }
    }
}

impl Default for ScoreOptions {
    fn default() -> Self {
        Self::IDENTITY
    }
}
