//! The aggregation pass itself.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::model::{CallContext, Candidate, EntityId};
use crate::resolver::SameAsOracle;

use super::error::AggregationError;
use super::{AggregatorConfig, SameAsGroup};

/// Folds candidates asserted equivalent by a [`SameAsOracle`] under one
/// primary and makes the resulting scores strictly ordered.
///
/// The pass runs in five steps over a single candidate list:
///
/// 1. consult the oracle once for every candidate id;
/// 2. build equivalence groups keyed by asserted primary;
/// 3. walk candidates by descending score, emitting primaries and folding
///    unvisited group members beneath them (the primary absorbs the group's
///    best score);
/// 4. separate candidates whose scores round to the same value by adding
///    per-position multiples of [`AggregatorConfig::tie_step`];
/// 5. pin folded secondaries beneath their primary's final score using
///    [`AggregatorConfig::pin_step`].
pub struct SameAsAggregator {
    oracle: Arc<dyn SameAsOracle>,
    config: AggregatorConfig,
}

impl std::fmt::Debug for SameAsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SameAsAggregator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SameAsAggregator {
    pub fn new(oracle: Arc<dyn SameAsOracle>, config: AggregatorConfig) -> Self {
        Self { oracle, config }
    }

    #[inline]
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Runs the aggregation pass over one resolver's candidate list.
    ///
    /// The oracle is consulted exactly once. Candidates whose asserted
    /// primary is not itself in the list stay independent; chain tails whose
    /// primary was folded elsewhere are returned standalone.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn aggregate(
        &self,
        mut candidates: Vec<Candidate>,
        context: &CallContext,
    ) -> Result<Vec<Candidate>, AggregationError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let ids: Vec<EntityId> = candidates.iter().map(|c| c.id.clone()).collect();
        let equivalents = self
            .oracle
            .equivalents_of(&ids, context)
            .await
            .map_err(|error| AggregationError::Oracle {
                reason: error.to_string(),
            })?;

        let mut index_of: HashMap<EntityId, usize> = HashMap::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            index_of.entry(id.clone()).or_insert(index);
        }

        let groups = build_groups(&candidates, &equivalents);
        let secondaries = classify_secondaries(&groups, &index_of);

        // Descending-score walk; ties keep input order.
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| {
            candidates[b]
                .score
                .partial_cmp(&candidates[a].score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut emitted = vec![false; candidates.len()];
        let mut emission: Vec<usize> = Vec::with_capacity(candidates.len());
        let mut pinned: Vec<(usize, Vec<usize>)> = Vec::new();

        for &index in &order {
            if emitted[index] {
                continue;
            }
            let id = candidates[index].id.clone();
            if secondaries.contains(&id) {
                // Folded when its primary is reached.
                continue;
            }

            emitted[index] = true;
            emission.push(index);

            let Some(group) = groups.get(&id) else {
                continue;
            };
            let mut attached = Vec::new();
            for member in group.members() {
                if member == &id {
                    continue;
                }
                let Some(&member_index) = index_of.get(member) else {
                    continue;
                };
                if emitted[member_index] {
                    continue;
                }
                emitted[member_index] = true;
                if candidates[member_index].score > candidates[index].score {
                    candidates[index].score = candidates[member_index].score;
                }
                if self.config.filter_secondaries {
                    trace!(member = %member, primary = %id, "dropping folded secondary");
                    continue;
                }
                candidates[member_index].reference = Some(id.clone());
                emission.push(member_index);
                attached.push(member_index);
            }
            if !attached.is_empty() {
                pinned.push((index, attached));
            }
        }

        // Chain tails: their primary was folded under some other primary, so
        // the walk never flushed the group they belong to.
        for &index in &order {
            if !emitted[index] {
                emitted[index] = true;
                debug!(
                    id = %candidates[index].id,
                    "same-as member kept standalone; its primary folded elsewhere"
                );
                emission.push(index);
            }
        }

        let mut in_output = vec![false; candidates.len()];
        for &index in &emission {
            in_output[index] = true;
        }

        // Step 4: separate rounded-score ties, earliest input position on top.
        let tie_step = self.config.tie_step();
        let mut by_key: HashMap<i64, Vec<usize>> = HashMap::new();
        for (index, flag) in in_output.iter().enumerate() {
            if *flag {
                let key = self.config.rounded_key(candidates[index].score);
                by_key.entry(key).or_default().push(index);
            }
        }
        for members in by_key.values() {
            if members.len() < 2 {
                continue;
            }
            for (position, &index) in members.iter().enumerate() {
                candidates[index].score += (members.len() - 1 - position) as f64 * tie_step;
            }
        }

        // Step 5: pin secondaries just beneath their primary's final score.
        let pin_step = self.config.pin_step();
        for (primary_index, attached) in &pinned {
            let base = candidates[*primary_index].score;
            for (position, &secondary_index) in attached.iter().enumerate() {
                candidates[secondary_index].score = base - (position as f64 + 1.0) * pin_step;
            }
        }

        let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
        let mut output: Vec<Candidate> = emission
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();
        output.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(output = output.len(), "aggregation complete");
        Ok(output)
    }
}

/// Groups candidates by their asserted primary. Self-assertions are ignored.
fn build_groups(
    candidates: &[Candidate],
    equivalents: &HashMap<EntityId, BTreeSet<EntityId>>,
) -> HashMap<EntityId, SameAsGroup> {
    let mut groups: HashMap<EntityId, SameAsGroup> = HashMap::new();
    for candidate in candidates {
        let Some(targets) = equivalents.get(&candidate.id) else {
            continue;
        };
        for primary in targets {
            if *primary == candidate.id {
                continue;
            }
            groups
                .entry(primary.clone())
                .or_insert_with(|| SameAsGroup::new(primary.clone()))
                .add(candidate.id.clone());
        }
    }
    groups
}

/// Ids that appear inside a group whose primary is present, without being a
/// group primary themselves. Groups whose primary is absent leave their
/// members independent.
fn classify_secondaries(
    groups: &HashMap<EntityId, SameAsGroup>,
    index_of: &HashMap<EntityId, usize>,
) -> HashSet<EntityId> {
    let mut secondaries = HashSet::new();
    for (primary, group) in groups {
        if !index_of.contains_key(primary) {
            debug!(
                primary = %primary,
                members = group.len(),
                "asserted primary absent from results; members stay independent"
            );
            continue;
        }
        for member in group.members() {
            if member != primary
                && index_of.contains_key(member)
                && !groups.contains_key(member)
            {
                secondaries.insert(member.clone());
            }
        }
    }
    secondaries
}
