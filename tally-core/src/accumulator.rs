use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tally_types::{DedupPolicy, MetricValue, NormalizedRow, TallyError};

/// Merges the rows of one window across pages.
///
/// Keys are the dimension tuples; iteration order is the key order, so output
/// does not depend on page arrival order.
#[derive(Debug, Clone)]
pub struct Accumulator {
    policy: DedupPolicy,
    rows: BTreeMap<Vec<String>, Vec<MetricValue>>,
}

impl Accumulator {
    /// Empty accumulator applying `policy`.
    #[must_use]
    pub const fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            rows: BTreeMap::new(),
        }
    }

    /// The policy in effect.
    #[must_use]
    pub const fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Merge one row.
    ///
    /// # Errors
    /// Returns `TallyError::Data` when a sum-by-key row disagrees with the
    /// stored row on metric count or kinds.
    pub fn push(&mut self, row: NormalizedRow) -> Result<(), TallyError> {
        match self.rows.entry(row.dimensions) {
            Entry::Vacant(slot) => {
                slot.insert(row.metrics);
            }
            Entry::Occupied(mut slot) => match self.policy {
                DedupPolicy::SetByIdentity => {}
                DedupPolicy::SumByKey => {
                    if slot.get().len() != row.metrics.len() {
                        return Err(TallyError::Data(format!(
                            "row for key {:?} has {} metrics, expected {}",
                            slot.key(),
                            row.metrics.len(),
                            slot.get().len()
                        )));
                    }
                    for (acc, v) in slot.get_mut().iter_mut().zip(&row.metrics) {
                        acc.accumulate(v)?;
                    }
                }
            },
        }
        Ok(())
    }

    /// Merge every row of `rows`.
    ///
    /// # Errors
    /// Propagates the first error from [`Accumulator::push`].
    pub fn extend<I>(&mut self, rows: I) -> Result<(), TallyError>
    where
        I: IntoIterator<Item = NormalizedRow>,
    {
        rows.into_iter().try_for_each(|r| self.push(r))
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing has been merged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Consume the accumulator, yielding rows ordered by key.
    #[must_use]
    pub fn into_rows(self) -> Vec<NormalizedRow> {
        self.rows
            .into_iter()
            .map(|(dimensions, metrics)| NormalizedRow::new(dimensions, metrics))
            .collect()
    }
}
