use crate::{
    deferred::{DeferredValue, Settler},
    error::{GroupFailure, SettlementFailure},
};
use futures::{future, stream::FuturesUnordered, StreamExt};
use std::slice;

/// A fixed, ordered set of deferred values that were all started when the
/// group was built.
///
/// Membership never changes after construction. Only the settlement state of
/// each member does.
#[derive(Debug)]
pub struct DeferredGroup<T> {
    members: Vec<DeferredValue<T>>,
}

impl<T> DeferredGroup<T> {
    pub fn new(members: impl IntoIterator<Item = DeferredValue<T>>) -> Self {
        DeferredGroup {
            members: members.into_iter().collect(),
        }
    }

    /// Starts every producer, in order, before returning.
    pub fn from_producers<I, P>(producers: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: FnOnce(Settler<T>),
    {
        producers.into_iter().map(DeferredValue::new).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DeferredValue<T>> {
        self.members.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, DeferredValue<T>> {
        self.members.iter()
    }
}

impl<T: Clone> DeferredGroup<T> {
    /// Waits for every member, calling `on_settled` as each one settles.
    ///
    /// Callbacks run in settlement order; the returned values are in index
    /// order. The first observed failure ends the wait. Members still pending
    /// at that point keep running, their results are just not collected.
    pub async fn await_all<F>(&self, mut on_settled: F) -> Result<Vec<T>, GroupFailure>
    where
        F: FnMut(usize, &T),
    {
        let mut pending: FuturesUnordered<_> = self
            .members
            .iter()
            .enumerate()
            .map(|(index, member)| async move { (index, member.settled().await) })
            .collect();

        let mut values: Vec<Option<T>> = vec![None; self.members.len()];
        while let Some((index, result)) = pending.next().await {
            match result {
                Ok(value) => {
                    on_settled(index, &value);
                    values[index] = Some(value);
                }
                Err(source) => {
                    tracing::debug!(index, remaining = pending.len(), "await_all failing fast");
                    return Err(GroupFailure { index, source });
                }
            }
        }

        Ok(values.into_iter().flatten().collect())
    }

    /// Reads members one at a time in index order.
    ///
    /// Ordering the reads does not order the work: every member started when
    /// the group was built, so a read only waits for whatever is left of that
    /// member's delay. Stops at the first failing index.
    pub async fn await_sequential<F>(&self, mut on_settled: F) -> Result<Vec<T>, GroupFailure>
    where
        F: FnMut(usize, &T),
    {
        let mut values = Vec::with_capacity(self.members.len());
        for (index, member) in self.members.iter().enumerate() {
            if member.is_settled() {
                tracing::debug!(index, "member already settled, reading without waiting");
            }
            match member.settled().await {
                Ok(value) => {
                    on_settled(index, &value);
                    values.push(value);
                }
                Err(source) => return Err(GroupFailure { index, source }),
            }
        }
        Ok(values)
    }

    /// Waits for every member and reports each outcome in index order,
    /// without failing fast.
    pub async fn settle_all(&self) -> Vec<Result<T, SettlementFailure>> {
        future::join_all(self.members.iter().map(DeferredValue::settled)).await
    }
}

impl<T> FromIterator<DeferredValue<T>> for DeferredGroup<T> {
    fn from_iter<I: IntoIterator<Item = DeferredValue<T>>>(iter: I) -> Self {
        DeferredGroup::new(iter)
    }
}
