//! Per-entry bookkeeping: payload, strong count and dependency edges.

use crate::config::grow_for_push;
use crate::error::{RcError, Result};
use crate::index::EntryIndex;
use crate::payload::Payload;

/// One registered allocation.
///
/// `strong_count == 0` marks the entry dead. It stays in the registry, payload
/// included, until the registry is torn down.
#[derive(Debug)]
pub struct Entry {
    pub(crate) payload: Payload,
    pub(crate) strong_count: usize,
    /// Slots whose count drops along with this one.
    pub(crate) dependencies: Vec<EntryIndex>,
}

impl Entry {
    /// A fresh entry owned by exactly one strong handle.
    pub(crate) fn new(payload: Payload, dep_capacity: usize) -> Result<Self> {
        Ok(Self {
            payload,
            strong_count: 1,
            dependencies: reserve_edges(dep_capacity)?,
        })
    }

    /// Forget every edge and count, as if the entry had just been created.
    pub(crate) fn reset(&mut self, dep_capacity: usize) -> Result<()> {
        self.dependencies = reserve_edges(dep_capacity)?;
        self.strong_count = 1;
        Ok(())
    }

    pub(crate) fn push_dependency(
        &mut self,
        index: EntryIndex,
        initial: usize,
        factor: usize,
    ) -> Result<()> {
        grow_for_push(&mut self.dependencies, initial, factor)?;
        self.dependencies.push(index);
        Ok(())
    }

    #[inline]
    pub fn strong_count(&self) -> usize {
        self.strong_count
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.strong_count > 0
    }

    #[inline]
    pub fn dependencies(&self) -> &[EntryIndex] {
        &self.dependencies
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

fn reserve_edges(capacity: usize) -> Result<Vec<EntryIndex>> {
    let mut edges = Vec::new();
    edges
        .try_reserve_exact(capacity)
        .map_err(|_| RcError::AllocationFailed {
            bytes: capacity.saturating_mul(std::mem::size_of::<EntryIndex>()),
        })?;
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> Entry {
        Entry::new(Payload::zeroed(4).unwrap(), 8).unwrap()
    }

    #[test]
    fn test_new_entry_has_one_owner() {
        let e = entry();
        assert_eq!(e.strong_count(), 1);
        assert!(e.is_alive());
        assert!(e.dependencies().is_empty());
        assert_eq!(e.dependencies.capacity(), 8);
    }

    #[test]
    fn test_dependency_list_doubles() {
        let mut e = entry();
        for i in 0..9 {
            e.push_dependency(i, 8, 2).unwrap();
        }
        assert_eq!(e.dependencies().len(), 9);
        assert_eq!(e.dependencies.capacity(), 16);
        assert_eq!(e.dependencies()[8], 8);
    }

    #[test]
    fn test_reset_discards_edges_and_count() {
        let mut e = entry();
        e.push_dependency(3, 8, 2).unwrap();
        e.strong_count = 5;

        e.reset(8).unwrap();
        assert_eq!(e.strong_count(), 1);
        assert!(e.dependencies().is_empty());
    }
}
