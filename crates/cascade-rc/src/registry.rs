//! The registry: slot storage, allocation, aliasing, downgrade/upgrade and
//! teardown.

use crate::config::{grow_for_push, RegistryConfig};
use crate::entry::Entry;
use crate::error::{RcError, Result};
use crate::handle::Strong;
use crate::index::{EntryIndex, Weak};
use crate::payload::{Payload, PodInt};
use qcell::{QCell, QCellOwner};
use std::rc::Rc;
use tracing::{debug, trace};

/// A registry slot. Two slots may share one entry (see
/// [`Registry::create_alias`]).
type Slot = Rc<QCell<Entry>>;

/// Append-only store of reference-counted entries.
///
/// Indices are handed out in insertion order and never reused until
/// [`cleanup`](Registry::cleanup) drops everything at once. Entries whose
/// count reaches zero stay in place, dead, so weak handles pointing at them
/// fail to upgrade instead of dangling.
///
/// The registry is single-threaded: it holds `Rc`s and is neither `Send`
/// nor `Sync`.
///
/// # Example
///
/// ```
/// use cascade_rc::Registry;
///
/// let mut registry = Registry::new();
/// let owner = registry.create_owned(16, None).unwrap();
/// let child = registry.create_owned(4, Some(&owner)).unwrap();
///
/// // Releasing the owner releases what it depends on
/// registry.downgrade(owner);
/// assert_eq!(registry.strong_count(&owner), Some(0));
/// assert_eq!(registry.strong_count(&child), Some(0));
/// ```
pub struct Registry {
    owner: QCellOwner,
    slots: Vec<Slot>,
    config: RegistryConfig,
}

impl Registry {
    /// Create an empty registry with the default growth policy.
    pub fn new() -> Self {
        Self::build(RegistryConfig::default())
    }

    /// Create an empty registry with a custom growth policy.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RegistryConfig) -> Self {
        Self {
            owner: QCellOwner::new(),
            slots: Vec::new(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Number of slots, dead entries and duplicate slots included.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Number of slots whose entry still has strong owners.
    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| self.owner.ro(slot).is_alive())
            .count()
    }

    // ------------------------------------------------------------------
    // Slot storage
    // ------------------------------------------------------------------

    /// Store a new entry at the next index.
    pub(crate) fn append(&mut self, entry: Entry) -> Result<EntryIndex> {
        let slot = Rc::new(QCell::new(&self.owner, entry));
        self.push_slot(slot)
    }

    fn push_slot(&mut self, slot: Slot) -> Result<EntryIndex> {
        let index = self.slots.len();
        if index == Weak::INVALID.entry_id() {
            return Err(RcError::RegistryFull);
        }
        grow_for_push(
            &mut self.slots,
            self.config.initial_capacity,
            self.config.growth_factor,
        )?;
        self.slots.push(slot);
        Ok(index)
    }

    /// The entry stored at `index`, dead or alive.
    pub fn entry(&self, index: EntryIndex) -> Option<&Entry> {
        self.slots.get(index).map(|slot| self.owner.ro(slot))
    }

    fn entry_mut(&mut self, index: EntryIndex) -> Option<&mut Entry> {
        let slot = self.slots.get(index)?;
        Some(self.owner.rw(slot))
    }

    /// First index, in insertion order, whose entry owns the payload at `ptr`.
    pub fn find_by_payload(&self, ptr: *const u8) -> Option<EntryIndex> {
        self.slots
            .iter()
            .position(|slot| self.owner.ro(slot).payload.as_ptr() == ptr)
    }

    /// First index at which the entry behind `handle` is stored.
    ///
    /// This differs from `handle.index()` only for handles minted on a
    /// duplicate slot.
    pub fn find_index_of(&self, handle: &Strong) -> Option<EntryIndex> {
        let target = self.slots.get(self.resolve(handle)?)?;
        self.slots.iter().position(|slot| Rc::ptr_eq(slot, target))
    }

    /// Whether `handle` names an entry of the current registry state.
    #[inline]
    pub fn exists(&self, handle: &Strong) -> bool {
        self.resolve(handle).is_some()
    }

    /// Map a handle to its slot, checking that the payload it cached is
    /// still the one stored there.
    fn resolve(&self, handle: &Strong) -> Option<EntryIndex> {
        let entry = self.entry(handle.index)?;
        (entry.payload.as_ptr() == handle.payload).then_some(handle.index)
    }

    fn resolve_dependent(&self, dependent: Option<&Strong>) -> Result<Option<EntryIndex>> {
        dependent
            .map(|handle| {
                self.resolve(handle)
                    .ok_or(RcError::UnknownHandle {
                        index: handle.index,
                    })
            })
            .transpose()
    }

    /// Record that releasing `owner` must also release `dependency`.
    fn link(&mut self, owner: EntryIndex, dependency: EntryIndex) -> Result<()> {
        let initial = self.config.dependency_capacity;
        let factor = self.config.growth_factor;
        let entry = self
            .entry_mut(owner)
            .ok_or(RcError::UnknownHandle { index: owner })?;
        entry.push_dependency(dependency, initial, factor)?;
        trace!(owner, dependency, "recorded dependency edge");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Allocation and aliasing
    // ------------------------------------------------------------------

    /// Allocate `size` zeroed bytes under a new entry with one strong owner.
    ///
    /// With a `dependent`, the new index is appended to the dependent's
    /// edge list so that downgrading the dependent also releases the new
    /// entry. The dependent's own count is untouched.
    pub fn create_owned(&mut self, size: usize, dependent: Option<&Strong>) -> Result<Strong> {
        let owner = self.resolve_dependent(dependent)?;

        let payload = Payload::zeroed(size)?;
        let ptr = payload.as_ptr();
        let index = self.append(Entry::new(payload, self.config.dependency_capacity)?)?;
        trace!(index, size, "allocated entry");

        if let Some(owner) = owner {
            self.link(owner, index)?;
        }
        Ok(Strong::new(index, ptr))
    }

    /// Take another strong handle on an already registered payload.
    ///
    /// Returns `None` when `ptr` is not a registered payload, when its entry
    /// is already dead, or when storage is exhausted. See
    /// [`try_create_alias`](Registry::try_create_alias) for the error.
    pub fn create_alias(
        &mut self,
        ptr: *const u8,
        size_hint: usize,
        dependent: Option<&Strong>,
    ) -> Option<Strong> {
        self.try_create_alias(ptr, size_hint, dependent)
            .map_err(|err| debug!(%err, "alias request rejected"))
            .ok()
    }

    /// Take another strong handle on an already registered payload.
    ///
    /// Without a `dependent` this is a plain alias: the entry's count goes up
    /// by one and the handle shares its index.
    ///
    /// With a `dependent` the entry is also registered a second time, under
    /// a new index that becomes a dependency edge of `dependent`. Doing so
    /// resets the entry's bookkeeping: every edge it had is dropped and its
    /// count ends at 2, one unit for the caller and one for the dependent.
    ///
    /// `size_hint` is accepted for symmetry with allocation and not used.
    pub fn try_create_alias(
        &mut self,
        ptr: *const u8,
        size_hint: usize,
        dependent: Option<&Strong>,
    ) -> Result<Strong> {
        let owner = self.resolve_dependent(dependent)?;
        let not_found = RcError::NotFound { addr: ptr as usize };
        let index = self.find_by_payload(ptr).ok_or(not_found.clone())?;

        let entry = self.entry_mut(index).ok_or(not_found.clone())?;
        if !entry.is_alive() {
            return Err(RcError::DeadReference { index });
        }
        entry.strong_count += 1;

        let Some(owner) = owner else {
            trace!(index, count = entry.strong_count, size_hint, "aliased entry");
            return Ok(Strong::new(index, ptr));
        };

        let duplicate = self.slots.get(index).map(Rc::clone).ok_or(not_found)?;
        let duplicate_index = self.push_slot(duplicate)?;

        let dep_capacity = self.config.dependency_capacity;
        if let Some(entry) = self.entry_mut(index) {
            entry.reset(dep_capacity)?;
        }
        self.link(owner, duplicate_index)?;
        if let Some(entry) = self.entry_mut(index) {
            entry.strong_count += 1;
        }

        trace!(index, duplicate_index, owner, "aliased entry as dependency");
        Ok(Strong::new(index, ptr))
    }

    // ------------------------------------------------------------------
    // Downgrade / upgrade
    // ------------------------------------------------------------------

    /// Give up one strong unit and get a weak handle back.
    ///
    /// The release cascades: the entry's count drops by one, then every
    /// dependency that is still alive is released the same way, depth
    /// first, in the order the edges were recorded. Dependencies already at
    /// zero are skipped, which is also what stops cycles.
    ///
    /// Returns [`Weak::INVALID`] if the entry is dead afterwards or the
    /// handle does not belong to this registry.
    pub fn downgrade(&mut self, handle: Strong) -> Weak {
        let Some(index) = self.resolve(&handle) else {
            debug!(index = handle.index, "downgrade of unknown handle");
            return Weak::INVALID;
        };

        if self.entry(index).is_some_and(Entry::is_alive) {
            let released = self.cascade(index);
            debug!(index, released, "released strong unit");
        }

        if !self.exists(&handle) || !self.entry(index).is_some_and(Entry::is_alive) {
            return Weak::INVALID;
        }
        self.find_index_of(&handle).map_or(Weak::INVALID, Weak::new)
    }

    /// Decrement `root` and everything reachable through live edges.
    ///
    /// Worklist form of a pre-order depth-first walk: edges are pushed in
    /// reverse so they pop in insertion order, and the zero check happens
    /// at pop time, after earlier siblings' subtrees have run.
    fn cascade(&mut self, root: EntryIndex) -> usize {
        let mut pending = vec![root];
        let mut released = 0;

        while let Some(index) = pending.pop() {
            let Some(slot) = self.slots.get(index) else {
                continue;
            };
            let entry = self.owner.rw(slot);
            if entry.strong_count == 0 {
                continue;
            }
            entry.strong_count -= 1;
            released += 1;
            pending.extend(entry.dependencies.iter().rev().copied());
        }

        released
    }

    /// Turn a weak handle back into a strong one, if its entry is alive.
    pub fn upgrade(&mut self, weak: Weak) -> Option<Strong> {
        self.try_upgrade(weak).ok()
    }

    /// Turn a weak handle back into a strong one.
    ///
    /// Fails with [`RcError::DeadReference`] for the sentinel, for an index
    /// past the end of the registry (an empty registry included) and for an
    /// entry whose count is zero.
    pub fn try_upgrade(&mut self, weak: Weak) -> Result<Strong> {
        let dead = || RcError::DeadReference {
            index: weak.entry_id(),
        };
        let index = weak.index().ok_or_else(dead)?;
        if self.slots.is_empty() {
            return Err(dead());
        }

        let entry = self.entry_mut(index).ok_or_else(dead)?;
        if !entry.is_alive() {
            return Err(dead());
        }
        entry.strong_count += 1;
        let ptr = entry.payload.as_ptr();
        trace!(index, count = entry.strong_count, "upgraded weak handle");
        Ok(Strong::new(index, ptr))
    }

    /// Whether `weak` would upgrade right now.
    pub fn is_alive(&self, weak: Weak) -> bool {
        weak.index()
            .and_then(|index| self.entry(index))
            .is_some_and(Entry::is_alive)
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Drop every entry, payloads and edge lists included, and release the
    /// slot storage. Outstanding handles stop resolving.
    pub fn cleanup(&mut self) {
        let released = self.slots.len();
        self.slots = Vec::new();
        debug!(released, "registry torn down");
    }

    // ------------------------------------------------------------------
    // Inspection and payload access
    // ------------------------------------------------------------------

    pub fn strong_count(&self, handle: &Strong) -> Option<usize> {
        self.strong_count_at(self.resolve(handle)?)
    }

    pub fn strong_count_at(&self, index: EntryIndex) -> Option<usize> {
        self.entry(index).map(Entry::strong_count)
    }

    /// Edge list of the entry behind `handle`, in insertion order.
    pub fn dependencies(&self, handle: &Strong) -> Option<&[EntryIndex]> {
        self.entry(self.resolve(handle)?).map(Entry::dependencies)
    }

    pub fn payload(&self, handle: &Strong) -> Option<&[u8]> {
        self.entry(self.resolve(handle)?)
            .map(|entry| entry.payload.as_bytes())
    }

    pub fn payload_mut(&mut self, handle: &Strong) -> Option<&mut [u8]> {
        let index = self.resolve(handle)?;
        self.entry_mut(index)
            .map(|entry| entry.payload.as_bytes_mut())
    }

    /// Read a native-endian integer from the start of the payload.
    pub fn read_int<T: PodInt>(&self, handle: &Strong) -> Result<T> {
        let index = self.resolve(handle).ok_or(RcError::UnknownHandle {
            index: handle.index,
        })?;
        let entry = self
            .entry(index)
            .ok_or(RcError::UnknownHandle { index })?;
        entry.payload.read()
    }

    /// Write a native-endian integer at the start of the payload.
    pub fn write_int<T: PodInt>(&mut self, handle: &Strong, value: T) -> Result<()> {
        let index = self.resolve(handle).ok_or(RcError::UnknownHandle {
            index: handle.index,
        })?;
        let entry = self
            .entry_mut(index)
            .ok_or(RcError::UnknownHandle { index })?;
        entry.payload.write(value)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.slots.len())
            .field("capacity", &self.slots.capacity())
            .field("live", &self.live_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INT: usize = std::mem::size_of::<i32>();

    #[test]
    fn test_create_owned_starts_at_one() {
        let mut registry = Registry::new();
        let h = registry.create_owned(INT, None).unwrap();
        assert_eq!(h.index(), 0);
        assert_eq!(registry.strong_count(&h), Some(1));
        assert_eq!(registry.payload(&h).map(<[u8]>::len), Some(INT));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_indices_follow_insertion_order() {
        let mut registry = Registry::new();
        let indices: Vec<_> = (0..5)
            .map(|_| registry.create_owned(1, None).unwrap().index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_slot_capacity_doubles_from_eight() {
        let mut registry = Registry::new();
        assert_eq!(registry.capacity(), 0);

        registry.create_owned(1, None).unwrap();
        assert_eq!(registry.capacity(), 8);

        for _ in 0..8 {
            registry.create_owned(1, None).unwrap();
        }
        assert_eq!(registry.len(), 9);
        assert_eq!(registry.capacity(), 16);
    }

    #[test]
    fn test_owned_with_dependent_records_edge_only() {
        let mut registry = Registry::new();
        let owner = registry.create_owned(INT, None).unwrap();
        let child = registry.create_owned(INT, Some(&owner)).unwrap();

        assert_eq!(registry.dependencies(&owner), Some(&[child.index()][..]));
        assert_eq!(registry.strong_count(&owner), Some(1));
        assert_eq!(registry.strong_count(&child), Some(1));
    }

    #[test]
    fn test_plain_alias_shares_index() {
        let mut registry = Registry::new();
        let m = registry.create_owned(INT, None).unwrap();
        let a = registry.create_alias(m.as_ptr(), 0, None).unwrap();

        assert_eq!(a, m);
        assert_eq!(registry.strong_count(&m), Some(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_alias_of_unknown_pointer_fails() {
        let mut registry = Registry::new();
        registry.create_owned(INT, None).unwrap();
        let stray = [0u8; 4];

        assert!(registry.create_alias(stray.as_ptr(), 4, None).is_none());
        assert_eq!(
            registry.try_create_alias(stray.as_ptr(), 4, None),
            Err(RcError::NotFound {
                addr: stray.as_ptr() as usize
            })
        );
    }

    #[test]
    fn test_alias_of_dead_entry_fails() {
        let mut registry = Registry::new();
        let m = registry.create_owned(INT, None).unwrap();
        registry.downgrade(m);

        assert_eq!(
            registry.try_create_alias(m.as_ptr(), 0, None),
            Err(RcError::DeadReference { index: 0 })
        );
        assert_eq!(registry.strong_count(&m), Some(0));
    }

    #[test]
    fn test_dual_alias_duplicates_slot_and_resets_edges() {
        let mut registry = Registry::new();
        let m = registry.create_owned(INT, None).unwrap();
        let n = registry.create_owned(INT, None).unwrap();
        let extra = registry.create_owned(INT, Some(&n)).unwrap();
        assert_eq!(registry.dependencies(&n), Some(&[extra.index()][..]));

        let k = registry.create_alias(n.as_ptr(), INT, Some(&m)).unwrap();

        assert_eq!(k, n);
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.strong_count(&n), Some(2));
        assert_eq!(registry.strong_count_at(3), Some(2));
        assert!(registry.dependencies(&n).unwrap().is_empty());
        assert_eq!(registry.dependencies(&m), Some(&[3][..]));
        assert_eq!(registry.find_index_of(&k), Some(1));
        assert_eq!(registry.find_by_payload(n.as_ptr()), Some(1));
    }

    #[test]
    fn test_downgrade_last_unit_returns_sentinel() {
        let mut registry = Registry::new();
        let m = registry.create_owned(INT, None).unwrap();

        let w = registry.downgrade(m);
        assert!(w.is_invalid());
        assert_eq!(registry.strong_count(&m), Some(0));
        assert!(registry.upgrade(w).is_none());
    }

    #[test]
    fn test_downgrade_shared_entry_returns_index() {
        let mut registry = Registry::new();
        let m = registry.create_owned(INT, None).unwrap();
        let a = registry.create_alias(m.as_ptr(), 0, None).unwrap();

        let w = registry.downgrade(a);
        assert_eq!(w.index(), Some(0));
        assert_eq!(registry.strong_count(&m), Some(1));

        let again = registry.upgrade(w).unwrap();
        assert_eq!(again, m);
        assert_eq!(registry.strong_count(&m), Some(2));
    }

    #[test]
    fn test_downgrade_dead_entry_is_noop() {
        let mut registry = Registry::new();
        let child = registry.create_owned(INT, None).unwrap();
        let grandchild = registry.create_owned(INT, Some(&child)).unwrap();

        registry.downgrade(child);
        assert_eq!(registry.strong_count(&grandchild), Some(0));

        let w = registry.downgrade(child);
        assert!(w.is_invalid());
        assert_eq!(registry.strong_count(&child), Some(0));
    }

    #[test]
    fn test_cascade_visits_edges_in_insertion_order() {
        // root -> [a, b]; a -> [b]. Walking a first drains b through a, so
        // the direct root -> b edge finds b already at zero.
        let mut registry = Registry::new();
        let root = registry.create_owned(1, None).unwrap();
        let a = registry.create_owned(1, Some(&root)).unwrap();
        let b = registry.create_owned(1, Some(&root)).unwrap();
        registry.link(a.index(), b.index()).unwrap();

        let released = registry.cascade(root.index());
        assert_eq!(released, 3);
        assert_eq!(registry.strong_count(&a), Some(0));
        assert_eq!(registry.strong_count(&b), Some(0));
    }

    #[test]
    fn test_cascade_terminates_on_cycle() {
        let mut registry = Registry::new();
        let a = registry.create_owned(1, None).unwrap();
        let b = registry.create_owned(1, Some(&a)).unwrap();
        registry.link(b.index(), a.index()).unwrap();
        registry.upgrade(Weak::new(a.index())).unwrap();

        let w = registry.downgrade(a);
        assert!(w.is_invalid());
        assert_eq!(registry.strong_count(&a), Some(0));
        assert_eq!(registry.strong_count(&b), Some(0));
    }

    #[test]
    fn test_upgrade_rejects_out_of_range_and_sentinel() {
        let mut registry = Registry::new();
        assert!(registry.upgrade(Weak::new(0)).is_none());

        registry.create_owned(1, None).unwrap();
        assert!(registry.upgrade(Weak::new(1)).is_none());
        assert!(registry.upgrade(Weak::INVALID).is_none());
        assert_eq!(
            registry.try_upgrade(Weak::INVALID),
            Err(RcError::DeadReference { index: usize::MAX })
        );
    }

    #[test]
    fn test_cleanup_resets_storage() {
        let mut registry = Registry::new();
        let m = registry.create_owned(INT, None).unwrap();
        let a = registry.create_alias(m.as_ptr(), 0, None).unwrap();
        let w = registry.downgrade(a);
        assert!(registry.is_alive(w));

        registry.cleanup();
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.capacity(), 0);
        assert!(registry.upgrade(w).is_none());
        assert!(!registry.exists(&m));
        assert!(registry.downgrade(m).is_invalid());

        registry.cleanup();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_dependent_is_rejected() {
        let mut registry = Registry::new();
        let owner = registry.create_owned(INT, None).unwrap();
        registry.cleanup();

        assert_eq!(
            registry.create_owned(INT, Some(&owner)),
            Err(RcError::UnknownHandle { index: 0 })
        );
    }

    #[test]
    fn test_int_payload_access() {
        let mut registry = Registry::new();
        let m = registry.create_owned(INT, None).unwrap();
        let a = registry.create_alias(m.as_ptr(), 0, None).unwrap();

        registry.write_int(&m, 100i32).unwrap();
        assert_eq!(registry.read_int::<i32>(&a).unwrap(), 100);

        registry.payload_mut(&a).unwrap().fill(0);
        assert_eq!(registry.read_int::<i32>(&m).unwrap(), 0);
    }

    #[test]
    fn test_with_config_custom_growth() {
        let config = RegistryConfig::default()
            .with_initial_capacity(2)
            .with_growth_factor(3);
        let mut registry = Registry::with_config(config).unwrap();
        for _ in 0..3 {
            registry.create_owned(1, None).unwrap();
        }
        assert_eq!(registry.capacity(), 6);
    }

    #[test]
    fn test_live_count_tracks_dead_entries() {
        let mut registry = Registry::new();
        let a = registry.create_owned(1, None).unwrap();
        registry.create_owned(1, None).unwrap();
        assert_eq!(registry.live_count(), 2);

        registry.downgrade(a);
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.len(), 2);
    }
}
