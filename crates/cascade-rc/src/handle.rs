//! Strong handle type.

use crate::index::EntryIndex;

/// A strong handle: one ownership unit over a registry entry.
///
/// The handle caches the entry's payload address next to its index, the
/// same pair the registry checks to decide whether the handle still names
/// a live slot. Handles are always `Copy` and dropping one releases
/// nothing; ownership is given back explicitly with
/// [`Registry::downgrade`](crate::Registry::downgrade).
///
/// # Example
///
/// ```
/// use cascade_rc::Registry;
///
/// let mut registry = Registry::new();
/// let strong = registry.create_owned(8, None).unwrap();
/// assert_eq!(strong.index(), 0);
/// assert_eq!(registry.strong_count(&strong), Some(1));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Strong {
    pub(crate) index: EntryIndex,
    pub(crate) payload: *const u8,
}

impl Strong {
    #[inline]
    pub(crate) const fn new(index: EntryIndex, payload: *const u8) -> Self {
        Self { index, payload }
    }

    /// Slot this handle was issued for.
    #[inline]
    pub const fn index(&self) -> EntryIndex {
        self.index
    }

    /// Address of the payload buffer, usable with
    /// [`Registry::create_alias`](crate::Registry::create_alias).
    #[inline]
    pub const fn as_ptr(&self) -> *const u8 {
        self.payload
    }
}

impl std::fmt::Debug for Strong {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strong")
            .field("index", &self.index)
            .field("payload", &self.payload)
            .finish()
    }
}
