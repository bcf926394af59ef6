//! Registry indices and the weak handle built on them.

use std::fmt;

/// Position of an entry in the registry, assigned in insertion order.
pub type EntryIndex = usize;

/// A weak (non-owning) reference to a registry slot.
///
/// A weak handle is nothing but an index. It does not keep its entry alive
/// and must be upgraded through [`Registry::upgrade`](crate::Registry::upgrade)
/// before the payload can be touched. [`Weak::INVALID`] is what a downgrade
/// returns once the entry has no strong owners left.
///
/// # Example
///
/// ```
/// use cascade_rc::{Registry, Weak};
///
/// let mut registry = Registry::new();
/// let strong = registry.create_owned(4, None).unwrap();
///
/// // Last strong unit released: the entry dies
/// let weak = registry.downgrade(strong);
/// assert_eq!(weak, Weak::INVALID);
/// assert!(registry.upgrade(weak).is_none());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Weak {
    entry_id: usize,
}

impl Weak {
    /// Sentinel that never names a real slot.
    pub const INVALID: Weak = Weak {
        entry_id: usize::MAX,
    };

    #[inline]
    pub(crate) const fn new(index: EntryIndex) -> Self {
        Self { entry_id: index }
    }

    /// Raw id, sentinel included.
    #[inline]
    pub const fn entry_id(self) -> usize {
        self.entry_id
    }

    /// The slot index, or `None` for the sentinel.
    #[inline]
    pub const fn index(self) -> Option<EntryIndex> {
        if self.is_invalid() {
            None
        } else {
            Some(self.entry_id)
        }
    }

    #[inline]
    pub const fn is_invalid(self) -> bool {
        self.entry_id == usize::MAX
    }
}

impl Default for Weak {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for Weak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index() {
            Some(index) => write!(f, "Weak({index})"),
            None => f.write_str("Weak(INVALID)"),
        }
    }
}
