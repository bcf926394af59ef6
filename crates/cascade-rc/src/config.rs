//! Sizing knobs for registry and dependency-list storage.

use crate::error::{RcError, Result};

/// Slots reserved on the first append, and edges reserved per entry.
pub const DEFAULT_INITIAL_CAPACITY: usize = 8;

/// Factor applied to a full buffer before the next push.
pub const DEFAULT_GROWTH_FACTOR: usize = 2;

/// Growth policy for the registry's slot list and every entry's
/// dependency list.
///
/// # Example
///
/// ```
/// use cascade_rc::{Registry, RegistryConfig};
///
/// let config = RegistryConfig::default().with_initial_capacity(4);
/// let registry = Registry::with_config(config).unwrap();
/// assert_eq!(registry.capacity(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub initial_capacity: usize,
    pub growth_factor: usize,
    pub dependency_capacity: usize,
}

impl RegistryConfig {
    pub const fn new() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            dependency_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }

    pub const fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub const fn with_growth_factor(mut self, factor: usize) -> Self {
        self.growth_factor = factor;
        self
    }

    pub const fn with_dependency_capacity(mut self, capacity: usize) -> Self {
        self.dependency_capacity = capacity;
        self
    }

    /// Reject configurations under which a buffer could never grow.
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(RcError::InvalidConfig {
                reason: "initial capacity must be at least 1",
            });
        }
        if self.dependency_capacity == 0 {
            return Err(RcError::InvalidConfig {
                reason: "dependency capacity must be at least 1",
            });
        }
        if self.growth_factor < 2 {
            return Err(RcError::InvalidConfig {
                reason: "growth factor must be at least 2",
            });
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Make room for one more element in `buf`.
///
/// An unallocated buffer jumps straight to `initial`; a full one is
/// multiplied by `factor`. Capacity is reserved exactly so it follows
/// the configured progression rather than the allocator's.
pub(crate) fn grow_for_push<T>(buf: &mut Vec<T>, initial: usize, factor: usize) -> Result<()> {
    let len = buf.len();
    if len < buf.capacity() {
        return Ok(());
    }
    let target = if buf.capacity() == 0 {
        initial.max(1)
    } else {
        buf.capacity().checked_mul(factor).ok_or(RcError::RegistryFull)?
    };
    buf.try_reserve_exact(target - len)
        .map_err(|_| RcError::AllocationFailed {
            bytes: target.saturating_mul(std::mem::size_of::<T>()),
        })
}
