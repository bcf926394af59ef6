//! # Cascade-RC
//!
//! Manual reference counting with explicit strong and weak handles over a
//! single append-only registry.
//!
//! Besides counting owners, the registry records *dependency edges*: an
//! entry can be created (or aliased) as a dependency of another one, and
//! releasing the owner then cascades the decrement through every entry it
//! depends on.
//!
//! ## Features
//!
//! - **Untyped payloads**: every entry owns a zeroed byte block of the
//!   requested size, addressed by pointer for aliasing
//! - **Strong/weak handles**: `downgrade` gives up an ownership unit,
//!   `upgrade` takes one back while the entry is alive
//! - **Cascading release**: depth-first, in edge insertion order, stopping
//!   at entries already at zero
//! - **Bulk teardown**: nothing is freed individually; `cleanup` drops
//!   the whole registry
//! - **QCell-based**: entries shared between slots without `RefCell` panics
//!
//! ## Quick Start
//!
//! ```rust
//! use cascade_rc::Registry;
//!
//! let mut registry = Registry::new();
//! let m = registry.create_owned(4, None).unwrap();
//! registry.write_int(&m, 100i32).unwrap();
//!
//! let a = registry.create_alias(m.as_ptr(), 0, None).unwrap();
//! assert_eq!(registry.read_int::<i32>(&a).unwrap(), 100);
//! assert_eq!(registry.strong_count(&m), Some(2));
//!
//! let w = registry.downgrade(a); // count 1, weak handle still valid
//! assert!(registry.upgrade(w).is_some());
//! ```

mod config;
mod entry;
mod error;
mod handle;
mod index;
mod payload;
mod registry;

pub use config::{RegistryConfig, DEFAULT_GROWTH_FACTOR, DEFAULT_INITIAL_CAPACITY};
pub use entry::Entry;
pub use error::{RcError, Result};
pub use handle::Strong;
pub use index::{EntryIndex, Weak};
pub use payload::{Payload, PodInt};
pub use registry::Registry;
