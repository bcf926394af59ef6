//! Error type shared by every registry operation.

use thiserror::Error;

/// Everything that can go wrong while talking to a [`Registry`](crate::Registry).
///
/// Only [`RcError::AllocationFailed`] and [`RcError::RegistryFull`] describe
/// resource exhaustion; the rest are lookups that simply did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RcError {
    /// No entry owns a payload at this address.
    #[error("no entry owns the payload at {addr:#x}")]
    NotFound { addr: usize },

    /// The weak handle points at an entry whose count reached zero, or at
    /// nothing at all.
    #[error("entry {index} has been released")]
    DeadReference { index: usize },

    /// A strong handle that does not belong to the current registry state.
    #[error("handle for slot {index} is not known to this registry")]
    UnknownHandle { index: usize },

    #[error("failed to allocate {bytes} bytes")]
    AllocationFailed { bytes: usize },

    /// Every index below the weak sentinel is taken.
    #[error("registry has no free index left")]
    RegistryFull,

    #[error("invalid registry configuration: {reason}")]
    InvalidConfig { reason: &'static str },

    /// Typed access wider than the payload buffer.
    #[error("payload holds {available} bytes, {needed} needed")]
    PayloadTooSmall { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, RcError>;
