//! Untyped payload buffers.

use crate::error::{RcError, Result};

/// A zero-initialised byte block owned by one entry.
///
/// The registry identifies entries by payload address, so a zero-size
/// request still reserves one byte to keep every address distinct.
pub struct Payload {
    bytes: Box<[u8]>,
    len: usize,
}

impl Payload {
    /// Allocate `len` zeroed bytes.
    pub fn zeroed(len: usize) -> Result<Self> {
        let reserved = len.max(1);
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(reserved)
            .map_err(|_| RcError::AllocationFailed { bytes: reserved })?;
        bytes.resize(reserved, 0u8);
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
            len,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.as_ptr()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len]
    }

    /// Decode a native-endian integer from the start of the buffer.
    pub fn read<T: PodInt>(&self) -> Result<T> {
        let bytes = self.as_bytes();
        if bytes.len() < T::SIZE {
            return Err(RcError::PayloadTooSmall {
                needed: T::SIZE,
                available: bytes.len(),
            });
        }
        Ok(T::read_ne(&bytes[..T::SIZE]))
    }

    /// Encode a native-endian integer at the start of the buffer.
    pub fn write<T: PodInt>(&mut self, value: T) -> Result<()> {
        let bytes = self.as_bytes_mut();
        if bytes.len() < T::SIZE {
            return Err(RcError::PayloadTooSmall {
                needed: T::SIZE,
                available: bytes.len(),
            });
        }
        value.write_ne(&mut bytes[..T::SIZE]);
        Ok(())
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len)
            .finish()
    }
}

/// Plain integers that can be stored in a payload byte-for-byte.
///
/// Slices passed in are exactly `SIZE` bytes long.
pub trait PodInt: Copy + Sized {
    const SIZE: usize;

    fn read_ne(bytes: &[u8]) -> Self;
    fn write_ne(self, bytes: &mut [u8]);
}

macro_rules! impl_pod_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PodInt for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn read_ne(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_ne_bytes(raw)
                }

                #[inline]
                fn write_ne(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_pod_int!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);
