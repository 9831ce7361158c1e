//! Hasher state for maps keyed by values that are already hashes.
//!
//! Keys such as [`Hash32`](super::Hash32) and [`HashString64`](super::HashString64)
//! are FNV results, [`NoOpHashState`] passes them straight through.

use core::hash::{BuildHasher, Hasher};

// -----------------------------------------------------------------------------
// NoOpHasher

/// A hasher that keeps the last written integer as its result.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHasher {
    hash: u64,
}

impl Hasher for NoOpHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, bytes: &[u8]) {
        // Little-endian fold, so `write_u32(x)` and `write_u64(x as u64)` agree.
        for byte in bytes.iter().rev() {
            self.hash = self.hash.rotate_left(8).wrapping_add(*byte as u64);
        }
    }

    #[inline]
    fn write_u32(&mut self, i: u32) {
        // Spread the 32-bit value over the high bits too, hashbrown
        // takes its control bytes from the top 7 bits.
        let i = i as u64;
        self.hash = i | (i << 32);
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}

/// Builds [`NoOpHasher`]s, for maps keyed by values that are already hashes.
///
/// # Examples
///
/// ```
/// use core::hash::{BuildHasher, Hash, Hasher};
/// use shib_utils::hash::NoOpHashState;
///
/// let mut hasher = NoOpHashState.build_hasher();
/// 42_u64.hash(&mut hasher);
/// assert_eq!(hasher.finish(), 42);
/// ```
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHashState;

impl BuildHasher for NoOpHashState {
    type Hasher = NoOpHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        NoOpHasher { hash: 0 }
    }
}
