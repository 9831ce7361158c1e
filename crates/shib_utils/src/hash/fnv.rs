use core::fmt;

// -----------------------------------------------------------------------------
// FNV-1a

const FNV32_OFFSET: u32 = 0x811C_9DC5;
const FNV32_PRIME: u32 = 0x0100_0193;

const FNV64_OFFSET: u64 = 0xCBF2_9CE4_8422_2325;
const FNV64_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Computes the 32-bit FNV-1a hash of `bytes`.
///
/// # Examples
///
/// ```
/// use shib_utils::hash::fnv1a_hash32;
///
/// assert_eq!(fnv1a_hash32(b""), 0x811C_9DC5);
/// assert_eq!(fnv1a_hash32(b"a"), 0xE40C_292C);
/// ```
#[inline]
pub const fn fnv1a_hash32(bytes: &[u8]) -> u32 {
    fnv1a_hash32_with(FNV32_OFFSET, bytes)
}

/// Continues a 32-bit FNV-1a hash from a previous result.
///
/// Chaining lets composite keys (e.g. a function name and its
/// signature) be hashed without building a temporary buffer.
pub const fn fnv1a_hash32_with(init: u32, bytes: &[u8]) -> u32 {
    let mut hash = init;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV32_PRIME);
        i += 1;
    }
    hash
}

/// Computes the 64-bit FNV-1a hash of `bytes`.
///
/// # Examples
///
/// ```
/// use shib_utils::hash::fnv1a_hash64;
///
/// assert_eq!(fnv1a_hash64(b""), 0xCBF2_9CE4_8422_2325);
/// assert_eq!(fnv1a_hash64(b"a"), 0xAF63_DC4C_8601_EC8C);
/// ```
#[inline]
pub const fn fnv1a_hash64(bytes: &[u8]) -> u64 {
    fnv1a_hash64_with(FNV64_OFFSET, bytes)
}

/// Continues a 64-bit FNV-1a hash from a previous result.
pub const fn fnv1a_hash64_with(init: u64, bytes: &[u8]) -> u64 {
    let mut hash = init;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV64_PRIME);
        i += 1;
    }
    hash
}

// -----------------------------------------------------------------------------
// Hash32

/// A 32-bit FNV-1a hash.
///
/// Used for per-definition lookups such as field and function names.
///
/// # Examples
///
/// ```
/// use shib_utils::Hash32;
///
/// const NAME: Hash32 = Hash32::of_str("position");
/// assert_eq!(NAME, Hash32::of_str("position"));
/// assert_ne!(NAME, Hash32::of_str("rotation"));
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Hash32(u32);

impl Hash32 {
    /// The hash of empty input, used as the seed of chained hashes.
    pub const INIT: Self = Self(FNV32_OFFSET);

    /// Wraps an already computed hash value.
    #[inline(always)]
    pub const fn new(hash: u32) -> Self {
        Self(hash)
    }

    /// Hashes a string.
    #[inline]
    pub const fn of_str(s: &str) -> Self {
        Self(fnv1a_hash32(s.as_bytes()))
    }

    /// Hashes raw bytes.
    #[inline]
    pub const fn of_bytes(bytes: &[u8]) -> Self {
        Self(fnv1a_hash32(bytes))
    }

    /// Hashes `bytes`, continuing from `self`.
    #[inline]
    pub const fn chain(self, bytes: &[u8]) -> Self {
        Self(fnv1a_hash32_with(self.0, bytes))
    }

    /// Returns the raw hash value.
    #[inline(always)]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for Hash32 {
    #[inline]
    fn default() -> Self {
        Self::INIT
    }
}

impl From<u32> for Hash32 {
    #[inline]
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({:#010x})", self.0)
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

// -----------------------------------------------------------------------------
// Hash64

/// A 64-bit FNV-1a hash.
///
/// Used for identities that must be unique across modules:
/// classes, interfaces, attributes and modules themselves.
///
/// # Examples
///
/// ```
/// use shib_utils::Hash64;
///
/// let hash = Hash64::of_str("Shibboleth::IManager");
/// assert_eq!(hash, Hash64::INIT.chain(b"Shibboleth::IManager"));
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Hash64(u64);

impl Hash64 {
    /// The hash of empty input, used as the seed of chained hashes.
    pub const INIT: Self = Self(FNV64_OFFSET);

    /// Wraps an already computed hash value.
    #[inline(always)]
    pub const fn new(hash: u64) -> Self {
        Self(hash)
    }

    /// Hashes a string.
    #[inline]
    pub const fn of_str(s: &str) -> Self {
        Self(fnv1a_hash64(s.as_bytes()))
    }

    /// Hashes raw bytes.
    #[inline]
    pub const fn of_bytes(bytes: &[u8]) -> Self {
        Self(fnv1a_hash64(bytes))
    }

    /// Hashes `bytes`, continuing from `self`.
    #[inline]
    pub const fn chain(self, bytes: &[u8]) -> Self {
        Self(fnv1a_hash64_with(self.0, bytes))
    }

    /// Folds another hash into this one.
    #[inline]
    pub const fn combine(self, other: Self) -> Self {
        self.chain(&other.0.to_le_bytes())
    }

    /// Returns the raw hash value.
    #[inline(always)]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Default for Hash64 {
    #[inline]
    fn default() -> Self {
        Self::INIT
    }
}

impl From<u64> for Hash64 {
    #[inline]
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Hash64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash64({:#018x})", self.0)
    }
}

impl fmt::Display for Hash64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{Hash32, Hash64, fnv1a_hash32, fnv1a_hash64};

    #[test]
    fn known_vectors() {
        assert_eq!(fnv1a_hash32(b"foobar"), 0xBF9C_F968);
        assert_eq!(fnv1a_hash64(b"foobar"), 0x8594_4171_F739_67E8);
    }

    #[test]
    fn chained_equals_concatenated() {
        let split = Hash64::of_str("Module").chain(b"Name");
        assert_eq!(split, Hash64::of_str("ModuleName"));

        let split = Hash32::of_str("ab").chain(b"cd");
        assert_eq!(split, Hash32::of_str("abcd"));
    }

    #[test]
    fn const_evaluation() {
        const HASH: Hash32 = Hash32::of_str("a");
        assert_eq!(HASH.get(), 0xE40C_292C);
        assert_eq!(Hash32::default(), Hash32::INIT);
    }
}
