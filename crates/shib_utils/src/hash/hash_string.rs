use alloc::borrow::Cow;
use alloc::string::String;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

use super::{Hash32, Hash64};

macro_rules! define_hash_string {
    ($(#[$meta:meta])* $name:ident, $hash:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            hash: $hash,
            string: Cow<'static, str>,
        }

        impl $name {
            /// Creates a hash string from a static string, usable in const context.
            #[inline]
            pub const fn from_static(string: &'static str) -> Self {
                Self {
                    hash: $hash::of_str(string),
                    string: Cow::Borrowed(string),
                }
            }

            /// Creates a hash string, computing the hash of `string`.
            #[inline]
            pub fn new(string: impl Into<Cow<'static, str>>) -> Self {
                let string = string.into();
                Self {
                    hash: $hash::of_str(&string),
                    string,
                }
            }

            /// Returns the precomputed hash.
            #[inline(always)]
            pub const fn hash(&self) -> $hash {
                self.hash
            }

            /// Returns the original string.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.string
            }

            /// Consumes `self`, returning the owned string.
            #[inline]
            pub fn into_string(self) -> String {
                self.string.into_owned()
            }
        }

        impl PartialEq for $name {
            #[inline]
            fn eq(&self, other: &Self) -> bool {
                self.hash == other.hash
            }
        }

        impl Eq for $name {}

        impl PartialOrd for $name {
            #[inline]
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            #[inline]
            fn cmp(&self, other: &Self) -> Ordering {
                self.hash.cmp(&other.hash)
            }
        }

        impl Hash for $name {
            #[inline]
            fn hash<H: Hasher>(&self, state: &mut H) {
                // Must match `$hash`'s own `Hash` so `Borrow<$hash>` lookups work.
                self.hash.hash(state);
            }
        }

        impl Borrow<$hash> for $name {
            #[inline]
            fn borrow(&self) -> &$hash {
                &self.hash
            }
        }

        impl From<&'static str> for $name {
            #[inline]
            fn from(value: &'static str) -> Self {
                Self::from_static(value)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}@{}", self.string, self.hash)
            }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.string)
            }
        }
    };
}

define_hash_string! {
    /// A string carrying its 32-bit FNV-1a hash.
    ///
    /// Comparison and hashing only look at the hash, and the type
    /// borrows as [`Hash32`], so maps keyed by `HashString32` can be
    /// queried with a bare hash.
    ///
    /// # Examples
    ///
    /// ```
    /// use shib_utils::{Hash32, HashString32};
    ///
    /// let name = HashString32::from_static("names");
    /// assert_eq!(name.hash(), Hash32::of_str("names"));
    /// assert_eq!(name.as_str(), "names");
    /// ```
    HashString32, Hash32
}

define_hash_string! {
    /// A string carrying its 64-bit FNV-1a hash.
    ///
    /// See [`HashString32`]; this is the cross-module variant.
    HashString64, Hash64
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::{HashString32, HashString64};
    use crate::hash::{Hash32, Hash64, NoOpHashMap};

    #[test]
    fn borrowed_and_owned_agree() {
        let a = HashString64::from_static("Core");
        let b = HashString64::new(String::from("Core"));
        assert_eq!(a, b);
        assert_eq!(a.hash(), Hash64::of_str("Core"));
    }

    #[test]
    fn lookup_by_bare_hash() {
        let mut map = NoOpHashMap::default();
        map.insert(HashString32::from_static("a"), 5);
        assert_eq!(map.get(&Hash32::of_str("a")), Some(&5));
        assert_eq!(map.get(&Hash32::of_str("b")), None);
    }
}
