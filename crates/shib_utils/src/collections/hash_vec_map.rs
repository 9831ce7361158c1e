use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::Hash;

use crate::hash::NoOpHashState;
use crate::hash::hashbrown::HashMap;
use crate::hash::hashbrown::hash_map::Entry;

// -----------------------------------------------------------------------------
// HashVecMap

/// An insertion-ordered map for pre-hashed keys.
///
/// Entries live in a `Vec` and are indexed by a hash map from key to
/// position, so lookups are O(1) and iteration follows insertion order.
/// Serialization walks fields through this map, which is what keeps
/// saved output deterministic.
///
/// Keys are expected to be hashes (or hash strings), the index uses
/// [`NoOpHashState`].
///
/// # Examples
///
/// ```
/// use shib_utils::collections::HashVecMap;
/// use shib_utils::{Hash32, HashString32};
///
/// let mut map = HashVecMap::new();
/// map.try_insert(HashString32::from_static("b"), 2).unwrap();
/// map.try_insert(HashString32::from_static("a"), 1).unwrap();
///
/// assert_eq!(map.get(&Hash32::of_str("a")), Some(&1));
/// let keys: Vec<_> = map.keys().map(|k| k.as_str()).collect();
/// assert_eq!(keys, ["b", "a"]);
/// ```
pub struct HashVecMap<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize, NoOpHashState>,
}

impl<K, V> HashVecMap<K, V> {
    /// Creates an empty map.
    #[inline]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::with_hasher(NoOpHashState),
        }
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry at `index` in insertion order.
    #[inline]
    pub fn get_index(&self, index: usize) -> Option<(&K, &V)> {
        self.entries.get(index).map(|(k, v)| (k, v))
    }

    /// Returns the entry at `index` in insertion order, with a mutable value.
    #[inline]
    pub fn get_index_mut(&mut self, index: usize) -> Option<(&K, &mut V)> {
        self.entries.get_mut(index).map(|(k, v)| (&*k, v))
    }

    /// Iterates over entries in insertion order.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Iterates over keys in insertion order.
    #[inline]
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Iterates over values in insertion order.
    #[inline]
    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Iterates mutably over values in insertion order.
    #[inline]
    pub fn values_mut(&mut self) -> impl ExactSizeIterator<Item = &mut V> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    /// Removes every entry.
    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

impl<K: Hash + Eq + Clone, V> HashVecMap<K, V> {
    /// Appends an entry unless the key is present.
    ///
    /// Returns the position of the new entry, or gives the pair back
    /// if the key already exists.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<usize, (K, V)> {
        let position = self.entries.len();
        match self.index.entry(key.clone()) {
            Entry::Occupied(_) => Err((key, value)),
            Entry::Vacant(entry) => {
                entry.insert(position);
                self.entries.push((key, value));
                Ok(position)
            }
        }
    }

    /// Inserts an entry at `position`, shifting later entries back.
    ///
    /// `position` is clamped to the length of the map.
    pub fn try_insert_at(&mut self, position: usize, key: K, value: V) -> Result<usize, (K, V)> {
        if self.index.contains_key(&key) {
            return Err((key, value));
        }
        let position = position.min(self.entries.len());
        for index in self.index.values_mut() {
            if *index >= position {
                *index += 1;
            }
        }
        self.index.insert(key.clone(), position);
        self.entries.insert(position, (key, value));
        Ok(position)
    }

    /// Returns the position of `key`.
    #[inline]
    pub fn index_of<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).copied()
    }

    /// Returns `true` if `key` is present.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Returns the value stored for `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.index_of(key)?;
        Some(&self.entries[index].1)
    }

    /// Returns the stored key and value for `key`.
    #[inline]
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.index_of(key)?;
        self.get_index(index)
    }

    /// Returns the value stored for `key` mutably.
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.index_of(key)?;
        Some(&mut self.entries[index].1)
    }

    /// Removes `key`, preserving the order of the remaining entries.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let position = self.index.remove(key)?;
        for index in self.index.values_mut() {
            if *index > position {
                *index -= 1;
            }
        }
        Some(self.entries.remove(position))
    }
}

// -----------------------------------------------------------------------------
// Traits

impl<K, V> Default for HashVecMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Debug, V: Debug> Debug for HashVecMap<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// -----------------------------------------------------------------------------
// Tests
