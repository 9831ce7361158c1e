//! Hash map aliases over [`hashbrown`].

use super::NoOpHashState;

/// A [`hashbrown::HashMap`] for keys that are already hashes.
///
/// # Examples
///
/// ```
/// use shib_utils::Hash64;
/// use shib_utils::hash::NoOpHashMap;
///
/// let mut map = NoOpHashMap::default();
/// map.insert(Hash64::of_str("Renderer"), 1);
/// assert_eq!(map.get(&Hash64::of_str("Renderer")), Some(&1));
/// ```
pub type NoOpHashMap<K, V> = hashbrown::HashMap<K, V, NoOpHashState>;

