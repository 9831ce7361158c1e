//! Stable content hashes and hash containers, re-exports *hashbrown*.
//!
//! Two families of hashes live here:
//!
//! - [`Hash32`] / [`Hash64`]: FNV-1a hashes of names. They are stable across
//!   builds and modules, so they serve as cross-module identifiers.
//! - [`NoOpHashState`]: a [`BuildHasher`](core::hash::BuildHasher) for maps
//!   whose keys are such hashes already.

// -----------------------------------------------------------------------------
// Modules

mod fnv;
mod hash_string;
mod hasher;

pub mod hash_map;

// -----------------------------------------------------------------------------
// Exports

pub use fnv::{Hash32, Hash64};
pub use fnv::{fnv1a_hash32, fnv1a_hash32_with, fnv1a_hash64, fnv1a_hash64_with};

pub use hash_string::{HashString32, HashString64};

pub use hasher::{NoOpHashState, NoOpHasher};

pub use hash_map::NoOpHashMap;

// -----------------------------------------------------------------------------
// Re-export crates

pub use hashbrown;
