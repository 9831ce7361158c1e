//! Hashing primitives and small containers shared by the reflection crates.
//!
//! - [`hash`]: stable FNV-1a hashes, hash strings and hasher states.
//! - [`collections`]: insertion-ordered maps keyed by pre-hashed names.
#![no_std]

// -----------------------------------------------------------------------------
// No STD Support

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

pub mod collections;
pub mod hash;

// -----------------------------------------------------------------------------
// Top-level exports

pub use hash::{Hash32, Hash64, HashString32, HashString64};
