//! Containers with deterministic iteration order.

mod hash_vec_map;

pub use hash_vec_map::HashVecMap;
