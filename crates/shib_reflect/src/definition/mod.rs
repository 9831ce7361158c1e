//! Type definitions and the builders that produce them.
//!
//! A class is described with a [`ReflectionDefinition`] and frozen into
//! a [`ClassDefinition`] when it is handed to a
//! [`Registrar`](crate::Registrar). Enums use
//! [`EnumReflectionDefinition`] and are stored behind the object-safe
//! [`EnumDefinition`] trait.
//!
//! Functions are stored per name as up to [`MAX_OVERLOADS`] overloads,
//! each keyed by the hash of its argument and return types
//! ([`args_hash`]). Constructors are keyed the same way by their
//! argument tuple ([`ctor_hash`]).
//!
//! Interfaces are Rust traits. A class declares the traits it
//! implements with an [`InterfaceCaster`], usually built by
//! [`trait_cast!`](crate::trait_cast), and derived classes inherit the
//! interfaces of their bases.

// -----------------------------------------------------------------------------
// Modules

mod builder;
mod class;
mod enums;
mod function;
mod interface;

// -----------------------------------------------------------------------------
// Exports

pub use builder::ReflectionDefinition;
pub use class::{BaseClass, ClassDefinition, VarEntry};
pub use enums::{EnumDefinition, EnumReflectionDefinition, entry_names};
pub use function::{
    Factory, FunctionOverload, MAX_OVERLOADS, ReflectionFunction, ReflectionStaticFunction,
    args_hash, ctor_hash,
};
pub use interface::{DirectCast, ErasedTraitCast, InterfaceCaster, ThroughBase, TraitCast};
