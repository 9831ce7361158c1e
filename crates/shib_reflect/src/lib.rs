//! Runtime reflection for engine types.
//!
//! A [`ReflectionDefinition`] describes one concrete type: its fields
//! (as type-erased [`ReflectionVar`] accessors), functions, base
//! types, interfaces, attributes and factories. Finished definitions are
//! frozen into [`ClassDefinition`]s and registered into the
//! [`ReflectionManager`], which buckets them by interface and by
//! owning module.
//!
//! Everything is keyed by stable FNV-1a hashes (see [`shib_utils::hash`])
//! so identities survive across module boundaries.
//!
//! # Examples
//!
//! ```
//! use shib_reflect::prelude::*;
//! use shib_reflect::serialize::{JsonReader, JsonWriter};
//!
//! #[derive(Default)]
//! struct Player {
//!     health: i32,
//!     names: Vec<String>,
//! }
//!
//! impl_type_name!(Player = "Player");
//!
//! let mut manager = ReflectionManager::new();
//! ReflectionDefinition::<Player>::new()
//!     .var("health", field!(Player, health), &[])
//!     .var_vec("names", field!(Player, names), &[])
//!     .finish(&mut manager.registrar());
//!
//! let def = manager.get_reflection_of::<Player>().unwrap();
//!
//! let json = serde_json::json!({ "health": 5, "names": ["x", "y"] });
//! let mut player = Player::default();
//! def.load(&mut JsonReader::new(&json), &mut player, &manager).unwrap();
//! assert_eq!(player.health, 5);
//!
//! let mut writer = JsonWriter::new();
//! def.save(&mut writer, &player, &manager).unwrap();
//! assert_eq!(writer.finish(), json);
//! ```

// -----------------------------------------------------------------------------
// Extern Self

// Lets the exported macros name `shib_reflect` both inside and outside the crate.
extern crate self as shib_reflect;

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod error;
mod impls;
mod reflect;
mod type_name;

pub mod attribute;
pub mod definition;
pub mod manager;
pub mod serialize;
pub mod var;

// -----------------------------------------------------------------------------
// Top-level exports

pub use error::{CallError, LoadError, SaveError, VarError};
pub use reflect::{Reflect, ValueType};
pub use type_name::TypeName;

pub use definition::{ClassDefinition, EnumDefinition, EnumReflectionDefinition, ReflectionDefinition};
pub use manager::{ReflectionManager, Registrar};
pub use var::ReflectionVar;

#[doc(hidden)]
pub mod __macro_exports {
    pub use crate::reflect::{class_instance_hash, load_class, save_class};
    pub use crate::reflect::{enum_instance_hash, load_enum, save_enum};
    pub use alloc::boxed::Box;
    pub use shib_utils::Hash64;
}

/// Log target used by the reflection system.
pub const LOG_CHANNEL: &str = "Reflection";

/// The most common imports.
pub mod prelude {
    pub use crate::attribute::{
        Attribute, NoCopyAttribute, NoSerializeAttribute, OptionalAttribute, RangeAttribute,
        ReadOnlyAttribute,
    };
    pub use crate::definition::{
        ClassDefinition, EnumDefinition, EnumReflectionDefinition, ReflectionDefinition,
    };
    pub use crate::manager::{ReflectionManager, Registrar};
    pub use crate::var::{ReflectionVar, VarFlags, VarKind};
    pub use crate::{Reflect, TypeName};
    pub use crate::{field, impl_reflect_class, impl_reflect_enum, impl_type_name, trait_cast};
    pub use shib_utils::{Hash32, Hash64, HashString32, HashString64};
}
