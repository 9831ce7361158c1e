use core::any::{Any, TypeId};
use core::fmt;

use shib_utils::Hash64;

use crate::TypeName;
use crate::error::{LoadError, SaveError};
use crate::manager::ReflectionManager;
use crate::serialize::{SerializeReader, SerializeWriter};

// -----------------------------------------------------------------------------
// Reflect

/// A value that can be stored in a reflected field.
///
/// Scalars, strings and hashes implement it directly. Reflected
/// classes implement it with [`impl_reflect_class!`](crate::impl_reflect_class)
/// and reflected enums with [`impl_reflect_enum!`](crate::impl_reflect_enum),
/// both of which forward to the definitions registered in the
/// [`ReflectionManager`] passed in.
///
/// A null node leaves scalar values untouched on load.
pub trait Reflect: TypeName + Any + Send + Sync {
    /// Overwrites `self` with the value under the reader's cursor.
    fn load(
        &mut self,
        reader: &mut dyn SerializeReader,
        registry: &ReflectionManager,
    ) -> Result<(), LoadError>;

    /// Writes `self` at the writer's current position.
    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        registry: &ReflectionManager,
    ) -> Result<(), SaveError>;

    /// Folds the value's content into `init`.
    fn instance_hash(&self, init: Hash64, registry: &ReflectionManager) -> Hash64;
}

// -----------------------------------------------------------------------------
// ValueType

/// Describes the data type behind a var.
///
/// # Examples
///
/// ```
/// use shib_reflect::ValueType;
///
/// let ty = ValueType::of::<i32>();
/// assert!(ty.is::<i32>());
/// assert_eq!(ty.name(), "int32_t");
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ValueType {
    name: &'static str,
    hash: Hash64,
    type_id: TypeId,
}

impl ValueType {
    /// The value type of a [`TypeName`] type.
    #[inline]
    pub fn of<T: TypeName>() -> Self {
        Self {
            name: T::TYPE_NAME,
            hash: T::TYPE_HASH,
            type_id: TypeId::of::<T>(),
        }
    }

    /// The value type of a type without a registered name.
    ///
    /// The name comes from [`core::any::type_name`], which is only
    /// meaningful for diagnostics.
    #[inline]
    pub fn of_unnamed<T: Any>() -> Self {
        let name = core::any::type_name::<T>();
        Self {
            name,
            hash: Hash64::of_str(name),
            type_id: TypeId::of::<T>(),
        }
    }

    /// The type's name.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The type's name hash.
    #[inline]
    pub const fn hash(&self) -> Hash64 {
        self.hash
    }

    /// The type's [`TypeId`].
    #[inline]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns `true` if this describes `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Returns `true` for built-in integer and float types.
    pub fn is_numeric(&self) -> bool {
        macro_rules! any_of {
            ($($ty:ty),*) => { false $(|| self.is::<$ty>())* };
        }
        any_of!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64)
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// -----------------------------------------------------------------------------
// Macro support

/// Loads a reflected class through its registered definition.
pub fn load_class<T: TypeName>(
    value: &mut T,
    reader: &mut dyn SerializeReader,
    registry: &ReflectionManager,
) -> Result<(), LoadError> {
    if let Some(definition) = registry.get_reflection(T::TYPE_HASH) {
        return definition.load(reader, value, registry);
    }
    match registry.get_pending(T::TYPE_HASH) {
        Some(pending) => Err(LoadError::NotDefined {
            type_name: pending.name().to_string(),
        }),
        None => Err(LoadError::UnknownType {
            type_name: T::TYPE_NAME,
        }),
    }
}

/// Saves a reflected class through its registered definition.
pub fn save_class<T: TypeName>(
    value: &T,
    writer: &mut dyn SerializeWriter,
    registry: &ReflectionManager,
) -> Result<(), SaveError> {
    if let Some(definition) = registry.get_reflection(T::TYPE_HASH) {
        return definition.save(writer, value, registry);
    }
    match registry.get_pending(T::TYPE_HASH) {
        Some(pending) => Err(SaveError::NotDefined {
            type_name: pending.name().to_string(),
        }),
        None => Err(SaveError::UnknownType {
            type_name: T::TYPE_NAME,
        }),
    }
}

/// Hashes a reflected class, unknown types leave `init` unchanged.
pub fn class_instance_hash<T: TypeName>(
    value: &T,
    init: Hash64,
    registry: &ReflectionManager,
) -> Hash64 {
    registry
        .get_reflection(T::TYPE_HASH)
        .and_then(|definition| definition.instance_hash(value, init, registry).ok())
        .unwrap_or(init)
}

/// Loads a reflected enum by entry name.
pub fn load_enum<E: TypeName>(
    value: &mut E,
    reader: &mut dyn SerializeReader,
    registry: &ReflectionManager,
) -> Result<(), LoadError> {
    match registry.get_enum_reflection(E::TYPE_HASH) {
        Some(definition) => definition.load_any(reader, value),
        None => Err(LoadError::UnknownType {
            type_name: E::TYPE_NAME,
        }),
    }
}

/// Saves a reflected enum by entry name.
pub fn save_enum<E: TypeName>(
    value: &E,
    writer: &mut dyn SerializeWriter,
    registry: &ReflectionManager,
) -> Result<(), SaveError> {
    match registry.get_enum_reflection(E::TYPE_HASH) {
        Some(definition) => definition.save_any(writer, value),
        None => Err(SaveError::UnknownType {
            type_name: E::TYPE_NAME,
        }),
    }
}

/// Hashes a reflected enum through its entry name.
pub fn enum_instance_hash<E: TypeName>(
    value: &E,
    init: Hash64,
    registry: &ReflectionManager,
) -> Hash64 {
    registry
        .get_enum_reflection(E::TYPE_HASH)
        .and_then(|definition| definition.entry_name_of(value))
        .map_or(init, |name| init.chain(name.as_bytes()))
}

/// Implements [`Reflect`] for a type with a registered class definition.
///
/// # Examples
///
/// ```
/// use shib_reflect::{impl_reflect_class, impl_type_name};
///
/// #[derive(Default, Clone)]
/// struct Color { r: f32, g: f32, b: f32 }
///
/// impl_type_name!(Color = "Color");
/// impl_reflect_class!(Color);
/// ```
#[macro_export]
macro_rules! impl_reflect_class {
    ($ty:ty) => {
        impl $crate::Reflect for $ty {
            fn load(
                &mut self,
                reader: &mut dyn $crate::serialize::SerializeReader,
                registry: &$crate::ReflectionManager,
            ) -> ::core::result::Result<(), $crate::LoadError> {
                $crate::__macro_exports::load_class(self, reader, registry)
            }

            fn save(
                &self,
                writer: &mut dyn $crate::serialize::SerializeWriter,
                registry: &$crate::ReflectionManager,
            ) -> ::core::result::Result<(), $crate::SaveError> {
                $crate::__macro_exports::save_class(self, writer, registry)
            }

            fn instance_hash(
                &self,
                init: $crate::__macro_exports::Hash64,
                registry: &$crate::ReflectionManager,
            ) -> $crate::__macro_exports::Hash64 {
                $crate::__macro_exports::class_instance_hash(self, init, registry)
            }
        }
    };
}

/// Implements [`Reflect`] for an enum with a registered enum definition.
#[macro_export]
macro_rules! impl_reflect_enum {
    ($ty:ty) => {
        impl $crate::Reflect for $ty {
            fn load(
                &mut self,
                reader: &mut dyn $crate::serialize::SerializeReader,
                registry: &$crate::ReflectionManager,
            ) -> ::core::result::Result<(), $crate::LoadError> {
                $crate::__macro_exports::load_enum(self, reader, registry)
            }

            fn save(
                &self,
                writer: &mut dyn $crate::serialize::SerializeWriter,
                registry: &$crate::ReflectionManager,
            ) -> ::core::result::Result<(), $crate::SaveError> {
                $crate::__macro_exports::save_enum(self, writer, registry)
            }

            fn instance_hash(
                &self,
                init: $crate::__macro_exports::Hash64,
                registry: &$crate::ReflectionManager,
            ) -> $crate::__macro_exports::Hash64 {
                $crate::__macro_exports::enum_instance_hash(self, init, registry)
            }
        }
    };
}
