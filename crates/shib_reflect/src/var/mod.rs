//! Type-erased field accessors.
//!
//! A [`ReflectionVar`] reads and writes one field of an object that it
//! only sees as `&dyn Any`. Each var kind implements the subset of the
//! protocol that makes sense for it, and every other operation
//! returns [`VarError::Unsupported`].
//!
//! | var                    | field                          |
//! |------------------------|--------------------------------|
//! | [`VarPtr`]             | a plain member                 |
//! | [`VarFuncPtr`]         | getter returning `&V` + setter |
//! | [`VarFuncPtrWithCache`]| getter returning `V` + setter  |
//! | [`VectorPtr`]          | `Vec<V>`                       |
//! | [`ArrayPtr`]           | `[V; N]`                       |
//! | [`MapPtr`]             | `BTreeMap<K, V>`               |
//! | [`VarFlagsPtr`]        | a whole `bitflags` value       |
//! | [`VarFlagPtr`]         | one flag of a `bitflags` value |
//! | [`BaseVarPtr`]         | a var inherited from a base    |

// -----------------------------------------------------------------------------
// Modules

mod base_ptr;
mod container;
mod flags;
mod func_ptr;
mod var_ptr;

// -----------------------------------------------------------------------------
// Exports

pub use base_ptr::{BaseCast, BaseVarPtr, ChainedCast, Upcast, base_pointer_offset};
pub use container::{ArrayPtr, MapKey, MapPtr, VectorPtr};
pub use flags::{VarFlagPtr, VarFlagsPtr};
pub use func_ptr::{VarFuncPtr, VarFuncPtrWithCache};
pub use var_ptr::VarPtr;

use alloc::boxed::Box;
use core::any::Any;
use core::ops::Deref;

use shib_utils::Hash64;

use crate::ValueType;
use crate::error::{LoadError, SaveError, VarError};
use crate::manager::ReflectionManager;
use crate::serialize::{SerializeReader, SerializeWriter};

// -----------------------------------------------------------------------------
// VarKind / VarFlags

/// The capability set of a var.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// A single value.
    Scalar,
    /// A fixed-size array.
    FixedArray,
    /// A growable vector.
    Vector,
    /// A sorted map.
    Map,
    /// A set of flags.
    Flags,
}

bitflags::bitflags! {
    /// Behavior flags of a var, usually set by attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VarFlags: u8 {
        /// Skipped by load and save.
        const NO_SERIALIZE = 1 << 0;
        /// Rejects every write made through the var.
        const READ_ONLY = 1 << 1;
        /// May be absent from serialized input.
        const OPTIONAL = 1 << 2;
        /// Skipped when copying objects through reflection.
        const NO_COPY = 1 << 3;
    }
}

// -----------------------------------------------------------------------------
// VarData

/// Data borrowed from a var by [`ReflectionVar::get_data`].
///
/// Dereferences to the field value as `dyn Any`.
pub enum VarData<'a> {
    /// The field itself.
    Ref(&'a dyn Any),
    /// A value computed by a getter.
    Owned(Box<dyn Any + Send + Sync>),
    /// A guarded snapshot held by the var.
    Guarded(Box<dyn Deref<Target = dyn Any> + 'a>),
}

impl VarData<'_> {
    /// Returns the data as `V`.
    #[inline]
    pub fn downcast_ref<V: Any>(&self) -> Option<&V> {
        (**self).downcast_ref::<V>()
    }
}

impl Deref for VarData<'_> {
    type Target = dyn Any;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Ref(data) => *data,
            Self::Owned(data) => &**data,
            Self::Guarded(data) => &***data,
        }
    }
}

// -----------------------------------------------------------------------------
// Field

/// Accessors for one member of `T`, the stand-in for a pointer-to-member.
///
/// Built with [`field!`](crate::field).
pub struct Field<T, V> {
    get: fn(&T) -> &V,
    get_mut: fn(&mut T) -> &mut V,
}

impl<T, V> Field<T, V> {
    /// Creates a field from its accessors.
    #[inline]
    pub const fn new(get: fn(&T) -> &V, get_mut: fn(&mut T) -> &mut V) -> Self {
        Self { get, get_mut }
    }

    /// Borrows the field of `object`.
    #[inline(always)]
    pub fn get<'a>(&self, object: &'a T) -> &'a V {
        (self.get)(object)
    }

    /// Mutably borrows the field of `object`.
    #[inline(always)]
    pub fn get_mut<'a>(&self, object: &'a mut T) -> &'a mut V {
        (self.get_mut)(object)
    }
}

impl<T, V> Clone for Field<T, V> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Field<T, V> {}

/// Builds a [`Field`] accessing `object.path`.
///
/// # Examples
///
/// ```
/// use shib_reflect::field;
///
/// struct Inner { value: u32 }
/// struct Outer { inner: Inner }
///
/// let field = field!(Outer, inner.value);
/// let mut outer = Outer { inner: Inner { value: 1 } };
/// *field.get_mut(&mut outer) = 2;
/// assert_eq!(*field.get(&outer), 2);
/// ```
#[macro_export]
macro_rules! field {
    ($ty:ty, $($path:tt)+) => {
        $crate::var::Field::<$ty, _>::new(
            |object| &object.$($path)+,
            |object| &mut object.$($path)+,
        )
    };
}

// -----------------------------------------------------------------------------
// ReflectionVar

/// A type-erased accessor for one field.
///
/// Objects are passed as `&dyn Any` and checked against the owning
/// type on every call. A var never owns the object, so data borrowed
/// from it lives exactly as long as the object borrow.
///
/// Writes made through this interface honor [`VarFlags::READ_ONLY`];
/// [`load`](Self::load) does not, it is data initialization.
pub trait ReflectionVar: Send + Sync {
    /// The capability set of this var.
    fn kind(&self) -> VarKind;

    /// The value type, or element type for containers.
    fn value_type(&self) -> ValueType;

    /// The key type of map vars.
    fn key_type(&self) -> Option<ValueType> {
        None
    }

    /// The behavior flags.
    fn flags(&self) -> VarFlags;

    /// Mutable flags, used by attributes at registration time.
    fn flags_mut(&mut self) -> &mut VarFlags;

    /// Returns an error if the var is read-only.
    #[inline]
    fn ensure_writable(&self) -> Result<(), VarError> {
        if self.flags().contains(VarFlags::READ_ONLY) {
            Err(VarError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Returns the field of `object`.
    ///
    /// For containers this is the whole container.
    fn get_data<'a>(&'a self, object: &'a dyn Any) -> Result<VarData<'a>, VarError>;

    /// Returns the field of `object` mutably.
    ///
    /// Only vars backed by a real member support this.
    fn get_data_mut<'a>(&self, object: &'a mut dyn Any) -> Result<&'a mut dyn Any, VarError> {
        let _ = object;
        Err(self.unsupported("get_data_mut"))
    }

    /// Overwrites the field of `object` with a clone of `data`.
    fn set_data(&self, object: &mut dyn Any, data: &dyn Any) -> Result<(), VarError>;

    /// Moves `data` into the field of `object`.
    fn set_data_move(
        &self,
        object: &mut dyn Any,
        data: Box<dyn Any + Send + Sync>,
    ) -> Result<(), VarError>;

    /// Copies the field of `src` into the field of `dst`.
    ///
    /// Vars whose [`VarData`] holds a lock override this so the read
    /// is released before the write.
    fn copy_value(&self, dst: &mut dyn Any, src: &dyn Any) -> Result<(), VarError> {
        let data = self.get_data(src)?;
        self.set_data(dst, &*data)
    }

    /// Number of elements of a container.
    fn size(&self, object: &dyn Any) -> Result<usize, VarError> {
        let _ = object;
        Err(self.unsupported("size"))
    }

    /// Borrows the element at `index`.
    fn get_element<'a>(&self, object: &'a dyn Any, index: usize) -> Result<&'a dyn Any, VarError> {
        let _ = (object, index);
        Err(self.unsupported("get_element"))
    }

    /// Mutably borrows the element at `index`.
    fn get_element_mut<'a>(
        &self,
        object: &'a mut dyn Any,
        index: usize,
    ) -> Result<&'a mut dyn Any, VarError> {
        let _ = (object, index);
        Err(self.unsupported("get_element_mut"))
    }

    /// Overwrites the element at `index` with a clone of `data`.
    fn set_element(&self, object: &mut dyn Any, index: usize, data: &dyn Any) -> Result<(), VarError> {
        let _ = (object, index, data);
        Err(self.unsupported("set_element"))
    }

    /// Swaps two elements.
    fn swap(&self, object: &mut dyn Any, a: usize, b: usize) -> Result<(), VarError> {
        let _ = (object, a, b);
        Err(self.unsupported("swap"))
    }

    /// Resizes a vector, new elements are defaulted.
    fn resize(&self, object: &mut dyn Any, len: usize) -> Result<(), VarError> {
        let _ = (object, len);
        Err(self.unsupported("resize"))
    }

    /// Removes the element at `index` of a vector or map.
    fn remove(&self, object: &mut dyn Any, index: usize) -> Result<(), VarError> {
        let _ = (object, index);
        Err(self.unsupported("remove"))
    }

    /// Borrows the map value stored under `key`.
    fn get_map_entry<'a>(
        &self,
        object: &'a dyn Any,
        key: &dyn Any,
    ) -> Result<Option<&'a dyn Any>, VarError> {
        let _ = (object, key);
        Err(self.unsupported("get_map_entry"))
    }

    /// Inserts or replaces a map entry.
    fn add_map_entry(&self, object: &mut dyn Any, key: &dyn Any, value: &dyn Any) -> Result<(), VarError> {
        let _ = (object, key, value);
        Err(self.unsupported("add_map_entry"))
    }

    /// Sets or clears the flag at `index` of the flags type's declared flags.
    fn set_flag_value(&self, object: &mut dyn Any, index: usize, value: bool) -> Result<(), VarError> {
        let _ = (object, index, value);
        Err(self.unsupported("set_flag_value"))
    }

    /// Tests the flag at `index` of the flags type's declared flags.
    fn get_flag_value(&self, object: &dyn Any, index: usize) -> Result<bool, VarError> {
        let _ = (object, index);
        Err(self.unsupported("get_flag_value"))
    }

    /// Loads the field of `object` from the reader's cursor.
    fn load(
        &self,
        reader: &mut dyn SerializeReader,
        object: &mut dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), LoadError>;

    /// Saves the field of `object` at the writer's position.
    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        object: &dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), SaveError>;

    /// Folds the field's content into `init`.
    fn instance_hash(
        &self,
        object: &dyn Any,
        init: Hash64,
        registry: &ReflectionManager,
    ) -> Result<Hash64, VarError>;

    #[doc(hidden)]
    #[inline]
    fn unsupported(&self, op: &'static str) -> VarError {
        VarError::Unsupported {
            op,
            kind: self.kind(),
        }
    }
}

// -----------------------------------------------------------------------------
// Helpers

#[inline]
pub(crate) fn object_ref<'a, T: Any>(
    object: &'a dyn Any,
    expected: &'static str,
) -> Result<&'a T, VarError> {
    object
        .downcast_ref::<T>()
        .ok_or(VarError::ObjectMismatch { expected })
}

#[inline]
pub(crate) fn object_mut<'a, T: Any>(
    object: &'a mut dyn Any,
    expected: &'static str,
) -> Result<&'a mut T, VarError> {
    object
        .downcast_mut::<T>()
        .ok_or(VarError::ObjectMismatch { expected })
}

#[inline]
pub(crate) fn value_ref<'a, V: Any>(
    data: &'a dyn Any,
    expected: &'static str,
) -> Result<&'a V, VarError> {
    data.downcast_ref::<V>()
        .ok_or(VarError::ValueMismatch { expected })
}

#[inline]
pub(crate) fn value_box<V: Any>(
    data: Box<dyn Any + Send + Sync>,
    expected: &'static str,
) -> Result<V, VarError> {
    data.downcast::<V>()
        .map(|value| *value)
        .map_err(|_| VarError::ValueMismatch { expected })
}

#[inline]
pub(crate) fn check_index(index: usize, len: usize) -> Result<(), VarError> {
    if index < len {
        Ok(())
    } else {
        Err(VarError::IndexOutOfRange { index, len })
    }
}
