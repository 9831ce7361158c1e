use alloc::boxed::Box;
use alloc::sync::Arc;
use core::any::{Any, TypeId};

use shib_utils::Hash64;

use super::{Field, ReflectionVar, VarData, VarFlags, VarKind};
use crate::error::{LoadError, SaveError, VarError};
use crate::manager::ReflectionManager;
use crate::serialize::{SerializeReader, SerializeWriter};
use crate::ValueType;

// -----------------------------------------------------------------------------
// BaseCast

/// A type-erased upcast from a derived object to one of its bases.
///
/// Bases are modeled by composition: the base lives in a field of the
/// derived type, possibly several levels deep. Casting an object that
/// is not of [`derived_type`](Self::derived_type) returns `None`.
pub trait BaseCast: Send + Sync {
    /// The object type accepted by the cast.
    fn derived_type(&self) -> TypeId;

    /// The type produced by the cast.
    fn base_type(&self) -> TypeId;

    /// Borrows the base of `object`.
    fn upcast<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any>;

    /// Mutably borrows the base of `object`.
    fn upcast_mut<'a>(&self, object: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

/// The byte distance between `object` and its base, for diagnostics.
///
/// Returns `None` if the cast does not apply to `object`.
pub fn base_pointer_offset(cast: &dyn BaseCast, object: &dyn Any) -> Option<isize> {
    let base = cast.upcast(object)?;
    let base = base as *const dyn Any as *const u8 as isize;
    let object = object as *const dyn Any as *const u8 as isize;
    Some(base - object)
}

// -----------------------------------------------------------------------------
// Upcast

/// Casts `T` to the base `B` stored in one of its fields.
pub struct Upcast<T, B> {
    field: Field<T, B>,
}

impl<T, B> Upcast<T, B> {
    /// Creates a cast through `field`.
    #[inline]
    pub const fn new(field: Field<T, B>) -> Self {
        Self { field }
    }
}

impl<T: Any, B: Any> BaseCast for Upcast<T, B> {
    #[inline]
    fn derived_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    #[inline]
    fn base_type(&self) -> TypeId {
        TypeId::of::<B>()
    }

    #[inline]
    fn upcast<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any> {
        let object = object.downcast_ref::<T>()?;
        Some(self.field.get(object))
    }

    #[inline]
    fn upcast_mut<'a>(&self, object: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let object = object.downcast_mut::<T>()?;
        Some(self.field.get_mut(object))
    }
}

// -----------------------------------------------------------------------------
// ChainedCast

/// Two casts applied in sequence, derived to intermediate to base.
///
/// Produced when a definition absorbs the bases of its own bases.
pub struct ChainedCast {
    first: Arc<dyn BaseCast>,
    second: Arc<dyn BaseCast>,
}

impl ChainedCast {
    /// Chains `first` then `second`.
    ///
    /// # Panics
    ///
    /// Panics if `first` does not produce the type `second` accepts.
    pub fn new(first: Arc<dyn BaseCast>, second: Arc<dyn BaseCast>) -> Self {
        assert_eq!(
            first.base_type(),
            second.derived_type(),
            "chained casts do not line up"
        );
        Self { first, second }
    }
}

impl BaseCast for ChainedCast {
    #[inline]
    fn derived_type(&self) -> TypeId {
        self.first.derived_type()
    }

    #[inline]
    fn base_type(&self) -> TypeId {
        self.second.base_type()
    }

    #[inline]
    fn upcast<'a>(&self, object: &'a dyn Any) -> Option<&'a dyn Any> {
        self.second.upcast(self.first.upcast(object)?)
    }

    #[inline]
    fn upcast_mut<'a>(&self, object: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        self.second.upcast_mut(self.first.upcast_mut(object)?)
    }
}

// -----------------------------------------------------------------------------
// BaseVarPtr

/// A var of a base definition, seen through the derived type.
///
/// Every operation upcasts the object and forwards to the base var.
/// The flags start as a copy of the base var's.
pub struct BaseVarPtr {
    cast: Arc<dyn BaseCast>,
    inner: Arc<dyn ReflectionVar>,
    flags: VarFlags,
}

impl BaseVarPtr {
    /// Wraps `inner` behind `cast`.
    pub fn new(cast: Arc<dyn BaseCast>, inner: Arc<dyn ReflectionVar>) -> Self {
        let flags = inner.flags();
        Self { cast, inner, flags }
    }

    /// The wrapped base var.
    #[inline]
    pub fn inner(&self) -> &Arc<dyn ReflectionVar> {
        &self.inner
    }

    #[inline]
    fn base<'a>(&self, object: &'a dyn Any) -> Result<&'a dyn Any, VarError> {
        self.cast.upcast(object).ok_or(VarError::ObjectMismatch {
            expected: "a type deriving from the var's owner",
        })
    }

    #[inline]
    fn base_mut<'a>(&self, object: &'a mut dyn Any) -> Result<&'a mut dyn Any, VarError> {
        self.cast.upcast_mut(object).ok_or(VarError::ObjectMismatch {
            expected: "a type deriving from the var's owner",
        })
    }
}

impl ReflectionVar for BaseVarPtr {
    #[inline]
    fn kind(&self) -> VarKind {
        self.inner.kind()
    }

    #[inline]
    fn value_type(&self) -> ValueType {
        self.inner.value_type()
    }

    #[inline]
    fn key_type(&self) -> Option<ValueType> {
        self.inner.key_type()
    }

    #[inline]
    fn flags(&self) -> VarFlags {
        self.flags
    }

    #[inline]
    fn flags_mut(&mut self) -> &mut VarFlags {
        &mut self.flags
    }

    fn get_data<'a>(&'a self, object: &'a dyn Any) -> Result<VarData<'a>, VarError> {
        self.inner.get_data(self.base(object)?)
    }

    fn get_data_mut<'a>(&self, object: &'a mut dyn Any) -> Result<&'a mut dyn Any, VarError> {
        self.ensure_writable()?;
        self.inner.get_data_mut(self.base_mut(object)?)
    }

    fn set_data(&self, object: &mut dyn Any, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        self.inner.set_data(self.base_mut(object)?, data)
    }

    fn set_data_move(
        &self,
        object: &mut dyn Any,
        data: Box<dyn Any + Send + Sync>,
    ) -> Result<(), VarError> {
        self.ensure_writable()?;
        self.inner.set_data_move(self.base_mut(object)?, data)
    }

    fn copy_value(&self, dst: &mut dyn Any, src: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        self.inner.copy_value(self.base_mut(dst)?, self.base(src)?)
    }

    fn size(&self, object: &dyn Any) -> Result<usize, VarError> {
        self.inner.size(self.base(object)?)
    }

    fn get_element<'a>(&self, object: &'a dyn Any, index: usize) -> Result<&'a dyn Any, VarError> {
        self.inner.get_element(self.base(object)?, index)
    }

    fn get_element_mut<'a>(
        &self,
        object: &'a mut dyn Any,
        index: usize,
    ) -> Result<&'a mut dyn Any, VarError> {
        self.ensure_writable()?;
        self.inner.get_element_mut(self.base_mut(object)?, index)
    }

    fn set_element(&self, object: &mut dyn Any, index: usize, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        self.inner.set_element(self.base_mut(object)?, index, data)
    }

    fn swap(&self, object: &mut dyn Any, a: usize, b: usize) -> Result<(), VarError> {
        self.ensure_writable()?;
        self.inner.swap(self.base_mut(object)?, a, b)
    }

    fn resize(&self, object: &mut dyn Any, len: usize) -> Result<(), VarError> {
        self.ensure_writable()?;
        self.inner.resize(self.base_mut(object)?, len)
    }

    fn remove(&self, object: &mut dyn Any, index: usize) -> Result<(), VarError> {
        self.ensure_writable()?;
        self.inner.remove(self.base_mut(object)?, index)
    }

    fn get_map_entry<'a>(
        &self,
        object: &'a dyn Any,
        key: &dyn Any,
    ) -> Result<Option<&'a dyn Any>, VarError> {
        self.inner.get_map_entry(self.base(object)?, key)
    }

    fn add_map_entry(&self, object: &mut dyn Any, key: &dyn Any, value: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        self.inner.add_map_entry(self.base_mut(object)?, key, value)
    }

    fn set_flag_value(&self, object: &mut dyn Any, index: usize, value: bool) -> Result<(), VarError> {
        self.ensure_writable()?;
        self.inner.set_flag_value(self.base_mut(object)?, index, value)
    }

    fn get_flag_value(&self, object: &dyn Any, index: usize) -> Result<bool, VarError> {
        self.inner.get_flag_value(self.base(object)?, index)
    }

    fn load(
        &self,
        reader: &mut dyn SerializeReader,
        object: &mut dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        self.inner.load(reader, self.base_mut(object)?, registry)
    }

    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        object: &dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        self.inner.save(writer, self.base(object)?, registry)
    }

    fn instance_hash(
        &self,
        object: &dyn Any,
        init: Hash64,
        registry: &ReflectionManager,
    ) -> Result<Hash64, VarError> {
        self.inner.instance_hash(self.base(object)?, init, registry)
    }
}

// -----------------------------------------------------------------------------
// Tests
