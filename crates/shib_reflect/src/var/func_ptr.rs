use alloc::boxed::Box;
use core::any::Any;
use core::ops::Deref;
use std::sync::{Mutex, MutexGuard, PoisonError};

use shib_utils::Hash64;

use super::{ReflectionVar, VarData, VarFlags, VarKind};
use super::{object_mut, object_ref, value_box, value_ref};
use crate::error::{LoadError, SaveError, VarError};
use crate::manager::ReflectionManager;
use crate::serialize::{SerializeReader, SerializeWriter};
use crate::{Reflect, TypeName, ValueType};

// -----------------------------------------------------------------------------
// VarFuncPtr

/// A var accessed through a getter returning a reference and a setter.
pub struct VarFuncPtr<T, V> {
    getter: fn(&T) -> &V,
    setter: fn(&mut T, V),
    flags: VarFlags,
}

impl<T, V> VarFuncPtr<T, V> {
    /// Creates a var over a getter/setter pair.
    #[inline]
    pub const fn new(getter: fn(&T) -> &V, setter: fn(&mut T, V)) -> Self {
        Self {
            getter,
            setter,
            flags: VarFlags::empty(),
        }
    }
}

impl<T: Any, V: Reflect + Clone> ReflectionVar for VarFuncPtr<T, V> {
    #[inline]
    fn kind(&self) -> VarKind {
        VarKind::Scalar
    }

    #[inline]
    fn value_type(&self) -> ValueType {
        ValueType::of::<V>()
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
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(VarData::Ref((self.getter)(object)))
    }

    fn set_data(&self, object: &mut dyn Any, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_ref::<V>(data, V::TYPE_NAME)?.clone();
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        (self.setter)(object, data);
        Ok(())
    }

    fn set_data_move(
        &self,
        object: &mut dyn Any,
        data: Box<dyn Any + Send + Sync>,
    ) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_box::<V>(data, V::TYPE_NAME)?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        (self.setter)(object, data);
        Ok(())
    }

    fn load(
        &self,
        reader: &mut dyn SerializeReader,
        object: &mut dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        let mut value = (self.getter)(object).clone();
        value.load(reader, registry)?;
        (self.setter)(object, value);
        Ok(())
    }

    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        object: &dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        (self.getter)(object).save(writer, registry)
    }

    fn instance_hash(
        &self,
        object: &dyn Any,
        init: Hash64,
        registry: &ReflectionManager,
    ) -> Result<Hash64, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok((self.getter)(object).instance_hash(init, registry))
    }
}

// -----------------------------------------------------------------------------
// VarFuncPtrWithCache

struct CacheGuard<'a, V>(MutexGuard<'a, Option<V>>);

impl<V: Any> Deref for CacheGuard<'_, V> {
    type Target = dyn Any;

    fn deref(&self) -> &Self::Target {
        match &*self.0 {
            Some(value) => value,
            None => &(),
        }
    }
}

/// A var accessed through a getter returning by value and a setter.
///
/// The getter's result is stored in a cache owned by the var, so
/// [`get_data`](ReflectionVar::get_data) can hand out a stable
/// reference. The cache is refreshed on every `get_data` and after every
/// write. The returned [`VarData`] holds the cache lock: drop it before
/// calling `get_data` again on the same var.
///
/// # Examples
///
/// ```
/// use shib_reflect::var::{ReflectionVar, VarFuncPtrWithCache};
///
/// struct Transform { matrix: [f32; 2] }
///
/// impl Transform {
///     fn translation(&self) -> f32 { self.matrix[1] }
///     fn set_translation(&mut self, value: f32) { self.matrix[1] = value; }
/// }
///
/// let var = VarFuncPtrWithCache::new(Transform::translation, Transform::set_translation);
/// let mut transform = Transform { matrix: [1.0, 2.0] };
///
/// assert_eq!(var.get_data(&transform).unwrap().downcast_ref::<f32>(), Some(&2.0));
/// var.set_data(&mut transform, &5.0_f32).unwrap();
/// assert_eq!(transform.matrix[1], 5.0);
/// ```
pub struct VarFuncPtrWithCache<T, V> {
    getter: fn(&T) -> V,
    setter: fn(&mut T, V),
    cache: Mutex<Option<V>>,
    flags: VarFlags,
}

impl<T, V> VarFuncPtrWithCache<T, V> {
    /// Creates a var over a getter/setter pair.
    #[inline]
    pub const fn new(getter: fn(&T) -> V, setter: fn(&mut T, V)) -> Self {
        Self {
            getter,
            setter,
            cache: Mutex::new(None),
            flags: VarFlags::empty(),
        }
    }

    fn refresh(&self, object: &T) -> MutexGuard<'_, Option<V>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        *cache = Some((self.getter)(object));
        cache
    }
}

impl<T: Any, V: Reflect + Clone> ReflectionVar for VarFuncPtrWithCache<T, V> {
    #[inline]
    fn kind(&self) -> VarKind {
        VarKind::Scalar
    }

    #[inline]
    fn value_type(&self) -> ValueType {
        ValueType::of::<V>()
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
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(VarData::Guarded(Box::new(CacheGuard(self.refresh(object)))))
    }

    fn set_data(&self, object: &mut dyn Any, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_ref::<V>(data, V::TYPE_NAME)?.clone();
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        (self.setter)(object, data);
        drop(self.refresh(object));
        Ok(())
    }

    fn set_data_move(
        &self,
        object: &mut dyn Any,
        data: Box<dyn Any + Send + Sync>,
    ) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_box::<V>(data, V::TYPE_NAME)?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        (self.setter)(object, data);
        drop(self.refresh(object));
        Ok(())
    }

    fn copy_value(&self, dst: &mut dyn Any, src: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let value = (self.getter)(object_ref::<T>(src, core::any::type_name::<T>())?);
        let dst = object_mut::<T>(dst, core::any::type_name::<T>())?;
        (self.setter)(dst, value);
        drop(self.refresh(dst));
        Ok(())
    }

    fn load(
        &self,
        reader: &mut dyn SerializeReader,
        object: &mut dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        let mut value = (self.getter)(object);
        value.load(reader, registry)?;
        (self.setter)(object, value);
        drop(self.refresh(object));
        Ok(())
    }

    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        object: &dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        (self.getter)(object).save(writer, registry)
    }

    fn instance_hash(
        &self,
        object: &dyn Any,
        init: Hash64,
        registry: &ReflectionManager,
    ) -> Result<Hash64, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok((self.getter)(object).instance_hash(init, registry))
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{VarFuncPtr, VarFuncPtrWithCache};
    use crate::manager::ReflectionManager;
    use crate::serialize::{JsonReader, JsonWriter};
    use crate::var::ReflectionVar;

    #[derive(Default)]
    struct Counter {
        value: i32,
        writes: u32,
    }

    impl Counter {
        fn value(&self) -> &i32 {
            &self.value
        }

        fn value_copy(&self) -> i32 {
            self.value
        }

        fn set_value(&mut self, value: i32) {
            self.value = value;
            self.writes += 1;
        }
    }

    #[test]
    fn setter_runs_on_write_and_load() {
        let var = VarFuncPtr::new(Counter::value, Counter::set_value);
        let registry = ReflectionManager::new();
        let mut counter = Counter::default();

        var.set_data(&mut counter, &3_i32).unwrap();
        var.load(&mut JsonReader::new(&json!(9)), &mut counter, &registry)
            .unwrap();
        assert_eq!(counter.value, 9);
        assert_eq!(counter.writes, 2);

        let mut writer = JsonWriter::new();
        var.save(&mut writer, &counter, &registry).unwrap();
        assert_eq!(writer.finish(), json!(9));
    }

    #[test]
    fn cache_tracks_the_object() {
        let var = VarFuncPtrWithCache::new(Counter::value_copy, Counter::set_value);
        let mut counter = Counter::default();

        {
            let data = var.get_data(&counter).unwrap();
            assert_eq!(data.downcast_ref::<i32>(), Some(&0));
        }

        counter.value = 4;
        {
            let data = var.get_data(&counter).unwrap();
            assert_eq!(data.downcast_ref::<i32>(), Some(&4));
        }

        var.set_data(&mut counter, &8_i32).unwrap();
        assert_eq!(counter.value, 8);
        assert_eq!(var.get_data(&counter).unwrap().downcast_ref::<i32>(), Some(&8));
    }

    #[test]
    fn cached_copy_releases_the_cache() {
        let var = VarFuncPtrWithCache::new(Counter::value_copy, Counter::set_value);
        let src = Counter { value: 6, writes: 0 };
        let mut dst = Counter::default();

        var.copy_value(&mut dst, &src).unwrap();
        assert_eq!(dst.value, 6);
        assert_eq!(dst.writes, 1);
        assert_eq!(var.get_data(&dst).unwrap().downcast_ref::<i32>(), Some(&6));
    }
}
