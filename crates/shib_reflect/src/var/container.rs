use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::any::Any;

use shib_utils::{Hash32, Hash64, HashString32, HashString64};

use super::{Field, ReflectionVar, VarData, VarFlags, VarKind};
use super::{check_index, object_mut, object_ref, value_box, value_ref};
use crate::error::{LoadError, SaveError, VarError};
use crate::manager::ReflectionManager;
use crate::serialize::{SerializeReader, SerializeWriter};
use crate::{Reflect, ValueType};

// -----------------------------------------------------------------------------
// Shared element protocol

fn load_elements<V: Reflect>(
    elements: &mut [V],
    reader: &mut dyn SerializeReader,
    registry: &ReflectionManager,
) -> Result<(), LoadError> {
    for (index, element) in elements.iter_mut().enumerate() {
        if !reader.enter_index(index) {
            return Err(LoadError::ArrayLength {
                expected: index + 1,
                found: reader.size(),
            });
        }
        let result = element.load(reader, registry);
        reader.exit_element();
        result.map_err(|err| err.in_element(index))?;
    }
    Ok(())
}

fn save_elements<V: Reflect>(
    elements: &[V],
    writer: &mut dyn SerializeWriter,
    registry: &ReflectionManager,
) -> Result<(), SaveError> {
    writer.start_array(elements.len());
    for element in elements {
        element.save(writer, registry)?;
    }
    writer.end_array();
    Ok(())
}

fn hash_elements<V: Reflect>(elements: &[V], init: Hash64, registry: &ReflectionManager) -> Hash64 {
    elements
        .iter()
        .fold(init, |hash, element| element.instance_hash(hash, registry))
}

fn set_element_in<V: Reflect + Clone>(
    elements: &mut [V],
    index: usize,
    data: &dyn Any,
) -> Result<(), VarError> {
    let data = value_ref::<V>(data, V::TYPE_NAME)?;
    check_index(index, elements.len())?;
    elements[index].clone_from(data);
    Ok(())
}

fn swap_in<V>(elements: &mut [V], a: usize, b: usize) -> Result<(), VarError> {
    check_index(a, elements.len())?;
    check_index(b, elements.len())?;
    elements.swap(a, b);
    Ok(())
}

macro_rules! impl_var_common {
    ($kind:expr) => {
        #[inline]
        fn kind(&self) -> VarKind {
            $kind
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
    };
}

// -----------------------------------------------------------------------------
// VectorPtr

/// A var backed by a `Vec<V>` member.
///
/// Saved as an array. Loading resizes the vector to the input length.
pub struct VectorPtr<T, V> {
    field: Field<T, Vec<V>>,
    flags: VarFlags,
}

impl<T, V> VectorPtr<T, V> {
    /// Creates a var over `field`.
    #[inline]
    pub const fn new(field: Field<T, Vec<V>>) -> Self {
        Self {
            field,
            flags: VarFlags::empty(),
        }
    }
}

impl<T: Any, V: Reflect + Clone + Default> ReflectionVar for VectorPtr<T, V> {
    impl_var_common!(VarKind::Vector);

    fn get_data<'a>(&'a self, object: &'a dyn Any) -> Result<VarData<'a>, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(VarData::Ref(self.field.get(object)))
    }

    fn get_data_mut<'a>(&self, object: &'a mut dyn Any) -> Result<&'a mut dyn Any, VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        Ok(self.field.get_mut(object))
    }

    fn set_data(&self, object: &mut dyn Any, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_ref::<Vec<V>>(data, core::any::type_name::<Vec<V>>())?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        self.field.get_mut(object).clone_from(data);
        Ok(())
    }

    fn set_data_move(
        &self,
        object: &mut dyn Any,
        data: Box<dyn Any + Send + Sync>,
    ) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_box::<Vec<V>>(data, core::any::type_name::<Vec<V>>())?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        *self.field.get_mut(object) = data;
        Ok(())
    }

    fn size(&self, object: &dyn Any) -> Result<usize, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(self.field.get(object).len())
    }

    fn get_element<'a>(&self, object: &'a dyn Any, index: usize) -> Result<&'a dyn Any, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        let vec = self.field.get(object);
        check_index(index, vec.len())?;
        Ok(&vec[index])
    }

    fn get_element_mut<'a>(
        &self,
        object: &'a mut dyn Any,
        index: usize,
    ) -> Result<&'a mut dyn Any, VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        let vec = self.field.get_mut(object);
        check_index(index, vec.len())?;
        Ok(&mut vec[index])
    }

    fn set_element(&self, object: &mut dyn Any, index: usize, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        set_element_in(self.field.get_mut(object), index, data)
    }

    fn swap(&self, object: &mut dyn Any, a: usize, b: usize) -> Result<(), VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        swap_in(self.field.get_mut(object), a, b)
    }

    fn resize(&self, object: &mut dyn Any, len: usize) -> Result<(), VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        self.field.get_mut(object).resize_with(len, V::default);
        Ok(())
    }

    fn remove(&self, object: &mut dyn Any, index: usize) -> Result<(), VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        let vec = self.field.get_mut(object);
        check_index(index, vec.len())?;
        vec.remove(index);
        Ok(())
    }

    fn load(
        &self,
        reader: &mut dyn SerializeReader,
        object: &mut dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        if !reader.is_array() {
            return Err(LoadError::TypeMismatch { expected: "an array" });
        }
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        let vec = self.field.get_mut(object);
        vec.resize_with(reader.size(), V::default);
        load_elements(vec, reader, registry)
    }

    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        object: &dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        save_elements(self.field.get(object), writer, registry)
    }

    fn instance_hash(
        &self,
        object: &dyn Any,
        init: Hash64,
        registry: &ReflectionManager,
    ) -> Result<Hash64, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(hash_elements(self.field.get(object), init, registry))
    }
}

// -----------------------------------------------------------------------------
// ArrayPtr

/// A var backed by a `[V; N]` member.
///
/// Fixed arrays cannot be resized, and loading requires exactly `N`
/// elements.
pub struct ArrayPtr<T, V, const N: usize> {
    field: Field<T, [V; N]>,
    flags: VarFlags,
}

impl<T, V, const N: usize> ArrayPtr<T, V, N> {
    /// Creates a var over `field`.
    #[inline]
    pub const fn new(field: Field<T, [V; N]>) -> Self {
        Self {
            field,
            flags: VarFlags::empty(),
        }
    }
}

impl<T: Any, V: Reflect + Clone, const N: usize> ReflectionVar for ArrayPtr<T, V, N> {
    impl_var_common!(VarKind::FixedArray);

    fn get_data<'a>(&'a self, object: &'a dyn Any) -> Result<VarData<'a>, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(VarData::Ref(self.field.get(object)))
    }

    fn get_data_mut<'a>(&self, object: &'a mut dyn Any) -> Result<&'a mut dyn Any, VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        Ok(self.field.get_mut(object))
    }

    fn set_data(&self, object: &mut dyn Any, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_ref::<[V; N]>(data, core::any::type_name::<[V; N]>())?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        self.field.get_mut(object).clone_from(data);
        Ok(())
    }

    fn set_data_move(
        &self,
        object: &mut dyn Any,
        data: Box<dyn Any + Send + Sync>,
    ) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_box::<[V; N]>(data, core::any::type_name::<[V; N]>())?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        *self.field.get_mut(object) = data;
        Ok(())
    }

    fn size(&self, object: &dyn Any) -> Result<usize, VarError> {
        object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(N)
    }

    fn get_element<'a>(&self, object: &'a dyn Any, index: usize) -> Result<&'a dyn Any, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        check_index(index, N)?;
        Ok(&self.field.get(object)[index])
    }

    fn get_element_mut<'a>(
        &self,
        object: &'a mut dyn Any,
        index: usize,
    ) -> Result<&'a mut dyn Any, VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        check_index(index, N)?;
        Ok(&mut self.field.get_mut(object)[index])
    }

    fn set_element(&self, object: &mut dyn Any, index: usize, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        set_element_in(self.field.get_mut(object), index, data)
    }

    fn swap(&self, object: &mut dyn Any, a: usize, b: usize) -> Result<(), VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        swap_in(self.field.get_mut(object), a, b)
    }

    fn load(
        &self,
        reader: &mut dyn SerializeReader,
        object: &mut dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        if !reader.is_array() {
            return Err(LoadError::TypeMismatch { expected: "an array" });
        }
        if reader.size() != N {
            return Err(LoadError::ArrayLength {
                expected: N,
                found: reader.size(),
            });
        }
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        load_elements(self.field.get_mut(object), reader, registry)
    }

    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        object: &dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        save_elements(self.field.get(object), writer, registry)
    }

    fn instance_hash(
        &self,
        object: &dyn Any,
        init: Hash64,
        registry: &ReflectionManager,
    ) -> Result<Hash64, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(hash_elements(self.field.get(object), init, registry))
    }
}

// -----------------------------------------------------------------------------
// MapKey

/// A map key that can be written as an object key.
pub trait MapKey: Reflect + Ord + Clone {
    /// Formats the key.
    fn to_key(&self) -> String;

    /// Parses a key, `None` if malformed.
    fn from_key(key: &str) -> Option<Self>;
}

impl MapKey for String {
    #[inline]
    fn to_key(&self) -> String {
        self.clone()
    }

    #[inline]
    fn from_key(key: &str) -> Option<Self> {
        Some(String::from(key))
    }
}

impl MapKey for HashString32 {
    #[inline]
    fn to_key(&self) -> String {
        String::from(self.as_str())
    }

    #[inline]
    fn from_key(key: &str) -> Option<Self> {
        Some(HashString32::new(String::from(key)))
    }
}

impl MapKey for HashString64 {
    #[inline]
    fn to_key(&self) -> String {
        String::from(self.as_str())
    }

    #[inline]
    fn from_key(key: &str) -> Option<Self> {
        Some(HashString64::new(String::from(key)))
    }
}

macro_rules! impl_map_key_parse {
    ($($ty:ty),*) => {$(
        impl MapKey for $ty {
            #[inline]
            fn to_key(&self) -> String {
                self.to_string()
            }

            #[inline]
            fn from_key(key: &str) -> Option<Self> {
                key.parse().ok()
            }
        }
    )*};
}

impl_map_key_parse!(i8, i16, i32, i64, u8, u16, u32, u64, bool);

impl MapKey for Hash32 {
    #[inline]
    fn to_key(&self) -> String {
        self.get().to_string()
    }

    #[inline]
    fn from_key(key: &str) -> Option<Self> {
        key.parse().ok().map(Hash32::new)
    }
}

impl MapKey for Hash64 {
    #[inline]
    fn to_key(&self) -> String {
        self.get().to_string()
    }

    #[inline]
    fn from_key(key: &str) -> Option<Self> {
        key.parse().ok().map(Hash64::new)
    }
}

// -----------------------------------------------------------------------------
// MapPtr

/// A var backed by a `BTreeMap<K, V>` member.
///
/// Elements are addressed by position in key order. Saved as an object
/// keyed by [`MapKey::to_key`].
pub struct MapPtr<T, K, V> {
    field: Field<T, BTreeMap<K, V>>,
    flags: VarFlags,
}

impl<T, K, V> MapPtr<T, K, V> {
    /// Creates a var over `field`.
    #[inline]
    pub const fn new(field: Field<T, BTreeMap<K, V>>) -> Self {
        Self {
            field,
            flags: VarFlags::empty(),
        }
    }
}

impl<T: Any, K: MapKey, V: Reflect + Clone + Default> ReflectionVar for MapPtr<T, K, V> {
    impl_var_common!(VarKind::Map);

    #[inline]
    fn key_type(&self) -> Option<ValueType> {
        Some(ValueType::of::<K>())
    }

    fn get_data<'a>(&'a self, object: &'a dyn Any) -> Result<VarData<'a>, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(VarData::Ref(self.field.get(object)))
    }

    fn get_data_mut<'a>(&self, object: &'a mut dyn Any) -> Result<&'a mut dyn Any, VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        Ok(self.field.get_mut(object))
    }

    fn set_data(&self, object: &mut dyn Any, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_ref::<BTreeMap<K, V>>(data, core::any::type_name::<BTreeMap<K, V>>())?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        self.field.get_mut(object).clone_from(data);
        Ok(())
    }

    fn set_data_move(
        &self,
        object: &mut dyn Any,
        data: Box<dyn Any + Send + Sync>,
    ) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_box::<BTreeMap<K, V>>(data, core::any::type_name::<BTreeMap<K, V>>())?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        *self.field.get_mut(object) = data;
        Ok(())
    }

    fn size(&self, object: &dyn Any) -> Result<usize, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(self.field.get(object).len())
    }

    fn get_element<'a>(&self, object: &'a dyn Any, index: usize) -> Result<&'a dyn Any, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        let map = self.field.get(object);
        match map.values().nth(index) {
            Some(value) => Ok(value),
            None => Err(VarError::IndexOutOfRange {
                index,
                len: map.len(),
            }),
        }
    }

    fn get_element_mut<'a>(
        &self,
        object: &'a mut dyn Any,
        index: usize,
    ) -> Result<&'a mut dyn Any, VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        let map = self.field.get_mut(object);
        let len = map.len();
        match map.values_mut().nth(index) {
            Some(value) => Ok(value),
            None => Err(VarError::IndexOutOfRange { index, len }),
        }
    }

    fn set_element(&self, object: &mut dyn Any, index: usize, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_ref::<V>(data, V::TYPE_NAME)?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        let map = self.field.get_mut(object);
        let len = map.len();
        match map.values_mut().nth(index) {
            Some(value) => {
                value.clone_from(data);
                Ok(())
            }
            None => Err(VarError::IndexOutOfRange { index, len }),
        }
    }

    fn remove(&self, object: &mut dyn Any, index: usize) -> Result<(), VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        let map = self.field.get_mut(object);
        check_index(index, map.len())?;
        if let Some(key) = map.keys().nth(index).cloned() {
            map.remove(&key);
        }
        Ok(())
    }

    fn get_map_entry<'a>(
        &self,
        object: &'a dyn Any,
        key: &dyn Any,
    ) -> Result<Option<&'a dyn Any>, VarError> {
        let key = value_ref::<K>(key, K::TYPE_NAME)?;
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(self.field.get(object).get(key).map(|value| value as &dyn Any))
    }

    fn add_map_entry(&self, object: &mut dyn Any, key: &dyn Any, value: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let key = value_ref::<K>(key, K::TYPE_NAME)?;
        let value = value_ref::<V>(value, V::TYPE_NAME)?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        self.field.get_mut(object).insert(key.clone(), value.clone());
        Ok(())
    }

    fn load(
        &self,
        reader: &mut dyn SerializeReader,
        object: &mut dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        if !reader.is_object() {
            return Err(LoadError::TypeMismatch { expected: "an object" });
        }
        let mut loaded = BTreeMap::new();
        for name in reader.keys() {
            let key = K::from_key(&name).ok_or_else(|| LoadError::InvalidKey { key: name.clone() })?;
            let mut value = V::default();
            if reader.enter_element(&name) {
                let result = value.load(reader, registry);
                reader.exit_element();
                result.map_err(|err| err.in_field(&name))?;
            }
            loaded.insert(key, value);
        }
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        *self.field.get_mut(object) = loaded;
        Ok(())
    }

    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        object: &dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        let map = self.field.get(object);
        writer.start_object(map.len());
        for (key, value) in map {
            writer.write_key(&key.to_key());
            value.save(writer, registry)?;
        }
        writer.end_object();
        Ok(())
    }

    fn instance_hash(
        &self,
        object: &dyn Any,
        init: Hash64,
        registry: &ReflectionManager,
    ) -> Result<Hash64, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        let hash = self
            .field
            .get(object)
            .iter()
            .fold(init, |hash, (key, value)| {
                value.instance_hash(key.instance_hash(hash, registry), registry)
            });
        Ok(hash)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeMap;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;

    use serde_json::json;

    use super::{ArrayPtr, MapPtr, VectorPtr};
    use crate::error::{LoadError, VarError};
    use crate::field;
    use crate::manager::ReflectionManager;
    use crate::serialize::{JsonReader, JsonWriter};
    use crate::var::ReflectionVar;

    #[derive(Default)]
    struct Bag {
        items: Vec<u32>,
        slots: [i16; 3],
        table: BTreeMap<String, f32>,
    }

    #[test]
    fn vector_bounds_are_checked() {
        let var = VectorPtr::new(field!(Bag, items));
        let mut bag = Bag { items: vec![1, 2, 3], ..Bag::default() };

        assert_eq!(var.size(&bag), Ok(3));
        assert_eq!(var.get_element(&bag, 2).unwrap().downcast_ref::<u32>(), Some(&3));
        assert_eq!(
            var.get_element(&bag, 3).err(),
            Some(VarError::IndexOutOfRange { index: 3, len: 3 })
        );

        var.swap(&mut bag, 0, 2).unwrap();
        var.set_element(&mut bag, 1, &7_u32).unwrap();
        assert_eq!(bag.items, [3, 7, 1]);

        var.resize(&mut bag, 5).unwrap();
        var.remove(&mut bag, 0).unwrap();
        assert_eq!(bag.items, [7, 1, 0, 0]);
        assert!(var.swap(&mut bag, 0, 9).is_err());
    }

    #[test]
    fn fixed_arrays_do_not_resize() {
        let var = ArrayPtr::new(field!(Bag, slots));
        let mut bag = Bag::default();
        assert_eq!(var.size(&bag), Ok(3));
        assert!(matches!(var.resize(&mut bag, 4), Err(VarError::Unsupported { .. })));
        assert!(matches!(var.remove(&mut bag, 0), Err(VarError::Unsupported { .. })));

        let registry = ReflectionManager::new();
        let short = json!([1, 2]);
        assert_eq!(
            var.load(&mut JsonReader::new(&short), &mut bag, &registry),
            Err(LoadError::ArrayLength { expected: 3, found: 2 })
        );
        let exact = json!([1, 2, 3]);
        var.load(&mut JsonReader::new(&exact), &mut bag, &registry).unwrap();
        assert_eq!(bag.slots, [1, 2, 3]);
    }

    #[test]
    fn element_errors_carry_the_index() {
        let var = VectorPtr::new(field!(Bag, items));
        let mut bag = Bag::default();
        let registry = ReflectionManager::new();
        let json = json!([1, "two"]);
        let err = var
            .load(&mut JsonReader::new(&json), &mut bag, &registry)
            .unwrap_err();
        assert!(matches!(err, LoadError::Element { index: 1, .. }));
        assert_eq!(
            err.root_cause(),
            &LoadError::TypeMismatch { expected: "an integer" }
        );
    }

    #[test]
    fn map_entries_round_trip() {
        let var = MapPtr::new(field!(Bag, table));
        let mut bag = Bag::default();
        var.add_map_entry(&mut bag, &String::from("b"), &2.0_f32).unwrap();
        var.add_map_entry(&mut bag, &String::from("a"), &1.0_f32).unwrap();

        assert_eq!(var.get_element(&bag, 0).unwrap().downcast_ref::<f32>(), Some(&1.0));
        let entry = var.get_map_entry(&bag, &String::from("b")).unwrap();
        assert_eq!(entry.and_then(|v| v.downcast_ref::<f32>()), Some(&2.0));

        let registry = ReflectionManager::new();
        let mut writer = JsonWriter::new();
        var.save(&mut writer, &bag, &registry).unwrap();
        let json = writer.finish();
        assert_eq!(json, json!({ "a": 1.0, "b": 2.0 }));

        let mut loaded = Bag::default();
        var.load(&mut JsonReader::new(&json), &mut loaded, &registry).unwrap();
        assert_eq!(loaded.table, bag.table);
    }
}
