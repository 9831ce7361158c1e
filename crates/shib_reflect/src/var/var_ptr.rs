use alloc::boxed::Box;
use core::any::Any;
use core::marker::PhantomData;

use shib_utils::Hash64;

use super::{Field, ReflectionVar, VarData, VarFlags, VarKind};
use super::{object_mut, object_ref, value_box, value_ref};
use crate::error::{LoadError, SaveError, VarError};
use crate::manager::ReflectionManager;
use crate::serialize::{SerializeReader, SerializeWriter};
use crate::{Reflect, TypeName, ValueType};

// -----------------------------------------------------------------------------
// VarPtr

/// A var backed by a plain member of `T`.
///
/// # Examples
///
/// ```
/// use shib_reflect::field;
/// use shib_reflect::var::{ReflectionVar, VarPtr};
///
/// struct Light { intensity: f32 }
///
/// let var = VarPtr::new(field!(Light, intensity));
/// let mut light = Light { intensity: 1.0 };
///
/// var.set_data(&mut light, &4.0_f32).unwrap();
/// assert_eq!(light.intensity, 4.0);
/// assert_eq!(var.get_data(&light).unwrap().downcast_ref::<f32>(), Some(&4.0));
/// ```
pub struct VarPtr<T, V> {
    field: Field<T, V>,
    flags: VarFlags,
    _marker: PhantomData<fn() -> T>,
}

impl<T, V> VarPtr<T, V> {
    /// Creates a var over `field`.
    #[inline]
    pub const fn new(field: Field<T, V>) -> Self {
        Self {
            field,
            flags: VarFlags::empty(),
            _marker: PhantomData,
        }
    }
}

impl<T: Any, V: Reflect + Clone> ReflectionVar for VarPtr<T, V> {
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
        Ok(VarData::Ref(self.field.get(object)))
    }

    fn get_data_mut<'a>(&self, object: &'a mut dyn Any) -> Result<&'a mut dyn Any, VarError> {
        self.ensure_writable()?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        Ok(self.field.get_mut(object))
    }

    fn set_data(&self, object: &mut dyn Any, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_ref::<V>(data, V::TYPE_NAME)?;
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
        let data = value_box::<V>(data, V::TYPE_NAME)?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        *self.field.get_mut(object) = data;
        Ok(())
    }

    fn load(
        &self,
        reader: &mut dyn SerializeReader,
        object: &mut dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        self.field.get_mut(object).load(reader, registry)
    }

    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        object: &dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        self.field.get(object).save(writer, registry)
    }

    fn instance_hash(
        &self,
        object: &dyn Any,
        init: Hash64,
        registry: &ReflectionManager,
    ) -> Result<Hash64, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(self.field.get(object).instance_hash(init, registry))
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::string::String;

    use super::VarPtr;
    use crate::error::VarError;
    use crate::field;
    use crate::var::{ReflectionVar, VarFlags, VarKind};

    struct Named {
        name: String,
        id: u32,
    }

    #[test]
    fn wrong_object_and_wrong_data() {
        let var = VarPtr::new(field!(Named, id));
        let mut other = 5_u8;
        assert!(matches!(
            var.set_data(&mut other, &1_u32),
            Err(VarError::ObjectMismatch { .. })
        ));

        let mut named = Named { name: String::new(), id: 0 };
        assert_eq!(
            var.set_data(&mut named, &1_i64),
            Err(VarError::ValueMismatch { expected: "uint32_t" })
        );
        assert_eq!(named.id, 0);
    }

    #[test]
    fn read_only_rejects_generic_writes_only() {
        let mut var = VarPtr::new(field!(Named, name));
        var.flags_mut().insert(VarFlags::READ_ONLY);

        let mut named = Named { name: String::from("a"), id: 0 };
        assert_eq!(var.set_data(&mut named, &String::from("b")), Err(VarError::ReadOnly));
        assert_eq!(
            var.set_data_move(&mut named, Box::new(String::from("b"))),
            Err(VarError::ReadOnly)
        );
        assert!(var.get_data_mut(&mut named).is_err());
        assert_eq!(named.name, "a");

        named.name = String::from("direct");
        assert_eq!(
            var.get_data(&named).unwrap().downcast_ref::<String>().map(String::as_str),
            Some("direct")
        );
    }

    #[test]
    fn scalars_have_no_collection_protocol() {
        let var = VarPtr::new(field!(Named, id));
        let named = Named { name: String::new(), id: 3 };
        assert_eq!(var.kind(), VarKind::Scalar);
        assert_eq!(
            var.size(&named),
            Err(VarError::Unsupported { op: "size", kind: VarKind::Scalar })
        );
    }
}
