use alloc::boxed::Box;
use core::any::Any;

use bitflags::Flags;
use shib_utils::Hash64;

use super::{Field, ReflectionVar, VarData, VarFlags, VarKind};
use super::{check_index, object_mut, object_ref, value_box, value_ref};
use crate::error::{LoadError, SaveError, VarError};
use crate::manager::ReflectionManager;
use crate::serialize::{SerializeReader, SerializeWriter};
use crate::{TypeName, ValueType};

/// Returns the declared flag at `index`.
#[inline]
fn declared<F: Flags>(index: usize) -> Result<&'static F, VarError> {
    check_index(index, F::FLAGS.len())?;
    Ok(F::FLAGS[index].value())
}

// -----------------------------------------------------------------------------
// VarFlagsPtr

/// A var over a whole [`bitflags`] field.
///
/// Saved as the array of the names of the set flags, in declaration
/// order. Loading rejects names the flags type does not declare.
/// Individual flags are addressed by declaration index through
/// [`ReflectionVar::set_flag_value`] and [`ReflectionVar::get_flag_value`].
pub struct VarFlagsPtr<T, F> {
    field: Field<T, F>,
    flags: VarFlags,
}

impl<T, F> VarFlagsPtr<T, F> {
    /// Creates a var over `field`.
    #[inline]
    pub const fn new(field: Field<T, F>) -> Self {
        Self {
            field,
            flags: VarFlags::empty(),
        }
    }
}

impl<T, F> ReflectionVar for VarFlagsPtr<T, F>
where
    T: Any,
    F: Flags + TypeName + Copy + Send + Sync,
{
    #[inline]
    fn kind(&self) -> VarKind {
        VarKind::Flags
    }

    #[inline]
    fn value_type(&self) -> ValueType {
        ValueType::of::<F>()
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
        let data = value_ref::<F>(data, F::TYPE_NAME)?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        *self.field.get_mut(object) = *data;
        Ok(())
    }

    fn set_data_move(
        &self,
        object: &mut dyn Any,
        data: Box<dyn Any + Send + Sync>,
    ) -> Result<(), VarError> {
        self.ensure_writable()?;
        let data = value_box::<F>(data, F::TYPE_NAME)?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        *self.field.get_mut(object) = data;
        Ok(())
    }

    fn size(&self, object: &dyn Any) -> Result<usize, VarError> {
        object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(F::FLAGS.len())
    }

    fn set_flag_value(&self, object: &mut dyn Any, index: usize, value: bool) -> Result<(), VarError> {
        self.ensure_writable()?;
        let flag = declared::<F>(index)?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        self.field.get_mut(object).set(*flag, value);
        Ok(())
    }

    fn get_flag_value(&self, object: &dyn Any, index: usize) -> Result<bool, VarError> {
        let flag = declared::<F>(index)?;
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        Ok(self.field.get(object).contains(*flag))
    }

    fn load(
        &self,
        reader: &mut dyn SerializeReader,
        object: &mut dyn Any,
        _registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        if !reader.is_array() {
            return Err(LoadError::TypeMismatch { expected: "an array of flag names" });
        }
        let mut loaded = F::empty();
        for index in 0..reader.size() {
            let name = reader
                .scoped_index(index, |reader| reader.read_string())
                .flatten()
                .ok_or(LoadError::TypeMismatch { expected: "a flag name" })
                .map_err(|err| err.in_element(index))?;
            match F::from_name(&name) {
                Some(flag) => loaded.insert(flag),
                None => {
                    return Err(LoadError::UnknownFlag {
                        type_name: F::TYPE_NAME,
                        flag: name,
                    });
                }
            }
        }
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        *self.field.get_mut(object) = loaded;
        Ok(())
    }

    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        object: &dyn Any,
        _registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        let value = *self.field.get(object);
        let set = F::FLAGS
            .iter()
            .filter(|flag| !flag.value().is_empty() && value.contains(*flag.value()));
        writer.start_array(set.clone().count());
        for flag in set {
            writer.write_str(flag.name());
        }
        writer.end_array();
        Ok(())
    }

    fn instance_hash(
        &self,
        object: &dyn Any,
        init: Hash64,
        _registry: &ReflectionManager,
    ) -> Result<Hash64, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        let value = *self.field.get(object);
        let hash = F::FLAGS.iter().fold(init, |hash, flag| {
            let set = !flag.value().is_empty() && value.contains(*flag.value());
            hash.chain(&[set as u8])
        });
        Ok(hash)
    }
}

// -----------------------------------------------------------------------------
// VarFlagPtr

/// A `bool` var over one declared flag of a [`bitflags`] field.
///
/// Saved as a boolean.
pub struct VarFlagPtr<T, F> {
    field: Field<T, F>,
    index: usize,
    flags: VarFlags,
}

impl<T, F: Flags + Copy> VarFlagPtr<T, F> {
    /// Creates a var over the flag named `name`.
    ///
    /// # Panics
    ///
    /// Panics if `F` declares no flag called `name`.
    pub fn new(field: Field<T, F>, name: &str) -> Self {
        let index = F::FLAGS
            .iter()
            .position(|flag| flag.name() == name)
            .unwrap_or_else(|| {
                panic!("`{}` declares no flag named `{name}`", core::any::type_name::<F>())
            });
        Self {
            field,
            index,
            flags: VarFlags::empty(),
        }
    }

    /// The declared name of the flag.
    #[inline]
    pub fn flag_name(&self) -> &'static str {
        F::FLAGS[self.index].name()
    }

    #[inline]
    fn flag(&self) -> F {
        *F::FLAGS[self.index].value()
    }
}

impl<T, F> ReflectionVar for VarFlagPtr<T, F>
where
    T: Any,
    F: Flags + Copy + Send + Sync + 'static,
{
    #[inline]
    fn kind(&self) -> VarKind {
        VarKind::Scalar
    }

    #[inline]
    fn value_type(&self) -> ValueType {
        ValueType::of::<bool>()
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
        let value = self.field.get(object).contains(self.flag());
        Ok(VarData::Owned(Box::new(value)))
    }

    fn set_data(&self, object: &mut dyn Any, data: &dyn Any) -> Result<(), VarError> {
        self.ensure_writable()?;
        let value = *value_ref::<bool>(data, "bool")?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        self.field.get_mut(object).set(self.flag(), value);
        Ok(())
    }

    fn set_data_move(
        &self,
        object: &mut dyn Any,
        data: Box<dyn Any + Send + Sync>,
    ) -> Result<(), VarError> {
        self.ensure_writable()?;
        let value = value_box::<bool>(data, "bool")?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        self.field.get_mut(object).set(self.flag(), value);
        Ok(())
    }

    fn load(
        &self,
        reader: &mut dyn SerializeReader,
        object: &mut dyn Any,
        _registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        if reader.is_null() {
            return Ok(());
        }
        let value = reader
            .read_bool()
            .ok_or(LoadError::TypeMismatch { expected: "a boolean" })?;
        let object = object_mut::<T>(object, core::any::type_name::<T>())?;
        self.field.get_mut(object).set(self.flag(), value);
        Ok(())
    }

    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        object: &dyn Any,
        _registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        writer.write_bool(self.field.get(object).contains(self.flag()));
        Ok(())
    }

    fn instance_hash(
        &self,
        object: &dyn Any,
        init: Hash64,
        _registry: &ReflectionManager,
    ) -> Result<Hash64, VarError> {
        let object = object_ref::<T>(object, core::any::type_name::<T>())?;
        let set = self.field.get(object).contains(self.flag());
        Ok(init.chain(&[set as u8]))
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{VarFlagPtr, VarFlagsPtr};
    use crate::error::{LoadError, VarError};
    use crate::manager::ReflectionManager;
    use crate::serialize::{JsonReader, JsonWriter};
    use crate::var::{ReflectionVar, VarFlags};
    use crate::{field, impl_type_name};

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        struct Layers: u8 {
            const OPAQUE = 1 << 0;
            const SHADOW = 1 << 1;
            const UI = 1 << 2;
        }
    }

    impl_type_name!(Layers = "Layers");

    #[derive(Default)]
    struct Mesh {
        layers: Layers,
    }

    #[test]
    fn flags_save_as_names() {
        let var = VarFlagsPtr::new(field!(Mesh, layers));
        let registry = ReflectionManager::new();
        let mesh = Mesh { layers: Layers::OPAQUE | Layers::UI };

        let mut writer = JsonWriter::new();
        var.save(&mut writer, &mesh, &registry).unwrap();
        assert_eq!(writer.finish(), json!(["OPAQUE", "UI"]));

        let mut loaded = Mesh::default();
        let json = json!(["SHADOW", "UI"]);
        var.load(&mut JsonReader::new(&json), &mut loaded, &registry).unwrap();
        assert_eq!(loaded.layers, Layers::SHADOW | Layers::UI);
    }

    #[test]
    fn unknown_flag_names_fail() {
        let var = VarFlagsPtr::new(field!(Mesh, layers));
        let registry = ReflectionManager::new();
        let mut mesh = Mesh { layers: Layers::OPAQUE };
        let json = json!(["SHADOW", "GLOW"]);
        assert_eq!(
            var.load(&mut JsonReader::new(&json), &mut mesh, &registry),
            Err(LoadError::UnknownFlag { type_name: "Layers", flag: "GLOW".into() })
        );
        assert_eq!(mesh.layers, Layers::OPAQUE);
    }

    #[test]
    fn flags_by_index() {
        let mut var = VarFlagsPtr::new(field!(Mesh, layers));
        let mut mesh = Mesh::default();
        var.set_flag_value(&mut mesh, 1, true).unwrap();
        assert_eq!(mesh.layers, Layers::SHADOW);
        assert_eq!(var.get_flag_value(&mesh, 1), Ok(true));
        assert_eq!(var.get_flag_value(&mesh, 0), Ok(false));
        assert_eq!(
            var.get_flag_value(&mesh, 3),
            Err(VarError::IndexOutOfRange { index: 3, len: 3 })
        );

        var.flags_mut().insert(VarFlags::READ_ONLY);
        assert_eq!(var.set_flag_value(&mut mesh, 0, true), Err(VarError::ReadOnly));
    }

    #[test]
    fn single_flag_is_a_bool() {
        let var = VarFlagPtr::new(field!(Mesh, layers), "SHADOW");
        assert_eq!(var.flag_name(), "SHADOW");
        let mut mesh = Mesh::default();
        var.set_data(&mut mesh, &true).unwrap();
        assert_eq!(mesh.layers, Layers::SHADOW);
        assert_eq!(var.get_data(&mesh).unwrap().downcast_ref::<bool>(), Some(&true));
    }

    #[test]
    #[should_panic(expected = "declares no flag named `GLOW`")]
    fn unknown_single_flag_panics() {
        let _ = VarFlagPtr::new(field!(Mesh, layers), "GLOW");
    }
}
