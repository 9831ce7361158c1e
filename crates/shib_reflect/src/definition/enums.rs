use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use core::marker::PhantomData;

use shib_utils::collections::HashVecMap;
use shib_utils::{Hash32, Hash64, HashString32};

use crate::attribute::{Attribute, AttributeList};
use crate::error::{LoadError, SaveError, VarError};
use crate::manager::Registrar;
use crate::serialize::{SerializeReader, SerializeWriter};
use crate::{LOG_CHANNEL, TypeName};

// -----------------------------------------------------------------------------
// EnumDefinition

/// The type-erased view of a registered enum.
pub trait EnumDefinition: Send + Sync {
    /// The enum's type name.
    fn name(&self) -> &'static str;

    /// The enum's type hash.
    fn hash(&self) -> Hash64;

    /// The enum's [`TypeId`].
    fn type_id(&self) -> TypeId;

    /// Number of registered entries.
    fn num_entries(&self) -> usize;

    /// The name of the entry at `index`, in registration order.
    fn entry_name_at(&self, index: usize) -> Option<&str>;

    /// The name of the entry equal to `value`.
    fn entry_name_of(&self, value: &dyn Any) -> Option<&str>;

    /// The enum's attributes.
    fn attrs(&self) -> &AttributeList;

    /// Loads `value` from an entry name.
    fn load_any(&self, reader: &mut dyn SerializeReader, value: &mut dyn Any) -> Result<(), LoadError>;

    /// Saves `value` as its entry name.
    fn save_any(&self, writer: &mut dyn SerializeWriter, value: &dyn Any) -> Result<(), SaveError>;
}

// -----------------------------------------------------------------------------
// EnumReflectionDefinition

/// Describes a reflected enum as an ordered list of named entries.
///
/// Enums are serialized by entry name. Loading a name that was never
/// registered is an error, the value is never defaulted.
///
/// # Examples
///
/// ```
/// use shib_reflect::prelude::*;
/// use shib_reflect::serialize::JsonReader;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Filter { Nearest, Linear }
/// impl_type_name!(Filter = "Filter");
///
/// let filter = EnumReflectionDefinition::<Filter>::new()
///     .entry("Nearest", Filter::Nearest)
///     .entry("Linear", Filter::Linear);
///
/// assert_eq!(filter.get_entry("Linear"), Some(Filter::Linear));
/// assert_eq!(filter.get_entry_name(Filter::Nearest), Some("Nearest"));
///
/// let json = serde_json::json!("Linear");
/// let mut value = Filter::Nearest;
/// filter.load(&mut JsonReader::new(&json), &mut value).unwrap();
/// assert_eq!(value, Filter::Linear);
/// ```
pub struct EnumReflectionDefinition<E> {
    entries: HashVecMap<HashString32, E>,
    attrs: AttributeList,
    _marker: PhantomData<fn() -> E>,
}

impl<E> EnumReflectionDefinition<E>
where
    E: TypeName + Copy + PartialEq + Send + Sync,
{
    #[inline]
    pub fn new() -> Self {
        Self {
            entries: HashVecMap::new(),
            attrs: AttributeList::new(),
            _marker: PhantomData,
        }
    }

    /// Adds an entry.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered.
    pub fn entry(mut self, name: &'static str, value: E) -> Self {
        if self
            .entries
            .try_insert(HashString32::from_static(name), value)
            .is_err()
        {
            panic!("enum `{}` registers entry `{name}` twice", E::TYPE_NAME);
        }
        self
    }

    /// Attaches attributes to the enum.
    pub fn enum_attrs(mut self, attrs: &[&dyn Attribute]) -> Self {
        for attr in attrs {
            let attr = attr.clone_attribute();
            attr.apply_enum(E::TYPE_NAME);
            self.attrs.push(attr);
        }
        self
    }

    /// The value of the entry named `name`.
    #[inline]
    pub fn get_entry(&self, name: &str) -> Option<E> {
        self.get_entry_by_hash(Hash32::of_str(name))
    }

    /// The value of the entry whose name hashes to `hash`.
    #[inline]
    pub fn get_entry_by_hash(&self, hash: Hash32) -> Option<E> {
        self.entries.get(&hash).copied()
    }

    /// The name of the first entry equal to `value`.
    pub fn get_entry_name(&self, value: E) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, entry)| **entry == value)
            .map(|(name, _)| name.as_str())
    }

    #[inline]
    pub fn entry_exists(&self, name: &str) -> bool {
        self.entries.contains_key(&Hash32::of_str(name))
    }

    #[inline]
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn entry_name_at(&self, index: usize) -> Option<&str> {
        self.entries.get_index(index).map(|(name, _)| name.as_str())
    }

    #[inline]
    pub fn attrs(&self) -> &AttributeList {
        &self.attrs
    }

    /// Reads an entry name and stores its value into `value`.
    pub fn load(&self, reader: &mut dyn SerializeReader, value: &mut E) -> Result<(), LoadError> {
        let name = reader.read_string().ok_or(LoadError::TypeMismatch {
            expected: "an enum entry name",
        })?;
        match self.get_entry(&name) {
            Some(entry) => {
                *value = entry;
                Ok(())
            }
            None => {
                log::error!(target: LOG_CHANNEL, "'{name}' is not an entry of enum '{}'", E::TYPE_NAME);
                Err(LoadError::UnknownEnumEntry {
                    enum_name: E::TYPE_NAME.to_string(),
                    entry: name,
                })
            }
        }
    }

    /// Writes the entry name of `value`.
    pub fn save(&self, writer: &mut dyn SerializeWriter, value: E) -> Result<(), SaveError> {
        let name = self.get_entry_name(value).ok_or_else(|| SaveError::UnknownEnumValue {
            enum_name: String::from(E::TYPE_NAME),
        })?;
        writer.write_str(name);
        Ok(())
    }

    /// Registers the enum.
    pub fn finish(self, registrar: &mut Registrar<'_>) {
        registrar.register_enum(Arc::new(self));
    }
}

impl<E> Default for EnumReflectionDefinition<E>
where
    E: TypeName + Copy + PartialEq + Send + Sync,
{
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EnumDefinition for EnumReflectionDefinition<E>
where
    E: TypeName + Copy + PartialEq + Send + Sync,
{
    #[inline]
    fn name(&self) -> &'static str {
        E::TYPE_NAME
    }

    #[inline]
    fn hash(&self) -> Hash64 {
        E::TYPE_HASH
    }

    #[inline]
    fn type_id(&self) -> TypeId {
        TypeId::of::<E>()
    }

    #[inline]
    fn num_entries(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    fn entry_name_at(&self, index: usize) -> Option<&str> {
        EnumReflectionDefinition::entry_name_at(self, index)
    }

    fn entry_name_of(&self, value: &dyn Any) -> Option<&str> {
        self.get_entry_name(*value.downcast_ref::<E>()?)
    }

    #[inline]
    fn attrs(&self) -> &AttributeList {
        &self.attrs
    }

    fn load_any(&self, reader: &mut dyn SerializeReader, value: &mut dyn Any) -> Result<(), LoadError> {
        let value = value
            .downcast_mut::<E>()
            .ok_or(VarError::ObjectMismatch { expected: E::TYPE_NAME })?;
        self.load(reader, value)
    }

    fn save_any(&self, writer: &mut dyn SerializeWriter, value: &dyn Any) -> Result<(), SaveError> {
        let value = value
            .downcast_ref::<E>()
            .ok_or(VarError::ObjectMismatch { expected: E::TYPE_NAME })?;
        self.save(writer, *value)
    }
}

/// Lists the entry names of an enum definition.
pub fn entry_names(definition: &dyn EnumDefinition) -> Vec<&str> {
    (0..definition.num_entries())
        .filter_map(|index| definition.entry_name_at(index))
        .collect()
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{EnumDefinition, EnumReflectionDefinition, entry_names};
    use crate::error::{LoadError, SaveError};
    use crate::impl_type_name;
    use crate::serialize::{JsonReader, JsonWriter};

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Blend {
        Opaque,
        Additive,
        Masked,
    }

    impl_type_name!(Blend = "Blend");

    fn blend() -> EnumReflectionDefinition<Blend> {
        EnumReflectionDefinition::new()
            .entry("Opaque", Blend::Opaque)
            .entry("Additive", Blend::Additive)
    }

    #[test]
    fn unknown_names_fail_without_defaulting() {
        let def = blend();
        let mut value = Blend::Additive;
        let json = json!("Screen");
        assert_eq!(
            def.load(&mut JsonReader::new(&json), &mut value),
            Err(LoadError::UnknownEnumEntry { enum_name: "Blend".into(), entry: "Screen".into() })
        );
        assert_eq!(value, Blend::Additive);
    }

    #[test]
    fn unregistered_values_do_not_save() {
        let def = blend();
        let mut writer = JsonWriter::new();
        assert_eq!(
            def.save(&mut writer, Blend::Masked),
            Err(SaveError::UnknownEnumValue { enum_name: "Blend".into() })
        );
    }

    #[test]
    fn erased_view() {
        let def = blend();
        let erased: &dyn EnumDefinition = &def;
        assert_eq!(entry_names(erased), ["Opaque", "Additive"]);
        assert_eq!(erased.entry_name_of(&Blend::Additive), Some("Additive"));
        assert!(def.entry_exists("Opaque"));
        assert!(!def.entry_exists("Masked"));

        let mut writer = JsonWriter::new();
        erased.save_any(&mut writer, &Blend::Opaque).unwrap();
        assert_eq!(writer.finish(), json!("Opaque"));
    }

    #[test]
    #[should_panic(expected = "registers entry `Opaque` twice")]
    fn duplicate_entries_panic() {
        let _ = blend().entry("Opaque", Blend::Masked);
    }
}
