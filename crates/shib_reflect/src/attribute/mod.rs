//! Attributes attached to classes, vars, functions and enums.
//!
//! An [`Attribute`] is a small value type that is cloned into the
//! definition it decorates. It can react to the registration of its
//! target (`apply_*`), to the owning definition becoming defined
//! ([`finish`](Attribute::finish)), and to every object created through
//! the definition's factories ([`instantiated`](Attribute::instantiated)).
//!
//! Attributes are identified by their [`TypeName`] hash, which is also
//! the key of the manager's attribute buckets.
//!
//! # Examples
//!
//! ```
//! use shib_reflect::prelude::*;
//!
//! #[derive(Clone)]
//! struct EditorCategory(&'static str);
//!
//! impl_type_name!(EditorCategory = "EditorCategory");
//! impl Attribute for EditorCategory {}
//!
//! #[derive(Default)]
//! struct Light {
//!     intensity: f32,
//! }
//! impl_type_name!(Light = "Light");
//!
//! let mut manager = ReflectionManager::new();
//! ReflectionDefinition::<Light>::new()
//!     .class_attrs(&[&EditorCategory("Rendering")])
//!     .var("intensity", field!(Light, intensity), &[&RangeAttribute::new(0.0, 10.0)])
//!     .finish(&mut manager.registrar());
//!
//! let def = manager.get_reflection_of::<Light>().unwrap();
//! assert_eq!(def.get_class_attr::<EditorCategory>().unwrap().0, "Rendering");
//! assert!(def.has_var_attr::<RangeAttribute>());
//! ```

// -----------------------------------------------------------------------------
// Modules

mod builtin;

// -----------------------------------------------------------------------------
// Exports

pub use builtin::{
    NoCopyAttribute, NoSerializeAttribute, OptionalAttribute, RangeAttribute, ReadOnlyAttribute,
};

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use shib_utils::{Hash64, HashString32};

use crate::TypeName;
use crate::definition::ClassDefinition;
use crate::error::VarError;
use crate::var::ReflectionVar;

// -----------------------------------------------------------------------------
// Attribute

/// Metadata attached to a reflected item.
///
/// Every hook has an empty default, implementors override the ones
/// they care about. `apply_*` hooks run once per target, at
/// registration time.
pub trait Attribute: AttributeBase + Send + Sync {
    /// Called when the attribute is added to a class.
    fn apply_class(&self, definition: &mut ClassDefinition) {
        let _ = definition;
    }

    /// Called when the attribute is added to a var.
    ///
    /// Returning an error rejects the var and aborts registration.
    fn apply_var(&self, var: &mut dyn ReflectionVar) -> Result<(), VarError> {
        let _ = var;
        Ok(())
    }

    /// Called when the attribute is added to a function overload.
    fn apply_func(&self, name: &HashString32, args_hash: Hash64) {
        let _ = (name, args_hash);
    }

    /// Called when the attribute is added to an enum.
    fn apply_enum(&self, enum_name: &'static str) {
        let _ = enum_name;
    }

    /// Called once the owning class definition is fully defined.
    fn finish(&self, definition: &ClassDefinition) {
        let _ = definition;
    }

    /// Called for every object created through the owning definition.
    fn instantiated(&self, object: &mut dyn Any) {
        let _ = object;
    }
}

/// Object-safe plumbing for [`Attribute`].
///
/// Implemented for every `Attribute + TypeName + Clone`.
pub trait AttributeBase: Any {
    /// The attribute's type name.
    fn attribute_name(&self) -> &'static str;

    /// The attribute's type hash.
    fn attribute_hash(&self) -> Hash64;

    /// Clones the attribute into a new box.
    fn clone_attribute(&self) -> Box<dyn Attribute>;

    /// Upcasts to `dyn Any`, used to recover the concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl<A: Attribute + TypeName + Clone> AttributeBase for A {
    #[inline]
    fn attribute_name(&self) -> &'static str {
        A::TYPE_NAME
    }

    #[inline]
    fn attribute_hash(&self) -> Hash64 {
        A::TYPE_HASH
    }

    #[inline]
    fn clone_attribute(&self) -> Box<dyn Attribute> {
        Box::new(self.clone())
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Attribute {
    /// Returns the attribute as `A`.
    #[inline]
    pub fn downcast_ref<A: Attribute>(&self) -> Option<&A> {
        self.as_any().downcast_ref::<A>()
    }

    /// Returns `true` if the attribute is an `A`.
    #[inline]
    pub fn is<A: Attribute>(&self) -> bool {
        self.as_any().is::<A>()
    }
}

impl fmt::Debug for dyn Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute_name())
    }
}

// -----------------------------------------------------------------------------
// AttributeList

/// The attributes of one reflected item, in declaration order.
#[derive(Default)]
pub struct AttributeList {
    attributes: Vec<Box<dyn Attribute>>,
}

impl AttributeList {
    /// Creates an empty list.
    #[inline]
    pub const fn new() -> Self {
        Self {
            attributes: Vec::new(),
        }
    }

    /// Clones every attribute of `attributes` into a new list.
    pub fn cloned_from(attributes: &[&dyn Attribute]) -> Self {
        Self {
            attributes: attributes.iter().map(|attr| attr.clone_attribute()).collect(),
        }
    }

    /// Appends an attribute.
    #[inline]
    pub fn push(&mut self, attribute: Box<dyn Attribute>) {
        self.attributes.push(attribute);
    }

    /// Returns the number of attributes.
    #[inline]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns `true` if the list is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Iterates over the attributes.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &dyn Attribute> {
        self.attributes.iter().map(|attr| &**attr)
    }

    /// Returns the attribute at `index`.
    #[inline]
    pub fn get_at(&self, index: usize) -> Option<&dyn Attribute> {
        self.attributes.get(index).map(|attr| &**attr)
    }

    /// Returns the first attribute of type `A`.
    pub fn get<A: Attribute>(&self) -> Option<&A> {
        self.iter().find_map(|attr| attr.downcast_ref::<A>())
    }

    /// Returns the first attribute whose type hash is `hash`.
    pub fn get_by_hash(&self, hash: Hash64) -> Option<&dyn Attribute> {
        self.iter().find(|attr| attr.attribute_hash() == hash)
    }

    /// Returns `true` if an attribute of type `A` is present.
    #[inline]
    pub fn contains<A: Attribute>(&self) -> bool {
        self.iter().any(|attr| attr.is::<A>())
    }

    /// Returns `true` if an attribute with type hash `hash` is present.
    #[inline]
    pub fn contains_hash(&self, hash: Hash64) -> bool {
        self.get_by_hash(hash).is_some()
    }
}

impl Clone for AttributeList {
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.iter().map(|attr| attr.clone_attribute()).collect(),
        }
    }
}

impl fmt::Debug for AttributeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// -----------------------------------------------------------------------------
// Tests
