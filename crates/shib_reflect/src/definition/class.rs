use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use core::fmt;

use shib_utils::collections::HashVecMap;
use shib_utils::{Hash32, Hash64, HashString32, HashString64};

use super::function::{
    Factory, FunctionOverload, MAX_OVERLOADS, ReflectionFunction, ReflectionStaticFunction,
    args_hash, ctor_hash,
};
use super::interface::ErasedTraitCast;
use crate::attribute::{Attribute, AttributeList};
use crate::error::{LoadError, SaveError, VarError};
use crate::manager::ReflectionManager;
use crate::serialize::{SerializeReader, SerializeWriter};
use crate::var::{BaseCast, BaseVarPtr, ChainedCast, ReflectionVar, VarFlags};
use crate::{LOG_CHANNEL, TypeName};

pub(crate) type LoadFn =
    dyn Fn(&mut dyn SerializeReader, &mut dyn Any, &ReflectionManager) -> Result<(), LoadError> + Send + Sync;
pub(crate) type SaveFn =
    dyn Fn(&mut dyn SerializeWriter, &dyn Any, &ReflectionManager) -> Result<(), SaveError> + Send + Sync;
pub(crate) type HashFn = dyn Fn(&dyn Any, Hash64, &ReflectionManager) -> Hash64 + Send + Sync;

// -----------------------------------------------------------------------------
// VarEntry

/// A var together with its attributes.
pub struct VarEntry {
    pub(crate) var: Arc<dyn ReflectionVar>,
    pub(crate) attrs: AttributeList,
}

impl VarEntry {
    #[inline]
    pub fn var(&self) -> &dyn ReflectionVar {
        &*self.var
    }

    #[inline]
    pub fn attrs(&self) -> &AttributeList {
        &self.attrs
    }
}

// -----------------------------------------------------------------------------
// BaseClass

/// A base type of a class definition.
///
/// Direct bases are declared with
/// [`ReflectionDefinition::base`](crate::ReflectionDefinition::base).
/// Bases of bases are added when the direct base resolves, with a
/// chained cast, and are marked as inherited.
pub struct BaseClass {
    pub(crate) name: &'static str,
    pub(crate) hash: Hash64,
    pub(crate) cast: Arc<dyn BaseCast>,
    pub(crate) insert_index: usize,
    pub(crate) absorbed: usize,
    pub(crate) resolved: bool,
    pub(crate) inherited: bool,
}

impl BaseClass {
    pub(crate) fn new(name: &'static str, hash: Hash64, cast: Arc<dyn BaseCast>, insert_index: usize) -> Self {
        Self {
            name,
            hash,
            cast,
            insert_index,
            absorbed: 0,
            resolved: false,
            inherited: false,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn hash(&self) -> Hash64 {
        self.hash
    }

    /// The upcast from the owning type to this base.
    #[inline]
    pub fn cast(&self) -> &dyn BaseCast {
        &*self.cast
    }

    /// Returns `true` once the base's vars have been absorbed.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Returns `true` for bases reached through another base.
    #[inline]
    pub fn is_inherited(&self) -> bool {
        self.inherited
    }
}

// -----------------------------------------------------------------------------
// ClassDefinition

/// The frozen, type-erased description of a reflected class.
///
/// Built by [`ReflectionDefinition`](crate::ReflectionDefinition) and
/// owned by the [`ReflectionManager`]. A definition whose bases are not
/// registered yet is *pending*: its var, interface and factory queries
/// return `None` and log a warning until the manager resolves it.
pub struct ClassDefinition {
    type_name: &'static str,
    name: HashString64,
    friendly_name: Option<&'static str>,
    type_id: TypeId,
    size: usize,
    version: Hash64,
    defined: bool,
    bases_remaining: usize,
    vars: HashVecMap<HashString32, VarEntry>,
    funcs: HashVecMap<HashString32, Vec<FunctionOverload>>,
    static_funcs: HashVecMap<HashString32, Vec<FunctionOverload>>,
    class_attrs: AttributeList,
    bases: Vec<BaseClass>,
    interfaces: HashVecMap<Hash64, Box<dyn ErasedTraitCast>>,
    factories: HashVecMap<Hash64, Box<dyn Any + Send + Sync>>,
    load_fn: Option<Box<LoadFn>>,
    save_fn: Option<Box<SaveFn>>,
    hash_fn: Option<Box<HashFn>>,
}

impl ClassDefinition {
    pub(crate) fn new(type_name: &'static str, type_id: TypeId, size: usize) -> Self {
        Self {
            type_name,
            name: HashString64::from_static(type_name),
            friendly_name: None,
            type_id,
            size,
            version: Hash64::INIT,
            defined: false,
            bases_remaining: 0,
            vars: HashVecMap::new(),
            funcs: HashVecMap::new(),
            static_funcs: HashVecMap::new(),
            class_attrs: AttributeList::new(),
            bases: Vec::new(),
            interfaces: HashVecMap::new(),
            factories: HashVecMap::new(),
            load_fn: None,
            save_fn: None,
            hash_fn: None,
        }
    }

    fn check_defined(&self, query: &str) -> bool {
        if !self.defined {
            log::warn!(
                target: LOG_CHANNEL,
                "'{}' queried through `{query}` while {} of its bases are undefined",
                self.type_name,
                self.bases_remaining,
            );
        }
        self.defined
    }

    fn check_object(&self, object: &dyn Any) -> Result<(), VarError> {
        if object.type_id() == self.type_id {
            Ok(())
        } else {
            Err(VarError::ObjectMismatch {
                expected: self.type_name,
            })
        }
    }
}

// -----------------------------------------------------------------------------
// Identity

impl ClassDefinition {
    /// The registered type name.
    #[inline]
    pub fn name(&self) -> &HashString64 {
        &self.name
    }

    /// The type hash, FNV-1a 64 of the name.
    #[inline]
    pub fn hash(&self) -> Hash64 {
        self.name.hash()
    }

    /// The display name, the type name unless one was set.
    #[inline]
    pub fn friendly_name(&self) -> &str {
        self.friendly_name.unwrap_or(self.type_name)
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// `size_of` the reflected type.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// A hash over the definition's layout: var names and types, and bases.
    ///
    /// Only meaningful once defined.
    #[inline]
    pub fn version(&self) -> Hash64 {
        self.version
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    /// Number of direct bases that are still undefined.
    #[inline]
    pub fn bases_remaining(&self) -> usize {
        self.bases_remaining
    }
}

// -----------------------------------------------------------------------------
// Vars

impl ClassDefinition {
    pub fn num_vars(&self) -> usize {
        if self.check_defined("num_vars") {
            self.vars.len()
        } else {
            0
        }
    }

    pub fn var_name(&self, index: usize) -> Option<&HashString32> {
        if !self.check_defined("var_name") {
            return None;
        }
        self.vars.get_index(index).map(|(name, _)| name)
    }

    /// The var whose name hashes to `name`.
    pub fn get_var(&self, name: Hash32) -> Option<&dyn ReflectionVar> {
        if !self.check_defined("get_var") {
            return None;
        }
        self.vars.get(&name).map(VarEntry::var)
    }

    #[inline]
    pub fn get_var_by_name(&self, name: &str) -> Option<&dyn ReflectionVar> {
        self.get_var(Hash32::of_str(name))
    }

    pub fn get_var_at(&self, index: usize) -> Option<(&HashString32, &dyn ReflectionVar)> {
        if !self.check_defined("get_var_at") {
            return None;
        }
        self.vars
            .get_index(index)
            .map(|(name, entry)| (name, entry.var()))
    }

    /// Iterates over the vars in declaration order, empty until defined.
    pub fn vars(&self) -> impl Iterator<Item = (&HashString32, &VarEntry)> {
        let len = if self.check_defined("vars") {
            self.vars.len()
        } else {
            0
        };
        self.vars.iter().take(len)
    }

    pub fn get_var_attrs(&self, name: Hash32) -> Option<&AttributeList> {
        if !self.check_defined("get_var_attrs") {
            return None;
        }
        self.vars.get(&name).map(VarEntry::attrs)
    }

    pub fn get_var_attr<A: Attribute>(&self, name: Hash32) -> Option<&A> {
        self.get_var_attrs(name)?.get::<A>()
    }

    /// Returns `true` if any var carries an `A`.
    pub fn has_var_attr<A: Attribute>(&self) -> bool {
        self.vars.values().any(|entry| entry.attrs.contains::<A>())
    }
}

// -----------------------------------------------------------------------------
// Functions

fn find_overload<'a>(
    table: &'a HashVecMap<HashString32, Vec<FunctionOverload>>,
    name: &str,
    args_hash: Hash64,
) -> Option<&'a FunctionOverload> {
    table
        .get(&Hash32::of_str(name))?
        .iter()
        .find(|overload| overload.args_hash == args_hash)
}

impl ClassDefinition {
    /// The method `name` with the signature `(Args) -> Ret`.
    pub fn get_func<Args: 'static, Ret: 'static>(&self, name: &str) -> Option<&ReflectionFunction<Args, Ret>> {
        find_overload(&self.funcs, name, args_hash::<Args, Ret>())?.downcast()
    }

    /// The associated function `name` with the signature `(Args) -> Ret`.
    pub fn get_static_func<Args: 'static, Ret: 'static>(
        &self,
        name: &str,
    ) -> Option<&ReflectionStaticFunction<Args, Ret>> {
        find_overload(&self.static_funcs, name, args_hash::<Args, Ret>())?.downcast()
    }

    pub fn get_func_attrs<Args: 'static, Ret: 'static>(&self, name: &str) -> Option<&AttributeList> {
        find_overload(&self.funcs, name, args_hash::<Args, Ret>()).map(FunctionOverload::attrs)
    }

    pub fn get_static_func_attrs<Args: 'static, Ret: 'static>(&self, name: &str) -> Option<&AttributeList> {
        find_overload(&self.static_funcs, name, args_hash::<Args, Ret>()).map(FunctionOverload::attrs)
    }

    /// Number of distinct method names.
    #[inline]
    pub fn num_funcs(&self) -> usize {
        self.funcs.len()
    }

    #[inline]
    pub fn num_static_funcs(&self) -> usize {
        self.static_funcs.len()
    }

    #[inline]
    pub fn func_name(&self, index: usize) -> Option<&HashString32> {
        self.funcs.get_index(index).map(|(name, _)| name)
    }

    #[inline]
    pub fn static_func_name(&self, index: usize) -> Option<&HashString32> {
        self.static_funcs.get_index(index).map(|(name, _)| name)
    }

    /// The overloads registered under the method `name`.
    pub fn func_overloads(&self, name: &str) -> &[FunctionOverload] {
        self.funcs
            .get(&Hash32::of_str(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn static_func_overloads(&self, name: &str) -> &[FunctionOverload] {
        self.static_funcs
            .get(&Hash32::of_str(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns `true` if any method overload carries an `A`.
    pub fn has_func_attr<A: Attribute>(&self) -> bool {
        self.funcs
            .values()
            .flatten()
            .any(|overload| overload.attrs.contains::<A>())
    }

    pub fn has_static_func_attr<A: Attribute>(&self) -> bool {
        self.static_funcs
            .values()
            .flatten()
            .any(|overload| overload.attrs.contains::<A>())
    }
}

// -----------------------------------------------------------------------------
// Attributes

impl ClassDefinition {
    #[inline]
    pub fn class_attrs(&self) -> &AttributeList {
        &self.class_attrs
    }

    #[inline]
    pub fn get_class_attr<A: Attribute>(&self) -> Option<&A> {
        self.class_attrs.get::<A>()
    }

    #[inline]
    pub fn get_class_attr_by_hash(&self, hash: Hash64) -> Option<&dyn Attribute> {
        self.class_attrs.get_by_hash(hash)
    }

    #[inline]
    pub fn has_class_attr<A: Attribute>(&self) -> bool {
        self.class_attrs.contains::<A>()
    }

    /// Returns `true` if the class, a var, a method or an associated
    /// function carries an attribute with type hash `hash`.
    pub fn has_attribute(&self, hash: Hash64) -> bool {
        self.class_attrs.contains_hash(hash)
            || self.vars.values().any(|entry| entry.attrs.contains_hash(hash))
            || self
                .funcs
                .values()
                .chain(self.static_funcs.values())
                .flatten()
                .any(|overload| overload.attrs.contains_hash(hash))
    }
}

// -----------------------------------------------------------------------------
// Bases and interfaces

impl ClassDefinition {
    /// Direct and inherited bases.
    #[inline]
    pub fn bases(&self) -> &[BaseClass] {
        &self.bases
    }

    fn find_base(&self, hash: Hash64) -> Option<&BaseClass> {
        self.bases.iter().find(|base| base.hash == hash)
    }

    /// Returns `true` for the type's own hash, any base, and any
    /// registered interface.
    pub fn has_interface(&self, hash: Hash64) -> bool {
        hash == self.hash() || self.find_base(hash).is_some() || self.interfaces.contains_key(&hash)
    }

    /// Hashes of every base and interface, own hash excluded.
    pub fn interface_hashes(&self) -> impl Iterator<Item = Hash64> + '_ {
        self.bases
            .iter()
            .map(|base| base.hash)
            .chain(self.interfaces.keys().copied())
    }

    /// Borrows the part of `object` that is the type `hash`.
    ///
    /// The own hash returns `object` itself, a base hash returns the
    /// base. `None` for other hashes and for objects of another type.
    pub fn get_interface<'a>(&self, hash: Hash64, object: &'a dyn Any) -> Option<&'a dyn Any> {
        if !self.check_defined("get_interface") || self.check_object(object).is_err() {
            return None;
        }
        if hash == self.hash() {
            return Some(object);
        }
        self.find_base(hash)?.cast.upcast(object)
    }

    /// Mutable counterpart of [`get_interface`](Self::get_interface).
    pub fn get_interface_mut<'a>(&self, hash: Hash64, object: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        if !self.check_defined("get_interface_mut") || self.check_object(object).is_err() {
            return None;
        }
        if hash == self.hash() {
            return Some(object);
        }
        self.find_base(hash)?.cast.upcast_mut(object)
    }

    /// Borrows the base `B` of `object`.
    #[inline]
    pub fn get_base<'a, B: TypeName>(&self, object: &'a dyn Any) -> Option<&'a B> {
        self.get_interface(B::TYPE_HASH, object)?.downcast_ref::<B>()
    }

    /// The byte distance between `object` and its part of type `hash`.
    pub fn base_pointer_offset(&self, hash: Hash64, object: &dyn Any) -> Option<isize> {
        let base = self.get_interface(hash, object)?;
        let base = base as *const dyn Any as *const u8 as isize;
        let object = object as *const dyn Any as *const u8 as isize;
        Some(base - object)
    }

    /// Borrows `object` as the interface `I`.
    pub fn cast_ref<'a, I: ?Sized + TypeName>(&self, object: &'a dyn Any) -> Option<&'a I> {
        if !self.check_defined("cast_ref") {
            return None;
        }
        let cast = self.interfaces.get(&I::TYPE_HASH)?;
        cast.downcast::<I>()?.cast_ref(object)
    }

    /// Mutably borrows `object` as the interface `I`.
    pub fn cast_mut<'a, I: ?Sized + TypeName>(&self, object: &'a mut dyn Any) -> Option<&'a mut I> {
        if !self.check_defined("cast_mut") {
            return None;
        }
        let cast = self.interfaces.get(&I::TYPE_HASH)?;
        cast.downcast::<I>()?.cast_mut(object)
    }
}

// -----------------------------------------------------------------------------
// Construction

impl ClassDefinition {
    fn factory<Args: 'static>(&self) -> Option<&Factory<Args>> {
        self.factories
            .get(&ctor_hash::<Args>())?
            .downcast_ref::<Factory<Args>>()
    }

    /// Returns `true` if a constructor taking `Args` is registered.
    #[inline]
    pub fn has_factory<Args: 'static>(&self) -> bool {
        self.factories.contains_key(&ctor_hash::<Args>())
    }

    #[inline]
    pub fn num_factories(&self) -> usize {
        self.factories.len()
    }

    fn instantiated(&self, object: &mut dyn Any) {
        for attr in self.class_attrs.iter() {
            attr.instantiated(object);
        }
        for entry in self.vars.values() {
            for attr in entry.attrs.iter() {
                attr.instantiated(object);
            }
        }
    }

    /// Creates an object with the constructor taking `Args`.
    pub fn create<Args: 'static>(&self, args: Args) -> Option<Box<dyn Any>> {
        if !self.check_defined("create") {
            return None;
        }
        let mut object = self.factory::<Args>()?.create(args);
        self.instantiated(&mut *object);
        Some(object)
    }

    /// Overwrites `object` using the constructor taking `Args`.
    ///
    /// Returns `false` if there is no such constructor or `object` has
    /// another type.
    pub fn construct<Args: 'static>(&self, object: &mut dyn Any, args: Args) -> bool {
        if !self.check_defined("construct") {
            return false;
        }
        let Some(factory) = self.factory::<Args>() else {
            return false;
        };
        if !factory.construct(object, args) {
            return false;
        }
        self.instantiated(object);
        true
    }

    /// Creates an object and converts it to the interface `I`.
    ///
    /// Only interfaces implemented by the type itself can take
    /// ownership, interfaces inherited from a base return `None`.
    pub fn create_t<I: ?Sized + TypeName, Args: 'static>(&self, args: Args) -> Option<Box<I>> {
        if !self.check_defined("create_t") {
            return None;
        }
        let cast = self.interfaces.get(&I::TYPE_HASH)?.downcast::<I>()?;
        let object = self.create(args)?;
        cast.cast_box(object).ok()
    }
}

// -----------------------------------------------------------------------------
// Serialization

impl ClassDefinition {
    /// Loads `object` from the reader's current node.
    ///
    /// Vars are read in declaration order, `NO_SERIALIZE` vars are
    /// skipped. A missing `OPTIONAL` var keeps its current value, any
    /// other missing var fails with [`LoadError::MissingField`].
    pub fn load(
        &self,
        reader: &mut dyn SerializeReader,
        object: &mut dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        if !self.defined {
            return Err(LoadError::NotDefined {
                type_name: self.type_name.to_string(),
            });
        }
        self.check_object(object)?;
        if let Some(load) = &self.load_fn {
            return load(reader, object, registry);
        }
        if !reader.is_object() {
            return Err(LoadError::TypeMismatch { expected: "an object" });
        }
        for (name, entry) in self.vars.iter() {
            let flags = entry.var.flags();
            if flags.contains(VarFlags::NO_SERIALIZE) {
                continue;
            }
            if reader.enter_element(name.as_str()) {
                let result = entry.var.load(reader, object, registry);
                reader.exit_element();
                result.map_err(|err| err.in_field(name.as_str()))?;
            } else if !flags.contains(VarFlags::OPTIONAL) {
                log::error!(
                    target: LOG_CHANNEL,
                    "'{}' is missing required field '{name}'",
                    self.type_name,
                );
                return Err(LoadError::MissingField {
                    type_name: self.type_name,
                    field: String::from(name.as_str()),
                });
            }
        }
        Ok(())
    }

    /// Saves `object` as an object of its serialized vars.
    pub fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        object: &dyn Any,
        registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        if !self.defined {
            return Err(SaveError::NotDefined {
                type_name: self.type_name.to_string(),
            });
        }
        self.check_object(object)?;
        if let Some(save) = &self.save_fn {
            return save(writer, object, registry);
        }
        let serialized = |entry: &&VarEntry| !entry.var.flags().contains(VarFlags::NO_SERIALIZE);
        writer.start_object(self.vars.values().filter(serialized).count());
        for (name, entry) in self.vars.iter() {
            if !serialized(&entry) {
                continue;
            }
            writer.write_key(name.as_str());
            entry.var.save(writer, object, registry)?;
        }
        writer.end_object();
        Ok(())
    }

    /// Folds the serialized content of `object` into `init`.
    pub fn instance_hash(
        &self,
        object: &dyn Any,
        init: Hash64,
        registry: &ReflectionManager,
    ) -> Result<Hash64, VarError> {
        if !self.check_defined("instance_hash") {
            return Ok(init);
        }
        self.check_object(object)?;
        if let Some(hash) = &self.hash_fn {
            return Ok(hash(object, init, registry));
        }
        let mut hash = init;
        for entry in self.vars.values() {
            if !entry.var.flags().contains(VarFlags::NO_SERIALIZE) {
                hash = entry.var.instance_hash(object, hash, registry)?;
            }
        }
        Ok(hash)
    }

    /// Copies every var of `src` into `dst`.
    ///
    /// `NO_COPY` and `READ_ONLY` vars are left untouched.
    pub fn copy(&self, dst: &mut dyn Any, src: &dyn Any) -> Result<(), VarError> {
        if !self.check_defined("copy") {
            return Ok(());
        }
        self.check_object(src)?;
        self.check_object(dst)?;
        for entry in self.vars.values() {
            if entry
                .var
                .flags()
                .intersects(VarFlags::NO_COPY | VarFlags::READ_ONLY)
            {
                continue;
            }
            entry.var.copy_value(dst, src)?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Building

impl ClassDefinition {
    pub(crate) fn set_friendly_name(&mut self, name: &'static str) {
        self.friendly_name = Some(name);
    }

    pub(crate) fn insert_var(&mut self, name: &'static str, var: Arc<dyn ReflectionVar>, attrs: AttributeList) {
        let key = HashString32::from_static(name);
        if self.vars.try_insert(key, VarEntry { var, attrs }).is_err() {
            panic!("'{}' registers var '{name}' twice", self.type_name);
        }
    }

    pub(crate) fn insert_overload(&mut self, is_static: bool, name: &'static str, overload: FunctionOverload) {
        let type_name = self.type_name;
        let table = if is_static {
            &mut self.static_funcs
        } else {
            &mut self.funcs
        };
        let key = HashString32::from_static(name);
        if !table.contains_key(&key.hash()) {
            let _ = table.try_insert(key.clone(), Vec::new());
        }
        let Some(overloads) = table.get_mut(&key.hash()) else {
            return;
        };
        if overloads.iter().any(|o| o.args_hash == overload.args_hash) {
            panic!("'{type_name}' registers function '{name}' twice with the same signature");
        }
        if overloads.len() >= MAX_OVERLOADS {
            panic!("'{type_name}' registers more than {MAX_OVERLOADS} overloads of '{name}'");
        }
        overloads.push(overload);
    }

    pub(crate) fn insert_factory(&mut self, hash: Hash64, factory: Box<dyn Any + Send + Sync>) {
        if self.factories.try_insert(hash, factory).is_err() {
            panic!("'{}' registers the same constructor twice", self.type_name);
        }
    }

    pub(crate) fn insert_base(&mut self, base: BaseClass) {
        if self.find_base(base.hash).is_some() {
            panic!("'{}' registers base '{}' twice", self.type_name, base.name);
        }
        self.bases.push(base);
        self.bases_remaining += 1;
    }

    pub(crate) fn insert_interface(&mut self, cast: Box<dyn ErasedTraitCast>) {
        let name = cast.interface_name();
        if self.interfaces.try_insert(cast.interface_hash(), cast).is_err() {
            panic!("'{}' registers interface '{name}' twice", self.type_name);
        }
    }

    pub(crate) fn push_class_attr(&mut self, attr: Box<dyn Attribute>) {
        self.class_attrs.push(attr);
    }

    pub(crate) fn set_serializer(&mut self, load: Box<LoadFn>, save: Box<SaveFn>) {
        self.load_fn = Some(load);
        self.save_fn = Some(save);
    }

    pub(crate) fn set_instance_hash(&mut self, hash: Box<HashFn>) {
        self.hash_fn = Some(hash);
    }

    #[inline]
    pub(crate) fn own_var_count(&self) -> usize {
        self.vars.len()
    }
}

// -----------------------------------------------------------------------------
// Deferred bases

impl ClassDefinition {
    /// Hashes of the direct bases that are still undefined.
    pub(crate) fn unresolved_bases(&self) -> impl Iterator<Item = Hash64> + '_ {
        self.bases
            .iter()
            .filter(|base| !base.resolved)
            .map(|base| base.hash)
    }

    /// Where the vars of the base at `index` go.
    ///
    /// The recorded index is shifted by the vars of bases declared at or
    /// before it that were absorbed earlier.
    fn insert_position(&self, index: usize) -> usize {
        let target = &self.bases[index];
        let shift: usize = self
            .bases
            .iter()
            .enumerate()
            .filter(|(i, base)| {
                base.resolved
                    && !base.inherited
                    && (base.insert_index < target.insert_index
                        || (base.insert_index == target.insert_index && *i < index))
            })
            .map(|(_, base)| base.absorbed)
            .sum();
        target.insert_index + shift
    }

    /// Absorbs the defined `base` if it is one of the pending bases.
    ///
    /// Returns `false` if `base` is not awaited.
    pub(crate) fn resolve_base(&mut self, base: &ClassDefinition) -> bool {
        let Some(index) = self
            .bases
            .iter()
            .position(|b| !b.resolved && b.hash == base.hash())
        else {
            return false;
        };

        let position = self.insert_position(index);
        let cast = self.bases[index].cast.clone();

        let mut absorbed = 0;
        for (name, entry) in base.vars.iter() {
            if self.vars.contains_key(&name.hash()) {
                log::warn!(
                    target: LOG_CHANNEL,
                    "'{}' shadows var '{name}' of base '{}'",
                    self.type_name,
                    base.type_name,
                );
                continue;
            }
            let var: Arc<dyn ReflectionVar> = Arc::new(BaseVarPtr::new(cast.clone(), entry.var.clone()));
            let entry = VarEntry {
                var,
                attrs: entry.attrs.clone(),
            };
            if self.vars.try_insert_at(position + absorbed, name.clone(), entry).is_ok() {
                absorbed += 1;
            }
        }

        let resolved = &mut self.bases[index];
        resolved.absorbed = absorbed;
        resolved.resolved = true;

        for inherited in &base.bases {
            if self.find_base(inherited.hash).is_some() {
                continue;
            }
            let chained: Arc<dyn BaseCast> = Arc::new(ChainedCast::new(cast.clone(), inherited.cast.clone()));
            self.bases.push(BaseClass {
                name: inherited.name,
                hash: inherited.hash,
                cast: chained,
                insert_index: 0,
                absorbed: 0,
                resolved: true,
                inherited: true,
            });
        }

        for (hash, interface) in base.interfaces.iter() {
            if !self.interfaces.contains_key(hash) {
                let _ = self.interfaces.try_insert(*hash, interface.through_base(cast.clone()));
            }
        }

        self.bases_remaining -= 1;
        log::debug!(
            target: LOG_CHANNEL,
            "'{}' absorbed {absorbed} vars of base '{}', {} bases remaining",
            self.type_name,
            base.type_name,
            self.bases_remaining,
        );
        true
    }

    /// Freezes the definition and runs the attributes' `finish` hooks.
    pub(crate) fn mark_defined(&mut self) {
        self.defined = true;
        let mut version = self.hash();
        for (name, entry) in self.vars.iter() {
            version = version
                .chain(&name.hash().get().to_le_bytes())
                .combine(entry.var.value_type().hash());
        }
        for base in &self.bases {
            version = version.combine(base.hash);
        }
        self.version = version;

        for attr in self.class_attrs.iter() {
            attr.finish(self);
        }
        for entry in self.vars.values() {
            for attr in entry.attrs.iter() {
                attr.finish(self);
            }
        }
        for overload in self.funcs.values().chain(self.static_funcs.values()).flatten() {
            for attr in overload.attrs.iter() {
                attr.finish(self);
            }
        }
    }
}

impl fmt::Debug for ClassDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDefinition")
            .field("name", &self.type_name)
            .field("defined", &self.defined)
            .field("vars", &self.vars.keys().collect::<Vec<_>>())
            .field("bases", &self.bases.iter().map(|b| b.name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use core::any::Any;

    use shib_utils::Hash64;

    use crate::attribute::{NoCopyAttribute, ReadOnlyAttribute};
    use crate::definition::ReflectionDefinition;
    use crate::manager::ReflectionManager;
    use crate::{TypeName, field, impl_type_name};

    #[derive(Default)]
    struct Root {
        a: i32,
    }

    #[derive(Default)]
    struct Left {
        root: Root,
        l: i32,
    }

    #[derive(Default)]
    struct Right {
        root: Root,
        r: i32,
    }

    #[derive(Default)]
    struct Diamond {
        left: Left,
        right: Right,
    }

    impl_type_name!(Root = "Root");
    impl_type_name!(Left = "Left");
    impl_type_name!(Right = "Right");
    impl_type_name!(Diamond = "Diamond");

    fn register_root(manager: &mut ReflectionManager) {
        ReflectionDefinition::<Root>::new()
            .var("a", field!(Root, a), &[])
            .finish(&mut manager.registrar());
    }

    fn register_sides(manager: &mut ReflectionManager) {
        ReflectionDefinition::<Left>::new()
            .base::<Root>(field!(Left, root))
            .var("l", field!(Left, l), &[])
            .finish(&mut manager.registrar());
        ReflectionDefinition::<Right>::new()
            .base::<Root>(field!(Right, root))
            .var("r", field!(Right, r), &[])
            .finish(&mut manager.registrar());
    }

    fn register_diamond(manager: &mut ReflectionManager) {
        ReflectionDefinition::<Diamond>::new()
            .base::<Left>(field!(Diamond, left))
            .base::<Right>(field!(Diamond, right))
            .finish(&mut manager.registrar());
    }

    fn diamond_manager() -> ReflectionManager {
        let mut manager = ReflectionManager::new();
        register_root(&mut manager);
        register_sides(&mut manager);
        register_diamond(&mut manager);
        manager
    }

    fn address(object: &dyn Any) -> *const u8 {
        object as *const dyn Any as *const u8
    }

    #[test]
    fn own_hash_returns_the_object() {
        let manager = diamond_manager();
        let diamond = manager.get_reflection_of::<Diamond>().unwrap();
        let mut value = Diamond::default();

        let own = diamond.get_interface(Diamond::TYPE_HASH, &value).unwrap();
        assert!(core::ptr::eq(own.downcast_ref::<Diamond>().unwrap(), &value));
        assert_eq!(diamond.base_pointer_offset(Diamond::TYPE_HASH, &value), Some(0));

        for hash in [Diamond::TYPE_HASH, Left::TYPE_HASH, Right::TYPE_HASH, Root::TYPE_HASH] {
            let shared = address(diamond.get_interface(hash, &value).unwrap());
            let exclusive = address(diamond.get_interface_mut(hash, &mut value).unwrap());
            assert_eq!(shared, exclusive);
        }
        let right = diamond.get_interface(Right::TYPE_HASH, &value).unwrap();
        assert!(core::ptr::eq(right.downcast_ref::<Right>().unwrap(), &value.right));
    }

    #[test]
    fn unknown_hashes_and_foreign_objects_cast_to_nothing() {
        let manager = diamond_manager();
        let diamond = manager.get_reflection_of::<Diamond>().unwrap();
        let mut value = Diamond::default();
        let mut root = Root::default();

        assert!(diamond.get_interface(Hash64::of_str("Missing"), &value).is_none());
        assert!(diamond.get_interface_mut(Hash64::of_str("Missing"), &mut value).is_none());
        assert!(diamond.get_interface(Diamond::TYPE_HASH, &root).is_none());
        assert!(diamond.get_interface_mut(Root::TYPE_HASH, &mut root).is_none());
        assert!(diamond.get_base::<Root>(&root).is_none());
        assert_eq!(diamond.base_pointer_offset(Root::TYPE_HASH, &root), None);
    }

    #[test]
    fn diamonds_keep_the_first_path() {
        let manager = diamond_manager();
        let diamond = manager.get_reflection_of::<Diamond>().unwrap();
        let value = Diamond {
            left: Left { root: Root { a: 1 }, l: 2 },
            right: Right { root: Root { a: 3 }, r: 4 },
        };

        let roots = diamond
            .bases()
            .iter()
            .filter(|base| base.hash() == Root::TYPE_HASH)
            .count();
        assert_eq!(roots, 1);
        assert!(core::ptr::eq(diamond.get_base::<Root>(&value).unwrap(), &value.left.root));

        let expected = address(&value.left.root) as isize - address(&value) as isize;
        assert_eq!(diamond.base_pointer_offset(Root::TYPE_HASH, &value), Some(expected));

        let a = diamond.get_var_by_name("a").unwrap().get_data(&value).unwrap();
        assert_eq!(a.downcast_ref::<i32>(), Some(&1));
        let r = diamond.get_var_by_name("r").unwrap().get_data(&value).unwrap();
        assert_eq!(r.downcast_ref::<i32>(), Some(&4));
        assert_eq!(diamond.num_vars(), 3);
    }

    #[test]
    fn pending_definitions_hide_their_vars() {
        let mut manager = ReflectionManager::new();
        register_sides(&mut manager);
        register_diamond(&mut manager);

        let pending = manager.get_pending(Diamond::TYPE_HASH).unwrap();
        assert!(!pending.is_defined());
        assert!(pending.get_var_by_name("l").is_none());
        assert_eq!(pending.num_vars(), 0);
        assert_eq!(pending.vars().count(), 0);
        assert!(pending.get_interface(Diamond::TYPE_HASH, &Diamond::default()).is_none());

        register_root(&mut manager);
        let diamond = manager.get_reflection_of::<Diamond>().unwrap();
        assert!(diamond.get_var_by_name("l").is_some());
    }

    // -------------------------------------------------------------------------
    // Copy

    #[derive(Default)]
    struct Transform {
        matrix: [f32; 2],
        locked: u8,
        id: u32,
    }

    impl Transform {
        fn translation(&self) -> f32 {
            self.matrix[1]
        }

        fn set_translation(&mut self, value: f32) {
            self.matrix[1] = value;
        }
    }

    #[derive(Default)]
    struct Actor {
        transform: Transform,
        health: i32,
    }

    impl_type_name!(Transform = "Transform");
    impl_type_name!(Actor = "Actor");

    fn transform_manager() -> ReflectionManager {
        let mut manager = ReflectionManager::new();
        ReflectionDefinition::<Transform>::new()
            .var_fn_cached("translation", Transform::translation, Transform::set_translation, &[])
            .var("locked", field!(Transform, locked), &[&ReadOnlyAttribute])
            .var("id", field!(Transform, id), &[&NoCopyAttribute])
            .finish(&mut manager.registrar());
        ReflectionDefinition::<Actor>::new()
            .base::<Transform>(field!(Actor, transform))
            .var("health", field!(Actor, health), &[])
            .finish(&mut manager.registrar());
        manager
    }

    #[test]
    fn copy_goes_through_cached_getters() {
        let manager = transform_manager();
        let transform = manager.get_reflection_of::<Transform>().unwrap();
        let src = Transform {
            matrix: [1.0, 2.0],
            locked: 3,
            id: 4,
        };
        let mut dst = Transform::default();

        transform.copy(&mut dst, &src).unwrap();
        assert_eq!(dst.matrix, [0.0, 2.0]);
        assert_eq!((dst.locked, dst.id), (0, 0));

        // The cache is free again once the copy returns.
        let translation = transform.get_var_by_name("translation").unwrap();
        assert_eq!(translation.get_data(&dst).unwrap().downcast_ref::<f32>(), Some(&2.0));
        transform.copy(&mut dst, &src).unwrap();
    }

    #[test]
    fn copy_goes_through_inherited_cached_getters() {
        let manager = transform_manager();
        let actor = manager.get_reflection_of::<Actor>().unwrap();
        let src = Actor {
            transform: Transform {
                matrix: [0.0, 5.0],
                ..Transform::default()
            },
            health: 7,
        };
        let mut dst = Actor::default();

        actor.copy(&mut dst, &src).unwrap();
        assert_eq!(dst.transform.matrix[1], 5.0);
        assert_eq!(dst.health, 7);
        assert!(actor.copy(&mut dst, &Transform::default()).is_err());
    }
}
