//! The registry of every reflected type.
//!
//! Definitions enter through a [`Registrar`]. A definition whose bases
//! are all defined is frozen immediately, otherwise it waits in the
//! pending list and is frozen as soon as its last base is. Frozen
//! definitions are shared as `Arc<ClassDefinition>`.
//!
//! Definitions are indexed three ways:
//!
//! - by type hash,
//! - by type bucket: every definition implementing an interface, with
//!   the built-in buckets [`ALL_TYPES`] and [`UNBUCKETED_TYPES`],
//! - by attribute bucket: every definition carrying an attribute.
//!
//! Each bucket is also kept per module so a module's types can be
//! queried, and dropped together by [`ReflectionManager::unload_module`].

use alloc::sync::Arc;
use alloc::vec::Vec;

use shib_utils::hash::NoOpHashMap;
use shib_utils::{Hash64, HashString64};

use crate::attribute::Attribute;
use crate::definition::{ClassDefinition, EnumDefinition};
use crate::{LOG_CHANNEL, TypeName};

/// Bucket holding every defined type.
pub const ALL_TYPES: Hash64 = Hash64::of_str("*");

/// Bucket holding the types that joined no interface bucket.
pub const UNBUCKETED_TYPES: Hash64 = Hash64::of_str("**");

type Bucket = Vec<Arc<ClassDefinition>>;

#[inline]
fn bucket_insert(bucket: &mut Bucket, definition: &Arc<ClassDefinition>) {
    let index = bucket.partition_point(|other| other.hash() < definition.hash());
    bucket.insert(index, Arc::clone(definition));
}

#[inline]
fn bucket_remove(bucket: &mut Bucket, hash: Hash64) {
    bucket.retain(|definition| definition.hash() != hash);
}

#[inline]
fn is_interface_bucket(hash: Hash64) -> bool {
    hash != ALL_TYPES && hash != UNBUCKETED_TYPES
}

// -----------------------------------------------------------------------------
// ModulePartition

/// The types registered by one module.
#[derive(Debug)]
pub struct ModulePartition {
    name: HashString64,
    definitions: Vec<Hash64>,
    enums: Vec<Hash64>,
    type_buckets: NoOpHashMap<Hash64, Bucket>,
}

impl ModulePartition {
    fn new(name: HashString64) -> Self {
        Self {
            name,
            definitions: Vec::new(),
            enums: Vec::new(),
            type_buckets: NoOpHashMap::default(),
        }
    }

    #[inline]
    pub fn name(&self) -> &HashString64 {
        &self.name
    }

    /// Hashes of the defined classes owned by the module.
    #[inline]
    pub fn definitions(&self) -> &[Hash64] {
        &self.definitions
    }

    /// Hashes of the enums owned by the module.
    #[inline]
    pub fn enums(&self) -> &[Hash64] {
        &self.enums
    }
}

struct Pending {
    definition: ClassDefinition,
    module: Option<HashString64>,
}

struct EnumEntry {
    definition: Arc<dyn EnumDefinition>,
    module: Option<Hash64>,
}

// -----------------------------------------------------------------------------
// ReflectionManager

/// Owns every class and enum definition.
///
/// Registration needs `&mut self` and happens while modules load.
/// Afterwards the manager is only read, and the definitions it hands
/// out are `Send + Sync`.
///
/// # Examples
///
/// ```
/// use shib_reflect::prelude::*;
///
/// trait Manager {}
///
/// #[derive(Default)]
/// struct Audio;
///
/// impl Manager for Audio {}
///
/// impl_type_name!(Audio = "Audio");
/// impl_type_name!(dyn Manager = "Manager");
///
/// let mut manager = ReflectionManager::new();
/// manager.register_type_bucket_for::<dyn Manager>();
///
/// ReflectionDefinition::<Audio>::new()
///     .interface::<dyn Manager>(trait_cast!(Audio => dyn Manager))
///     .finish(&mut manager.module_registrar("Sound"));
///
/// let bucket = manager.get_type_bucket(<dyn Manager>::TYPE_HASH).unwrap();
/// assert_eq!(bucket.len(), 1);
///
/// let sound = Hash64::of_str("Sound");
/// assert_eq!(manager.get_module_type_bucket(<dyn Manager>::TYPE_HASH, sound).unwrap().len(), 1);
///
/// manager.unload_module(sound);
/// assert!(manager.get_type_bucket(<dyn Manager>::TYPE_HASH).unwrap().is_empty());
/// assert!(manager.get_reflection_of::<Audio>().is_none());
/// ```
pub struct ReflectionManager {
    definitions: NoOpHashMap<Hash64, Arc<ClassDefinition>>,
    pending: Vec<Pending>,
    enums: NoOpHashMap<Hash64, EnumEntry>,
    type_buckets: NoOpHashMap<Hash64, Bucket>,
    attribute_buckets: NoOpHashMap<Hash64, Bucket>,
    modules: NoOpHashMap<Hash64, ModulePartition>,
}

impl Default for ReflectionManager {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl ReflectionManager {
    /// Creates an empty manager holding the built-in buckets.
    pub fn new() -> Self {
        let mut type_buckets = NoOpHashMap::default();
        type_buckets.insert(ALL_TYPES, Vec::new());
        type_buckets.insert(UNBUCKETED_TYPES, Vec::new());
        Self {
            definitions: NoOpHashMap::default(),
            pending: Vec::new(),
            enums: NoOpHashMap::default(),
            type_buckets,
            attribute_buckets: NoOpHashMap::default(),
            modules: NoOpHashMap::default(),
        }
    }

    /// Registers definitions owned by no module.
    #[inline]
    pub fn registrar(&mut self) -> Registrar<'_> {
        Registrar {
            manager: self,
            module: None,
        }
    }

    /// Registers definitions owned by the module `name`.
    #[inline]
    pub fn module_registrar(&mut self, name: impl Into<HashString64>) -> Registrar<'_> {
        Registrar {
            manager: self,
            module: Some(name.into()),
        }
    }
}

// -----------------------------------------------------------------------------
// Registration

impl ReflectionManager {
    fn register_definition(&mut self, mut definition: ClassDefinition, module: Option<HashString64>) {
        let hash = definition.hash();
        if self.definitions.contains_key(&hash) || self.get_pending(hash).is_some() {
            panic!("type '{}' is registered twice", definition.name());
        }

        let bases: Vec<Hash64> = definition.unresolved_bases().collect();
        for base in bases {
            if let Some(base) = self.definitions.get(&base) {
                definition.resolve_base(base);
            }
        }

        if definition.bases_remaining() == 0 {
            self.define(definition, module);
        } else {
            log::debug!(
                target: LOG_CHANNEL,
                "'{}' waits for {} bases",
                definition.name(),
                definition.bases_remaining(),
            );
            self.pending.push(Pending { definition, module });
        }
    }

    /// Freezes `definition` and every pending definition it unblocks.
    fn define(&mut self, definition: ClassDefinition, module: Option<HashString64>) {
        let mut queue = alloc::vec![(definition, module)];
        while let Some((mut definition, module)) = queue.pop() {
            definition.mark_defined();
            let definition = Arc::new(definition);
            self.insert_defined(&definition, module);

            let mut index = 0;
            while index < self.pending.len() {
                let pending = &mut self.pending[index].definition;
                if pending.resolve_base(&definition) && pending.bases_remaining() == 0 {
                    let Pending { definition, module } = self.pending.swap_remove(index);
                    queue.push((definition, module));
                } else {
                    index += 1;
                }
            }
        }
    }

    fn insert_defined(&mut self, definition: &Arc<ClassDefinition>, module: Option<HashString64>) {
        let hash = definition.hash();
        self.definitions.insert(hash, Arc::clone(definition));

        let mut joined = Vec::new();
        for (&bucket_hash, bucket) in &mut self.type_buckets {
            if is_interface_bucket(bucket_hash) && bucket_hash != hash && definition.has_interface(bucket_hash) {
                bucket_insert(bucket, definition);
                joined.push(bucket_hash);
            }
        }
        if joined.is_empty() {
            joined.push(UNBUCKETED_TYPES);
        }
        joined.push(ALL_TYPES);
        for builtin in [ALL_TYPES, UNBUCKETED_TYPES] {
            if joined.contains(&builtin)
                && let Some(bucket) = self.type_buckets.get_mut(&builtin)
            {
                bucket_insert(bucket, definition);
            }
        }

        for (&attribute, bucket) in &mut self.attribute_buckets {
            if definition.has_attribute(attribute) {
                bucket_insert(bucket, definition);
            }
        }

        if let Some(module) = module {
            let partition = self
                .modules
                .entry(module.hash())
                .or_insert_with(|| ModulePartition::new(module));
            partition.definitions.push(hash);
            for bucket_hash in joined {
                bucket_insert(partition.type_buckets.entry(bucket_hash).or_default(), definition);
            }
        }
    }

    fn register_enum(&mut self, definition: Arc<dyn EnumDefinition>, module: Option<HashString64>) {
        let hash = definition.hash();
        if self.enums.contains_key(&hash) {
            panic!("enum '{}' is registered twice", definition.name());
        }
        let module = module.map(|module| {
            let module_hash = module.hash();
            self.modules
                .entry(module_hash)
                .or_insert_with(|| ModulePartition::new(module))
                .enums
                .push(hash);
            module_hash
        });
        self.enums.insert(hash, EnumEntry { definition, module });
    }

    /// Creates the bucket of the types implementing the interface `hash`.
    ///
    /// Types defined earlier are added right away.
    ///
    /// # Panics
    ///
    /// Panics if the bucket already exists.
    pub fn register_type_bucket(&mut self, hash: Hash64) {
        if self.type_buckets.contains_key(&hash) {
            panic!("type bucket {hash:?} is registered twice");
        }

        let mut bucket = Bucket::new();
        for definition in self.definitions.values() {
            if definition.hash() != hash && definition.has_interface(hash) {
                bucket_insert(&mut bucket, definition);
            }
        }

        if let Some(unbucketed) = self.type_buckets.get_mut(&UNBUCKETED_TYPES) {
            unbucketed.retain(|definition| bucket.binary_search_by_key(&definition.hash(), |d| d.hash()).is_err());
        }

        for partition in self.modules.values_mut() {
            let members: Bucket = bucket
                .iter()
                .filter(|definition| partition.definitions.contains(&definition.hash()))
                .cloned()
                .collect();
            if members.is_empty() {
                continue;
            }
            if let Some(unbucketed) = partition.type_buckets.get_mut(&UNBUCKETED_TYPES) {
                unbucketed.retain(|definition| !members.iter().any(|m| m.hash() == definition.hash()));
            }
            partition.type_buckets.insert(hash, members);
        }

        self.type_buckets.insert(hash, bucket);
    }

    /// Creates the bucket of the types implementing `I`.
    #[inline]
    pub fn register_type_bucket_for<I: ?Sized + TypeName>(&mut self) {
        self.register_type_bucket(I::TYPE_HASH);
    }

    /// Creates the bucket of the types carrying the attribute `hash`.
    ///
    /// # Panics
    ///
    /// Panics if the bucket already exists.
    pub fn register_attribute_bucket(&mut self, hash: Hash64) {
        if self.attribute_buckets.contains_key(&hash) {
            panic!("attribute bucket {hash:?} is registered twice");
        }
        let mut bucket = Bucket::new();
        for definition in self.definitions.values() {
            if definition.has_attribute(hash) {
                bucket_insert(&mut bucket, definition);
            }
        }
        self.attribute_buckets.insert(hash, bucket);
    }

    #[inline]
    pub fn register_attribute_bucket_for<A: Attribute + TypeName>(&mut self) {
        self.register_attribute_bucket(A::TYPE_HASH);
    }
}

// -----------------------------------------------------------------------------
// Queries

impl ReflectionManager {
    /// Returns the defined type `hash`.
    ///
    /// Types still waiting for a base are not returned, see
    /// [`get_pending`](Self::get_pending).
    #[inline]
    pub fn get_reflection(&self, hash: Hash64) -> Option<&Arc<ClassDefinition>> {
        self.definitions.get(&hash)
    }

    #[inline]
    pub fn get_reflection_of<T: TypeName>(&self) -> Option<&Arc<ClassDefinition>> {
        self.get_reflection(T::TYPE_HASH)
    }

    /// Returns the type `hash` if it is waiting for a base.
    pub fn get_pending(&self, hash: Hash64) -> Option<&ClassDefinition> {
        self.pending
            .iter()
            .map(|pending| &pending.definition)
            .find(|definition| definition.hash() == hash)
    }

    /// Iterates over the types waiting for a base.
    pub fn pending(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.pending.iter().map(|pending| &pending.definition)
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_defined(&self, hash: Hash64) -> bool {
        self.definitions.contains_key(&hash)
    }

    /// Iterates over every defined type.
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<ClassDefinition>> {
        self.definitions.values()
    }

    /// Returns the types implementing the interface `hash`, sorted by type hash.
    ///
    /// `None` if no such bucket was registered.
    #[inline]
    pub fn get_type_bucket(&self, hash: Hash64) -> Option<&[Arc<ClassDefinition>]> {
        self.type_buckets.get(&hash).map(Vec::as_slice)
    }

    /// Returns the types of `module` implementing the interface `hash`.
    pub fn get_module_type_bucket(&self, hash: Hash64, module: Hash64) -> Option<&[Arc<ClassDefinition>]> {
        self.modules
            .get(&module)?
            .type_buckets
            .get(&hash)
            .map(Vec::as_slice)
    }

    #[inline]
    pub fn get_attribute_bucket(&self, hash: Hash64) -> Option<&[Arc<ClassDefinition>]> {
        self.attribute_buckets.get(&hash).map(Vec::as_slice)
    }

    /// Returns the types carrying the attribute `hash`.
    ///
    /// Served from the attribute bucket when one exists, otherwise every
    /// defined type is scanned.
    pub fn get_reflection_with_attribute(&self, hash: Hash64) -> Vec<Arc<ClassDefinition>> {
        if let Some(bucket) = self.attribute_buckets.get(&hash) {
            return bucket.clone();
        }
        let mut found: Bucket = self
            .definitions
            .values()
            .filter(|definition| definition.has_attribute(hash))
            .cloned()
            .collect();
        found.sort_by_key(|definition| definition.hash());
        found
    }

    /// Returns the types of `module` carrying the attribute `hash`.
    pub fn get_reflection_with_attribute_in_module(&self, hash: Hash64, module: Hash64) -> Vec<Arc<ClassDefinition>> {
        let Some(partition) = self.modules.get(&module) else {
            return Vec::new();
        };
        let mut found: Bucket = partition
            .definitions
            .iter()
            .filter_map(|hash| self.definitions.get(hash))
            .filter(|definition| definition.has_attribute(hash))
            .cloned()
            .collect();
        found.sort_by_key(|definition| definition.hash());
        found
    }

    #[inline]
    pub fn get_enum_reflection(&self, hash: Hash64) -> Option<&Arc<dyn EnumDefinition>> {
        self.enums.get(&hash).map(|entry| &entry.definition)
    }

    #[inline]
    pub fn get_enum_reflection_of<E: TypeName>(&self) -> Option<&Arc<dyn EnumDefinition>> {
        self.get_enum_reflection(E::TYPE_HASH)
    }

    /// Returns the enums carrying the attribute `hash`.
    pub fn get_enum_reflection_with_attribute(&self, hash: Hash64) -> Vec<Arc<dyn EnumDefinition>> {
        self.enums
            .values()
            .filter(|entry| entry.definition.attrs().contains_hash(hash))
            .map(|entry| Arc::clone(&entry.definition))
            .collect()
    }

    #[inline]
    pub fn get_module(&self, hash: Hash64) -> Option<&ModulePartition> {
        self.modules.get(&hash)
    }

    /// Iterates over the modules that registered types.
    pub fn modules(&self) -> impl Iterator<Item = &ModulePartition> {
        self.modules.values()
    }
}

// -----------------------------------------------------------------------------
// Unloading

impl ReflectionManager {
    /// Drops every type registered by the module `hash`.
    ///
    /// Types of other modules deriving from a dropped type are dropped
    /// with it. Unknown modules are ignored. Definitions already
    /// handed out stay alive until their last `Arc` is dropped.
    pub fn unload_module(&mut self, hash: Hash64) {
        let mut removed = Vec::new();
        self.pending.retain(|pending| {
            let owned = pending.module.as_ref().is_some_and(|module| module.hash() == hash);
            if owned {
                removed.push(pending.definition.hash());
            }
            !owned
        });

        let partition = self.modules.remove(&hash);
        if let Some(partition) = &partition {
            removed.extend_from_slice(&partition.definitions);
        }
        let owned = removed.len();
        self.collect_dependents(&mut removed);

        for dependent in &removed[owned..] {
            let name = self
                .definitions
                .get(dependent)
                .map(|definition| definition.name())
                .or_else(|| {
                    self.pending
                        .iter()
                        .find(|pending| pending.definition.hash() == *dependent)
                        .map(|pending| pending.definition.name())
                });
            if let Some(name) = name {
                log::warn!(
                    target: LOG_CHANNEL,
                    "dropping '{name}': it derives from a type of the unloaded module",
                );
            }
        }

        self.pending
            .retain(|pending| !removed.contains(&pending.definition.hash()));
        for definition in &removed {
            self.definitions.remove(definition);
            for bucket in self.type_buckets.values_mut() {
                bucket_remove(bucket, *definition);
            }
            for bucket in self.attribute_buckets.values_mut() {
                bucket_remove(bucket, *definition);
            }
        }
        for other in self.modules.values_mut() {
            other.definitions.retain(|definition| !removed.contains(definition));
            for bucket in other.type_buckets.values_mut() {
                bucket.retain(|definition| !removed.contains(&definition.hash()));
            }
        }

        let Some(partition) = partition else {
            return;
        };
        for definition in &partition.enums {
            if self.enums.get(definition).is_some_and(|entry| entry.module == Some(hash)) {
                self.enums.remove(definition);
            }
        }

        log::info!(
            target: LOG_CHANNEL,
            "unloaded module '{}': {} types, {} enums, {} dependent types",
            partition.name,
            partition.definitions.len(),
            partition.enums.len(),
            removed.len() - owned,
        );
    }

    /// Extends `removed` with every type deriving from one of its types.
    fn collect_dependents(&self, removed: &mut Vec<Hash64>) {
        loop {
            let dependents: Vec<Hash64> = self
                .definitions
                .values()
                .map(|definition| &**definition)
                .chain(self.pending.iter().map(|pending| &pending.definition))
                .filter(|definition| {
                    !removed.contains(&definition.hash())
                        && definition.bases().iter().any(|base| removed.contains(&base.hash()))
                })
                .map(ClassDefinition::hash)
                .collect();
            if dependents.is_empty() {
                return;
            }
            removed.extend(dependents);
        }
    }

    /// Drops every definition and bucket.
    pub fn destroy(&mut self) {
        *self = Self::new();
    }
}

// -----------------------------------------------------------------------------
// Registrar

/// Registers definitions into a [`ReflectionManager`], tagged with the
/// owning module.
pub struct Registrar<'a> {
    manager: &'a mut ReflectionManager,
    module: Option<HashString64>,
}

impl Registrar<'_> {
    /// Registers a class.
    ///
    /// # Panics
    ///
    /// Panics if the type is already registered.
    #[inline]
    pub fn register(&mut self, definition: ClassDefinition) {
        self.manager.register_definition(definition, self.module.clone());
    }

    /// Registers an enum.
    ///
    /// # Panics
    ///
    /// Panics if the enum is already registered.
    #[inline]
    pub fn register_enum(&mut self, definition: Arc<dyn EnumDefinition>) {
        self.manager.register_enum(definition, self.module.clone());
    }

    /// The module the definitions are registered for.
    #[inline]
    pub fn module(&self) -> Option<&HashString64> {
        self.module.as_ref()
    }

    /// The manager being registered into.
    #[inline]
    pub fn manager(&mut self) -> &mut ReflectionManager {
        self.manager
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use shib_utils::Hash64;

    use super::{ALL_TYPES, ReflectionManager, UNBUCKETED_TYPES};
    use crate::attribute::ReadOnlyAttribute;
    use crate::definition::{EnumReflectionDefinition, ReflectionDefinition};
    use crate::{TypeName, field, impl_type_name, trait_cast};

    trait Renderer {
        fn id(&self) -> u32;
    }

    #[derive(Default)]
    struct Forward;
    #[derive(Default)]
    struct Deferred;
    #[derive(Default)]
    struct Plain;

    impl Renderer for Forward {
        fn id(&self) -> u32 {
            1
        }
    }
    impl Renderer for Deferred {
        fn id(&self) -> u32 {
            2
        }
    }

    impl_type_name!(dyn Renderer = "Renderer");
    impl_type_name!(Forward = "Forward");
    impl_type_name!(Deferred = "Deferred");
    impl_type_name!(Plain = "Plain");

    #[derive(Default)]
    struct Root {
        a: i32,
    }
    #[derive(Default)]
    struct Middle {
        root: Root,
        b: i32,
    }
    #[derive(Default)]
    struct Leaf {
        middle: Middle,
        c: i32,
    }

    impl_type_name!(Root = "Root");
    impl_type_name!(Middle = "Middle");
    impl_type_name!(Leaf = "Leaf");

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        On,
    }

    impl_type_name!(Mode = "Mode");

    fn renderers(manager: &mut ReflectionManager) {
        ReflectionDefinition::<Forward>::new()
            .interface::<dyn Renderer>(trait_cast!(Forward => dyn Renderer))
            .finish(&mut manager.module_registrar("Graphics"));
        ReflectionDefinition::<Deferred>::new()
            .interface::<dyn Renderer>(trait_cast!(Deferred => dyn Renderer))
            .finish(&mut manager.module_registrar("Extra"));
        ReflectionDefinition::<Plain>::new().finish(&mut manager.module_registrar("Extra"));
    }

    #[test]
    fn buckets_across_modules() {
        let mut manager = ReflectionManager::new();
        manager.register_type_bucket_for::<dyn Renderer>();
        renderers(&mut manager);

        let renderer = <dyn Renderer>::TYPE_HASH;
        let graphics = Hash64::of_str("Graphics");
        let extra = Hash64::of_str("Extra");

        assert_eq!(manager.get_type_bucket(renderer).unwrap().len(), 2);
        assert_eq!(manager.get_module_type_bucket(renderer, graphics).unwrap().len(), 1);
        assert_eq!(manager.get_module_type_bucket(renderer, extra).unwrap().len(), 1);
        assert_eq!(manager.get_type_bucket(ALL_TYPES).unwrap().len(), 3);
        assert_eq!(manager.get_type_bucket(UNBUCKETED_TYPES).unwrap().len(), 1);

        manager.unload_module(extra);
        let bucket = manager.get_type_bucket(renderer).unwrap();
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].hash(), Forward::TYPE_HASH);
        assert!(manager.get_type_bucket(UNBUCKETED_TYPES).unwrap().is_empty());
        assert!(manager.get_module_type_bucket(renderer, extra).is_none());
        assert!(!manager.is_defined(Deferred::TYPE_HASH));

        manager.unload_module(extra);
        assert_eq!(manager.get_type_bucket(ALL_TYPES).unwrap().len(), 1);
    }

    #[test]
    fn late_buckets_are_backfilled() {
        let mut manager = ReflectionManager::new();
        renderers(&mut manager);
        assert_eq!(manager.get_type_bucket(UNBUCKETED_TYPES).unwrap().len(), 3);
        assert!(manager.get_type_bucket(<dyn Renderer>::TYPE_HASH).is_none());

        manager.register_type_bucket_for::<dyn Renderer>();
        let bucket = manager.get_type_bucket(<dyn Renderer>::TYPE_HASH).unwrap();
        assert_eq!(bucket.len(), 2);
        assert!(bucket.windows(2).all(|pair| pair[0].hash() < pair[1].hash()));

        let unbucketed = manager.get_type_bucket(UNBUCKETED_TYPES).unwrap();
        assert_eq!(unbucketed.len(), 1);
        assert_eq!(unbucketed[0].hash(), Plain::TYPE_HASH);

        let graphics = Hash64::of_str("Graphics");
        assert_eq!(
            manager
                .get_module_type_bucket(<dyn Renderer>::TYPE_HASH, graphics)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn bucket_members_cast_to_the_interface() {
        let mut manager = ReflectionManager::new();
        manager.register_type_bucket_for::<dyn Renderer>();
        ReflectionDefinition::<Forward>::new()
            .interface::<dyn Renderer>(trait_cast!(Forward => dyn Renderer))
            .default_ctor()
            .finish(&mut manager.registrar());

        let ids: Vec<u32> = manager
            .get_type_bucket(<dyn Renderer>::TYPE_HASH)
            .unwrap()
            .iter()
            .filter_map(|definition| definition.create_t::<dyn Renderer, ()>(()))
            .map(|renderer| renderer.id())
            .collect();
        assert_eq!(ids, [1]);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_buckets_panic() {
        let mut manager = ReflectionManager::new();
        manager.register_type_bucket_for::<dyn Renderer>();
        manager.register_type_bucket_for::<dyn Renderer>();
    }

    #[test]
    #[should_panic(expected = "type 'Plain' is registered twice")]
    fn duplicate_types_panic() {
        let mut manager = ReflectionManager::new();
        ReflectionDefinition::<Plain>::new().finish(&mut manager.registrar());
        ReflectionDefinition::<Plain>::new().finish(&mut manager.registrar());
    }

    #[test]
    fn deferred_bases_cascade() {
        let mut manager = ReflectionManager::new();
        let mut registrar = manager.registrar();
        ReflectionDefinition::<Leaf>::new()
            .base::<Middle>(field!(Leaf, middle))
            .var("c", field!(Leaf, c), &[])
            .finish(&mut registrar);
        ReflectionDefinition::<Middle>::new()
            .base::<Root>(field!(Middle, root))
            .var("b", field!(Middle, b), &[])
            .finish(&mut registrar);

        assert_eq!(manager.pending_count(), 2);
        assert!(manager.get_reflection_of::<Leaf>().is_none());
        assert!(!manager.get_pending(Leaf::TYPE_HASH).unwrap().is_defined());

        ReflectionDefinition::<Root>::new()
            .var("a", field!(Root, a), &[])
            .finish(&mut manager.registrar());

        assert_eq!(manager.pending_count(), 0);
        let leaf = manager.get_reflection_of::<Leaf>().unwrap();
        assert!(leaf.is_defined());
        let names: Vec<&str> = leaf.vars().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);

        let value = Leaf {
            middle: Middle { root: Root { a: 7 }, b: 8 },
            c: 9,
        };
        let a = leaf.get_var_by_name("a").unwrap().get_data(&value).unwrap();
        assert_eq!(a.downcast_ref::<i32>(), Some(&7));
        assert_eq!(leaf.get_base::<Root>(&value).unwrap().a, 7);
    }

    #[test]
    fn unloading_drops_pending_types() {
        let mut manager = ReflectionManager::new();
        ReflectionDefinition::<Leaf>::new()
            .base::<Middle>(field!(Leaf, middle))
            .finish(&mut manager.module_registrar("Game"));
        assert_eq!(manager.pending_count(), 1);

        manager.unload_module(Hash64::of_str("Game"));
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn unloading_drops_derived_types_of_other_modules() {
        let mut manager = ReflectionManager::new();
        manager.register_type_bucket_for::<dyn Renderer>();
        ReflectionDefinition::<Root>::new()
            .var("a", field!(Root, a), &[])
            .finish(&mut manager.module_registrar("Core"));
        ReflectionDefinition::<Middle>::new()
            .base::<Root>(field!(Middle, root))
            .var("b", field!(Middle, b), &[])
            .finish(&mut manager.module_registrar("Game"));
        ReflectionDefinition::<Leaf>::new()
            .base::<Middle>(field!(Leaf, middle))
            .finish(&mut manager.module_registrar("Editor"));
        ReflectionDefinition::<Forward>::new()
            .interface::<dyn Renderer>(trait_cast!(Forward => dyn Renderer))
            .finish(&mut manager.module_registrar("Game"));
        assert!(manager.get_reflection_of::<Leaf>().is_some());

        manager.unload_module(Hash64::of_str("Core"));

        assert!(manager.get_reflection_of::<Root>().is_none());
        assert!(manager.get_reflection_of::<Middle>().is_none());
        assert!(manager.get_reflection_of::<Leaf>().is_none());
        assert!(manager.get_reflection_of::<Forward>().is_some());

        let game = manager.get_module(Hash64::of_str("Game")).unwrap();
        assert_eq!(game.definitions(), [Forward::TYPE_HASH]);
        assert!(manager.get_module(Hash64::of_str("Editor")).unwrap().definitions().is_empty());
        assert_eq!(manager.get_type_bucket(ALL_TYPES).unwrap().len(), 1);
        assert_eq!(
            manager
                .get_module_type_bucket(ALL_TYPES, Hash64::of_str("Game"))
                .map_or(0, |bucket| bucket.len()),
            1
        );
    }

    #[test]
    fn unloading_drops_types_waiting_on_the_module() {
        let mut manager = ReflectionManager::new();
        ReflectionDefinition::<Middle>::new()
            .base::<Root>(field!(Middle, root))
            .finish(&mut manager.module_registrar("Core"));
        ReflectionDefinition::<Leaf>::new()
            .base::<Middle>(field!(Leaf, middle))
            .finish(&mut manager.module_registrar("Game"));
        assert_eq!(manager.pending_count(), 2);

        manager.unload_module(Hash64::of_str("Core"));
        assert_eq!(manager.pending_count(), 0);
        assert!(manager.get_pending(Leaf::TYPE_HASH).is_none());
    }

    #[test]
    fn attribute_buckets() {
        let mut manager = ReflectionManager::new();
        ReflectionDefinition::<Root>::new()
            .var("a", field!(Root, a), &[&ReadOnlyAttribute])
            .finish(&mut manager.registrar());
        manager.register_attribute_bucket_for::<ReadOnlyAttribute>();
        ReflectionDefinition::<Plain>::new()
            .class_attrs(&[&ReadOnlyAttribute])
            .finish(&mut manager.registrar());
        ReflectionDefinition::<Forward>::new().finish(&mut manager.registrar());

        let bucket = manager.get_attribute_bucket(ReadOnlyAttribute::TYPE_HASH).unwrap();
        assert_eq!(bucket.len(), 2);
        assert_eq!(manager.get_reflection_with_attribute(ReadOnlyAttribute::TYPE_HASH).len(), 2);
        assert!(manager.get_reflection_with_attribute(Hash64::of_str("Missing")).is_empty());
    }

    #[test]
    fn enums_belong_to_modules() {
        let mut manager = ReflectionManager::new();
        EnumReflectionDefinition::<Mode>::new()
            .entry("On", Mode::On)
            .enum_attrs(&[&ReadOnlyAttribute])
            .finish(&mut manager.module_registrar("Game"));

        let mode = manager.get_enum_reflection_of::<Mode>().unwrap();
        assert_eq!(mode.entry_name_of(&Mode::On), Some("On"));
        assert_eq!(manager.get_enum_reflection_with_attribute(ReadOnlyAttribute::TYPE_HASH).len(), 1);

        manager.unload_module(Hash64::of_str("Game"));
        assert!(manager.get_enum_reflection(Mode::TYPE_HASH).is_none());
    }

    #[test]
    fn destroy_clears_everything() {
        let mut manager = ReflectionManager::new();
        renderers(&mut manager);
        manager.destroy();
        assert_eq!(manager.definitions().count(), 0);
        assert_eq!(manager.modules().count(), 0);
        assert!(manager.get_type_bucket(ALL_TYPES).unwrap().is_empty());
    }
}
