use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use core::marker::PhantomData;

use bitflags::Flags;
use shib_utils::{Hash64, HashString32};

use super::class::{BaseClass, ClassDefinition};
use super::function::{
    Factory, FunctionOverload, ReflectionFunction, ReflectionStaticFunction, args_hash, ctor_hash,
};
use super::interface::{InterfaceCaster, TraitCast};
use crate::attribute::{Attribute, AttributeList};
use crate::error::{LoadError, SaveError, VarError};
use crate::manager::{ReflectionManager, Registrar};
use crate::serialize::{SerializeReader, SerializeWriter};
use crate::var::{
    ArrayPtr, Field, MapKey, MapPtr, ReflectionVar, Upcast, VarFlagPtr, VarFlagsPtr, VarFuncPtr,
    VarFuncPtrWithCache, VarPtr, VectorPtr,
};
use crate::{Reflect, TypeName};

// -----------------------------------------------------------------------------
// ReflectionDefinition

/// Builds the [`ClassDefinition`] of `T`.
///
/// Every registration method consumes and returns the builder. Attribute
/// slices are cloned into the definition, and each attribute's
/// `apply_*` hook runs as its target is added.
///
/// Registration mistakes are programmer errors and panic: duplicate
/// var names, duplicate function signatures, more than
/// [`MAX_OVERLOADS`](super::MAX_OVERLOADS) overloads of one name,
/// duplicate constructors, bases and interfaces, and attributes that
/// reject their var.
///
/// # Examples
///
/// ```
/// use shib_reflect::prelude::*;
///
/// trait Drawable { fn layer(&self) -> u8; }
///
/// #[derive(Default)]
/// struct Node { visible: bool }
///
/// #[derive(Default)]
/// struct Sprite { node: Node, layer: u8 }
///
/// impl Drawable for Sprite { fn layer(&self) -> u8 { self.layer } }
///
/// impl_type_name!(Node = "Node");
/// impl_type_name!(Sprite = "Sprite");
/// impl_type_name!(dyn Drawable = "Drawable");
///
/// let mut manager = ReflectionManager::new();
/// let mut registrar = manager.registrar();
///
/// // Registered before its base, resolved once `Node` is defined.
/// ReflectionDefinition::<Sprite>::new()
///     .base::<Node>(field!(Sprite, node))
///     .interface::<dyn Drawable>(trait_cast!(Sprite => dyn Drawable))
///     .var("layer", field!(Sprite, layer), &[])
///     .default_ctor()
///     .finish(&mut registrar);
///
/// ReflectionDefinition::<Node>::new()
///     .var("visible", field!(Node, visible), &[])
///     .finish(&mut registrar);
///
/// let sprite_def = manager.get_reflection_of::<Sprite>().unwrap();
/// assert_eq!(sprite_def.num_vars(), 2);
///
/// let sprite = Sprite { node: Node { visible: true }, layer: 3 };
/// assert!(sprite_def.get_base::<Node>(&sprite).unwrap().visible);
/// assert_eq!(sprite_def.cast_ref::<dyn Drawable>(&sprite).unwrap().layer(), 3);
///
/// let drawable = sprite_def.create_t::<dyn Drawable, ()>(()).unwrap();
/// assert_eq!(drawable.layer(), 0);
/// ```
pub struct ReflectionDefinition<T> {
    definition: ClassDefinition,
    _marker: PhantomData<fn() -> T>,
}

impl<T: TypeName> Default for ReflectionDefinition<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TypeName> ReflectionDefinition<T> {
    /// Starts the definition of `T`.
    pub fn new() -> Self {
        Self {
            definition: ClassDefinition::new(T::TYPE_NAME, TypeId::of::<T>(), size_of::<T>()),
            _marker: PhantomData,
        }
    }

    /// Sets the display name.
    pub fn friendly_name(mut self, name: &'static str) -> Self {
        self.definition.set_friendly_name(name);
        self
    }

    /// Adds a custom var.
    ///
    /// # Panics
    ///
    /// Panics if `name` is taken or an attribute rejects the var.
    pub fn add_var(mut self, name: &'static str, mut var: impl ReflectionVar + 'static, attrs: &[&dyn Attribute]) -> Self {
        let mut list = AttributeList::new();
        for attr in attrs {
            let attr = attr.clone_attribute();
            if let Err(err) = attr.apply_var(&mut var) {
                panic!(
                    "attribute '{}' rejects var '{name}' of '{}': {err}",
                    attr.attribute_name(),
                    T::TYPE_NAME,
                );
            }
            list.push(attr);
        }
        self.definition.insert_var(name, Arc::new(var), list);
        self
    }

    /// Adds a var over a plain member.
    #[inline]
    pub fn var<V: Reflect + Clone>(self, name: &'static str, field: Field<T, V>, attrs: &[&dyn Attribute]) -> Self {
        self.add_var(name, VarPtr::new(field), attrs)
    }

    /// Adds a var accessed through a getter returning a reference.
    #[inline]
    pub fn var_fn<V: Reflect + Clone>(
        self,
        name: &'static str,
        getter: fn(&T) -> &V,
        setter: fn(&mut T, V),
        attrs: &[&dyn Attribute],
    ) -> Self {
        self.add_var(name, VarFuncPtr::new(getter, setter), attrs)
    }

    /// Adds a var accessed through a getter returning a value.
    #[inline]
    pub fn var_fn_cached<V: Reflect + Clone>(
        self,
        name: &'static str,
        getter: fn(&T) -> V,
        setter: fn(&mut T, V),
        attrs: &[&dyn Attribute],
    ) -> Self {
        self.add_var(name, VarFuncPtrWithCache::new(getter, setter), attrs)
    }

    #[inline]
    pub fn var_vec<V: Reflect + Clone + Default>(
        self,
        name: &'static str,
        field: Field<T, Vec<V>>,
        attrs: &[&dyn Attribute],
    ) -> Self {
        self.add_var(name, VectorPtr::new(field), attrs)
    }

    #[inline]
    pub fn var_array<V: Reflect + Clone, const N: usize>(
        self,
        name: &'static str,
        field: Field<T, [V; N]>,
        attrs: &[&dyn Attribute],
    ) -> Self {
        self.add_var(name, ArrayPtr::new(field), attrs)
    }

    #[inline]
    pub fn var_map<K: MapKey, V: Reflect + Clone + Default>(
        self,
        name: &'static str,
        field: Field<T, BTreeMap<K, V>>,
        attrs: &[&dyn Attribute],
    ) -> Self {
        self.add_var(name, MapPtr::new(field), attrs)
    }

    /// Adds a var over a whole `bitflags` member.
    #[inline]
    pub fn var_flags<F: Flags + TypeName + Copy + Send + Sync>(
        self,
        name: &'static str,
        field: Field<T, F>,
        attrs: &[&dyn Attribute],
    ) -> Self {
        self.add_var(name, VarFlagsPtr::new(field), attrs)
    }

    /// Adds a `bool` var over the flag `flag` of a `bitflags` member.
    #[inline]
    pub fn var_flag<F: Flags + Copy + Send + Sync + 'static>(
        self,
        name: &'static str,
        field: Field<T, F>,
        flag: &str,
        attrs: &[&dyn Attribute],
    ) -> Self {
        self.add_var(name, VarFlagPtr::new(field, flag), attrs)
    }

    /// Declares `B`, stored in `field`, as a base of `T`.
    ///
    /// The vars of `B` are inserted at the current position once `B` is
    /// defined in the manager, its interfaces become interfaces of `T`.
    pub fn base<B: TypeName>(mut self, field: Field<T, B>) -> Self {
        let insert_index = self.definition.own_var_count();
        let base = BaseClass::new(B::TYPE_NAME, B::TYPE_HASH, Arc::new(Upcast::new(field)), insert_index);
        self.definition.insert_base(base);
        self
    }

    /// Declares that `T` implements the interface `I`.
    pub fn interface<I: ?Sized + TypeName>(mut self, caster: impl InterfaceCaster<I> + 'static) -> Self {
        let caster: Arc<dyn InterfaceCaster<I>> = Arc::new(caster);
        self.definition.insert_interface(Box::new(TraitCast::new(caster)));
        self
    }

    fn add_func(
        mut self,
        is_static: bool,
        name: &'static str,
        args_hash: Hash64,
        func: Box<dyn Any + Send + Sync>,
        attrs: &[&dyn Attribute],
    ) -> Self {
        let key = HashString32::from_static(name);
        let attrs = AttributeList::cloned_from(attrs);
        for attr in attrs.iter() {
            attr.apply_func(&key, args_hash);
        }
        let overload = FunctionOverload {
            args_hash,
            func,
            attrs,
        };
        self.definition.insert_overload(is_static, name, overload);
        self
    }

    /// Adds a method taking `&T`.
    pub fn func<Args: 'static, Ret: 'static>(
        self,
        name: &'static str,
        func: fn(&T, Args) -> Ret,
        attrs: &[&dyn Attribute],
    ) -> Self {
        let func = ReflectionFunction::new_const(func, T::TYPE_NAME);
        self.add_func(false, name, args_hash::<Args, Ret>(), Box::new(func), attrs)
    }

    /// Adds a method taking `&mut T`.
    pub fn func_mut<Args: 'static, Ret: 'static>(
        self,
        name: &'static str,
        func: fn(&mut T, Args) -> Ret,
        attrs: &[&dyn Attribute],
    ) -> Self {
        let func = ReflectionFunction::new_mut(func, T::TYPE_NAME);
        self.add_func(false, name, args_hash::<Args, Ret>(), Box::new(func), attrs)
    }

    /// Adds an associated function.
    pub fn static_func<Args: 'static, Ret: 'static>(
        self,
        name: &'static str,
        func: fn(Args) -> Ret,
        attrs: &[&dyn Attribute],
    ) -> Self {
        let func = ReflectionStaticFunction::new(func);
        self.add_func(true, name, args_hash::<Args, Ret>(), Box::new(func), attrs)
    }

    /// Adds a constructor taking `Args`.
    pub fn ctor<Args: 'static>(mut self, ctor: fn(Args) -> T) -> Self {
        self.definition
            .insert_factory(ctor_hash::<Args>(), Box::new(Factory::new(ctor)));
        self
    }

    /// Adds the constructor taking `()` that uses [`Default`].
    #[inline]
    pub fn default_ctor(self) -> Self
    where
        T: Default,
    {
        self.ctor(|()| T::default())
    }

    /// Attaches attributes to the class.
    pub fn class_attrs(mut self, attrs: &[&dyn Attribute]) -> Self {
        for attr in attrs {
            let attr = attr.clone_attribute();
            attr.apply_class(&mut self.definition);
            self.definition.push_class_attr(attr);
        }
        self
    }

    /// Replaces var-by-var serialization with custom functions.
    pub fn serialize(
        mut self,
        load: fn(&mut T, &mut dyn SerializeReader, &ReflectionManager) -> Result<(), LoadError>,
        save: fn(&T, &mut dyn SerializeWriter, &ReflectionManager) -> Result<(), SaveError>,
    ) -> Self {
        let load = move |reader: &mut dyn SerializeReader, object: &mut dyn Any, registry: &ReflectionManager| {
            let object = object
                .downcast_mut::<T>()
                .ok_or(VarError::ObjectMismatch { expected: T::TYPE_NAME })?;
            load(object, reader, registry)
        };
        let save = move |writer: &mut dyn SerializeWriter, object: &dyn Any, registry: &ReflectionManager| {
            let object = object
                .downcast_ref::<T>()
                .ok_or(VarError::ObjectMismatch { expected: T::TYPE_NAME })?;
            save(object, writer, registry)
        };
        self.definition.set_serializer(Box::new(load), Box::new(save));
        self
    }

    /// Replaces var-by-var hashing with a custom function.
    pub fn instance_hash(mut self, hash: fn(&T, Hash64, &ReflectionManager) -> Hash64) -> Self {
        let hash = move |object: &dyn Any, init: Hash64, registry: &ReflectionManager| {
            object
                .downcast_ref::<T>()
                .map_or(init, |object| hash(object, init, registry))
        };
        self.definition.set_instance_hash(Box::new(hash));
        self
    }

    /// Registers the definition.
    ///
    /// # Panics
    ///
    /// Panics if `T` is already registered.
    #[inline]
    pub fn finish(self, registrar: &mut Registrar<'_>) {
        registrar.register(self.definition);
    }

    /// Returns the unregistered definition.
    #[inline]
    pub fn into_definition(self) -> ClassDefinition {
        self.definition
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::vec::Vec;

    use serde_json::json;

    use super::ReflectionDefinition;
    use crate::definition::EnumReflectionDefinition;
    use crate::attribute::{
        NoCopyAttribute, NoSerializeAttribute, OptionalAttribute, RangeAttribute, ReadOnlyAttribute,
    };
    use crate::error::{CallError, LoadError, VarError};
    use crate::manager::ReflectionManager;
    use crate::serialize::{JsonReader, JsonWriter};
    use crate::{field, impl_reflect_class, impl_reflect_enum, impl_type_name};

    #[derive(Default, Debug, PartialEq)]
    struct Stats {
        a: i32,
        names: Vec<String>,
        hint: String,
        secret: u32,
        id: u64,
    }

    impl_type_name!(Stats = "Stats");

    fn stats_manager() -> ReflectionManager {
        let mut manager = ReflectionManager::new();
        ReflectionDefinition::<Stats>::new()
            .var("a", field!(Stats, a), &[])
            .var_vec("names", field!(Stats, names), &[])
            .var("hint", field!(Stats, hint), &[&OptionalAttribute])
            .var("secret", field!(Stats, secret), &[&NoSerializeAttribute])
            .var("id", field!(Stats, id), &[&ReadOnlyAttribute, &NoCopyAttribute, &OptionalAttribute])
            .func("total", |s: &Stats, (extra,): (i32,)| s.a + extra, &[])
            .func("total", |s: &Stats, (): ()| s.a, &[])
            .func_mut("reset", |s: &mut Stats, (): ()| s.a = 0, &[])
            .static_func("zero", |(): ()| 0_i32, &[])
            .default_ctor()
            .ctor(|(a,): (i32,)| Stats { a, ..Stats::default() })
            .finish(&mut manager.registrar());
        manager
    }

    #[test]
    fn vars_round_trip() {
        let manager = stats_manager();
        let def = manager.get_reflection_of::<Stats>().unwrap();

        let json = json!({ "a": 5, "names": ["x", "y"] });
        let mut stats = Stats::default();
        def.load(&mut JsonReader::new(&json), &mut stats, &manager).unwrap();
        assert_eq!(stats.a, 5);
        assert_eq!(stats.names, ["x", "y"]);

        let mut writer = JsonWriter::new();
        def.save(&mut writer, &stats, &manager).unwrap();
        assert_eq!(
            writer.finish(),
            json!({ "a": 5, "names": ["x", "y"], "hint": "", "id": 0 })
        );
    }

    #[test]
    fn optional_fields_keep_their_value() {
        let manager = stats_manager();
        let def = manager.get_reflection_of::<Stats>().unwrap();

        let mut stats = Stats { hint: String::from("keep"), secret: 9, ..Stats::default() };
        let json = json!({ "a": 1, "names": [] });
        def.load(&mut JsonReader::new(&json), &mut stats, &manager).unwrap();
        assert_eq!(stats.hint, "keep");
        assert_eq!(stats.secret, 9);

        let missing = json!({ "names": [] });
        assert_eq!(
            def.load(&mut JsonReader::new(&missing), &mut stats, &manager),
            Err(LoadError::MissingField { type_name: "Stats", field: "a".into() })
        );
    }

    #[test]
    fn load_errors_name_the_field() {
        let manager = stats_manager();
        let def = manager.get_reflection_of::<Stats>().unwrap();
        let json = json!({ "a": "five", "names": [] });
        let err = def
            .load(&mut JsonReader::new(&json), &mut Stats::default(), &manager)
            .unwrap_err();
        assert!(matches!(&err, LoadError::Field { field, .. } if field == "a"));

        let not_object = json!([1]);
        assert_eq!(
            def.load(&mut JsonReader::new(&not_object), &mut Stats::default(), &manager),
            Err(LoadError::TypeMismatch { expected: "an object" })
        );
    }

    #[test]
    fn read_only_vars_reject_writes() {
        let manager = stats_manager();
        let def = manager.get_reflection_of::<Stats>().unwrap();
        let id = def.get_var_by_name("id").unwrap();
        let mut stats = Stats::default();
        assert_eq!(id.set_data(&mut stats, &7_u64), Err(VarError::ReadOnly));

        let json = json!({ "a": 0, "names": [], "id": 7 });
        def.load(&mut JsonReader::new(&json), &mut stats, &manager).unwrap();
        assert_eq!(stats.id, 7);
    }

    #[test]
    fn copy_skips_no_copy_vars() {
        let manager = stats_manager();
        let def = manager.get_reflection_of::<Stats>().unwrap();
        let src = Stats { a: 3, names: vec![String::from("n")], id: 4, ..Stats::default() };
        let mut dst = Stats::default();
        def.copy(&mut dst, &src).unwrap();
        assert_eq!(dst.a, 3);
        assert_eq!(dst.names, src.names);
        assert_eq!(dst.id, 0);
    }

    #[test]
    fn functions_and_overloads() {
        let manager = stats_manager();
        let def = manager.get_reflection_of::<Stats>().unwrap();
        assert_eq!(def.num_funcs(), 2);
        assert_eq!(def.func_overloads("total").len(), 2);

        let mut stats = Stats { a: 2, ..Stats::default() };
        let with_extra = def.get_func::<(i32,), i32>("total").unwrap();
        assert_eq!(with_extra.call(&stats, (5,)), Ok(7));
        assert_eq!(def.get_func::<(), i32>("total").unwrap().call(&stats, ()), Ok(2));
        assert!(def.get_func::<(u8,), i32>("total").is_none());

        let reset = def.get_func::<(), ()>("reset").unwrap();
        assert_eq!(reset.call(&stats, ()), Err(CallError::NotConst));
        reset.call_mut(&mut stats, ()).unwrap();
        assert_eq!(stats.a, 0);

        assert_eq!(def.get_static_func::<(), i32>("zero").unwrap().call(()), 0);
    }

    #[test]
    fn factories() {
        let manager = stats_manager();
        let def = manager.get_reflection_of::<Stats>().unwrap();
        assert_eq!(def.num_factories(), 2);

        let created = def.create((6,)).unwrap();
        assert_eq!(created.downcast_ref::<Stats>().unwrap().a, 6);

        let mut stats = Stats { a: 1, ..Stats::default() };
        assert!(def.construct(&mut stats, ()));
        assert_eq!(stats, Stats::default());
        assert!(!def.construct(&mut stats, (1_u8,)));
    }

    #[derive(Default, Clone, Copy, PartialEq, Debug)]
    enum Blend {
        #[default]
        Opaque,
        Additive,
    }

    #[derive(Default, Clone)]
    struct Tint {
        r: f32,
    }

    #[derive(Default)]
    struct Material {
        tint: Tint,
        blend: Blend,
    }

    impl_type_name!(Blend = "Blend");
    impl_type_name!(Tint = "Tint");
    impl_type_name!(Material = "Material");
    impl_reflect_enum!(Blend);
    impl_reflect_class!(Tint);

    #[test]
    fn nested_classes_and_enums() {
        let mut manager = ReflectionManager::new();
        let mut registrar = manager.registrar();
        EnumReflectionDefinition::<Blend>::new()
            .entry("Opaque", Blend::Opaque)
            .entry("Additive", Blend::Additive)
            .finish(&mut registrar);
        ReflectionDefinition::<Material>::new()
            .var("tint", field!(Material, tint), &[])
            .var("blend", field!(Material, blend), &[])
            .finish(&mut registrar);
        ReflectionDefinition::<Tint>::new()
            .var("r", field!(Tint, r), &[])
            .finish(&mut registrar);

        let def = manager.get_reflection_of::<Material>().unwrap();
        let json = json!({ "tint": { "r": 0.5 }, "blend": "Additive" });
        let mut material = Material::default();
        def.load(&mut JsonReader::new(&json), &mut material, &manager).unwrap();
        assert_eq!(material.tint.r, 0.5);
        assert_eq!(material.blend, Blend::Additive);

        let mut writer = JsonWriter::new();
        def.save(&mut writer, &material, &manager).unwrap();
        assert_eq!(writer.finish(), json);

        let unknown = json!({ "tint": { "r": 0.0 }, "blend": "Subtract" });
        let err = def
            .load(&mut JsonReader::new(&unknown), &mut material, &manager)
            .unwrap_err();
        assert!(matches!(err.root_cause(), LoadError::UnknownEnumEntry { entry, .. } if entry == "Subtract"));
    }

    #[test]
    #[should_panic(expected = "registers var 'a' twice")]
    fn duplicate_vars_panic() {
        let _ = ReflectionDefinition::<Stats>::new()
            .var("a", field!(Stats, a), &[])
            .var("a", field!(Stats, a), &[]);
    }

    #[test]
    #[should_panic(expected = "registers function 'total' twice")]
    fn duplicate_signatures_panic() {
        let _ = ReflectionDefinition::<Stats>::new()
            .func("total", |s: &Stats, (): ()| s.a, &[])
            .func("total", |s: &Stats, (): ()| s.a + 1, &[]);
    }

    #[test]
    #[should_panic(expected = "more than 8 overloads")]
    fn too_many_overloads_panic() {
        let _ = ReflectionDefinition::<Stats>::new()
            .static_func("f", |(): ()| 0_u8, &[])
            .static_func("f", |(): ()| 0_u16, &[])
            .static_func("f", |(): ()| 0_u32, &[])
            .static_func("f", |(): ()| 0_u64, &[])
            .static_func("f", |(): ()| 0_i8, &[])
            .static_func("f", |(): ()| 0_i16, &[])
            .static_func("f", |(): ()| 0_i32, &[])
            .static_func("f", |(): ()| 0_i64, &[])
            .static_func("f", |(): ()| 0_f32, &[]);
    }

    #[test]
    #[should_panic(expected = "rejects var 'hint'")]
    fn rejected_attributes_panic() {
        let _ = ReflectionDefinition::<Stats>::new()
            .var("hint", field!(Stats, hint), &[&RangeAttribute::new(0.0, 1.0)]);
    }
}
