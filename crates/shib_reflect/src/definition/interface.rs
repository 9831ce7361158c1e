use alloc::boxed::Box;
use alloc::sync::Arc;
use core::any::Any;
use core::marker::PhantomData;

use shib_utils::Hash64;

use crate::TypeName;
use crate::var::BaseCast;

// -----------------------------------------------------------------------------
// InterfaceCaster

/// Casts objects seen as `dyn Any` to the interface `I`.
///
/// `I` is usually a trait object such as `dyn Renderer`. Casters are
/// built with [`trait_cast!`](crate::trait_cast) and registered with
/// [`ReflectionDefinition::interface`](crate::ReflectionDefinition::interface).
pub trait InterfaceCaster<I: ?Sized + 'static>: Send + Sync {
    /// Borrows `object` as `I`.
    fn cast_ref<'a>(&self, object: &'a dyn Any) -> Option<&'a I>;

    /// Mutably borrows `object` as `I`.
    fn cast_mut<'a>(&self, object: &'a mut dyn Any) -> Option<&'a mut I>;

    /// Converts an owned object, giving it back on failure.
    fn cast_box(&self, object: Box<dyn Any>) -> Result<Box<I>, Box<dyn Any>>;
}

/// An [`InterfaceCaster`] for a concrete type `T` implementing `I`.
pub struct DirectCast<T, I: ?Sized> {
    to_ref: fn(&T) -> &I,
    to_mut: fn(&mut T) -> &mut I,
    to_box: fn(Box<T>) -> Box<I>,
}

impl<T, I: ?Sized> DirectCast<T, I> {
    /// Creates a caster from the three unsizing conversions.
    #[inline]
    pub const fn new(
        to_ref: fn(&T) -> &I,
        to_mut: fn(&mut T) -> &mut I,
        to_box: fn(Box<T>) -> Box<I>,
    ) -> Self {
        Self {
            to_ref,
            to_mut,
            to_box,
        }
    }
}

impl<T: Any, I: ?Sized + 'static> InterfaceCaster<I> for DirectCast<T, I> {
    #[inline]
    fn cast_ref<'a>(&self, object: &'a dyn Any) -> Option<&'a I> {
        object.downcast_ref::<T>().map(self.to_ref)
    }

    #[inline]
    fn cast_mut<'a>(&self, object: &'a mut dyn Any) -> Option<&'a mut I> {
        object.downcast_mut::<T>().map(self.to_mut)
    }

    #[inline]
    fn cast_box(&self, object: Box<dyn Any>) -> Result<Box<I>, Box<dyn Any>> {
        object.downcast::<T>().map(self.to_box)
    }
}

/// An interface implemented by a base, reached through the base cast.
///
/// Owned objects cannot be split from their derived type, so
/// [`cast_box`](InterfaceCaster::cast_box) always fails.
pub struct ThroughBase<I: ?Sized + 'static> {
    base: Arc<dyn BaseCast>,
    inner: Arc<dyn InterfaceCaster<I>>,
}

impl<I: ?Sized + 'static> ThroughBase<I> {
    /// Applies `base` before `inner`.
    #[inline]
    pub fn new(base: Arc<dyn BaseCast>, inner: Arc<dyn InterfaceCaster<I>>) -> Self {
        Self { base, inner }
    }
}

impl<I: ?Sized + 'static> InterfaceCaster<I> for ThroughBase<I> {
    #[inline]
    fn cast_ref<'a>(&self, object: &'a dyn Any) -> Option<&'a I> {
        self.inner.cast_ref(self.base.upcast(object)?)
    }

    #[inline]
    fn cast_mut<'a>(&self, object: &'a mut dyn Any) -> Option<&'a mut I> {
        self.inner.cast_mut(self.base.upcast_mut(object)?)
    }

    #[inline]
    fn cast_box(&self, object: Box<dyn Any>) -> Result<Box<I>, Box<dyn Any>> {
        Err(object)
    }
}

/// Builds a [`DirectCast`] from a concrete type to a trait object.
///
/// # Examples
///
/// ```
/// use shib_reflect::definition::InterfaceCaster;
/// use shib_reflect::trait_cast;
///
/// trait Shape { fn area(&self) -> f32; }
/// struct Square(f32);
/// impl Shape for Square { fn area(&self) -> f32 { self.0 * self.0 } }
///
/// let caster = trait_cast!(Square => dyn Shape);
/// let square = Square(3.0);
/// assert_eq!(caster.cast_ref(&square).unwrap().area(), 9.0);
/// assert!(caster.cast_ref(&7_u32).is_none());
/// ```
#[macro_export]
macro_rules! trait_cast {
    ($ty:ty => $iface:ty) => {{
        type Iface = $iface;
        fn to_ref(object: &$ty) -> &Iface {
            object
        }
        fn to_mut(object: &mut $ty) -> &mut Iface {
            object
        }
        fn to_box(
            object: $crate::__macro_exports::Box<$ty>,
        ) -> $crate::__macro_exports::Box<Iface> {
            object
        }
        $crate::definition::DirectCast::<$ty, Iface>::new(to_ref, to_mut, to_box)
    }};
}

// -----------------------------------------------------------------------------
// TraitCast

/// The type-erased form of a registered interface.
pub trait ErasedTraitCast: Send + Sync {
    /// The interface's type name.
    fn interface_name(&self) -> &'static str;

    /// The interface's type hash.
    fn interface_hash(&self) -> Hash64;

    /// Upcasts to `dyn Any`, used to recover the typed [`TraitCast`].
    fn as_any(&self) -> &dyn Any;

    /// The same interface seen from a type deriving from the owner.
    fn through_base(&self, base: Arc<dyn BaseCast>) -> Box<dyn ErasedTraitCast>;
}

/// A registered interface `I`.
pub struct TraitCast<I: ?Sized + 'static> {
    caster: Arc<dyn InterfaceCaster<I>>,
    _marker: PhantomData<fn() -> Box<I>>,
}

impl<I: ?Sized + 'static> TraitCast<I> {
    /// Wraps `caster`.
    #[inline]
    pub fn new(caster: Arc<dyn InterfaceCaster<I>>) -> Self {
        Self {
            caster,
            _marker: PhantomData,
        }
    }

    /// The wrapped caster.
    #[inline]
    pub fn caster(&self) -> &dyn InterfaceCaster<I> {
        &*self.caster
    }
}

impl<I: ?Sized + TypeName> ErasedTraitCast for TraitCast<I> {
    #[inline]
    fn interface_name(&self) -> &'static str {
        I::TYPE_NAME
    }

    #[inline]
    fn interface_hash(&self) -> Hash64 {
        I::TYPE_HASH
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn through_base(&self, base: Arc<dyn BaseCast>) -> Box<dyn ErasedTraitCast> {
        let caster: Arc<dyn InterfaceCaster<I>> =
            Arc::new(ThroughBase::new(base, self.caster.clone()));
        Box::new(TraitCast::new(caster))
    }
}

impl dyn ErasedTraitCast {
    /// Returns the typed caster if this is the interface `I`.
    #[inline]
    pub fn downcast<I: ?Sized + TypeName>(&self) -> Option<&dyn InterfaceCaster<I>> {
        self.as_any()
            .downcast_ref::<TraitCast<I>>()
            .map(TraitCast::caster)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::sync::Arc;

    use super::{ErasedTraitCast, InterfaceCaster, TraitCast};
    use crate::var::{BaseCast, Upcast};
    use crate::{field, impl_type_name, trait_cast};

    trait Speaker {
        fn speak(&self) -> u32;
        fn louder(&mut self);
    }

    impl_type_name!(dyn Speaker = "Speaker");

    struct Bell {
        volume: u32,
    }

    impl Speaker for Bell {
        fn speak(&self) -> u32 {
            self.volume
        }

        fn louder(&mut self) {
            self.volume += 1;
        }
    }

    struct Tower {
        _height: u16,
        bell: Bell,
    }

    #[test]
    fn direct_casts_are_symmetric() {
        let caster = trait_cast!(Bell => dyn Speaker);
        let mut bell = Bell { volume: 2 };
        caster.cast_mut(&mut bell).unwrap().louder();
        assert_eq!(caster.cast_ref(&bell).unwrap().speak(), 3);
        assert!(caster.cast_ref(&1_u8).is_none());
        assert!(caster.cast_mut(&mut 1_u8).is_none());

        let boxed: Box<dyn core::any::Any> = Box::new(bell);
        assert_eq!(caster.cast_box(boxed).ok().unwrap().speak(), 3);
    }

    #[test]
    fn erased_casts_follow_bases() {
        let erased: Box<dyn ErasedTraitCast> =
            Box::new(TraitCast::<dyn Speaker>::new(Arc::new(trait_cast!(Bell => dyn Speaker))));
        assert_eq!(erased.interface_name(), "Speaker");

        let base: Arc<dyn BaseCast> = Arc::new(Upcast::new(field!(Tower, bell)));
        let inherited = erased.through_base(base);
        let caster = inherited.downcast::<dyn Speaker>().unwrap();

        let mut tower = Tower { _height: 40, bell: Bell { volume: 5 } };
        caster.cast_mut(&mut tower).unwrap().louder();
        assert_eq!(caster.cast_ref(&tower).unwrap().speak(), 6);
        assert!(caster.cast_box(Box::new(tower)).is_err());
    }
}
