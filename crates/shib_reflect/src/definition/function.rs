use alloc::boxed::Box;
use core::any::Any;

use shib_utils::Hash64;

use crate::attribute::AttributeList;
use crate::error::CallError;

/// The maximum number of overloads registered under one function name.
pub const MAX_OVERLOADS: usize = 8;

/// The overload identity of a function taking `Args` and returning `Ret`.
#[inline]
pub fn args_hash<Args: 'static, Ret: 'static>() -> Hash64 {
    Hash64::of_str(core::any::type_name::<(Ret, Args)>())
}

/// The identity of a constructor taking `Args`.
#[inline]
pub fn ctor_hash<Args: 'static>() -> Hash64 {
    Hash64::of_str(core::any::type_name::<Args>())
}

// -----------------------------------------------------------------------------
// ReflectionFunction

type ConstBody<Args, Ret> = dyn Fn(&dyn Any, Args) -> Option<Ret> + Send + Sync;
type MutBody<Args, Ret> = dyn Fn(&mut dyn Any, Args) -> Option<Ret> + Send + Sync;

enum Body<Args, Ret> {
    Const(Box<ConstBody<Args, Ret>>),
    Mut(Box<MutBody<Args, Ret>>),
}

/// A reflected method taking the arguments `Args` as a tuple.
///
/// # Examples
///
/// ```
/// use shib_reflect::definition::ReflectionFunction;
///
/// struct Counter(i32);
///
/// let get = ReflectionFunction::new_const(|c: &Counter, (): ()| c.0, "Counter");
/// let add = ReflectionFunction::new_mut(|c: &mut Counter, (n,): (i32,)| c.0 += n, "Counter");
///
/// let mut counter = Counter(1);
/// add.call_mut(&mut counter, (4,)).unwrap();
/// assert_eq!(get.call(&counter, ()), Ok(5));
/// assert!(add.call(&counter, (1,)).is_err());
/// ```
pub struct ReflectionFunction<Args, Ret> {
    body: Body<Args, Ret>,
    owner: &'static str,
}

impl<Args: 'static, Ret: 'static> ReflectionFunction<Args, Ret> {
    /// Wraps a method taking `&T`.
    pub fn new_const<T: Any>(func: fn(&T, Args) -> Ret, owner: &'static str) -> Self {
        let body = move |object: &dyn Any, args: Args| object.downcast_ref::<T>().map(|object| func(object, args));
        Self {
            body: Body::Const(Box::new(body)),
            owner,
        }
    }

    /// Wraps a method taking `&mut T`.
    pub fn new_mut<T: Any>(func: fn(&mut T, Args) -> Ret, owner: &'static str) -> Self {
        let body = move |object: &mut dyn Any, args: Args| object.downcast_mut::<T>().map(|object| func(object, args));
        Self {
            body: Body::Mut(Box::new(body)),
            owner,
        }
    }

    /// Returns `true` if the method does not mutate the object.
    #[inline]
    pub fn is_const(&self) -> bool {
        matches!(self.body, Body::Const(_))
    }

    /// Calls the method through a shared reference.
    ///
    /// Mutating methods fail with [`CallError::NotConst`].
    pub fn call(&self, object: &dyn Any, args: Args) -> Result<Ret, CallError> {
        match &self.body {
            Body::Const(body) => body(object, args).ok_or(CallError::ObjectMismatch {
                expected: self.owner,
            }),
            Body::Mut(_) => Err(CallError::NotConst),
        }
    }

    /// Calls the method through a mutable reference.
    pub fn call_mut(&self, object: &mut dyn Any, args: Args) -> Result<Ret, CallError> {
        let result = match &self.body {
            Body::Const(body) => body(&*object, args),
            Body::Mut(body) => body(object, args),
        };
        result.ok_or(CallError::ObjectMismatch {
            expected: self.owner,
        })
    }
}

// -----------------------------------------------------------------------------
// ReflectionStaticFunction

/// A reflected associated function taking the arguments `Args` as a tuple.
pub struct ReflectionStaticFunction<Args, Ret> {
    func: fn(Args) -> Ret,
}

impl<Args, Ret> ReflectionStaticFunction<Args, Ret> {
    #[inline]
    pub const fn new(func: fn(Args) -> Ret) -> Self {
        Self { func }
    }

    #[inline]
    pub fn call(&self, args: Args) -> Ret {
        (self.func)(args)
    }
}

// -----------------------------------------------------------------------------
// Overloads

/// One overload of a function name.
pub struct FunctionOverload {
    pub(crate) args_hash: Hash64,
    pub(crate) func: Box<dyn Any + Send + Sync>,
    pub(crate) attrs: AttributeList,
}

impl FunctionOverload {
    /// The overload's argument hash, see [`args_hash`].
    #[inline]
    pub fn args_hash(&self) -> Hash64 {
        self.args_hash
    }

    /// The attributes of this overload.
    #[inline]
    pub fn attrs(&self) -> &AttributeList {
        &self.attrs
    }

    /// Returns the function if it has the signature `F`.
    #[inline]
    pub fn downcast<F: Any>(&self) -> Option<&F> {
        self.func.downcast_ref::<F>()
    }
}

// -----------------------------------------------------------------------------
// Factory

type Create<Args> = dyn Fn(Args) -> Box<dyn Any> + Send + Sync;
type Construct<Args> = dyn Fn(&mut dyn Any, Args) -> bool + Send + Sync;

/// A constructor taking the arguments `Args` as a tuple.
pub struct Factory<Args> {
    create: Box<Create<Args>>,
    construct: Box<Construct<Args>>,
}

impl<Args: 'static> Factory<Args> {
    /// Wraps a constructor of `T`.
    pub fn new<T: Any>(ctor: fn(Args) -> T) -> Self {
        let create = move |args: Args| -> Box<dyn Any> { Box::new(ctor(args)) };
        let construct = move |object: &mut dyn Any, args: Args| match object.downcast_mut::<T>() {
            Some(object) => {
                *object = ctor(args);
                true
            }
            None => false,
        };
        Self {
            create: Box::new(create),
            construct: Box::new(construct),
        }
    }

    /// Creates a new object.
    #[inline]
    pub fn create(&self, args: Args) -> Box<dyn Any> {
        (self.create)(args)
    }

    /// Overwrites `object` with a newly constructed value.
    ///
    /// Returns `false` if `object` is not of the constructed type.
    #[inline]
    pub fn construct(&self, object: &mut dyn Any, args: Args) -> bool {
        (self.construct)(object, args)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{Factory, ReflectionFunction, ReflectionStaticFunction, args_hash};
    use crate::error::CallError;

    #[derive(Debug, PartialEq)]
    struct Gauge {
        level: u8,
    }

    #[test]
    fn const_and_mut_calls() {
        let read = ReflectionFunction::new_const(|g: &Gauge, (): ()| g.level, "Gauge");
        let bump = ReflectionFunction::new_mut(|g: &mut Gauge, (by,): (u8,)| g.level += by, "Gauge");
        assert!(read.is_const());
        assert!(!bump.is_const());

        let mut gauge = Gauge { level: 1 };
        assert_eq!(bump.call(&gauge, (1,)), Err(CallError::NotConst));
        bump.call_mut(&mut gauge, (2,)).unwrap();
        assert_eq!(read.call_mut(&mut gauge, ()), Ok(3));
        assert_eq!(
            read.call(&5_u8, ()),
            Err(CallError::ObjectMismatch { expected: "Gauge" })
        );
    }

    #[test]
    fn static_functions_and_signatures() {
        let twice = ReflectionStaticFunction::new(|(x,): (i32,)| x * 2);
        assert_eq!(twice.call((21,)), 42);
        assert_ne!(args_hash::<(i32,), i32>(), args_hash::<(f32,), i32>());
        assert_eq!(args_hash::<(), u8>(), args_hash::<(), u8>());
    }

    #[test]
    fn factories_create_and_construct() {
        let factory = Factory::new(|(level,): (u8,)| Gauge { level });
        let created = factory.create((4,));
        assert_eq!(created.downcast_ref::<Gauge>(), Some(&Gauge { level: 4 }));

        let mut gauge = Gauge { level: 0 };
        assert!(factory.construct(&mut gauge, (9,)));
        assert_eq!(gauge.level, 9);
        assert!(!factory.construct(&mut 0_u32, (1,)));
    }
}
