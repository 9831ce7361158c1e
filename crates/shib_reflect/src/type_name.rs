use shib_utils::Hash64;

// -----------------------------------------------------------------------------
// TypeName

/// A stable, module-independent name for a type.
///
/// The name, and the [`Hash64`] derived from it, are the identity of a
/// type inside the reflection system: definitions, interfaces, buckets
/// and attributes are all looked up by `TYPE_HASH`. Unlike
/// [`TypeId`](core::any::TypeId), the hash is the same in every module
/// and every build.
///
/// Implemented for concrete types and for interface trait objects
/// (`dyn Trait`). Use [`impl_type_name!`](crate::impl_type_name) rather
/// than writing the impl by hand.
///
/// # Examples
///
/// ```
/// use shib_reflect::{TypeName, impl_type_name};
/// use shib_utils::Hash64;
///
/// struct Transform;
/// trait Renderer {}
///
/// impl_type_name!(Transform = "Shibboleth::Transform");
/// impl_type_name!(dyn Renderer = "Shibboleth::IRenderer");
///
/// assert_eq!(Transform::TYPE_HASH, Hash64::of_str("Shibboleth::Transform"));
/// assert_eq!(<dyn Renderer>::TYPE_NAME, "Shibboleth::IRenderer");
/// ```
pub trait TypeName: 'static {
    /// The registered name.
    const TYPE_NAME: &'static str;

    /// FNV-1a 64 of [`TYPE_NAME`](Self::TYPE_NAME).
    const TYPE_HASH: Hash64 = Hash64::of_str(Self::TYPE_NAME);
}

/// Implements [`TypeName`].
///
/// - `impl_type_name!(Type)` names the type after its module path.
/// - `impl_type_name!(Type = "Name")` uses an explicit name.
#[macro_export]
macro_rules! impl_type_name {
    ($ty:ty = $name:expr) => {
        impl $crate::TypeName for $ty {
            const TYPE_NAME: &'static str = $name;
        }
    };
    ($ty:ty) => {
        impl $crate::TypeName for $ty {
            const TYPE_NAME: &'static str =
                ::core::concat!(::core::module_path!(), "::", ::core::stringify!($ty));
        }
    };
}

impl_type_name!(bool = "bool");
impl_type_name!(i8 = "int8_t");
impl_type_name!(i16 = "int16_t");
impl_type_name!(i32 = "int32_t");
impl_type_name!(i64 = "int64_t");
impl_type_name!(u8 = "uint8_t");
impl_type_name!(u16 = "uint16_t");
impl_type_name!(u32 = "uint32_t");
impl_type_name!(u64 = "uint64_t");
impl_type_name!(f32 = "float");
impl_type_name!(f64 = "double");
impl_type_name!(alloc::string::String = "U8String");
impl_type_name!(shib_utils::Hash32 = "Hash32");
impl_type_name!(shib_utils::Hash64 = "Hash64");
impl_type_name!(shib_utils::HashString32 = "HashString32");
impl_type_name!(shib_utils::HashString64 = "HashString64");
