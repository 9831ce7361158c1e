use super::Attribute;
use crate::error::VarError;
use crate::impl_type_name;
use crate::var::{ReflectionVar, VarFlags, VarKind};

macro_rules! flag_attribute {
    ($(#[$meta:meta])* $name:ident => $flag:ident, $type_name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl_type_name!($name = $type_name);

        impl Attribute for $name {
            #[inline]
            fn apply_var(&self, var: &mut dyn ReflectionVar) -> Result<(), VarError> {
                var.flags_mut().insert(VarFlags::$flag);
                Ok(())
            }
        }
    };
}

flag_attribute! {
    /// Makes a var reject every write made through reflection.
    ReadOnlyAttribute => READ_ONLY, "Shibboleth::ReadOnlyAttribute"
}

flag_attribute! {
    /// Excludes a var from load and save.
    NoSerializeAttribute => NO_SERIALIZE, "Shibboleth::NoSerializeAttribute"
}

flag_attribute! {
    /// Lets a var be absent from serialized input.
    OptionalAttribute => OPTIONAL, "Shibboleth::OptionalAttribute"
}

flag_attribute! {
    /// Excludes a var from reflective copies.
    NoCopyAttribute => NO_COPY, "Shibboleth::NoCopyAttribute"
}

// -----------------------------------------------------------------------------
// RangeAttribute

/// An inclusive numeric range for editor and validation purposes.
///
/// Only valid on scalar vars of a built-in numeric type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeAttribute {
    min: f64,
    max: f64,
}

impl_type_name!(RangeAttribute = "Shibboleth::RangeAttribute");

impl RangeAttribute {
    /// Creates the range `min..=max`.
    #[inline]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub const fn min(&self) -> f64 {
        self.min
    }

    #[inline]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Returns `true` if `value` lies inside the range.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Clamps `value` into the range.
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

impl Attribute for RangeAttribute {
    fn apply_var(&self, var: &mut dyn ReflectionVar) -> Result<(), VarError> {
        let value_type = var.value_type();
        if var.kind() != VarKind::Scalar {
            return Err(VarError::Unsupported {
                op: "RangeAttribute",
                kind: var.kind(),
            });
        }
        if !value_type.is_numeric() {
            return Err(VarError::ValueMismatch {
                expected: "a numeric type",
            });
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests
