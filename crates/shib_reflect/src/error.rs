use alloc::boxed::Box;
use alloc::string::String;

use thiserror::Error;

use crate::var::VarKind;

// -----------------------------------------------------------------------------
// VarError

/// An error returned by the generic [`ReflectionVar`](crate::ReflectionVar) interface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VarError {
    /// The object is not an instance of the type owning the var.
    #[error("object is not a `{expected}`")]
    ObjectMismatch { expected: &'static str },
    /// The data passed in is not of the var's value type.
    #[error("data is not a `{expected}`")]
    ValueMismatch { expected: &'static str },
    /// The var is flagged read-only.
    #[error("var is read-only")]
    ReadOnly,
    /// Element access out of bounds.
    #[error("index {index} out of range for container of size {len}")]
    IndexOutOfRange { index: usize, len: usize },
    /// The operation does not exist for this kind of var.
    #[error("operation `{op}` is not supported by {kind:?} vars")]
    Unsupported { op: &'static str, kind: VarKind },
}

// -----------------------------------------------------------------------------
// LoadError

/// An error raised while loading an object from a [`SerializeReader`](crate::serialize::SerializeReader).
///
/// Loading stops at the first error. [`LoadError::Field`] and
/// [`LoadError::Element`] wrap the underlying error with the path that
/// led to it.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum LoadError {
    /// A required field is absent from the input.
    #[error("`{type_name}` is missing required field `{field}`")]
    MissingField { type_name: &'static str, field: String },
    /// The input node has the wrong kind.
    #[error("expected {expected}")]
    TypeMismatch { expected: &'static str },
    /// A number does not fit into the target type.
    #[error("value does not fit into `{target}`")]
    OutOfRange { target: &'static str },
    /// A fixed array was given the wrong number of elements.
    #[error("expected {expected} elements, found {found}")]
    ArrayLength { expected: usize, found: usize },
    /// An enum entry name that was never registered.
    #[error("`{entry}` is not an entry of enum `{enum_name}`")]
    UnknownEnumEntry { enum_name: String, entry: String },
    /// A flag name that the flags type does not declare.
    #[error("`{flag}` is not a flag of `{type_name}`")]
    UnknownFlag { type_name: &'static str, flag: String },
    /// A map key that could not be parsed.
    #[error("invalid map key `{key}`")]
    InvalidKey { key: String },
    /// No definition is registered for the type.
    #[error("no reflection registered for `{type_name}`")]
    UnknownType { type_name: &'static str },
    /// The definition exists but is still waiting for its bases.
    #[error("reflection for `{type_name}` is not defined yet")]
    NotDefined { type_name: String },
    /// The var refused the loaded value.
    #[error(transparent)]
    Var(#[from] VarError),
    /// Failure inside a field.
    #[error("field `{field}`: {source}")]
    Field { field: String, source: Box<LoadError> },
    /// Failure inside a container element.
    #[error("element {index}: {source}")]
    Element { index: usize, source: Box<LoadError> },
}

impl LoadError {
    /// Wraps `self` with the name of the field being loaded.
    #[inline]
    pub fn in_field(self, field: &str) -> Self {
        Self::Field {
            field: String::from(field),
            source: Box::new(self),
        }
    }

    /// Wraps `self` with the index of the element being loaded.
    #[inline]
    pub fn in_element(self, index: usize) -> Self {
        Self::Element {
            index,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping path wrappers.
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Field { source, .. } | Self::Element { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

// -----------------------------------------------------------------------------
// SaveError

/// An error raised while saving an object into a [`SerializeWriter`](crate::serialize::SerializeWriter).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SaveError {
    /// No definition is registered for the type.
    #[error("no reflection registered for `{type_name}`")]
    UnknownType { type_name: &'static str },
    /// The definition exists but is still waiting for its bases.
    #[error("reflection for `{type_name}` is not defined yet")]
    NotDefined { type_name: String },
    /// The value has no registered enum entry.
    #[error("value has no entry in enum `{enum_name}`")]
    UnknownEnumValue { enum_name: String },
    /// NaN and infinities have no serialized form.
    #[error("non-finite `{type_name}` cannot be saved")]
    NonFinite { type_name: &'static str },
    /// The var could not read the object.
    #[error(transparent)]
    Var(#[from] VarError),
}

// -----------------------------------------------------------------------------
// CallError

/// An error returned when invoking a reflected function.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CallError {
    /// The object is not an instance of the type owning the function.
    #[error("object is not a `{expected}`")]
    ObjectMismatch { expected: &'static str },
    /// A mutating method was called through a shared reference.
    #[error("function requires a mutable object")]
    NotConst,
}
