//! The tree-structured serialization contract.
//!
//! Reflection never talks to a concrete format. It reads through
//! [`SerializeReader`], a cursor over a tree of objects, arrays and
//! scalars, and writes through [`SerializeWriter`], a stream of
//! start/end/key/value events. [`JsonReader`] and [`JsonWriter`] adapt
//! `serde_json` to the contract.

// -----------------------------------------------------------------------------
// Modules

mod json;

// -----------------------------------------------------------------------------
// Exports

pub use json::{JsonReader, JsonWriter};

use alloc::string::String;
use alloc::vec::Vec;

// -----------------------------------------------------------------------------
// SerializeReader

/// A cursor over a tree of serialized values.
///
/// The cursor starts at the root node. [`enter_element`](Self::enter_element)
/// and [`enter_index`](Self::enter_index) push a child onto the navigation
/// stack, [`exit_element`](Self::exit_element) pops it. Each successful
/// `enter_*` must be paired with one `exit_element`; [`scoped`](Self::scoped)
/// and [`scoped_index`](Self::scoped_index) do the pairing for you.
pub trait SerializeReader {
    /// Returns `true` if the current node is null.
    fn is_null(&self) -> bool;
    /// Returns `true` if the current node is an object.
    fn is_object(&self) -> bool;
    /// Returns `true` if the current node is an array.
    fn is_array(&self) -> bool;
    /// Returns `true` if the current node is a string.
    fn is_string(&self) -> bool;
    /// Returns `true` if the current node is any number.
    fn is_number(&self) -> bool;
    /// Returns `true` if the current node is an integer.
    fn is_int(&self) -> bool;
    /// Returns `true` if the current node is a floating point number.
    fn is_float(&self) -> bool;
    /// Returns `true` if the current node is a boolean.
    fn is_bool(&self) -> bool;

    /// Number of children of an object or array, `0` otherwise.
    fn size(&self) -> usize;

    /// Returns `true` if the current node is an object containing `key`.
    fn has_key(&self, key: &str) -> bool;

    /// The keys of the current object, in the order the backend stores them.
    fn keys(&self) -> Vec<String>;

    /// Enters the child stored under `key`.
    ///
    /// Returns `false`, leaving the cursor untouched, if there is no such child.
    fn enter_element(&mut self, key: &str) -> bool;

    /// Enters the array element at `index`.
    ///
    /// Returns `false`, leaving the cursor untouched, if there is no such element.
    fn enter_index(&mut self, index: usize) -> bool;

    /// Returns to the parent of the current node.
    fn exit_element(&mut self);

    /// Reads the current node as a signed integer.
    fn read_i64(&self) -> Option<i64>;
    /// Reads the current node as an unsigned integer.
    fn read_u64(&self) -> Option<u64>;
    /// Reads the current node as a float, integers are converted.
    fn read_f64(&self) -> Option<f64>;
    /// Reads the current node as a boolean.
    fn read_bool(&self) -> Option<bool>;
    /// Reads the current node as a string.
    fn read_string(&self) -> Option<String>;
}

impl dyn SerializeReader + '_ {
    /// Runs `f` with the cursor on the child stored under `key`.
    ///
    /// Returns `None` if the child does not exist.
    pub fn scoped<R>(&mut self, key: &str, f: impl FnOnce(&mut Self) -> R) -> Option<R> {
        if !self.enter_element(key) {
            return None;
        }
        let result = f(self);
        self.exit_element();
        Some(result)
    }

    /// Runs `f` with the cursor on the array element at `index`.
    ///
    /// Returns `None` if the element does not exist.
    pub fn scoped_index<R>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> R) -> Option<R> {
        if !self.enter_index(index) {
            return None;
        }
        let result = f(self);
        self.exit_element();
        Some(result)
    }

    /// Reads an integer, falling back to `default`.
    #[inline]
    pub fn read_i64_or(&self, default: i64) -> i64 {
        self.read_i64().unwrap_or(default)
    }

    /// Reads a float, falling back to `default`.
    #[inline]
    pub fn read_f64_or(&self, default: f64) -> f64 {
        self.read_f64().unwrap_or(default)
    }

    /// Reads a boolean, falling back to `default`.
    #[inline]
    pub fn read_bool_or(&self, default: bool) -> bool {
        self.read_bool().unwrap_or(default)
    }

    /// Reads a string, falling back to `default`.
    #[inline]
    pub fn read_string_or(&self, default: &str) -> String {
        self.read_string().unwrap_or_else(|| String::from(default))
    }
}

// -----------------------------------------------------------------------------
// SerializeWriter

/// A sink for serialized values.
///
/// Objects are written as `start_object`, then `write_key` + value
/// pairs, then `end_object`. Arrays as `start_array`, values, `end_array`.
/// The `size` hints may be used by formats that prefix lengths.
pub trait SerializeWriter {
    /// Opens an object with `size` entries.
    fn start_object(&mut self, size: usize);
    /// Closes the innermost object.
    fn end_object(&mut self);
    /// Opens an array with `size` elements.
    fn start_array(&mut self, size: usize);
    /// Closes the innermost array.
    fn end_array(&mut self);
    /// Names the next value written into the current object.
    fn write_key(&mut self, key: &str);

    /// Writes a null value.
    fn write_null(&mut self);
    /// Writes a signed integer.
    fn write_i64(&mut self, value: i64);
    /// Writes an unsigned integer.
    fn write_u64(&mut self, value: u64);
    /// Writes a float.
    fn write_f64(&mut self, value: f64);
    /// Writes a boolean.
    fn write_bool(&mut self, value: bool);
    /// Writes a string.
    fn write_str(&mut self, value: &str);
}
