use alloc::string::String;
use alloc::vec::Vec;

use serde_json::{Map, Number, Value};

use super::{SerializeReader, SerializeWriter};

// -----------------------------------------------------------------------------
// JsonReader

/// A [`SerializeReader`] over a borrowed [`serde_json::Value`].
///
/// # Examples
///
/// ```
/// use shib_reflect::serialize::{JsonReader, SerializeReader};
///
/// let value = serde_json::json!({ "a": [1, 2] });
/// let mut reader = JsonReader::new(&value);
///
/// assert!(reader.enter_element("a"));
/// assert_eq!(reader.size(), 2);
/// assert!(reader.enter_index(1));
/// assert_eq!(reader.read_i64(), Some(2));
/// reader.exit_element();
/// reader.exit_element();
/// assert!(reader.is_object());
/// ```
pub struct JsonReader<'a> {
    root: &'a Value,
    stack: Vec<&'a Value>,
}

impl<'a> JsonReader<'a> {
    /// Creates a reader positioned on `root`.
    #[inline]
    pub const fn new(root: &'a Value) -> Self {
        Self {
            root,
            stack: Vec::new(),
        }
    }

    /// Current nesting depth, `0` at the root.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    fn current(&self) -> &'a Value {
        self.stack.last().copied().unwrap_or(self.root)
    }
}

impl SerializeReader for JsonReader<'_> {
    fn is_null(&self) -> bool {
        self.current().is_null()
    }

    fn is_object(&self) -> bool {
        self.current().is_object()
    }

    fn is_array(&self) -> bool {
        self.current().is_array()
    }

    fn is_string(&self) -> bool {
        self.current().is_string()
    }

    fn is_number(&self) -> bool {
        self.current().is_number()
    }

    fn is_int(&self) -> bool {
        self.current().is_i64() || self.current().is_u64()
    }

    fn is_float(&self) -> bool {
        self.current().is_f64()
    }

    fn is_bool(&self) -> bool {
        self.current().is_boolean()
    }

    fn size(&self) -> usize {
        match self.current() {
            Value::Array(array) => array.len(),
            Value::Object(object) => object.len(),
            _ => 0,
        }
    }

    fn has_key(&self, key: &str) -> bool {
        self.current()
            .as_object()
            .is_some_and(|object| object.contains_key(key))
    }

    fn keys(&self) -> Vec<String> {
        match self.current() {
            Value::Object(object) => object.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn enter_element(&mut self, key: &str) -> bool {
        match self.current().get(key) {
            Some(child) => {
                self.stack.push(child);
                true
            }
            None => false,
        }
    }

    fn enter_index(&mut self, index: usize) -> bool {
        match self.current().as_array().and_then(|array| array.get(index)) {
            Some(child) => {
                self.stack.push(child);
                true
            }
            None => false,
        }
    }

    fn exit_element(&mut self) {
        let popped = self.stack.pop();
        debug_assert!(popped.is_some(), "`exit_element` called at the root");
    }

    fn read_i64(&self) -> Option<i64> {
        self.current().as_i64()
    }

    fn read_u64(&self) -> Option<u64> {
        self.current().as_u64()
    }

    fn read_f64(&self) -> Option<f64> {
        self.current().as_f64()
    }

    fn read_bool(&self) -> Option<bool> {
        self.current().as_bool()
    }

    fn read_string(&self) -> Option<String> {
        self.current().as_str().map(String::from)
    }
}

// -----------------------------------------------------------------------------
// JsonWriter

enum Frame {
    Object { map: Map<String, Value>, key: Option<String> },
    Array(Vec<Value>),
}

/// A [`SerializeWriter`] building a [`serde_json::Value`].
///
/// # Examples
///
/// ```
/// use shib_reflect::serialize::{JsonWriter, SerializeWriter};
///
/// let mut writer = JsonWriter::new();
/// writer.start_object(1);
/// writer.write_key("names");
/// writer.start_array(2);
/// writer.write_str("x");
/// writer.write_str("y");
/// writer.end_array();
/// writer.end_object();
///
/// assert_eq!(writer.finish(), serde_json::json!({ "names": ["x", "y"] }));
/// ```
#[derive(Default)]
pub struct JsonWriter {
    stack: Vec<Frame>,
    root: Option<Value>,
}

impl JsonWriter {
    /// Creates an empty writer.
    #[inline]
    pub const fn new() -> Self {
        Self {
            stack: Vec::new(),
            root: None,
        }
    }

    /// Returns the written value, `null` if nothing complete was written.
    pub fn finish(self) -> Value {
        debug_assert!(self.stack.is_empty(), "unterminated object or array");
        self.root.unwrap_or(Value::Null)
    }

    fn push_value(&mut self, value: Value) {
        match self.stack.last_mut() {
            None => self.root = Some(value),
            Some(Frame::Array(array)) => array.push(value),
            Some(Frame::Object { map, key }) => match key.take() {
                Some(key) => {
                    map.insert(key, value);
                }
                None => {
                    log::error!(target: crate::LOG_CHANNEL, "JsonWriter: value written into an object without a key");
                    debug_assert!(false, "value written into an object without a key");
                }
            },
        }
    }
}

impl SerializeWriter for JsonWriter {
    fn start_object(&mut self, size: usize) {
        self.stack.push(Frame::Object {
            map: Map::with_capacity(size),
            key: None,
        });
    }

    fn end_object(&mut self) {
        match self.stack.pop() {
            Some(Frame::Object { map, .. }) => self.push_value(Value::Object(map)),
            other => {
                debug_assert!(false, "`end_object` does not close an object");
                if let Some(frame) = other {
                    self.stack.push(frame);
                }
            }
        }
    }

    fn start_array(&mut self, size: usize) {
        self.stack.push(Frame::Array(Vec::with_capacity(size)));
    }

    fn end_array(&mut self) {
        match self.stack.pop() {
            Some(Frame::Array(array)) => self.push_value(Value::Array(array)),
            other => {
                debug_assert!(false, "`end_array` does not close an array");
                if let Some(frame) = other {
                    self.stack.push(frame);
                }
            }
        }
    }

    fn write_key(&mut self, new_key: &str) {
        if let Some(Frame::Object { key, .. }) = self.stack.last_mut() {
            *key = Some(String::from(new_key));
        } else {
            debug_assert!(false, "`write_key` outside of an object");
        }
    }

    fn write_null(&mut self) {
        self.push_value(Value::Null);
    }

    fn write_i64(&mut self, value: i64) {
        self.push_value(Value::from(value));
    }

    fn write_u64(&mut self, value: u64) {
        self.push_value(Value::from(value));
    }

    fn write_f64(&mut self, value: f64) {
        // Non-finite floats have no JSON representation.
        let value = Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.push_value(value);
    }

    fn write_bool(&mut self, value: bool) {
        self.push_value(Value::Bool(value));
    }

    fn write_str(&mut self, value: &str) {
        self.push_value(Value::String(String::from(value)));
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{JsonReader, JsonWriter};
    use crate::serialize::{SerializeReader, SerializeWriter};

    #[test]
    fn missing_children_do_not_move_the_cursor() {
        let value = json!({ "a": 1 });
        let mut reader = JsonReader::new(&value);
        assert!(!reader.enter_element("b"));
        assert!(!reader.enter_index(0));
        assert_eq!(reader.depth(), 0);
        assert!(reader.has_key("a"));
    }

    #[test]
    fn scoped_navigation() {
        let value = json!({ "outer": { "inner": "text" } });
        let mut reader = JsonReader::new(&value);
        let reader: &mut dyn SerializeReader = &mut reader;

        let text = reader.scoped("outer", |r| r.scoped("inner", |r| r.read_string()));
        assert_eq!(text, Some(Some(Some("text".into()))));
        assert!(reader.is_object());
        assert!(reader.scoped("missing", |_| ()).is_none());
    }

    #[test]
    fn numbers_keep_their_kind() {
        let value = json!([1, -2, 2.5]);
        let mut reader = JsonReader::new(&value);
        assert!(reader.enter_index(2));
        assert!(reader.is_float());
        assert!(!reader.is_int());
        assert_eq!(reader.read_f64(), Some(2.5));
        reader.exit_element();

        assert!(reader.enter_index(1));
        assert!(reader.is_int());
        assert_eq!(reader.read_u64(), None);
        assert_eq!(reader.read_i64(), Some(-2));
    }

    #[test]
    fn nested_writes() {
        let mut writer = JsonWriter::new();
        writer.start_array(2);
        writer.start_object(1);
        writer.write_key("nan");
        writer.write_f64(f64::NAN);
        writer.end_object();
        writer.write_bool(true);
        writer.end_array();
        assert_eq!(writer.finish(), json!([{ "nan": null }, true]));
    }
}
