//! [`Reflect`] for built-in scalar, string and hash types.

use alloc::string::String;

use shib_utils::{Hash32, Hash64, HashString32, HashString64};

use crate::error::{LoadError, SaveError};
use crate::manager::ReflectionManager;
use crate::serialize::{SerializeReader, SerializeWriter};
use crate::{Reflect, TypeName};

// -----------------------------------------------------------------------------
// Integers

macro_rules! impl_reflect_int {
    ($($ty:ty),* $(,)?) => {$(
        impl Reflect for $ty {
            fn load(
                &mut self,
                reader: &mut dyn SerializeReader,
                _registry: &ReflectionManager,
            ) -> Result<(), LoadError> {
                if reader.is_null() {
                    return Ok(());
                }
                if !reader.is_int() {
                    return Err(LoadError::TypeMismatch { expected: "an integer" });
                }
                let value = match reader.read_i64() {
                    Some(value) => <$ty>::try_from(value).ok(),
                    None => reader.read_u64().and_then(|value| <$ty>::try_from(value).ok()),
                };
                *self = value.ok_or(LoadError::OutOfRange {
                    target: <$ty as TypeName>::TYPE_NAME,
                })?;
                Ok(())
            }

            fn save(
                &self,
                writer: &mut dyn SerializeWriter,
                _registry: &ReflectionManager,
            ) -> Result<(), SaveError> {
                match i64::try_from(*self) {
                    Ok(value) => writer.write_i64(value),
                    Err(_) => writer.write_u64(*self as u64),
                }
                Ok(())
            }

            #[inline]
            fn instance_hash(&self, init: Hash64, _registry: &ReflectionManager) -> Hash64 {
                init.chain(&self.to_le_bytes())
            }
        }
    )*};
}

impl_reflect_int!(i8, i16, i32, i64, u8, u16, u32, u64);

// -----------------------------------------------------------------------------
// Floats

macro_rules! impl_reflect_float {
    ($($ty:ty),* $(,)?) => {$(
        impl Reflect for $ty {
            fn load(
                &mut self,
                reader: &mut dyn SerializeReader,
                _registry: &ReflectionManager,
            ) -> Result<(), LoadError> {
                if reader.is_null() {
                    return Ok(());
                }
                match reader.read_f64() {
                    Some(value) => {
                        *self = value as $ty;
                        Ok(())
                    }
                    None => Err(LoadError::TypeMismatch { expected: "a number" }),
                }
            }

            fn save(
                &self,
                writer: &mut dyn SerializeWriter,
                _registry: &ReflectionManager,
            ) -> Result<(), SaveError> {
                if !self.is_finite() {
                    return Err(SaveError::NonFinite {
                        type_name: <$ty as TypeName>::TYPE_NAME,
                    });
                }
                writer.write_f64(*self as f64);
                Ok(())
            }

            #[inline]
            fn instance_hash(&self, init: Hash64, _registry: &ReflectionManager) -> Hash64 {
                init.chain(&self.to_bits().to_le_bytes())
            }
        }
    )*};
}

impl_reflect_float!(f32, f64);

// -----------------------------------------------------------------------------
// bool / String

impl Reflect for bool {
    fn load(
        &mut self,
        reader: &mut dyn SerializeReader,
        _registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        if reader.is_null() {
            return Ok(());
        }
        *self = reader
            .read_bool()
            .ok_or(LoadError::TypeMismatch { expected: "a boolean" })?;
        Ok(())
    }

    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        _registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        writer.write_bool(*self);
        Ok(())
    }

    #[inline]
    fn instance_hash(&self, init: Hash64, _registry: &ReflectionManager) -> Hash64 {
        init.chain(&[*self as u8])
    }
}

impl Reflect for String {
    fn load(
        &mut self,
        reader: &mut dyn SerializeReader,
        _registry: &ReflectionManager,
    ) -> Result<(), LoadError> {
        if reader.is_null() {
            return Ok(());
        }
        *self = reader
            .read_string()
            .ok_or(LoadError::TypeMismatch { expected: "a string" })?;
        Ok(())
    }

    fn save(
        &self,
        writer: &mut dyn SerializeWriter,
        _registry: &ReflectionManager,
    ) -> Result<(), SaveError> {
        writer.write_str(self);
        Ok(())
    }

    #[inline]
    fn instance_hash(&self, init: Hash64, _registry: &ReflectionManager) -> Hash64 {
        init.chain(self.as_bytes())
    }
}

// -----------------------------------------------------------------------------
// Hashes

// Loaded from either the raw number or the string to hash.
macro_rules! impl_reflect_hash {
    ($ty:ident, $raw:ty) => {
        impl Reflect for $ty {
            fn load(
                &mut self,
                reader: &mut dyn SerializeReader,
                _registry: &ReflectionManager,
            ) -> Result<(), LoadError> {
                if reader.is_null() {
                    return Ok(());
                }
                if let Some(string) = reader.read_string() {
                    *self = $ty::of_str(&string);
                    return Ok(());
                }
                let raw = reader
                    .read_u64()
                    .ok_or(LoadError::TypeMismatch { expected: "a string or a hash" })?;
                let raw = <$raw>::try_from(raw).map_err(|_| LoadError::OutOfRange {
                    target: <$ty as TypeName>::TYPE_NAME,
                })?;
                *self = $ty::new(raw);
                Ok(())
            }

            fn save(
                &self,
                writer: &mut dyn SerializeWriter,
                _registry: &ReflectionManager,
            ) -> Result<(), SaveError> {
                writer.write_u64(self.get() as u64);
                Ok(())
            }

            #[inline]
            fn instance_hash(&self, init: Hash64, _registry: &ReflectionManager) -> Hash64 {
                init.chain(&self.get().to_le_bytes())
            }
        }
    };
}

impl_reflect_hash!(Hash32, u32);
impl_reflect_hash!(Hash64, u64);

macro_rules! impl_reflect_hash_string {
    ($($ty:ident),*) => {$(
        impl Reflect for $ty {
            fn load(
                &mut self,
                reader: &mut dyn SerializeReader,
                _registry: &ReflectionManager,
            ) -> Result<(), LoadError> {
                if reader.is_null() {
                    return Ok(());
                }
                let string = reader
                    .read_string()
                    .ok_or(LoadError::TypeMismatch { expected: "a string" })?;
                *self = $ty::new(string);
                Ok(())
            }

            fn save(
                &self,
                writer: &mut dyn SerializeWriter,
                _registry: &ReflectionManager,
            ) -> Result<(), SaveError> {
                writer.write_str(self.as_str());
                Ok(())
            }

            #[inline]
            fn instance_hash(&self, init: Hash64, _registry: &ReflectionManager) -> Hash64 {
                init.chain(self.as_str().as_bytes())
            }
        }
    )*};
}

impl_reflect_hash_string!(HashString32, HashString64);

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shib_utils::Hash32;

    use crate::error::{LoadError, SaveError};
    use crate::manager::ReflectionManager;
    use crate::serialize::{JsonReader, JsonWriter};
    use crate::{Reflect, TypeName};

    fn load<T: Reflect>(value: &mut T, json: serde_json::Value) -> Result<(), LoadError> {
        let registry = ReflectionManager::new();
        value.load(&mut JsonReader::new(&json), &registry)
    }

    #[test]
    fn integers_are_range_checked() {
        let mut value = 0_u8;
        assert!(load(&mut value, json!(255)).is_ok());
        assert_eq!(value, 255);
        assert_eq!(
            load(&mut value, json!(256)),
            Err(LoadError::OutOfRange { target: "uint8_t" })
        );
        assert_eq!(
            load(&mut value, json!(-1)),
            Err(LoadError::OutOfRange { target: "uint8_t" })
        );
        assert_eq!(value, 255);
    }

    #[test]
    fn non_finite_floats_refuse_to_save() {
        let registry = ReflectionManager::new();
        let mut writer = JsonWriter::new();
        assert_eq!(
            f32::NAN.save(&mut writer, &registry),
            Err(SaveError::NonFinite { type_name: f32::TYPE_NAME })
        );
        assert_eq!(
            f64::NEG_INFINITY.save(&mut writer, &registry),
            Err(SaveError::NonFinite { type_name: f64::TYPE_NAME })
        );

        1.5_f64.save(&mut writer, &registry).unwrap();
        assert_eq!(writer.finish(), json!(1.5));
    }

    #[test]
    fn null_keeps_value_and_kind_is_checked() {
        let mut value = 7_i32;
        assert!(load(&mut value, json!(null)).is_ok());
        assert_eq!(value, 7);
        assert_eq!(
            load(&mut value, json!("7")),
            Err(LoadError::TypeMismatch { expected: "an integer" })
        );
    }

    #[test]
    fn large_unsigned_round_trip() {
        let registry = ReflectionManager::new();
        let mut writer = JsonWriter::new();
        u64::MAX.save(&mut writer, &registry).unwrap();
        let json = writer.finish();
        assert_eq!(json, json!(u64::MAX));

        let mut value = 0_u64;
        value.load(&mut JsonReader::new(&json), &registry).unwrap();
        assert_eq!(value, u64::MAX);
    }

    #[test]
    fn hash_from_string_or_number() {
        let mut hash = Hash32::default();
        load(&mut hash, json!("position")).unwrap();
        assert_eq!(hash, Hash32::of_str("position"));
        load(&mut hash, json!(17)).unwrap();
        assert_eq!(hash.get(), 17);
    }
}
