use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Variables handed to a capture call, keyed by name
pub type CaptureValues = BTreeMap<String, CaptureValue>;

/// A captured variable.
///
/// Values that cannot be represented on the wire keep their key and are
/// replaced by a type-tag placeholder during redaction.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Already-serialized structured data
    Structured(Value),
    /// Present at the call site but not serializable
    Unserializable,
    Unknown,
}

impl CaptureValue {
    /// Marker for a value whose type cannot be serialized
    pub fn opaque<T: ?Sized>() -> Self {
        tracing::trace!(type_name = std::any::type_name::<T>(), "Capturing opaque value");
        CaptureValue::Unserializable
    }

    /// Serialize `value` now; falls back to [`CaptureValue::Unserializable`]
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => CaptureValue::Structured(value),
            Err(e) => {
                tracing::debug!(error = %e, "Captured value failed to serialize");
                CaptureValue::Unserializable
            }
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            CaptureValue::Null => "null",
            CaptureValue::Bool(_) => "boolean",
            CaptureValue::Int(_) | CaptureValue::Float(_) => "number",
            CaptureValue::Str(_) => "string",
            CaptureValue::Structured(Value::Array(_)) => "array",
            CaptureValue::Structured(_) | CaptureValue::Unserializable => "object",
            CaptureValue::Unknown => "unknown",
        }
    }

    /// Wire representation, substituting a `[<type>]` placeholder where needed
    pub fn to_wire(&self) -> Value {
        match self {
            CaptureValue::Null => Value::Null,
            CaptureValue::Bool(b) => Value::Bool(*b),
            CaptureValue::Int(i) => Value::from(*i),
            CaptureValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| placeholder(self.type_tag())),
            CaptureValue::Str(s) => Value::String(s.clone()),
            CaptureValue::Structured(value) => value.clone(),
            CaptureValue::Unserializable | CaptureValue::Unknown => placeholder(self.type_tag()),
        }
    }
}

fn placeholder(tag: &str) -> Value {
    Value::String(format!("[{tag}]"))
}

impl From<bool> for CaptureValue {
    fn from(value: bool) -> Self {
        CaptureValue::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CaptureValue {
                fn from(value: $ty) -> Self {
                    CaptureValue::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for CaptureValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(value) => CaptureValue::Int(value),
            Err(_) => CaptureValue::Structured(Value::from(value)),
        }
    }
}

impl From<usize> for CaptureValue {
    fn from(value: usize) -> Self {
        CaptureValue::from(value as u64)
    }
}

impl From<f32> for CaptureValue {
    fn from(value: f32) -> Self {
        CaptureValue::Float(f64::from(value))
    }
}

impl From<f64> for CaptureValue {
    fn from(value: f64) -> Self {
        CaptureValue::Float(value)
    }
}

impl From<&str> for CaptureValue {
    fn from(value: &str) -> Self {
        CaptureValue::Str(value.to_string())
    }
}

impl From<String> for CaptureValue {
    fn from(value: String) -> Self {
        CaptureValue::Str(value)
    }
}

impl From<&String> for CaptureValue {
    fn from(value: &String) -> Self {
        CaptureValue::Str(value.clone())
    }
}

impl From<Value> for CaptureValue {
    fn from(value: Value) -> Self {
        CaptureValue::Structured(value)
    }
}

impl<T: Into<CaptureValue>> From<Option<T>> for CaptureValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CaptureValue::Null)
    }
}
