//! Redaction of captured variables
//!
//! Captured values pass through three steps before they leave the process:
//! a serializability pass (placeholders for anything the wire format cannot
//! carry), name-based redaction, then value-based redaction against an
//! ordered pattern set.

pub mod redactor;
pub mod value;

pub use redactor::{
    luhn_valid, Redaction, Redactor, ValuePattern, REDACTED, SENSITIVE_NAME_TERMS,
    SENSITIVE_VARIABLE_NAME,
};
pub use value::{CaptureValue, CaptureValues};

/// Build a [`CaptureValues`] map from `name => value` pairs.
///
/// ```
/// use snapline::{vars, CaptureValue};
///
/// let order_id = 1042;
/// let values = vars! {
///     "order_id" => order_id,
///     "status" => "pending",
///     "conn" => CaptureValue::opaque::<std::net::TcpStream>(),
/// };
/// assert_eq!(values.len(), 3);
/// ```
#[macro_export]
macro_rules! vars {
    () => {
        $crate::redact::CaptureValues::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut values = $crate::redact::CaptureValues::new();
        $(
            values.insert(
                ::std::string::String::from($name),
                $crate::redact::CaptureValue::from($value),
            );
        )+
        values
    }};
}
