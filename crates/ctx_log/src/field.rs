//! Key/value pairs carried by log records.

use std::borrow::Cow;

use serde_json::Value;

/// The name of a field.
///
/// A registered field name is both the key probed in a context and the key written to the
/// structured output.
pub type FieldName = Cow<'static, str>;

/// A single key/value pair attached to a log record.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// The key written to the structured output.
    pub key: FieldName,

    /// The value written to the structured output.
    pub value: Value,
}

impl Field {
    /// Creates a new [`Field`].
    pub fn new(key: impl Into<FieldName>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl<K, V> From<(K, V)> for Field
where
    K: Into<FieldName>,
    V: Into<Value>,
{
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}
