//! Typed field values stored on documents.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};
use time::{OffsetDateTime, UtcOffset};

/// Field name to value mapping of a single document.
pub type Fields = BTreeMap<String, FieldValue>;

/// A single field value, following the Firestore value model.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit null.
    Null,
    /// Boolean.
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Point in time.
    Timestamp(OffsetDateTime),
    /// Ordered list of values.
    Array(Vec<FieldValue>),
    /// Nested map.
    Map(Fields),
}

impl FieldValue {
    /// Render as plain JSON. Timestamps become ISO-8601 strings.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::Number((*i).into()),
            FieldValue::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Timestamp(ts) => Value::String(to_iso_string(*ts)),
            FieldValue::Array(values) => {
                Value::Array(values.iter().map(FieldValue::to_json).collect())
            }
            FieldValue::Map(fields) => Value::Object(fields_to_json(fields)),
        }
    }

    /// Get the timestamp if this value is one.
    pub fn as_timestamp(&self) -> Option<OffsetDateTime> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Convert caller-supplied JSON, keeping its type.
    ///
    /// Whole numbers that fit become integers, other numbers doubles.
    /// Strings are never parsed as timestamps.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s),
            Value::Array(values) => {
                FieldValue::Array(values.into_iter().map(FieldValue::from_json).collect())
            }
            Value::Object(object) => FieldValue::Map(
                object
                    .into_iter()
                    .map(|(name, value)| (name, FieldValue::from_json(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<OffsetDateTime> for FieldValue {
    fn from(ts: OffsetDateTime) -> Self {
        FieldValue::Timestamp(ts)
    }
}

/// Render a whole field map as a JSON object.
pub fn fields_to_json(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM:SS.sssZ` in UTC.
pub fn to_iso_string(ts: OffsetDateTime) -> String {
    let format = time::macros::format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    let utc = ts.to_offset(UtcOffset::UTC);
    utc.format(&format).unwrap_or_else(|_| utc.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn iso_string_has_millisecond_precision_in_utc() {
        let ts = datetime!(2025-03-01 10:15:30.123456 +02:00);
        assert_eq!(to_iso_string(ts), "2025-03-01T08:15:30.123Z");
    }

    #[test]
    fn iso_string_pads_whole_seconds() {
        let ts = datetime!(2025-01-02 03:04:05 UTC);
        assert_eq!(to_iso_string(ts), "2025-01-02T03:04:05.000Z");
    }

    #[test]
    fn nested_values_render_as_json() {
        let mut inner = Fields::new();
        inner.insert("seen".to_string(), FieldValue::Timestamp(datetime!(2025-01-02 03:04:05 UTC)));
        inner.insert("count".to_string(), FieldValue::Integer(3));

        let value = FieldValue::Array(vec![
            FieldValue::Null,
            FieldValue::Boolean(true),
            FieldValue::Double(1.5),
            FieldValue::Map(inner),
        ]);

        assert_eq!(
            value.to_json(),
            json!([null, true, 1.5, {"count": 3, "seen": "2025-01-02T03:04:05.000Z"}])
        );
    }

    #[test]
    fn json_input_keeps_its_type() {
        let value = FieldValue::from_json(json!({
            "n": 42,
            "big": 18446744073709551615u64,
            "f": 0.5,
            "flag": false,
            "list": ["a", null],
            "when": "2025-01-02T03:04:05.000Z"
        }));

        let mut expected = Fields::new();
        expected.insert("n".to_string(), FieldValue::Integer(42));
        expected.insert("big".to_string(), FieldValue::Double(18446744073709551615u64 as f64));
        expected.insert("f".to_string(), FieldValue::Double(0.5));
        expected.insert("flag".to_string(), FieldValue::Boolean(false));
        expected.insert(
            "list".to_string(),
            FieldValue::Array(vec![FieldValue::from("a"), FieldValue::Null]),
        );
        expected.insert("when".to_string(), FieldValue::from("2025-01-02T03:04:05.000Z"));

        assert_eq!(value, FieldValue::Map(expected));
    }

    #[test]
    fn non_finite_double_renders_as_null() {
        assert_eq!(FieldValue::Double(f64::NAN).to_json(), Value::Null);
    }
}
