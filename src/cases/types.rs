//! Case request, record, and response types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::store::value::{fields_to_json, to_iso_string};
use crate::store::{Document, FieldValue, Fields};

/// Status given to every new case.
pub const STATUS_OPEN: &str = "Open";

/// Priority used when the caller supplies none.
pub const DEFAULT_PRIORITY: &str = "Low";

/// Stored field names.
pub mod field {
    /// Case title.
    pub const TITLE: &str = "title";
    /// Affected system.
    pub const SYSTEM_NAME: &str = "systemName";
    /// Priority label.
    pub const PRIORITY: &str = "priority";
    /// Workflow status.
    pub const STATUS: &str = "status";
    /// Creation timestamp.
    pub const CREATED_AT: &str = "createdAt";
    /// Document id, added on read.
    pub const ID: &str = "id";
}

/// Decode a request body without ever rejecting it.
///
/// A missing body, invalid JSON or a non-object value decodes as `{}`.
pub fn decode_body<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
        _ => T::default(),
    }
}

/// JavaScript truthiness: `null`, `false`, `0` and `""` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Body of `POST /cases`. Unknown keys, including `status`, are ignored.
///
/// Values may be any JSON type and are stored as given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaseRequest {
    /// Case title.
    #[serde(default)]
    pub title: Option<Value>,
    /// Affected system.
    #[serde(default)]
    pub system_name: Option<Value>,
    /// Priority label.
    #[serde(default)]
    pub priority: Option<Value>,
}

/// A case as written on creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCase {
    /// Case title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    /// Affected system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_name: Option<Value>,
    /// Priority, never falsy.
    pub priority: Value,
    /// Always `Open` at creation.
    pub status: String,
    /// Creation time.
    #[serde(serialize_with = "serialize_iso")]
    pub created_at: OffsetDateTime,
}

fn serialize_iso<S: Serializer>(ts: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_iso_string(*ts))
}

impl NewCase {
    /// Build a new case from a request, applying defaults.
    pub fn from_request(request: CreateCaseRequest, created_at: OffsetDateTime) -> Self {
        let priority = request
            .priority
            .filter(is_truthy)
            .unwrap_or_else(|| Value::String(DEFAULT_PRIORITY.to_string()));

        Self {
            title: request.title,
            system_name: request.system_name,
            priority,
            status: STATUS_OPEN.to_string(),
            created_at,
        }
    }

    /// Fields to store. Absent title and system name are left out.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        if let Some(title) = &self.title {
            fields.insert(field::TITLE.to_string(), FieldValue::from_json(title.clone()));
        }
        if let Some(system_name) = &self.system_name {
            fields.insert(
                field::SYSTEM_NAME.to_string(),
                FieldValue::from_json(system_name.clone()),
            );
        }
        fields.insert(
            field::PRIORITY.to_string(),
            FieldValue::from_json(self.priority.clone()),
        );
        fields.insert(field::STATUS.to_string(), FieldValue::from(self.status.as_str()));
        fields.insert(field::CREATED_AT.to_string(), FieldValue::from(self.created_at));
        fields
    }
}

/// Response of `POST /cases`: the generated id plus the submitted record.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedCase {
    /// Store-assigned id.
    pub id: String,
    /// The record as written.
    #[serde(flatten)]
    pub case: NewCase,
}

/// Body of `PUT /cases/{id}`.
///
/// Only these fields can change, to any JSON value. Unknown keys, `id` and
/// `createdAt` are ignored, and `null` counts as not supplied.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseUpdate {
    /// New title.
    #[serde(default)]
    pub title: Option<Value>,
    /// New system name.
    #[serde(default)]
    pub system_name: Option<Value>,
    /// New priority.
    #[serde(default)]
    pub priority: Option<Value>,
    /// New status.
    #[serde(default)]
    pub status: Option<Value>,
}

impl CaseUpdate {
    /// Whether no field was supplied.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.system_name.is_none()
            && self.priority.is_none()
            && self.status.is_none()
    }

    /// Supplied fields only.
    pub fn to_fields(&self) -> Fields {
        [
            (field::TITLE, &self.title),
            (field::SYSTEM_NAME, &self.system_name),
            (field::PRIORITY, &self.priority),
            (field::STATUS, &self.status),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_ref()
                .map(|v| (name.to_string(), FieldValue::from_json(v.clone())))
        })
        .collect()
    }
}

/// Confirmation body of a successful update.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    /// Confirmation text.
    pub message: String,
}

/// Render a stored document as a list entry.
///
/// Stored fields are copied as JSON with timestamps as ISO-8601 strings.
/// `createdAt` is always present, `null` when the document has none or the
/// stored value is falsy. The document id wins over any stored `id` field.
pub fn render_case(document: &Document) -> Value {
    let mut object: Map<String, Value> = fields_to_json(&document.fields);
    let created_at = object
        .remove(field::CREATED_AT)
        .filter(is_truthy)
        .unwrap_or(Value::Null);
    object.insert(field::CREATED_AT.to_string(), created_at);
    object.insert(field::ID.to_string(), Value::String(document.id.clone()));
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-03-01 08:15:30.250 UTC);

    fn request(title: Option<&str>, system: Option<&str>, priority: Option<&str>) -> CreateCaseRequest {
        CreateCaseRequest {
            title: title.map(Value::from),
            system_name: system.map(Value::from),
            priority: priority.map(Value::from),
        }
    }

    #[test]
    fn missing_priority_defaults_to_low() {
        let case = NewCase::from_request(request(Some("Disk full"), Some("db1"), None), NOW);
        assert_eq!(case.priority, json!("Low"));
        assert_eq!(case.status, "Open");
    }

    #[test]
    fn empty_priority_defaults_to_low() {
        let case = NewCase::from_request(request(None, None, Some("")), NOW);
        assert_eq!(case.priority, json!("Low"));
    }

    #[test]
    fn supplied_priority_is_kept() {
        let case = NewCase::from_request(request(None, None, Some("High")), NOW);
        assert_eq!(case.priority, json!("High"));
    }

    #[test]
    fn falsy_priority_values_default_to_low() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            let parsed: CreateCaseRequest =
                serde_json::from_value(json!({"priority": falsy.clone()})).unwrap();
            let case = NewCase::from_request(parsed, NOW);
            assert_eq!(case.priority, json!("Low"), "priority {falsy}");
        }
    }

    #[test]
    fn truthy_non_string_values_are_stored_as_given() {
        let parsed: CreateCaseRequest =
            serde_json::from_value(json!({"title": 42, "systemName": ["a"], "priority": 3}))
                .unwrap();
        let fields = NewCase::from_request(parsed, NOW).to_fields();

        assert_eq!(fields[field::TITLE], FieldValue::Integer(42));
        assert_eq!(
            fields[field::SYSTEM_NAME],
            FieldValue::Array(vec![FieldValue::from("a")])
        );
        assert_eq!(fields[field::PRIORITY], FieldValue::Integer(3));
    }

    #[test]
    fn unreadable_bodies_decode_as_empty() {
        for body in ["", "not json", "[1,2]", "\"text\"", "{\"title\":"] {
            let request: CreateCaseRequest = decode_body(body.as_bytes());
            assert!(request.title.is_none());
            assert!(request.priority.is_none());

            let update: CaseUpdate = decode_body(body.as_bytes());
            assert!(update.is_empty());
        }

        let update: CaseUpdate = decode_body(br#"{"status": 1}"#);
        assert_eq!(update.status, Some(json!(1)));
    }

    #[test]
    fn submitted_status_is_ignored() {
        let parsed: CreateCaseRequest =
            serde_json::from_value(json!({"title": "t", "status": "Closed", "priority": null}))
                .unwrap();
        let case = NewCase::from_request(parsed, NOW);
        assert_eq!(case.status, "Open");
        assert_eq!(case.priority, json!("Low"));
    }

    #[test]
    fn absent_fields_are_not_stored() {
        let case = NewCase::from_request(request(None, None, None), NOW);
        let fields = case.to_fields();
        assert!(!fields.contains_key(field::TITLE));
        assert!(!fields.contains_key(field::SYSTEM_NAME));
        assert_eq!(fields[field::CREATED_AT], FieldValue::Timestamp(NOW));
    }

    #[test]
    fn created_case_serializes_flat_with_iso_timestamp() {
        let created = CreatedCase {
            id: "abc".to_string(),
            case: NewCase::from_request(request(Some("Disk full"), Some("db1"), None), NOW),
        };

        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({
                "id": "abc",
                "title": "Disk full",
                "systemName": "db1",
                "priority": "Low",
                "status": "Open",
                "createdAt": "2025-03-01T08:15:30.250Z"
            })
        );
    }

    #[test]
    fn update_keeps_only_known_supplied_fields() {
        let update: CaseUpdate = serde_json::from_value(json!({
            "status": "Closed",
            "title": null,
            "createdAt": "1970-01-01T00:00:00Z",
            "id": "other",
            "extra": 1
        }))
        .unwrap();

        assert!(!update.is_empty());
        let fields = update.to_fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[field::STATUS], FieldValue::from("Closed"));
    }

    #[test]
    fn update_accepts_any_json_value_for_known_fields() {
        let update: CaseUpdate =
            serde_json::from_value(json!({"status": 1, "priority": false})).unwrap();

        let fields = update.to_fields();
        assert_eq!(fields[field::STATUS], FieldValue::Integer(1));
        assert_eq!(fields[field::PRIORITY], FieldValue::Boolean(false));
    }

    #[test]
    fn empty_update_has_no_fields() {
        let update: CaseUpdate = serde_json::from_value(json!({})).unwrap();
        assert!(update.is_empty());
        assert!(update.to_fields().is_empty());
    }

    #[test]
    fn render_converts_created_at_and_adds_id() {
        let mut fields = Fields::new();
        fields.insert(field::TITLE.to_string(), FieldValue::from("Disk full"));
        fields.insert(field::CREATED_AT.to_string(), FieldValue::Timestamp(NOW));
        fields.insert(field::ID.to_string(), FieldValue::from("stale"));

        let rendered = render_case(&Document {
            id: "abc".to_string(),
            fields,
        });

        assert_eq!(
            rendered,
            json!({"id": "abc", "title": "Disk full", "createdAt": "2025-03-01T08:15:30.250Z"})
        );
    }

    #[test]
    fn render_emits_null_created_at_when_missing() {
        let rendered = render_case(&Document {
            id: "abc".to_string(),
            fields: Fields::new(),
        });

        assert_eq!(rendered, json!({"id": "abc", "createdAt": null}));
    }

    #[test]
    fn render_emits_null_for_falsy_created_at() {
        for falsy in [
            FieldValue::from(""),
            FieldValue::Boolean(false),
            FieldValue::Integer(0),
            FieldValue::Double(0.0),
            FieldValue::Null,
        ] {
            let mut fields = Fields::new();
            fields.insert(field::CREATED_AT.to_string(), falsy.clone());

            let rendered = render_case(&Document {
                id: "abc".to_string(),
                fields,
            });
            assert_eq!(rendered, json!({"id": "abc", "createdAt": null}), "{falsy:?}");
        }
    }

    #[test]
    fn render_keeps_truthy_non_timestamp_created_at() {
        let mut fields = Fields::new();
        fields.insert(field::CREATED_AT.to_string(), FieldValue::from("yesterday"));

        let rendered = render_case(&Document {
            id: "abc".to_string(),
            fields,
        });
        assert_eq!(rendered, json!({"id": "abc", "createdAt": "yesterday"}));
    }
}
