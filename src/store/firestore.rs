//! Firestore REST API client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::Config;
use crate::credentials::{ServiceAccountKey, TokenProvider};
use crate::error::{ServerError, StoreError};

use super::{CaseStore, Document, FieldValue, Fields};

/// Page size used when listing a collection.
pub const LIST_PAGE_SIZE: u32 = 300;

/// Project id used against the emulator when none is configured.
pub const EMULATOR_PROJECT_ID: &str = "demo-case-tracker";

/// How requests are authorized.
#[derive(Debug, Clone)]
pub enum Authorization {
    /// OAuth2 bearer tokens from a service account.
    ServiceAccount(Arc<TokenProvider>),
    /// The emulator's admin token, which bypasses security rules.
    Emulator,
}

/// Firestore collection client.
#[derive(Debug, Clone)]
pub struct FirestoreStore {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// URL of the collection resource.
    collection_url: Url,
    /// Request authorization.
    auth: Authorization,
}

/// Document resource as returned by the API.
#[derive(Debug, Deserialize)]
struct DocumentResource {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Response of a `documents.list` call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<DocumentResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl FirestoreStore {
    /// Create a client for `collection` in the given project and database.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        project_id: &str,
        database: &str,
        collection: &str,
        auth: Authorization,
    ) -> Result<Self, StoreError> {
        let mut collection_url = Url::parse(base_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid Firestore base URL: {}", e)))?;

        collection_url
            .path_segments_mut()
            .map_err(|_| StoreError::Unavailable("Firestore base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["projects", project_id, "databases", database, "documents", collection]);

        Ok(Self {
            http,
            collection_url,
            auth,
        })
    }

    /// Build a client from configuration.
    ///
    /// Against the emulator no credentials are read. Otherwise the
    /// service-account key file must exist and parse, or startup fails.
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .connect_timeout(Duration::from_secs(5))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(StoreError::from)?;

        if let Some(host) = &config.firestore_emulator_host {
            let project_id = config
                .firestore_project_id
                .as_deref()
                .unwrap_or(EMULATOR_PROJECT_ID);
            info!(host = %host, project = %project_id, "Using Firestore emulator");

            let store = Self::new(
                http,
                &format!("http://{}/v1", host),
                project_id,
                &config.firestore_database,
                &config.cases_collection,
                Authorization::Emulator,
            )?;
            return Ok(store);
        }

        let key = ServiceAccountKey::from_file(&config.google_application_credentials)?;
        let tokens = TokenProvider::new(key, http.clone())?;
        let project_id = config
            .firestore_project_id
            .clone()
            .unwrap_or_else(|| tokens.key().project_id.clone());
        info!(
            project = %project_id,
            account = %tokens.key().client_email,
            "Loaded service-account credentials"
        );

        let store = Self::new(
            http,
            &config.firestore_base_url,
            &project_id,
            &config.firestore_database,
            &config.cases_collection,
            Authorization::ServiceAccount(Arc::new(tokens)),
        )?;
        Ok(store)
    }

    /// URL of the collection resource.
    pub fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    /// URL of a single document.
    pub fn document_url(&self, id: &str) -> Url {
        let mut url = self.collection_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        url
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        match &self.auth {
            Authorization::ServiceAccount(tokens) => {
                let token = tokens.access_token().await?;
                Ok(request.bearer_auth(token))
            }
            Authorization::Emulator => Ok(request.bearer_auth("owner")),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self.authorize(request).await?.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(api_error(response).await)
    }
}

/// Turn a non-success response into a `StoreError::Api`.
async fn api_error(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.is_empty() => format!("HTTP {}", status),
        Err(_) => body,
    };
    StoreError::Api { status, message }
}

#[async_trait]
impl CaseStore for FirestoreStore {
    #[instrument(skip(self, fields))]
    async fn add(&self, fields: Fields) -> Result<String, StoreError> {
        let request = self
            .http
            .post(self.collection_url.clone())
            .json(&json!({ "fields": encode_fields(&fields) }));

        let document: DocumentResource = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("created document: {}", e)))?;

        let id = document_id(&document.name)?;
        debug!(id = %id, "created document");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        if !is_document_id(id) {
            debug!(id = %id, "not a document id");
            return Ok(None);
        }

        let request = self.http.get(self.document_url(id));
        let response = self.authorize(request).await?.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let resource: DocumentResource = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("document {}: {}", id, e)))?;

        decode_document(resource).map(Some)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Document>, StoreError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", LIST_PAGE_SIZE.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let request = self.http.get(self.collection_url.clone()).query(&query);
            let page: ListDocumentsResponse = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(|e| StoreError::Decode(format!("document list: {}", e)))?;

            for resource in page.documents {
                documents.push(decode_document(resource)?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(count = documents.len(), "listed documents");
        Ok(documents)
    }

    #[instrument(skip(self, fields))]
    async fn update(&self, id: &str, fields: Fields) -> Result<(), StoreError> {
        // A PATCH without a mask replaces the whole document
        if fields.is_empty() {
            return Ok(());
        }
        if !is_document_id(id) {
            return Err(StoreError::Api {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("No document to update: {}", id),
            });
        }

        let mut query: Vec<(&str, String)> = fields
            .keys()
            .map(|name| ("updateMask.fieldPaths", quote_field_path(name)))
            .collect();
        query.push(("currentDocument.exists", "true".to_string()));

        let request = self
            .http
            .patch(self.document_url(id))
            .query(&query)
            .json(&json!({ "fields": encode_fields(&fields) }));

        self.send(request).await?;
        debug!(id = %id, "updated document");
        Ok(())
    }
}

/// Whether `id` names a document directly under the collection.
///
/// Empty ids, `.`, `..` and ids containing `/` would resolve to another
/// resource once placed in the URL path.
pub fn is_document_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains('/')
}

/// Extract the document id from a resource name.
pub fn document_id(name: &str) -> Result<String, StoreError> {
    name.rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StoreError::Decode(format!("malformed document name: {}", name)))
}

/// Quote a field name for use in a field path when it is not a simple identifier.
pub fn quote_field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn decode_document(resource: DocumentResource) -> Result<Document, StoreError> {
    let id = document_id(&resource.name)?;
    let fields = decode_fields(&resource.fields)?;
    Ok(Document { id, fields })
}

/// Encode a field map into Firestore's `fields` JSON.
pub fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect()
}

/// Encode one value into Firestore's typed JSON form.
pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Boolean(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => {
            let formatted = ts
                .to_offset(UtcOffset::UTC)
                .format(&Rfc3339)
                .unwrap_or_default();
            json!({ "timestampValue": formatted })
        }
        FieldValue::Array(values) => {
            let values: Vec<Value> = values.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

/// Decode Firestore's `fields` JSON into a field map.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Fields, StoreError> {
    fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

/// Decode one typed Firestore value.
pub fn decode_value(value: &Value) -> Result<FieldValue, StoreError> {
    let object = value
        .as_object()
        .ok_or_else(|| StoreError::Decode(format!("expected typed value, got {}", value)))?;
    let (kind, inner) = object
        .iter()
        .next()
        .ok_or_else(|| StoreError::Decode("empty typed value".to_string()))?;

    let decoded = match kind.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => FieldValue::Boolean(inner.as_bool().unwrap_or_default()),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse().ok(),
                other => other.as_i64(),
            };
            FieldValue::Integer(
                parsed.ok_or_else(|| StoreError::Decode(format!("bad integerValue: {}", inner)))?,
            )
        }
        "doubleValue" => match inner {
            Value::String(s) => FieldValue::Double(s.parse().unwrap_or(f64::NAN)),
            other => FieldValue::Double(other.as_f64().unwrap_or_default()),
        },
        "timestampValue" => {
            let raw = inner.as_str().unwrap_or_default();
            let ts = OffsetDateTime::parse(raw, &Rfc3339)
                .map_err(|e| StoreError::Decode(format!("bad timestampValue {}: {}", raw, e)))?;
            FieldValue::Timestamp(ts)
        }
        "stringValue" | "bytesValue" | "referenceValue" => {
            FieldValue::String(inner.as_str().unwrap_or_default().to_string())
        }
        "geoPointValue" => {
            let mut point = Fields::new();
            for axis in ["latitude", "longitude"] {
                let coordinate = inner.get(axis).and_then(Value::as_f64).unwrap_or_default();
                point.insert(axis.to_string(), FieldValue::Double(coordinate));
            }
            FieldValue::Map(point)
        }
        "arrayValue" => {
            let values = match inner.get("values").and_then(Value::as_array) {
                Some(values) => values.iter().map(decode_value).collect::<Result<_, _>>()?,
                None => Vec::new(),
            };
            FieldValue::Array(values)
        }
        "mapValue" => match inner.get("fields").and_then(Value::as_object) {
            Some(fields) => FieldValue::Map(decode_fields(fields)?),
            None => FieldValue::Map(Fields::new()),
        },
        other => return Err(StoreError::Decode(format!("unknown value type {}", other))),
    };

    Ok(decoded)
}
