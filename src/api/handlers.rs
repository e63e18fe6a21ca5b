//! HTTP API handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::cases::{
    decode_body, render_case, CaseUpdate, CreateCaseRequest, CreatedCase, MessageResponse, NewCase,
};
use crate::error::{ApiError, StoreError};
use crate::metrics;
use crate::store::CaseStore;

/// Text served at `/`.
pub const ROOT_MESSAGE: &str = "Backend Server is Running!";

/// Confirmation returned by a successful update.
pub const UPDATED_MESSAGE: &str = "Case updated successfully";

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Case document store.
    store: Arc<dyn CaseStore>,
}

impl AppState {
    /// Create app state around a store.
    pub fn new(store: impl CaseStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Create app state around an already shared store.
    pub fn from_shared(store: Arc<dyn CaseStore>) -> Self {
        Self { store }
    }

    /// The case store.
    pub fn store(&self) -> &dyn CaseStore {
        self.store.as_ref()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Record a failed store call before handing it to the caller.
fn store_failure(operation: &'static str) -> impl Fn(StoreError) -> ApiError {
    move |e| {
        metrics::inc_store_failures(operation);
        ApiError::Store(e)
    }
}

/// Root handler - plain text liveness string.
pub async fn root() -> &'static str {
    ROOT_MESSAGE
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Create a case with `Open` status and a default priority.
///
/// The body is never rejected: anything that is not a JSON object counts as
/// `{}`, and field values of any JSON type are stored as given.
#[instrument(skip_all)]
pub async fn create_case(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatedCase>), ApiError> {
    let request: CreateCaseRequest = decode_body(&body);
    let case = NewCase::from_request(request, OffsetDateTime::now_utc());

    let id = {
        let _timer = metrics::timer_store("add");
        state
            .store()
            .add(case.to_fields())
            .await
            .map_err(store_failure("add"))?
    };

    metrics::inc_cases_created();
    info!(id = %id, priority = %case.priority, "Case created");

    Ok((StatusCode::CREATED, Json(CreatedCase { id, case })))
}

/// List every case in store order.
#[instrument(skip_all)]
pub async fn list_cases(State(state): State<AppState>) -> Result<Json<Vec<Value>>, ApiError> {
    let documents = {
        let _timer = metrics::timer_store("list");
        state.store().list().await.map_err(store_failure("list"))?
    };

    Ok(Json(documents.iter().map(render_case).collect()))
}

/// Merge supplied fields into an existing case.
///
/// The body is decoded like [`create_case`]'s. When no known field is
/// supplied the existence check still runs, and an existing case answers
/// 200 without any write. A merge of `{}` through the Firestore SDK would
/// instead fail with 500.
#[instrument(skip(state, body))]
pub async fn update_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let update: CaseUpdate = decode_body(&body);
    let existing = {
        let _timer = metrics::timer_store("get");
        state.store().get(&id).await.map_err(store_failure("get"))?
    };
    if existing.is_none() {
        return Err(ApiError::NotFound);
    }

    if !update.is_empty() {
        let _timer = metrics::timer_store("update");
        state
            .store()
            .update(&id, update.to_fields())
            .await
            .map_err(store_failure("update"))?;
    }

    metrics::inc_cases_updated();
    info!(id = %id, "Case updated");

    Ok(Json(MessageResponse {
        message: UPDATED_MESSAGE.to_string(),
    }))
}
