//! Bulk ingestion handlers.
//!
//! Both endpoints run the same pipeline: decode the body, validate the
//! items, write the valid records, report. They differ only in record kind.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::header::CONTENT_ENCODING;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{Map, Value};

use usage_ingest_core::{decode_body, IngestResponse, ValidatedBatch};
use usage_ingest_store::{BulkWriter, Record};

use crate::auth::BearerAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Ingest a batch of usage events.
///
/// `POST /ingest/requests:bulk`
pub async fn ingest_usage_events(
    State(state): State<Arc<AppState>>,
    _auth: BearerAuth,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let payload = decode(&state, &headers, body?)?;
    let batch = state
        .validator
        .validate_usage_events(&payload, Utc::now())?;
    write_batch(&state, batch).await.map(Json)
}

/// Ingest a batch of message archives.
///
/// `POST /ingest/archives:bulk`
pub async fn ingest_archives(
    State(state): State<Arc<AppState>>,
    _auth: BearerAuth,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let payload = decode(&state, &headers, body?)?;
    let batch = state.validator.validate_archives(&payload, Utc::now())?;
    write_batch(&state, batch).await.map(Json)
}

fn decode(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Map<String, Value>, ApiError> {
    let encoding = headers
        .get(CONTENT_ENCODING)
        .map(|v| {
            v.to_str()
                .map_err(|_| ApiError::MalformedPayload("invalid Content-Encoding header".into()))
        })
        .transpose()?;

    decode_body(&body, encoding, &state.limits).map_err(|e| {
        tracing::debug!(error = %e, body_bytes = body.len(), ?encoding, "Rejected request body");
        ApiError::from(e)
    })
}

async fn write_batch<R: Record>(
    state: &AppState,
    batch: ValidatedBatch<R>,
) -> Result<IngestResponse, ApiError> {
    let ValidatedBatch {
        records,
        rejections,
        submitted,
    } = batch;

    let report = BulkWriter::new(state.store.as_ref())
        .write(&records)
        .await?;

    let errors = rejections
        .iter()
        .map(ToString::to_string)
        .chain(report.errors);
    let response = IngestResponse::new(submitted, report.accepted, errors);

    tracing::info!(
        kind = R::KIND,
        submitted,
        valid = records.len(),
        accepted = response.accepted,
        rejected = response.rejected,
        "Bulk ingest complete"
    );

    Ok(response)
}
