//! Page extraction route
//!
//! `POST /api/extract-pdf` takes `{ "pdfData": <base64>, "pageNumber": <int> }`
//! and answers with the text spans and placed images of that page.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::error::{AppError, Result};
use crate::extract::ExtractionResult;
use crate::state::AppState;

/// Create the extraction router
pub fn router() -> Router<AppState> {
    Router::new().route("/extract-pdf", post(extract_pdf))
}

/// Validated request fields
#[derive(Debug)]
struct ExtractRequest {
    pdf_bytes: Vec<u8>,
    page_number: i64,
}

impl ExtractRequest {
    /// Validate a raw JSON body. A missing `pdfData` wins over every other problem.
    fn from_json(body: Value) -> Result<Self> {
        let Value::Object(fields) = body else {
            return Err(AppError::InvalidRequest(
                "request body must be a JSON object".to_string(),
            ));
        };

        let encoded = pdf_data(&fields)?;
        let page_number = page_number(&fields)?;
        let pdf_bytes = decode_pdf_data(encoded)?;

        Ok(Self {
            pdf_bytes,
            page_number,
        })
    }
}

fn pdf_data(fields: &Map<String, Value>) -> Result<&str> {
    match fields.get("pdfData") {
        None => Err(AppError::MissingInput),
        Some(value) if is_falsy(value) => Err(AppError::MissingInput),
        Some(Value::String(encoded)) => Ok(encoded.as_str()),
        Some(_) => Err(AppError::InvalidRequest(
            "pdfData must be a base64 string".to_string(),
        )),
    }
}

fn page_number(fields: &Map<String, Value>) -> Result<i64> {
    match fields.get("pageNumber") {
        None | Some(Value::Null) => Ok(1),
        Some(value) => value.as_i64().ok_or_else(|| {
            AppError::InvalidRequest(format!("pageNumber must be an integer, got {value}"))
        }),
    }
}

/// JSON values that count as "not provided"
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Strip ASCII whitespace, then decode standard padded base64
fn decode_pdf_data(encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(BASE64.decode(compact)?)
}

/// Extract one page of a base64-encoded PDF
async fn extract_pdf(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<ExtractionResult>> {
    let Json(body) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let request = ExtractRequest::from_json(body)?;

    tracing::info!(
        bytes = request.pdf_bytes.len(),
        page = request.page_number,
        "Extracting PDF page"
    );

    let extractor = state.extractor().clone();
    let limit = state.extract_timeout();

    // Offload CPU-bound parsing; the blocking thread may outlive the timeout
    let outcome = timeout(
        limit,
        tokio::task::spawn_blocking(move || {
            extractor.extract(&request.pdf_bytes, request.page_number)
        }),
    )
    .await;

    let result = match outcome {
        Ok(join_result) => join_result.map_err(|e| AppError::Task(e.to_string()))??,
        Err(_) => return Err(AppError::Timeout(limit.as_secs())),
    };

    tracing::info!(
        text_elements = result.text_elements.len(),
        image_elements = result.image_elements.len(),
        "Extraction complete"
    );

    Ok(Json(result))
}
