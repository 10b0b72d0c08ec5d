//! Case-management document submission.
//!
//! One [`CreateDocumentRequest`] per item, posted to
//! `POST {base}/cases/{case_id}/documents` with the content base64-encoded
//! in the JSON body. HTTP statuses are mapped to the error taxonomy at
//! this boundary: 401/403 → auth, 429 → rate limited (with the
//! server-suggested wait when it sends one), 5xx → transient server
//! failure, any other non-2xx → client request failure.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AuthError, Result, UploadError};
use crate::types::UploadItem;

/// JSON body for creating a case document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    /// Document title shown in the case record.
    pub title: String,

    /// Original file name.
    pub filename: String,

    /// Mail-service id of the source item.
    pub source_item_id: String,

    /// MIME type of the content, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// When the host application received the email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,

    /// Base64-encoded binary content.
    pub content: String,
}

impl CreateDocumentRequest {
    /// Build the submission body for a translated item and its content.
    pub fn from_item(item: &UploadItem, content: &[u8]) -> Result<Self> {
        let source_item_id = item.remote_id.clone().ok_or_else(|| {
            UploadError::InvalidResponse(format!("item {} has no remote id", item.local_id))
        })?;
        Ok(Self {
            title: item.metadata.title.clone(),
            filename: item.metadata.filename.clone(),
            source_item_id,
            mime_type: item.metadata.mime_type.clone(),
            received_at: item.metadata.received_at,
            content: STANDARD.encode(content),
        })
    }
}

/// The case-management record created for one uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Identifier of the created document.
    pub id: String,

    /// Title as stored in the case record.
    pub title: String,

    /// Stored content size in bytes, if the service reports it.
    #[serde(default)]
    pub size_bytes: Option<u64>,

    /// Creation timestamp, if the service reports it.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Submits one document to the case-management service.
#[async_trait]
pub trait DocumentSubmitter: Send + Sync {
    /// Create a document under `case_id`, authenticating with `bearer`.
    async fn submit(
        &self,
        bearer: &str,
        case_id: &str,
        request: &CreateDocumentRequest,
    ) -> Result<DocumentRecord>;
}

/// [`DocumentSubmitter`] over the case-management REST API.
pub struct CaseDocumentsClient {
    http: reqwest::Client,
    base_url: String,
}

impl CaseDocumentsClient {
    /// Create a client against the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn documents_url(&self, case_id: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/cases/{case_id}/documents")
    }
}

#[async_trait]
impl DocumentSubmitter for CaseDocumentsClient {
    async fn submit(
        &self,
        bearer: &str,
        case_id: &str,
        request: &CreateDocumentRequest,
    ) -> Result<DocumentRecord> {
        debug!(case = %case_id, filename = %request.filename, "submitting document");

        let response = self
            .http
            .post(self.documents_url(case_id))
            .header("Authorization", format!("Bearer {bearer}"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                let header_ms = parse_retry_after_header(&response);
                let body = response.text().await.unwrap_or_default();
                let retry_after_ms = header_ms.or_else(|| parse_retry_after_ms(&body));
                warn!(case = %case_id, retry_after_ms, "submission rate limited");
                return Err(UploadError::RateLimited { retry_after_ms });
            }

            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(AuthError::fatal(body).into());
            }

            if status.is_server_error() {
                return Err(UploadError::Server {
                    status: status.as_u16(),
                    message: body,
                });
            }

            return Err(UploadError::Request {
                status: status.as_u16(),
                message: body,
            });
        }

        let record: DocumentRecord = response.json().await.map_err(|e| {
            UploadError::InvalidResponse(format!("unparseable document record: {e}"))
        })?;

        debug!(case = %case_id, document = %record.id, "document created");
        Ok(record)
    }
}

/// Parse a `Retry-After` header carrying whole seconds, as milliseconds.
fn parse_retry_after_header(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after_secs)
}

fn parse_retry_after_secs(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}

/// Parse a `retryAfterMs` hint out of an error body, if it is JSON.
fn parse_retry_after_ms(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("retryAfterMs")
        .or_else(|| value.get("retry_after_ms"))
        .and_then(|v| v.as_u64())
}
