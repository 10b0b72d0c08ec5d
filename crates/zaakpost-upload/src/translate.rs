//! Batched translation of host-local item ids to mail-service ids.
//!
//! The host application hands out session-local identifiers; the content
//! fetch API wants the backing mail-service identifiers. One batched call
//! translates the whole selection, preserving input order so the caller
//! can correlate results back to items by position.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, UploadError};

/// Translates a batch of local ids into remote ids in one round trip.
///
/// The output has the same length and order as the input. A slot is `None`
/// when that one id could not be translated; that is not an error. Failure
/// of the batch call as a whole is [`UploadError::Translation`].
#[async_trait]
pub trait IdTranslator: Send + Sync {
    /// Translate `local_ids`, authenticating with `bearer`.
    async fn translate(&self, bearer: &str, local_ids: &[String])
    -> Result<Vec<Option<String>>>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest<'a> {
    input_ids: &'a [String],
    source_id_type: &'a str,
    target_id_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslatedId {
    #[serde(default)]
    target_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    value: Vec<TranslatedId>,
}

/// [`IdTranslator`] over the mail service's id-translation endpoint.
pub struct ExchangeIdTranslator {
    http: reqwest::Client,
    base_url: String,
}

impl ExchangeIdTranslator {
    /// Create a translator against the given service base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn translate_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/me/translateExchangeIds")
    }
}

#[async_trait]
impl IdTranslator for ExchangeIdTranslator {
    async fn translate(
        &self,
        bearer: &str,
        local_ids: &[String],
    ) -> Result<Vec<Option<String>>> {
        if local_ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!(ids = local_ids.len(), "translating item ids");

        let body = TranslateRequest {
            input_ids: local_ids,
            source_id_type: "ews",
            target_id_type: "restImmutableEntryId",
        };

        let response = self
            .http
            .post(self.translate_url())
            .header("Authorization", format!("Bearer {bearer}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| UploadError::Translation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Translation(format!("HTTP {status}: {body}")));
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Translation(format!("unparseable response: {e}")))?;

        if parsed.value.len() != local_ids.len() {
            return Err(UploadError::InvalidResponse(format!(
                "translation returned {} ids for {} inputs",
                parsed.value.len(),
                local_ids.len()
            )));
        }

        Ok(parsed.value.into_iter().map(|t| t.target_id).collect())
    }
}
