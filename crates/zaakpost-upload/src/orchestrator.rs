//! Top-level coordination of a batch upload run.
//!
//! [`UploadOrchestrator::run`] drives one batch through its phases:
//! acquire a credential, translate the selection's ids in one call, then
//! fan out one submission per item. Per-item work runs concurrently as
//! cooperative futures joined in a single task; total latency is bounded
//! by the slowest item, not the sum. Item failures are isolated — they
//! land in the status registry and only surface in aggregate.

use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::auth::TokenCache;
use crate::config::UploadConfig;
use crate::content::ContentFetcher;
use crate::documents::{CreateDocumentRequest, DocumentRecord, DocumentSubmitter};
use crate::error::{Result, UploadError};
use crate::retry::{Backoff, RetryConfig};
use crate::status::StatusRegistry;
use crate::translate::IdTranslator;
use crate::types::{ItemKind, UploadItem};

/// Phase of the current (or last) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No run in progress.
    Idle,
    /// Acquiring the bearer credential.
    Authenticating,
    /// Translating the selection's local ids.
    Translating,
    /// Per-item submissions in flight.
    Uploading,
    /// The run has completed or failed.
    Settled,
}

/// Coordinates credential acquisition, id translation, and parallel
/// per-item submission for one batch at a time.
pub struct UploadOrchestrator {
    tokens: Arc<TokenCache>,
    translator: Arc<dyn IdTranslator>,
    fetcher: Arc<dyn ContentFetcher>,
    submitter: Arc<dyn DocumentSubmitter>,
    backoff: Backoff,
    registry: StatusRegistry,
    phase: Mutex<RunPhase>,
}

impl UploadOrchestrator {
    /// Create an orchestrator over the four collaborators, taking the
    /// retry knobs from `config`.
    pub fn new(
        tokens: Arc<TokenCache>,
        translator: Arc<dyn IdTranslator>,
        fetcher: Arc<dyn ContentFetcher>,
        submitter: Arc<dyn DocumentSubmitter>,
        config: &UploadConfig,
    ) -> Self {
        Self {
            tokens,
            translator,
            fetcher,
            submitter,
            backoff: Backoff::new(config.retry.clone()),
            registry: StatusRegistry::new(),
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    /// Replace the configured retry policy.
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.backoff = Backoff::new(config);
        self
    }

    /// The per-item status registry, for rendering individual indicators.
    pub fn registry(&self) -> &StatusRegistry {
        &self.registry
    }

    /// The current run phase.
    pub fn phase(&self) -> RunPhase {
        *self
            .phase
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_phase(&self, phase: RunPhase) {
        debug!(?phase, "run phase");
        *self
            .phase
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = phase;
    }

    /// Upload a validated selection to the given case.
    ///
    /// Returns `Ok(())` when every item uploaded (or the selection was
    /// empty), [`UploadError::BatchFailed`] when some items failed, and an
    /// orchestration-level error when authentication or translation failed
    /// before any submission started.
    pub async fn run(&self, case_id: &str, mut items: Vec<UploadItem>) -> Result<()> {
        if items.is_empty() {
            self.set_phase(RunPhase::Settled);
            return Ok(());
        }

        self.set_phase(RunPhase::Authenticating);
        let bearer = match self.tokens.get_token().await {
            Ok(bearer) => bearer,
            Err(err) => {
                self.set_phase(RunPhase::Settled);
                return Err(err.into());
            }
        };

        self.set_phase(RunPhase::Translating);
        if let Err(err) = self.translate_items(&bearer, &mut items).await {
            self.set_phase(RunPhase::Settled);
            return Err(err);
        }

        self.set_phase(RunPhase::Uploading);
        let selection: Vec<(String, ItemKind)> = items
            .iter()
            .map(|item| (item.local_id.clone(), item.kind))
            .collect();

        let jobs = items.into_iter().map(|item| self.upload_one(case_id, item));
        join_all(jobs).await;

        self.set_phase(RunPhase::Settled);
        let aggregate = self
            .registry
            .snapshot(selection.iter().map(|(id, kind)| (id.as_str(), *kind)));
        info!(
            case = %case_id,
            uploaded_email = aggregate.uploaded_email,
            uploaded_attachments = aggregate.uploaded_attachment_count,
            failed = aggregate.failed_count,
            "run settled"
        );

        if aggregate.failed_count > 0 {
            return Err(UploadError::BatchFailed {
                failed: aggregate.failed_count,
            });
        }
        Ok(())
    }

    /// Clear run state for a new batch.
    ///
    /// Drops the status records, invalidates the credential cache, and
    /// returns the phase to idle. In-flight network futures from an
    /// abandoned run are not aborted; their results are simply not read.
    pub fn reset(&self) {
        self.registry.reset();
        self.tokens.invalidate();
        self.backoff.reset();
        self.set_phase(RunPhase::Idle);
    }

    /// Translate every item's local id in one batched call and key the
    /// results back by position. Attachments get the email's translated id
    /// as their parent; the email itself keeps no parent.
    async fn translate_items(&self, bearer: &str, items: &mut [UploadItem]) -> Result<()> {
        let local_ids: Vec<String> = items.iter().map(|item| item.local_id.clone()).collect();
        let remote_ids = self.translator.translate(bearer, &local_ids).await?;

        // IdTranslator is a public seam: an implementation outside this
        // crate may break the positional contract, so the length is
        // checked again before the zip silently truncates.
        if remote_ids.len() != items.len() {
            return Err(UploadError::InvalidResponse(format!(
                "translation returned {} ids for {} items",
                remote_ids.len(),
                items.len()
            )));
        }

        for (item, remote_id) in items.iter_mut().zip(remote_ids) {
            item.remote_id = remote_id;
        }

        let email_remote_id = items
            .iter()
            .find(|item| item.kind == ItemKind::Email)
            .and_then(|item| item.remote_id.clone());
        for item in items.iter_mut() {
            if item.kind == ItemKind::Attachment {
                item.parent_remote_id = email_remote_id.clone();
            }
        }
        Ok(())
    }

    /// Run one item start to finish, recording its lifecycle. Failures are
    /// absorbed into the registry so sibling items are unaffected.
    async fn upload_one(&self, case_id: &str, mut item: UploadItem) {
        self.registry.record_pending(&item.local_id);
        match self.try_upload(case_id, &mut item).await {
            Ok(record) => {
                debug!(item = %item.local_id, document = %record.id, "item uploaded");
                self.registry.record_success(&item.local_id);
            }
            Err(err) => {
                warn!(item = %item.local_id, error = %err, "item failed");
                self.registry.record_error(&item.local_id);
            }
        }
    }

    async fn try_upload(&self, case_id: &str, item: &mut UploadItem) -> Result<DocumentRecord> {
        if item.remote_id.is_none() {
            return Err(UploadError::Translation(format!(
                "item {} could not be translated",
                item.local_id
            )));
        }

        item.content = Some(self.fetcher.fetch(item).await?);
        let content = item.content.as_deref().unwrap_or_default();
        let request = CreateDocumentRequest::from_item(item, content)?;

        self.backoff
            .execute(|| {
                let request = &request;
                async move {
                    // Re-read the token on every attempt so a refresh between
                    // retries is picked up; a cache hit is just a clone.
                    let bearer = self.tokens.get_token().await?;
                    self.submitter.submit(&bearer, case_id, request).await
                }
            })
            .await
    }
}
