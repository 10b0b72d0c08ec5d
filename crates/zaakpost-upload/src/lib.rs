//! Authenticated batch uploads from a mail host into a case-management
//! system.
//!
//! This crate is the engine behind "attach this email to a case": given a
//! validated selection of items (the email and/or its attachments), it
//! acquires a bearer credential, translates the host's session-local item
//! ids into mail-service ids in one batched call, and submits every item's
//! content to the case-management API concurrently, with per-item status
//! tracking and adaptive retry of transient failures.
//!
//! # Architecture
//!
//! - [`TokenCache`] owns the single cached credential and coalesces
//!   concurrent acquisitions onto one in-flight request
//! - [`IdTranslator`] / [`ExchangeIdTranslator`] turn local ids into
//!   remote ids, order-preserving and tolerant of per-id failure
//! - [`Backoff`] retries rate-limited and server-side failures with
//!   adaptive exponential backoff plus jitter; never retries auth or
//!   client errors
//! - [`StatusRegistry`] tracks each item's pending/success/error state and
//!   derives the aggregate view
//! - [`UploadOrchestrator`] wires it all together for one batch at a time
//!
//! The host-side seams — token providers, content fetch — are traits
//! ([`TokenAcquirer`], [`ContentFetcher`]) implemented by the embedding
//! application.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use zaakpost_upload::{
//!     CaseDocumentsClient, ExchangeIdTranslator, TokenCache, UploadConfig,
//!     UploadItem, UploadOrchestrator,
//! };
//!
//! let config = UploadConfig::default();
//! let tokens = Arc::new(
//!     TokenCache::new(silent_provider, &config).with_interactive(popup_provider),
//! );
//! let orchestrator = UploadOrchestrator::new(
//!     tokens,
//!     Arc::new(ExchangeIdTranslator::new("https://graph.example.com/v1.0")),
//!     content_fetcher,
//!     Arc::new(CaseDocumentsClient::new("https://cases.example.nl/api/v1")),
//!     &config,
//! );
//!
//! orchestrator.run("zaak-123", items).await?;
//! let status = orchestrator.registry().snapshot(selection);
//! ```

pub mod auth;
pub mod claims;
pub mod config;
pub mod content;
pub mod documents;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod status;
pub mod translate;
pub mod types;

pub use auth::{CachedToken, TokenAcquirer, TokenCache};
pub use claims::{TokenClaims, peek_claims};
pub use config::UploadConfig;
pub use content::{ContentFetcher, SliceSource, read_all_slices};
pub use documents::{CaseDocumentsClient, CreateDocumentRequest, DocumentRecord, DocumentSubmitter};
pub use error::{AuthError, AuthErrorCode, Result, UploadError};
pub use orchestrator::{RunPhase, UploadOrchestrator};
pub use retry::{Backoff, RetryConfig};
pub use status::{MutationRecord, MutationStatus, StatusRegistry};
pub use translate::{ExchangeIdTranslator, IdTranslator};
pub use types::{AggregateResult, DocumentMetadata, ItemKind, UploadItem};
