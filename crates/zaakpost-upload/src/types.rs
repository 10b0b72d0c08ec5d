//! Domain types for the upload subsystem.
//!
//! An [`UploadItem`] is one thing the user selected for upload: the email
//! itself or a single non-inline attachment. Items are created at selection
//! time, enriched once by identifier translation and once by content fetch,
//! and discarded when the run settles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of item this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// The full email message.
    Email,
    /// One non-inline attachment of the email.
    Attachment,
}

/// Domain metadata attached to a created case document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Document title shown in the case record.
    pub title: String,

    /// Original file name (e.g. "report.pdf", "message.eml").
    pub filename: String,

    /// MIME type of the content, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// When the host application received the email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

/// One selected attachment or the email itself.
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// Host-application id, meaningful only within the current session.
    pub local_id: String,

    /// Email or attachment.
    pub kind: ItemKind,

    /// Mail-service id obtained via translation. `None` until translated,
    /// and stays `None` when translation failed for this one id.
    pub remote_id: Option<String>,

    /// Translated id of the parent email. Always `None` for the email
    /// itself (it has no parent).
    pub parent_remote_id: Option<String>,

    /// Case-document metadata for the submission body.
    pub metadata: DocumentMetadata,

    /// Binary content, populated by the content fetch step.
    pub content: Option<Vec<u8>>,
}

impl UploadItem {
    /// Create the email item of a batch.
    pub fn email(local_id: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            local_id: local_id.into(),
            kind: ItemKind::Email,
            remote_id: None,
            parent_remote_id: None,
            metadata,
            content: None,
        }
    }

    /// Create an attachment item of a batch.
    pub fn attachment(local_id: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            local_id: local_id.into(),
            kind: ItemKind::Attachment,
            remote_id: None,
            parent_remote_id: None,
            metadata,
            content: None,
        }
    }
}

/// Aggregate view over a batch, derived on demand from the status registry.
///
/// `uploaded_email` and `uploaded_attachment_count` are only meaningful
/// once `complete` is true; before that they reflect a partial run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateResult {
    /// The email item settled successfully.
    pub uploaded_email: bool,
    /// Number of attachment items that settled successfully.
    pub uploaded_attachment_count: usize,
    /// Number of selected items that settled in error.
    pub failed_count: usize,
    /// Every selected item settled successfully.
    pub all_succeeded: bool,
    /// At least one selected item settled in error.
    pub any_failed: bool,
    /// Every selected item has a terminal record (success or error).
    pub complete: bool,
}
