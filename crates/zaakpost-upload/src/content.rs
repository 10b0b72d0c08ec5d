//! Content fetch collaborator and slice composition.
//!
//! The host exposes item content either whole (via [`ContentFetcher`]) or
//! slice by slice. Hosts that only do slices are adapted through
//! [`SliceSource`]: a sequence of discrete async steps,
//! `fetch_next_slice()` until `None`, composed by [`read_all_slices`].
//! Slices are requested strictly in order, and the source is released on
//! every exit path because it is owned by the loop.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::UploadItem;

/// Fetches an item's binary content from the host application.
///
/// For an email item this is the full message; for an attachment, the raw
/// attachment bytes. The item's `remote_id` is populated before this is
/// called.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the binary content of `item`.
    async fn fetch(&self, item: &UploadItem) -> Result<Vec<u8>>;
}

/// A host resource that yields content in consecutive slices.
#[async_trait]
pub trait SliceSource: Send {
    /// Fetch the next slice, or `None` when the content is exhausted.
    async fn fetch_next_slice(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Drain a [`SliceSource`] into one buffer, requesting slices in order.
pub async fn read_all_slices<S: SliceSource>(mut source: S) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    while let Some(slice) = source.fetch_next_slice().await? {
        content.extend_from_slice(&slice);
    }
    Ok(content)
}
