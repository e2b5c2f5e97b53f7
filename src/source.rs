//! Collaborator traits the hosting UI implements.

use crate::error::Result;
use crate::item::ChatItem;
use crate::types::SearchQuery;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Asynchronous backing store for message history.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch up to `query.limit` records matching the query.
    ///
    /// Returning fewer than `limit` records must mean no more matching
    /// records exist in that direction: the short batch is how the window
    /// learns it reached a dataset boundary, so a source that truncates
    /// results for any other reason will make the window stop loading early.
    /// Returned records may be in any order; the window re-sorts them.
    async fn load_messages(&self, query: SearchQuery) -> Result<Vec<Value>>;
}

/// Receives the committed window after every mutation.
#[async_trait]
pub trait WindowSink: Send + Sync {
    /// Apply the full current window, in order, to the rendering layer.
    ///
    /// Awaited before the mutating call returns, so callers can rely on the
    /// host's render having been scheduled. Must not mutate the sequence.
    async fn set_items(&self, items: &[Arc<ChatItem>]) -> Result<()>;
}
