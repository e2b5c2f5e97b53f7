//! Shared data types: directions, operation tags, boundary status, the
//! search query handed to the message source, and the window configuration.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stable identifier of one logical message.
pub type MessageId = String;

/// Temporal direction of a load, or `None` before the first load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadDirection {
    /// Towards older messages (the top of the rendered list).
    Up,
    /// Towards newer messages (the bottom of the rendered list).
    Down,
    #[default]
    None,
}

/// Diagnostic tag of the most recent window mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeOperation {
    AddUp,
    AddDown,
    RemoveUp,
    RemoveDown,
    #[default]
    None,
}

/// What we know about one true edge of the underlying dataset.
///
/// `NotYetChecked` means no load has probed this edge yet (or a re-probe was
/// requested); `Unknown` means a previous claim was invalidated by newer
/// data; `Reached` pins the edge to a concrete message id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BoundaryStatus {
    #[default]
    NotYetChecked,
    Unknown,
    Reached(MessageId),
}

impl BoundaryStatus {
    /// True iff this boundary is pinned to exactly `id`.
    pub fn is_reached_at(&self, id: &str) -> bool {
        matches!(self, Self::Reached(reached) if reached == id)
    }
}

/// Requested sort order for a batch fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortOrder {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

/// Query handed to [`crate::MessageSource::load_messages`].
///
/// `created_after`/`created_before` are inclusive bounds on the record's
/// creation date; the already-loaded edge item falls inside the bound and is
/// filtered out through `exclude` instead. The engine never sets `skip`, but
/// it is part of the wire shape so hosts can forward the query to a paged
/// backend unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchQuery {
    pub skip: Option<usize>,
    pub limit: usize,
    pub sort: Option<SortOrder>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub exclude: Vec<MessageId>,
}

/// Height of the rendered wrapper the proximity threshold defaults against.
pub const WRAPPER_HEIGHT: f64 = 400.0;

/// Tunables of one [`crate::ChatWindow`] instance.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Window size cap; eviction keeps the window at or under this, except
    /// when the only evictable edge is near the viewport.
    pub max_window: usize,
    /// Fetch batch size. A batch shorter than this marks a dataset boundary.
    pub batch_size: usize,
    /// Proximity threshold, in the same unit as the reported distances.
    pub sticky_buffer: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_window: 65,
            batch_size: 30,
            sticky_buffer: WRAPPER_HEIGHT + 200.0,
        }
    }
}
