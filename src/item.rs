//! One entry of the in-memory window: a raw message record plus the derived
//! identity, timestamp, adjacency links, and scroll-anchor slots.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::types::MessageId;
use crate::uid;

#[derive(Debug, Default)]
struct Links {
    prev: Option<Weak<ChatItem>>,
    next: Option<Weak<ChatItem>>,
}

#[derive(Debug)]
struct Position {
    /// Viewport offset reported by the host's last layout pass.
    top: f64,
    /// Offset captured by the most recent `save_position` call.
    saved_top: f64,
}

/// Wrapper around one raw message record.
///
/// Identity and timestamp are fixed at construction; the adjacency links and
/// position slots are recomputed by the owning window as it mutates.
#[derive(Debug)]
pub struct ChatItem {
    id: MessageId,
    raw: Value,
    timestamp: DateTime<Utc>,
    created_at_millis: i64,
    links: Mutex<Links>,
    position: Mutex<Position>,
}

impl ChatItem {
    /// Wrap a raw record, taking its own id and creation date when present.
    ///
    /// A record without an id gets a synthesized one; a missing or
    /// unparseable date falls back to the current time. Never fails.
    pub fn from_raw(raw: Value) -> Self {
        let id = Self::raw_id(&raw).unwrap_or_else(uid::local_item_id);
        let timestamp = Self::raw_date(&raw).unwrap_or_else(Utc::now);

        Self {
            id,
            timestamp,
            created_at_millis: timestamp.timestamp_millis(),
            raw,
            links: Mutex::new(Links::default()),
            position: Mutex::new(Position {
                top: f64::NAN,
                saved_top: f64::NAN,
            }),
        }
    }

    /// Extract the stable id of a raw record: `_id` first, then `id`.
    pub fn raw_id(raw: &Value) -> Option<MessageId> {
        let field = raw.get("_id").or_else(|| raw.get("id"))?;
        match field {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Extract the creation date of a raw record: `date` first, then
    /// `_created_date`. RFC 3339 strings and epoch-millisecond numbers are
    /// accepted.
    pub fn raw_date(raw: &Value) -> Option<DateTime<Utc>> {
        let field = raw.get("date").or_else(|| raw.get("_created_date"))?;
        match field {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => {
                let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
                Utc.timestamp_millis_opt(millis).single()
            }
            _ => None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn created_at_millis(&self) -> i64 {
        self.created_at_millis
    }

    /// The logically previous (older) item in the current window, if any.
    pub fn prev(&self) -> Option<Arc<ChatItem>> {
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .prev
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// The logically next (newer) item in the current window, if any.
    pub fn next(&self) -> Option<Arc<ChatItem>> {
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub(crate) fn set_links(&self, prev: Option<&Arc<ChatItem>>, next: Option<&Arc<ChatItem>>) {
        let mut links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
        links.prev = prev.map(Arc::downgrade);
        links.next = next.map(Arc::downgrade);
    }

    /// Current viewport offset, `NaN` while unmeasured.
    pub fn top_distance(&self) -> f64 {
        self.position
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .top
    }

    /// Report this item's measured viewport offset. Called by the host
    /// during layout.
    pub fn set_top_distance(&self, top: f64) {
        self.position
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .top = top;
    }

    /// Offset captured by the last `save_position` call, `NaN` if never
    /// captured.
    pub fn last_known_offset(&self) -> f64 {
        self.position
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .saved_top
    }

    /// Snapshot the current offset for scroll-correction math. The owning
    /// window calls this on the reference item before each mutation.
    pub fn save_position(&self) {
        let mut position = self.position.lock().unwrap_or_else(PoisonError::into_inner);
        position.saved_top = position.top;
    }
}

impl PartialEq for ChatItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChatItem {}
