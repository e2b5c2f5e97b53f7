//! Windowed pagination engine for chat message lists.
//!
//! Keeps a bounded, bidirectionally scrollable window over an unbounded,
//! externally stored message history. The host wires up a [`MessageSource`]
//! (answers "give me N messages before/after timestamp T"), a [`WindowSink`]
//! (receives the full window after every mutation), and reports viewport
//! proximity; [`ChatWindow`] decides when to fetch, merges batches, evicts
//! from the far edge, tracks the true dataset boundaries, and preserves the
//! scroll anchor across mutations.

pub mod error;
pub mod item;
pub mod source;
pub mod types;
pub mod uid;
pub mod window;

pub use error::{Result, WindowError};
pub use item::ChatItem;
pub use source::{MessageSource, WindowSink};
pub use types::{
    BoundaryStatus, ChangeOperation, LoadDirection, MessageId, SearchQuery, SortOrder,
    WindowConfig,
};
pub use window::{ChatWindow, NewMessage};
