//! The windowed pagination engine.
//!
//! `ChatWindow` owns the in-memory ordered window of items, orchestrates
//! upward/downward batch loads, applies eviction, tracks dataset-boundary
//! status, maintains prev/next links for rendering, and exposes the
//! scroll-anchor bookkeeping the host needs to keep the viewport stationary
//! across mutations.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::item::ChatItem;
use crate::source::{MessageSource, WindowSink};
use crate::types::{
    BoundaryStatus, ChangeOperation, LoadDirection, SearchQuery, SortOrder, WindowConfig,
};

/// A message handed to [`ChatWindow::send_new_messages`]: either a raw
/// record still to be wrapped, or an already-wrapped item.
pub enum NewMessage {
    Raw(Value),
    Item(Arc<ChatItem>),
}

impl NewMessage {
    fn into_item(self) -> Arc<ChatItem> {
        match self {
            NewMessage::Raw(raw) => Arc::new(ChatItem::from_raw(raw)),
            NewMessage::Item(item) => item,
        }
    }
}

impl From<Value> for NewMessage {
    fn from(raw: Value) -> Self {
        NewMessage::Raw(raw)
    }
}

impl From<Arc<ChatItem>> for NewMessage {
    fn from(item: Arc<ChatItem>) -> Self {
        NewMessage::Item(item)
    }
}

struct WindowState {
    window: Vec<Arc<ChatItem>>,
    index: HashMap<String, Arc<ChatItem>>,
    top_boundary: BoundaryStatus,
    bottom_boundary: BoundaryStatus,
    last_load_direction: LoadDirection,
    last_operation: ChangeOperation,
    last_count_change: i64,
    last_db_load: usize,
    last_count: usize,
    last_from_source: bool,
    reference: Option<Arc<ChatItem>>,
    distance_to_top: f64,
    distance_to_bottom: f64,
    sticky: bool,
}

impl WindowState {
    fn new() -> Self {
        Self {
            window: Vec::new(),
            index: HashMap::new(),
            top_boundary: BoundaryStatus::NotYetChecked,
            bottom_boundary: BoundaryStatus::NotYetChecked,
            last_load_direction: LoadDirection::None,
            last_operation: ChangeOperation::None,
            last_count_change: 0,
            last_db_load: 0,
            last_count: 0,
            last_from_source: false,
            reference: None,
            distance_to_top: 0.0,
            distance_to_bottom: 0.0,
            sticky: true,
        }
    }

    fn is_close_to_top(&self, config: &WindowConfig) -> bool {
        self.distance_to_top < config.sticky_buffer
    }

    fn is_close_to_bottom(&self, config: &WindowConfig) -> bool {
        self.distance_to_bottom < config.sticky_buffer
    }

    fn is_at_top(&self) -> bool {
        match self.window.first() {
            Some(top) => self.top_boundary.is_reached_at(top.id()),
            None => false,
        }
    }

    fn is_at_bottom(&self) -> bool {
        match self.window.last() {
            Some(bottom) => self.bottom_boundary.is_reached_at(bottom.id()),
            None => true,
        }
    }

    fn should_load_top(&self, config: &WindowConfig) -> bool {
        self.is_close_to_top(config) && !self.is_at_top()
    }

    fn should_load_down(&self, config: &WindowConfig) -> bool {
        self.is_close_to_bottom(config) && !self.is_at_bottom()
    }

    /// Designate the edge item the viewport hangs off of and snapshot its
    /// offset, so the host can compute a scroll correction after re-render.
    fn capture_reference(&mut self) {
        match self.last_load_direction {
            LoadDirection::Up => self.reference = self.window.first().cloned(),
            LoadDirection::Down => self.reference = self.window.last().cloned(),
            LoadDirection::None => {}
        }
        if let Some(reference) = &self.reference {
            reference.save_position();
        }
    }

    /// Cap the window by evicting from the edge opposite the one that just
    /// grew. If that edge is near the viewport nothing is evicted this
    /// cycle, even if the window stays over cap.
    fn trim_window(&self, input: Vec<Arc<ChatItem>>, config: &WindowConfig) -> Vec<Arc<ChatItem>> {
        if input.len() <= config.max_window {
            return input;
        }

        let mut remove_from = LoadDirection::None;
        if self.last_load_direction == LoadDirection::Up && !self.is_close_to_bottom(config) {
            remove_from = LoadDirection::Down;
        } else if self.last_load_direction == LoadDirection::Down && !self.is_close_to_top(config) {
            remove_from = LoadDirection::Up;
        }
        if remove_from == LoadDirection::None {
            log::debug!(
                "window over cap at {} items but the evictable edge is near the viewport, keeping everything",
                input.len()
            );
            return input;
        }

        // Ten more than strictly necessary, so the next few inserts do not
        // immediately re-trigger eviction.
        let count = (input.len() - config.max_window + 10).min(input.len());
        let mut result = input;
        match remove_from {
            LoadDirection::Up => {
                result.drain(..count);
            }
            LoadDirection::Down => {
                result.truncate(result.len() - count);
            }
            LoadDirection::None => {}
        }
        log::debug!(
            "evicted {count} items from the {remove_from:?} edge, window at {}",
            result.len()
        );
        result
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .window
            .iter()
            .map(|item| (item.id().to_owned(), item.clone()))
            .collect();
    }

    fn refresh_bottom(&mut self) {
        self.bottom_boundary = match self.window.last() {
            Some(bottom) => BoundaryStatus::Reached(bottom.id().to_owned()),
            None => BoundaryStatus::NotYetChecked,
        };
    }

    /// Re-derive the dataset-boundary status after a commit.
    fn reconcile_boundaries(&mut self, config: &WindowConfig) {
        if !self.last_from_source {
            // Locally added or removed content: the bottom of the window is
            // the live bottom by definition.
            self.refresh_bottom();
            return;
        }

        let full_batch = self.last_db_load >= config.batch_size;

        // The first source load seeds the bottom boundary, unless this very
        // batch formed the bottom edge and came back full-size: a full page
        // cannot certify that nothing exists below it.
        if self.bottom_boundary == BoundaryStatus::NotYetChecked
            && !(full_batch && self.last_load_direction == LoadDirection::Down)
        {
            self.refresh_bottom();
        }

        if !full_batch {
            // A short batch is authoritative for the loaded direction.
            match self.last_load_direction {
                LoadDirection::Down => {
                    if let Some(bottom) = self.window.last()
                        && !self.bottom_boundary.is_reached_at(bottom.id())
                    {
                        log::info!("reached the bottom of the conversation at {}", bottom.id());
                    }
                    self.refresh_bottom();
                }
                LoadDirection::Up => {
                    self.top_boundary = match self.window.first() {
                        Some(top) => {
                            if !self.top_boundary.is_reached_at(top.id()) {
                                log::info!("reached the top of the conversation at {}", top.id());
                            }
                            BoundaryStatus::Reached(top.id().to_owned())
                        }
                        None => BoundaryStatus::NotYetChecked,
                    };
                }
                LoadDirection::None => {}
            }
        } else {
            // A full page means more rows may exist past any boundary whose
            // item no longer sits at its edge.
            let bottom_pinned = self
                .window
                .last()
                .is_some_and(|bottom| self.bottom_boundary.is_reached_at(bottom.id()));
            if !bottom_pinned {
                self.bottom_boundary = BoundaryStatus::Unknown;
            }
            let top_pinned = self
                .window
                .first()
                .is_some_and(|top| self.top_boundary.is_reached_at(top.id()));
            if !top_pinned {
                self.top_boundary = BoundaryStatus::Unknown;
            }
        }
    }

    fn relink(&self) {
        for (i, item) in self.window.iter().enumerate() {
            let prev = if i > 0 { self.window.get(i - 1) } else { None };
            item.set_links(prev, self.window.get(i + 1));
        }
    }
}

/// Bounded, bidirectionally scrollable window over an external message
/// history. Share one instance per open chat via `Arc`; instances are fully
/// independent.
pub struct ChatWindow {
    config: WindowConfig,
    source: Arc<dyn MessageSource>,
    sink: Arc<dyn WindowSink>,
    state: Mutex<WindowState>,
    load_gate: Mutex<()>,
}

impl ChatWindow {
    pub fn new(
        config: WindowConfig,
        source: Arc<dyn MessageSource>,
        sink: Arc<dyn WindowSink>,
    ) -> Self {
        Self {
            config,
            source,
            sink,
            state: Mutex::new(WindowState::new()),
            load_gate: Mutex::new(()),
        }
    }

    /// Load the next batch if the viewport is close to an edge whose dataset
    /// boundary has not been reached yet.
    ///
    /// Loads are serialized: if one is already in flight, this call waits
    /// for it before issuing its own. Returns the number of merged items, or
    /// `None` when neither direction qualifies.
    pub async fn load_if_needed(&self) -> Result<Option<usize>> {
        let direction = {
            let state = self.state.lock().await;
            if state.should_load_top(&self.config) {
                LoadDirection::Up
            } else if state.should_load_down(&self.config) {
                LoadDirection::Down
            } else {
                return Ok(None);
            }
        };

        let _in_flight = self.load_gate.lock().await;
        let merged = self.load_batch(direction).await?;
        Ok(Some(merged))
    }

    /// Force a fresh bottom probe, even if the bottom was previously
    /// believed complete. Used when the host suspects new data beyond the
    /// known bottom.
    pub async fn load_for_new_messages(&self) -> Result<Option<usize>> {
        self.state.lock().await.bottom_boundary = BoundaryStatus::NotYetChecked;
        self.load_if_needed().await
    }

    async fn load_batch(&self, direction: LoadDirection) -> Result<usize> {
        let query = {
            let mut state = self.state.lock().await;
            state.last_load_direction = direction;

            let mut query = SearchQuery {
                limit: self.config.batch_size,
                ..SearchQuery::default()
            };
            match direction {
                LoadDirection::Down => {
                    query.sort = Some(SortOrder::Ascending);
                    query.created_after = state.window.last().map(|item| item.timestamp());
                }
                _ => {
                    query.sort = Some(SortOrder::Descending);
                    query.created_before = state.window.first().map(|item| item.timestamp());
                }
            }
            // The date bounds are inclusive so records sharing the edge
            // timestamp are not skipped; the exclusion list keeps the edge
            // items themselves from coming back.
            query.exclude = state.window.iter().map(|item| item.id().to_owned()).collect();
            query
        };

        log::debug!(
            "loading {direction:?} batch, limit {}, {} excluded ids",
            query.limit,
            query.exclude.len()
        );
        let loaded = self.source.load_messages(query).await?;

        let mut items: Vec<Arc<ChatItem>> = loaded
            .into_iter()
            .map(|raw| Arc::new(ChatItem::from_raw(raw)))
            .collect();
        // Normalize regardless of the order the source returned.
        items.sort_by_key(|item| item.created_at_millis());
        let added = items.len();

        let mut state = self.state.lock().await;
        state.last_db_load = added;
        state.last_operation = match direction {
            LoadDirection::Up => ChangeOperation::AddUp,
            _ => ChangeOperation::AddDown,
        };
        state.last_from_source = true;

        let mut next = Vec::with_capacity(state.window.len() + added);
        if direction == LoadDirection::Up {
            next.extend(items);
            next.extend(state.window.iter().cloned());
        } else {
            next.extend(state.window.iter().cloned());
            next.extend(items);
        }
        self.commit(&mut state, next).await?;
        Ok(added)
    }

    /// Append new messages at the bottom of the window.
    ///
    /// Records whose id is already in the window (or earlier in the same
    /// call) are dropped, so re-sending a message is a no-op. Refused with
    /// `Ok(false)` while the viewer is scrolled away from the bottom: new
    /// messages must not be injected under a viewer reading history.
    pub async fn send_new_messages<I>(&self, messages: I) -> Result<bool>
    where
        I: IntoIterator<Item = NewMessage>,
    {
        let incoming: Vec<Arc<ChatItem>> =
            messages.into_iter().map(NewMessage::into_item).collect();

        let mut state = self.state.lock().await;
        let mut fresh: Vec<Arc<ChatItem>> = Vec::new();
        for item in incoming {
            if state.index.contains_key(item.id()) {
                continue;
            }
            if fresh.iter().any(|f| f.id() == item.id()) {
                continue;
            }
            fresh.push(item);
        }
        if fresh.is_empty() {
            return Ok(false);
        }
        if !state.is_at_bottom() {
            log::debug!(
                "refusing {} new messages, viewer is not at the bottom",
                fresh.len()
            );
            return Ok(false);
        }

        state.last_operation = ChangeOperation::AddDown;
        state.last_from_source = false;
        let mut next = state.window.clone();
        next.extend(fresh);
        self.commit(&mut state, next).await?;
        Ok(true)
    }

    pub async fn send_new_message(&self, message: impl Into<NewMessage>) -> Result<bool> {
        self.send_new_messages([message.into()]).await
    }

    /// Delete the message described by this raw record, resolving it by id.
    /// Unknown records are a benign no-op.
    pub async fn delete_message(&self, raw: &Value) -> Result<bool> {
        match ChatItem::raw_id(raw) {
            Some(id) => self.delete_by_id(&id).await,
            None => Ok(false),
        }
    }

    /// Delete one item from the window by id. Returns whether anything was
    /// removed; unknown ids are a benign no-op.
    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.index.contains_key(id) {
            return Ok(false);
        }
        let Some(position) = state.window.iter().position(|item| item.id() == id) else {
            return Ok(false);
        };

        state.last_operation = if position < state.window.len() / 2 {
            ChangeOperation::RemoveUp
        } else {
            ChangeOperation::RemoveDown
        };
        state.last_from_source = false;
        let mut next = state.window.clone();
        next.remove(position);
        self.commit(&mut state, next).await?;
        Ok(true)
    }

    /// The single choke point for all window mutations: anchor capture,
    /// eviction, reindex, boundary reconciliation, relink, notify.
    async fn commit(&self, state: &mut WindowState, next: Vec<Arc<ChatItem>>) -> Result<()> {
        state.capture_reference();
        let trimmed = state.trim_window(next, &self.config);
        state.window = trimmed;
        state.rebuild_index();
        state.last_count_change = state.window.len() as i64 - state.last_count as i64;
        state.last_count = state.window.len();
        state.reconcile_boundaries(&self.config);
        state.relink();
        self.sink.set_items(&state.window).await
    }

    /// Report the viewport's proximity to the rendered window's edges.
    pub async fn set_distances(&self, to_top: f64, to_bottom: f64) {
        let mut state = self.state.lock().await;
        state.distance_to_top = to_top;
        state.distance_to_bottom = to_bottom;
    }

    pub async fn set_sticky(&self, sticky: bool) {
        self.state.lock().await.sticky = sticky;
    }

    pub async fn is_sticky(&self) -> bool {
        self.state.lock().await.sticky
    }

    pub async fn item_count(&self) -> usize {
        self.state.lock().await.window.len()
    }

    /// Snapshot of the current window, oldest first.
    pub async fn items(&self) -> Vec<Arc<ChatItem>> {
        self.state.lock().await.window.clone()
    }

    pub async fn top_message(&self) -> Option<Arc<ChatItem>> {
        self.state.lock().await.window.first().cloned()
    }

    pub async fn bottom_message(&self) -> Option<Arc<ChatItem>> {
        self.state.lock().await.window.last().cloned()
    }

    pub async fn middle_message(&self) -> Option<Arc<ChatItem>> {
        let state = self.state.lock().await;
        state.window.get(state.window.len().div_ceil(2)).cloned()
    }

    pub async fn top_message_time(&self) -> Option<i64> {
        let state = self.state.lock().await;
        state.window.first().map(|item| item.created_at_millis())
    }

    pub async fn bottom_message_time(&self) -> Option<i64> {
        let state = self.state.lock().await;
        state.window.last().map(|item| item.created_at_millis())
    }

    pub async fn last_count_change(&self) -> i64 {
        self.state.lock().await.last_count_change
    }

    /// Size of the most recent source batch.
    pub async fn last_db_load(&self) -> usize {
        self.state.lock().await.last_db_load
    }

    pub async fn last_load_direction(&self) -> LoadDirection {
        self.state.lock().await.last_load_direction
    }

    pub async fn last_operation(&self) -> ChangeOperation {
        self.state.lock().await.last_operation
    }

    pub async fn is_at_top(&self) -> bool {
        self.state.lock().await.is_at_top()
    }

    pub async fn is_at_bottom(&self) -> bool {
        self.state.lock().await.is_at_bottom()
    }

    pub async fn is_close_to_top(&self) -> bool {
        self.state.lock().await.is_close_to_top(&self.config)
    }

    pub async fn is_close_to_bottom(&self) -> bool {
        self.state.lock().await.is_close_to_bottom(&self.config)
    }

    pub async fn should_load_top(&self) -> bool {
        self.state.lock().await.should_load_top(&self.config)
    }

    pub async fn should_load_down(&self) -> bool {
        self.state.lock().await.should_load_down(&self.config)
    }

    /// Current measured offset of the reference item, `NaN` when there is no
    /// reference or it was never measured.
    pub async fn reference_top(&self) -> f64 {
        let state = self.state.lock().await;
        state
            .reference
            .as_ref()
            .map(|item| item.top_distance())
            .unwrap_or(f64::NAN)
    }

    /// Offset of the reference item as captured just before the last
    /// mutation; the difference against `reference_top` is the scroll
    /// correction that keeps the reference item visually stationary.
    pub async fn reference_last_top(&self) -> f64 {
        let state = self.state.lock().await;
        state
            .reference
            .as_ref()
            .map(|item| item.last_known_offset())
            .unwrap_or(f64::NAN)
    }
}
