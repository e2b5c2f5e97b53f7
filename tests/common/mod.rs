#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chat_window::{
    ChatItem, ChatWindow, MessageSource, Result, SearchQuery, SortOrder, WindowConfig, WindowSink,
};
use serde_json::{Value, json};

pub const BASE_MS: i64 = 1_700_000_000_000;

/// Distances that put the viewport far from / right at an edge.
pub const FAR: f64 = 10_000.0;
pub const NEAR: f64 = 0.0;

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn record(i: usize) -> Value {
    json!({
        "_id": format!("m-{i:04}"),
        "user": if i % 3 == 0 { "alice" } else { "bob" },
        "text": format!("message {i}"),
        "date": BASE_MS + i as i64 * 1_000,
    })
}

pub fn record_at(id: &str, date_ms: i64) -> Value {
    json!({ "_id": id, "text": id, "date": date_ms })
}

pub fn seed_records(n: usize) -> Vec<Value> {
    (0..n).map(record).collect()
}

/// In-memory message store honoring the full query contract: inclusive date
/// bounds, id exclusion, sort, skip and limit. Returning fewer than `limit`
/// records genuinely means nothing else matches.
pub struct MemorySource {
    records: Mutex<Vec<Value>>,
    queries: Mutex<Vec<SearchQuery>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl MemorySource {
    pub fn new(records: Vec<Value>) -> Arc<Self> {
        Self::build(records, None)
    }

    pub fn with_delay(records: Vec<Value>, delay: Duration) -> Arc<Self> {
        Self::build(records, Some(delay))
    }

    fn build(records: Vec<Value>, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            queries: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay,
        })
    }

    /// Append records to the backing store, simulating data that arrived
    /// after the window was opened.
    pub fn extend(&self, records: Vec<Value>) {
        self.records.lock().unwrap().extend(records);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of loads observed in flight at once.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().unwrap().clone()
    }

    fn date_ms(record: &Value) -> i64 {
        record["date"].as_i64().unwrap_or(0)
    }

    fn id(record: &Value) -> String {
        ChatItem::raw_id(record).unwrap_or_default()
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn load_messages(&self, query: SearchQuery) -> Result<Vec<Value>> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut matching: Vec<Value> = self.records.lock().unwrap().clone();
        if let Some(after) = query.created_after {
            let bound = after.timestamp_millis();
            matching.retain(|r| Self::date_ms(r) >= bound);
        }
        if let Some(before) = query.created_before {
            let bound = before.timestamp_millis();
            matching.retain(|r| Self::date_ms(r) <= bound);
        }
        matching.retain(|r| !query.exclude.contains(&Self::id(r)));
        match query.sort {
            Some(SortOrder::Descending) => {
                matching.sort_by_key(|r| std::cmp::Reverse(Self::date_ms(r)))
            }
            _ => matching.sort_by_key(Self::date_ms),
        }
        let skip = query.skip.unwrap_or(0);
        let out: Vec<Value> = matching.into_iter().skip(skip).take(query.limit).collect();

        self.queries.lock().unwrap().push(query);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(out)
    }
}

/// Sink recording every committed window as a list of ids.
pub struct CollectSink {
    batches: Mutex<Vec<Vec<String>>>,
}

impl CollectSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
        })
    }

    pub fn notify_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn last_ids(&self) -> Vec<String> {
        self.batches.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl WindowSink for CollectSink {
    async fn set_items(&self, items: &[Arc<ChatItem>]) -> Result<()> {
        let ids = items.iter().map(|item| item.id().to_owned()).collect();
        self.batches.lock().unwrap().push(ids);
        Ok(())
    }
}

pub fn window_over(records: Vec<Value>) -> (Arc<ChatWindow>, Arc<MemorySource>, Arc<CollectSink>) {
    window_with(WindowConfig::default(), records)
}

pub fn window_with(
    config: WindowConfig,
    records: Vec<Value>,
) -> (Arc<ChatWindow>, Arc<MemorySource>, Arc<CollectSink>) {
    let source = MemorySource::new(records);
    let sink = CollectSink::new();
    let window = Arc::new(ChatWindow::new(config, source.clone(), sink.clone()));
    (window, source, sink)
}

pub fn assert_ascending(items: &[Arc<ChatItem>]) {
    for pair in items.windows(2) {
        assert!(
            pair[0].created_at_millis() <= pair[1].created_at_millis(),
            "window out of order: {} after {}",
            pair[1].id(),
            pair[0].id()
        );
    }
}

pub fn assert_unique_ids(items: &[Arc<ChatItem>]) {
    let mut ids: Vec<&str> = items.iter().map(|item| item.id()).collect();
    ids.sort_unstable();
    let before = ids.len();
    ids.dedup();
    assert_eq!(before, ids.len(), "window holds duplicate ids");
}
