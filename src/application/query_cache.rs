// Query result cache - TTL memo store keyed by widget and filter fingerprint
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);

/// Source of wall-clock milliseconds, injectable so expiry can be tested.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    timestamp: i64,
}

/// Shared by every widget of a session. Entries expire lazily on read;
/// there is no background sweep.
pub struct QueryResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl QueryResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
        }
    }

    pub fn get(&self, widget_id: &str, filters: &Value) -> Option<Value> {
        let key = cache_key(widget_id, filters);
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        match entries.get(&key) {
            Some(entry) if now - entry.timestamp <= self.ttl_ms => {
                tracing::debug!(widget_id, "cache hit");
                Some(entry.data.clone())
            }
            Some(_) => {
                tracing::debug!(widget_id, "cache entry expired");
                entries.remove(&key);
                None
            }
            None => {
                tracing::debug!(widget_id, "cache miss");
                None
            }
        }
    }

    pub fn set(&self, widget_id: &str, filters: &Value, data: Value) {
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now_ms(),
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_key(widget_id, filters), entry);
    }

    /// Drops every entry derived from `widget_id`, whatever its filters.
    pub fn clear_widget(&self, widget_id: &str) -> usize {
        let prefix = key_prefix(widget_id);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// `{len}:{widget_id}|{canonical filters}`. The length prefix keeps the widget
/// id an unambiguous literal prefix even when ids contain separators.
pub fn cache_key(widget_id: &str, filters: &Value) -> String {
    let mut key = key_prefix(widget_id);
    write_canonical(filters, &mut key);
    key
}

fn key_prefix(widget_id: &str) -> String {
    format!("{}:{}|", widget_id.len(), widget_id)
}

/// JSON with object keys sorted at every level, so logically equal filter
/// sets serialize identically regardless of insertion order.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
