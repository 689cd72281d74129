/*!
 * In-memory storage
 *
 * The concurrent mapping from key to typed value, with per-key absolute
 * expiration. Built on `DashMap` (sharded locking, fast hasher) over a
 * tagged value enum, so `WRONGTYPE` is a pattern match and TTL is a stored
 * property rather than a fire-and-forget timer.
 */

use dashmap::mapref::entry::Entry as DashEntry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How often the background sweeper scans for expired keys.
pub const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// A stored value. Command handlers must WRONGTYPE when the shape they
/// need doesn't match what's actually stored under a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Opaque binary-safe string; integer-interpretable per `as_i64`.
    Str(Vec<u8>),
    /// Ordered sequence of binary-safe elements.
    List(VecDeque<Vec<u8>>),
}

impl Value {
    /// Parse this value as a signed 64-bit decimal, per the strict grammar
    /// in the data model: optional leading `-`, no whitespace, no leading
    /// zeros beyond a bare `0`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Str(b) => parse_strict_i64(b),
            Value::List(_) => None,
        }
    }
}

/// Parse `b` as a signed 64-bit decimal under the data model's strict grammar.
pub fn parse_strict_i64(b: &[u8]) -> Option<i64> {
    let s = std::str::from_utf8(b).ok()?;
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    s.parse::<i64>().ok()
}

struct Entry {
    value: Value,
    expires_at: Option<u64>,
}

impl Entry {
    fn is_expired(&self, now_ms: u64) -> bool {
        matches!(self.expires_at, Some(t) if now_ms >= t)
    }
}

/// Milliseconds since the Unix epoch, as seen by the store's clock.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The process-wide key-value store.
///
/// All operations are atomic with respect to other operations on the same
/// key; operations on distinct keys proceed in parallel via `DashMap`'s
/// shard locking.
pub struct Store {
    inner: DashMap<Vec<u8>, Entry, ahash::RandomState>,
    sweeping: AtomicBool,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Store {
            inner: DashMap::with_hasher(ahash::RandomState::new()),
            sweeping: AtomicBool::new(false),
        }
    }

    /// Load a live value for `k`, lazily deleting it first if it has expired.
    pub fn load(&self, k: &[u8]) -> Option<Value> {
        let now = now_ms();
        if let DashEntry::Occupied(e) = self.inner.entry(k.to_vec()) {
            if e.get().is_expired(now) {
                e.remove();
                return None;
            }
            return Some(e.get().value.clone());
        }
        None
    }

    /// Store `v` under `k`, replacing any existing entry and expiration.
    pub fn store(&self, k: Vec<u8>, v: Value, expires_at: Option<u64>) {
        self.inner.insert(
            k,
            Entry {
                value: v,
                expires_at,
            },
        );
    }

    /// Delete `k`. Returns whether a live (non-expired) entry was removed.
    pub fn delete(&self, k: &[u8]) -> bool {
        self.load_and_delete(k).is_some()
    }

    /// Remove and return the live value at `k`, if any.
    pub fn load_and_delete(&self, k: &[u8]) -> Option<Value> {
        let now = now_ms();
        match self.inner.entry(k.to_vec()) {
            DashEntry::Occupied(e) => {
                let (_, entry) = e.remove_entry();
                if entry.is_expired(now) {
                    None
                } else {
                    Some(entry.value)
                }
            }
            DashEntry::Vacant(_) => None,
        }
    }

    /// Whether `k` currently holds a live, non-expired entry.
    pub fn exists(&self, k: &[u8]) -> bool {
        self.load(k).is_some()
    }

    /// Atomically read-modify-write the entry at `k`.
    ///
    /// `f` receives the live value (`None` if absent or expired) and
    /// returns `(new_value, result)`; `new_value = None` deletes the key,
    /// `Some(v)` stores `v` with no expiration (compute is used by
    /// INCR/DECR/LPUSH/RPUSH, none of which carry a TTL).
    pub fn compute<F, R>(&self, k: &[u8], f: F) -> R
    where
        F: FnOnce(Option<Value>) -> (Option<Value>, R),
    {
        let now = now_ms();
        match self.inner.entry(k.to_vec()) {
            DashEntry::Occupied(mut e) => {
                let current = if e.get().is_expired(now) {
                    None
                } else {
                    Some(e.get().value.clone())
                };
                let (next, result) = f(current);
                match next {
                    Some(v) => {
                        e.get_mut().value = v;
                        e.get_mut().expires_at = None;
                    }
                    None => {
                        e.remove();
                    }
                }
                result
            }
            DashEntry::Vacant(e) => {
                let (next, result) = f(None);
                if let Some(v) = next {
                    e.insert(Entry {
                        value: v,
                        expires_at: None,
                    });
                }
                result
            }
        }
    }

    /// Remove every entry whose expiration has passed, as of now.
    fn sweep_once(&self) {
        let now = now_ms();
        self.inner.retain(|_, e| !e.is_expired(now));
    }
}

/// Spawn the background thread that periodically reclaims expired keys
/// that no client has touched since expiring (idle/abandoned TTLs).
///
/// Returns a join handle; the thread runs until the process exits. Calling
/// this more than once per `Store` is a caller error (guarded by an
/// internal flag so tests that build many short-lived stores don't leak
/// threads if they call it twice by mistake).
pub fn spawn_sweeper(store: Arc<Store>) -> std::thread::JoinHandle<()> {
    store
        .sweeping
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .expect("spawn_sweeper called twice for the same Store");
    std::thread::Builder::new()
        .name("expire-sweep".into())
        .spawn(move || loop {
            std::thread::sleep(SWEEP_INTERVAL);
            store.sweep_once();
        })
        .expect("failed to spawn expiration sweep thread")
}
