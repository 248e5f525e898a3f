//! Request/response correlation: one-shot continuations keyed by
//! requestID, garbage-collected on a fixed interval.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

/// How often the sweep runs, and how old an unresolved entry may get.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

type Continuation = Box<dyn FnOnce(Value) + Send>;

struct PendingCallback {
    created_at: Instant,
    continuation: Continuation,
}

/// Map of in-flight requests awaiting a response.
///
/// Entries are one-shot: the first matching [`resolve`] consumes the
/// continuation; [`sweep`] removes anything older than the TTL so an
/// unanswered request cannot leak forever.
pub struct CallbackRegistry {
    pending: Mutex<HashMap<String, PendingCallback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a continuation for `request_id`. Empty or duplicate ids
    /// are a no-op: the request still goes out, but its response will
    /// surface only as an orphan in the logs.
    pub fn register<F>(&self, request_id: &str, continuation: F)
    where
        F: FnOnce(Value) + Send + 'static,
    {
        if request_id.is_empty() {
            warn!("refusing to register callback with empty requestID");
            return;
        }
        let mut pending = self.pending.lock().unwrap();
        if pending.contains_key(request_id) {
            warn!(request_id, "callback already registered for this requestID");
            return;
        }
        pending.insert(
            request_id.to_string(),
            PendingCallback {
                created_at: Instant::now(),
                continuation: Box::new(continuation),
            },
        );
    }

    /// Fire and remove the continuation for `request_id`. Returns false
    /// on a miss, which is expected when the request already timed out
    /// locally and the remote answered late.
    pub fn resolve(&self, request_id: &str, response: Value) -> bool {
        let entry = self.pending.lock().unwrap().remove(request_id);
        match entry {
            Some(callback) => {
                (callback.continuation)(response);
                true
            }
            None => {
                warn!(request_id, "response did not match any pending request");
                false
            }
        }
    }

    /// Drop entries older than `ttl`. Returns how many were removed.
    pub fn sweep(&self, ttl: Duration) -> usize {
        let mut pending = self.pending.lock().unwrap();
        let before = pending.len();
        pending.retain(|_, callback| callback.created_at.elapsed() <= ttl);
        let removed = before - pending.len();
        if removed > 0 {
            debug!(removed, "swept expired response callbacks");
        }
        removed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_resolve_fires_exactly_once() {
        let registry = CallbackRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        registry.register("req-1", move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.resolve("req-1", Value::Null));
        assert!(!registry.resolve("req-1", Value::Null), "second resolve must miss");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_unmatched_response_is_a_miss() {
        let registry = CallbackRegistry::new();
        assert!(!registry.resolve("never-registered", Value::Null));
    }

    #[test]
    fn test_empty_id_not_registered() {
        let registry = CallbackRegistry::new();
        registry.register("", |_| panic!("must never fire"));
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let registry = CallbackRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let first_clone = first.clone();
        registry.register("dup", move |_| {
            first_clone.fetch_add(1, Ordering::SeqCst);
        });
        registry.register("dup", |_| panic!("second registration must be dropped"));
        assert_eq!(registry.pending_count(), 1);

        registry.resolve("dup", Value::Null);
        assert_eq!(first.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let registry = CallbackRegistry::new();
        registry.register("old", |_| {});
        std::thread::sleep(Duration::from_millis(25));
        registry.register("fresh", |_| {});

        // TTL between the two ages: only "old" goes.
        let removed = registry.sweep(Duration::from_millis(10));
        assert_eq!(removed, 1);
        assert_eq!(registry.pending_count(), 1);
        assert!(registry.resolve("fresh", Value::Null));
        assert!(!registry.resolve("old", Value::Null));
    }

    #[test]
    fn test_resolved_entry_absent_after_sweep_window() {
        // Resolving before the TTL prevents the sweep from seeing it.
        let registry = CallbackRegistry::new();
        registry.register("r", |_| {});
        assert!(registry.resolve("r", Value::Null));
        assert_eq!(registry.sweep(Duration::from_millis(0)), 0);
    }

    #[test]
    fn test_callback_receives_response_payload() {
        let registry = CallbackRegistry::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        registry.register("payload", move |value| {
            *seen_clone.lock().unwrap() = Some(value);
        });

        registry.resolve("payload", serde_json::json!({"ok": true}));
        let value = seen.lock().unwrap().take().unwrap();
        assert_eq!(value["ok"], true);
    }
}
