//! Keyspace-notification translation and listener fan-out (§4.5, §4.3 "Subscribe").
//!
//! One subscriber connection is shared by every registered listener: a
//! single delivery loop reads `(channel, op)` tuples off the subscriber
//! client and dispatches a translated [`JobEvent`] to each listener in the
//! registry. Listener panics are caught so one bad callback cannot take
//! down the loop.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use broker_store::{parse_keyspace_channel, is_reserved_suffix, SubscriberClient};
use broker_types::{JobEvent, JobEventKind, JobEventListener};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Translates a single keyspace-notification `(channel, op)` pair into a
/// [`JobEvent`], per the §4.5 algorithm.
///
/// Returns `None` when the channel doesn't match this adapter's envelope,
/// or when `tail` is `meta` (internal housekeeping, never surfaced).
pub(crate) fn translate_event(prefix: &str, db: u8, channel: &str, op: &str) -> Option<JobEvent> {
    let (queue, tail) = parse_keyspace_channel(prefix, db, channel)?;
    if tail == "meta" {
        return None;
    }

    let kind = match (tail.as_str(), op) {
        ("wait", "lpush") | ("wait", "rpush") => JobEventKind::Waiting,
        ("wait", "lrem") => JobEventKind::Dequeued,
        ("active", "lpush") | ("active", "rpush") => JobEventKind::Active,
        ("completed", "zadd") => JobEventKind::Completed,
        ("failed", "zadd") => JobEventKind::Failed,
        ("delayed", "zadd") => JobEventKind::Delayed,
        (tail, _) if is_reserved_suffix(tail) => return None,
        (_, "hset") | (_, "hmset") => JobEventKind::Updated,
        (_, "del") => JobEventKind::Removed,
        _ => JobEventKind::Updated,
    };

    let job_id = match kind {
        JobEventKind::Waiting
        | JobEventKind::Dequeued
        | JobEventKind::Active
        | JobEventKind::Completed
        | JobEventKind::Failed
        | JobEventKind::Delayed => String::new(),
        JobEventKind::Updated | JobEventKind::Removed => tail,
    };

    Some(JobEvent {
        kind,
        queue,
        job_id,
        at: Utc::now(),
    })
}

/// Registered listeners for one subscriber connection.
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, JobEventListener>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn add(&self, listener: JobEventListener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().expect("listener registry poisoned").insert(id, listener);
        id
    }

    /// Idempotent: removing an id twice is a no-op the second time.
    pub(crate) fn remove(&self, id: u64) {
        self.listeners.lock().expect("listener registry poisoned").remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().expect("listener registry poisoned").len()
    }

    /// Invokes every listener with `event`. A panicking listener is caught
    /// and logged rather than propagated (§4.3: "exceptions ... must not
    /// terminate the delivery loop").
    fn dispatch(&self, event: &JobEvent) {
        let snapshot: Vec<JobEventListener> = self
            .listeners
            .lock()
            .expect("listener registry poisoned")
            .values()
            .cloned()
            .collect();
        for listener in snapshot {
            let event = event.clone();
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!("job event listener panicked; dropping this delivery");
            }
        }
    }
}

/// Runs the subscriber delivery loop until cancelled or the connection
/// closes. Spawned once per `Subscribe` lifetime by `broker-adapter`'s
/// lifecycle module; torn down by `Disconnect` or the last `unregister`.
pub(crate) async fn run_delivery_loop(
    mut subscriber: Box<dyn SubscriberClient>,
    registry: std::sync::Arc<ListenerRegistry>,
    prefix: String,
    db_index: u8,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("subscriber delivery loop cancelled");
                break;
            }
            message = subscriber.recv() => {
                match message {
                    Ok(Some(msg)) => {
                        if let Some(event) = translate_event(&prefix, db_index, &msg.channel, &msg.op) {
                            registry.dispatch(&event);
                        }
                    }
                    Ok(None) => {
                        debug!("subscriber connection closed by broker");
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "subscriber connection error; stopping delivery loop");
                        break;
                    }
                }
            }
        }
    }
    let _ = subscriber.close().await;
}
