//! Deterministic name/ID <-> storage key mapping for a broker schema.
//!
//! Pure functions, no state. Keys have the shape `<prefix>:<queue>:<suffix>`
//! where `suffix` is one of the five reserved status-index tokens plus
//! `meta`, or is a job id. The mapping is a bijection between
//! `(queue, suffix|id)` and `key` so reverse parsing recovers the queue name
//! and discriminates a job-record key from a status-index key.
//!
//! Parsing rule: split on `:`; the first token is the fixed prefix, the last
//! token is the suffix, the middle tokens (rejoined with `:`) are the queue
//! name. A queue name containing `:` is only safely addressable through this
//! scheme as long as it never collides with a reserved suffix token as its
//! own trailing component — see [`is_reserved_suffix`].

use std::fmt;

/// The six reserved trailing tokens that are never job ids.
pub const RESERVED_SUFFIXES: [&str; 6] = [
    "meta",
    "wait",
    "active",
    "completed",
    "failed",
    "delayed",
];

/// One of the five status indexes (excludes `meta`, which is housekeeping).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusIndex {
    Wait,
    Active,
    Completed,
    Failed,
    Delayed,
}

impl StatusIndex {
    pub const ALL: [StatusIndex; 5] = [
        StatusIndex::Wait,
        StatusIndex::Active,
        StatusIndex::Completed,
        StatusIndex::Failed,
        StatusIndex::Delayed,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Wait => "wait",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Delayed => "delayed",
        }
    }
}

impl fmt::Display for StatusIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// A broker key, parsed back into its constituent parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedKey {
    /// `<prefix>:<queue>:meta`
    Meta { queue: String },
    /// `<prefix>:<queue>:<index-suffix>`
    Status { queue: String, index: StatusIndex },
    /// `<prefix>:<queue>:<job-id>` (the id may itself contain `:`).
    Job { queue: String, id: String },
}

/// Whether `token` is one of the reserved suffix names ([`RESERVED_SUFFIXES`]).
///
/// A queue named exactly after a reserved token would be misparsed by
/// [`parse_key`] (its `meta`/status keys collide with its own job keys);
/// `broker-adapter`'s discovery step rejects such queue names rather than
/// surfacing the ambiguity to a caller.
pub fn is_reserved_suffix(token: &str) -> bool {
    RESERVED_SUFFIXES.contains(&token)
}

fn join(prefix: &str, queue: &str, suffix: &str) -> String {
    format!("{prefix}:{queue}:{suffix}")
}

pub fn meta_key(prefix: &str, queue: &str) -> String {
    join(prefix, queue, "meta")
}

pub fn status_key(prefix: &str, queue: &str, index: StatusIndex) -> String {
    join(prefix, queue, index.suffix())
}

pub fn job_key(prefix: &str, queue: &str, id: &str) -> String {
    join(prefix, queue, id)
}

/// Glob pattern matching every queue's `meta` key, for the discovery cursor
/// scan. Redis `*` matches across embedded `:` characters, so this also
/// matches queue names that contain `:`.
pub fn meta_key_pattern(prefix: &str) -> String {
    format!("{prefix}:*:meta")
}

/// Glob pattern for subscribing to every keyspace mutation under `prefix`.
pub fn keyspace_pattern(prefix: &str, db: u8) -> String {
    format!("__keyspace@{db}__:{prefix}:*")
}

/// Parses a raw broker key of the shape `<prefix>:<queue>:<suffix>` back
/// into its queue name and the discriminated suffix.
///
/// Returns `None` when `key` does not start with `prefix` or has fewer than
/// three `:`-separated tokens.
pub fn parse_key(prefix: &str, key: &str) -> Option<ParsedKey> {
    let mut parts = key.split(':');
    if parts.next()? != prefix {
        return None;
    }
    let rest: Vec<&str> = parts.collect();
    if rest.len() < 2 {
        return None;
    }
    let (suffix, queue_parts) = rest.split_last().expect("checked len >= 2 above");
    let queue = queue_parts.join(":");
    if queue.is_empty() {
        return None;
    }

    match *suffix {
        "meta" => Some(ParsedKey::Meta { queue }),
        "wait" => Some(ParsedKey::Status {
            queue,
            index: StatusIndex::Wait,
        }),
        "active" => Some(ParsedKey::Status {
            queue,
            index: StatusIndex::Active,
        }),
        "completed" => Some(ParsedKey::Status {
            queue,
            index: StatusIndex::Completed,
        }),
        "failed" => Some(ParsedKey::Status {
            queue,
            index: StatusIndex::Failed,
        }),
        "delayed" => Some(ParsedKey::Status {
            queue,
            index: StatusIndex::Delayed,
        }),
        id => Some(ParsedKey::Job {
            queue,
            id: id.to_string(),
        }),
    }
}

/// Strips the `__keyspace@<db>__:<prefix>:` envelope from a keyspace
/// notification channel and splits the remainder into `(queue, tail)`,
/// where `tail` is everything after the queue's first `:`-delimited token
/// (and may itself contain further `:`, e.g. a job id).
///
/// Returns `None` when the channel does not match the envelope for the
/// given `db`/`prefix`.
pub fn parse_keyspace_channel(prefix: &str, db: u8, channel: &str) -> Option<(String, String)> {
    let envelope = format!("__keyspace@{db}__:{prefix}:");
    let remainder = channel.strip_prefix(&envelope)?;
    let (queue, tail) = remainder.split_once(':')?;
    if queue.is_empty() || tail.is_empty() {
        return None;
    }
    Some((queue.to_string(), tail.to_string()))
}
