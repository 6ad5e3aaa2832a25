use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptor for the broker endpoint a [`Queue`] or adapter connected to.
///
/// Immutable, captured at connect-time. Purely diagnostic — never used to
/// re-derive a connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub db_index: u8,
}

/// A named queue at the broker, with status counts captured at the moment
/// of discovery.
///
/// Synthesized per `Discover` call; never cached implicitly by the adapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub name: String,
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
    pub paused: bool,
    pub endpoint: ConnectionDescriptor,
}

/// A closed enumeration of the six job statuses.
///
/// Waiting/active are queue-position states; completed/failed are terminal
/// history states; delayed is a scheduled-future state; paused is a
/// queue-level flag only (see [`Queue::paused`]) — jobs never carry it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
    Delayed,
    Paused,
}

impl JobStatus {
    /// All statuses that `ListJobs`/`FetchJob` may resolve a job to.
    ///
    /// Excludes [`JobStatus::Paused`], which is queue-level only (§9).
    pub const JOB_STATUSES: [JobStatus; 5] = [
        JobStatus::Waiting,
        JobStatus::Active,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Delayed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Delayed => "delayed",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "delayed" => Ok(Self::Delayed),
            "paused" => Ok(Self::Paused),
            _ => Err(()),
        }
    }
}

/// Terminal error record attached to a [`JobStatus::Failed`] job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub message: String,
    pub stack: Vec<String>,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A single job, identified by (queue name, job id).
///
/// Invariants (enforced by the adapter, not by this type):
/// - `attempts <= max_attempts` when `max_attempts` is defined.
/// - `status == Completed` implies `processed_at` and `finished_at` are both
///   defined and `processed_at <= finished_at`.
/// - `status == Failed` implies `finished_at` is defined and `error` is present.
/// - `status == Delayed` implies `scheduled_at` is defined and greater than
///   `created_at`.
/// - `status` in `{Waiting, Active}` implies `finished_at` is absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub queue: String,
    pub id: String,
    pub status: JobStatus,
    pub payload: serde_json::Value,
    pub return_value: Option<serde_json::Value>,
    pub error: Option<JobError>,
    pub attempts: u32,
    pub max_attempts: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Per-queue aggregate metrics snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Jobs terminated (completed + failed) in the last hour.
    pub throughput: u64,
    /// Fraction of the sampled terminal population that failed, in `[0, 1]`.
    pub failure_rate: f64,
    /// Mean `finished_at - processed_at` over the sampled completed
    /// population, in milliseconds; `0` when the sample is empty.
    pub avg_processing_ms: f64,
}

/// The kind of job-lifecycle transition a [`JobEvent`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    /// Job record fields changed (`hset`/`hmset` on the job hash).
    Updated,
    /// Job record was deleted.
    Removed,
    /// Job entered the wait list.
    Waiting,
    /// Job left the wait list (picked up by a worker).
    Dequeued,
    /// Job entered the active list.
    Active,
    /// Job was added to the completed set.
    Completed,
    /// Job was added to the failed set.
    Failed,
    /// Job was added to the delayed set.
    Delayed,
}

impl JobEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Removed => "removed",
            Self::Waiting => "waiting",
            Self::Dequeued => "dequeued",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Delayed => "delayed",
        }
    }
}

impl fmt::Display for JobEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single job-lifecycle transition, translated from a broker keyspace
/// notification.
///
/// `job_id` is empty for queue-list events that do not carry the id inline
/// (`Waiting`, `Dequeued`, `Active`, `Completed`, `Failed`, `Delayed`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub queue: String,
    pub job_id: String,
    pub at: DateTime<Utc>,
}
