use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AdapterResult;
use crate::model::{Job, JobEvent, JobStatus, Metrics, Queue};

/// Paged listing request for [`BrokerAdapter::list_jobs`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListJobsQuery {
    pub queue: String,
    pub status: JobStatus,
    pub offset: u64,
    pub limit: u32,
}

/// Callback registered via [`BrokerAdapter::subscribe`].
///
/// Invocation is synchronous from the parser's perspective: the adapter's
/// delivery loop runs serially over incoming broker messages, so a listener
/// must not block for long. A panicking listener must not terminate the
/// delivery loop — implementations catch and discard such failures (see
/// `broker-adapter`'s `events` module).
pub type JobEventListener = Arc<dyn Fn(JobEvent) + Send + Sync + 'static>;

/// Handle returned by [`BrokerAdapter::subscribe`]; dropping or calling
/// [`Unregister::unregister`] removes the listener. Idempotent.
pub struct Unregister {
    inner: Box<dyn FnMut() + Send>,
    done: bool,
}

impl Unregister {
    pub fn new(inner: impl FnMut() + Send + 'static) -> Self {
        Self {
            inner: Box::new(inner),
            done: false,
        }
    }

    /// Removes the listener. Safe to call more than once.
    pub fn unregister(&mut self) {
        if !self.done {
            (self.inner)();
            self.done = true;
        }
    }
}

impl Drop for Unregister {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// The normalized, broker-agnostic contract consumed by the HTTP/SSE
/// collaborators.
///
/// An implementation owns both broker connections (command + subscriber)
/// internally; nothing in this trait exposes connection handles to callers.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Validates `endpoint`, opens the command connection, and waits for the
    /// first of {ready, error}. On error the client is force-closed and the
    /// error is surfaced.
    async fn connect(&self, endpoint: &str) -> AdapterResult<()>;

    /// Closes the subscriber (unsubscribe + close) then the command
    /// connection. Idempotent: repeated calls after success are no-ops.
    async fn disconnect(&self) -> AdapterResult<()>;

    /// Enumerates every queue the broker currently knows about.
    ///
    /// Returns an empty collection (not an error) when the broker holds no
    /// queues. `cancel`, if provided, aborts in-flight broker calls and
    /// returns [`crate::error::AdapterError::Cancelled`] promptly.
    async fn discover(&self, cancel: Option<&CancellationToken>) -> AdapterResult<Vec<Queue>>;

    /// Returns a page of jobs for `query.queue` in the status's natural
    /// order (see the status -> index table in `broker-adapter`).
    ///
    /// `query.status == JobStatus::Paused` always fails with
    /// `InvalidArgument`; jobs are never individually paused.
    async fn list_jobs(
        &self,
        query: ListJobsQuery,
        cancel: Option<&CancellationToken>,
    ) -> AdapterResult<Vec<Job>>;

    /// Resolves a single job's status by probing the five status indexes in
    /// order and returns its full decoded record.
    async fn fetch_job(&self, queue: &str, id: &str) -> AdapterResult<Job>;

    /// Computes the rolling-window metrics snapshot for `queue`.
    async fn metrics(&self, queue: &str) -> AdapterResult<Metrics>;

    /// Registers `listener` to receive [`JobEvent`]s for every queue on the
    /// connected broker. Lazily creates the subscriber connection on first
    /// call. Returns a handle that unregisters the listener when dropped.
    async fn subscribe(&self, listener: JobEventListener) -> AdapterResult<Unregister>;
}
