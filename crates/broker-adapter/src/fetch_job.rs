//! `FetchJob`: resolve a job's status by probing the five indexes in order,
//! then decode its record (§4.3 "FetchJob").

use broker_store::{job_key, status_key, CommandClient, StatusIndex};
use broker_types::{AdapterError, AdapterResult, Job, JobStatus};

use crate::decode::decode_job;

/// Probes the five status indexes in the fixed order `waiting -> active ->
/// completed -> failed -> delayed` and returns the first that reports `id`
/// present. No further probes are issued once one matches (§4.3).
async fn resolve_status(
    command: &dyn CommandClient,
    prefix: &str,
    queue: &str,
    id: &str,
) -> AdapterResult<Option<JobStatus>> {
    let wait_key = status_key(prefix, queue, StatusIndex::Wait);
    let present = command
        .lpos(&wait_key, id)
        .await
        .map_err(|e| AdapterError::Transport(e.to_string()))?
        .is_some();
    if present {
        return Ok(Some(JobStatus::Waiting));
    }

    let active_key = status_key(prefix, queue, StatusIndex::Active);
    let present = command
        .lpos(&active_key, id)
        .await
        .map_err(|e| AdapterError::Transport(e.to_string()))?
        .is_some();
    if present {
        return Ok(Some(JobStatus::Active));
    }

    for (index, status) in [
        (StatusIndex::Completed, JobStatus::Completed),
        (StatusIndex::Failed, JobStatus::Failed),
        (StatusIndex::Delayed, JobStatus::Delayed),
    ] {
        let key = status_key(prefix, queue, index);
        let present = command
            .zscore(&key, id)
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?
            .is_some();
        if present {
            return Ok(Some(status));
        }
    }

    Ok(None)
}

pub(crate) async fn fetch_job(
    command: &dyn CommandClient,
    prefix: &str,
    queue: &str,
    id: &str,
) -> AdapterResult<Job> {
    let status = resolve_status(command, prefix, queue, id)
        .await?
        .ok_or_else(|| AdapterError::NotFound {
            queue: queue.to_string(),
            id: id.to_string(),
        })?;

    let record_key = job_key(prefix, queue, id);
    let record = command
        .hgetall(&record_key)
        .await
        .map_err(|e| AdapterError::Transport(e.to_string()))?;
    if record.is_empty() {
        // The index reported the id present, but the record is gone —
        // a race with broker pruning (§4.3).
        return Err(AdapterError::NotFound {
            queue: queue.to_string(),
            id: id.to_string(),
        });
    }

    decode_job(queue, id, status, &record)
}
