//! `ListJobs`: paginated listing of one status index (§4.3 "ListJobs").

use broker_store::{job_key, status_key, CommandClient, StatusIndex};
use broker_types::{AdapterError, AdapterResult, Job, JobStatus, ListJobsQuery};
use tokio_util::sync::CancellationToken;

use crate::decode::decode_job;

const MAX_LIMIT: u32 = 100;

fn cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.is_some_and(|token| token.is_cancelled())
}

fn validate(query: &ListJobsQuery) -> AdapterResult<()> {
    if query.status == JobStatus::Paused {
        return Err(AdapterError::InvalidArgument(
            "jobs are never individually paused".to_string(),
        ));
    }
    if query.limit == 0 || query.limit > MAX_LIMIT {
        return Err(AdapterError::InvalidArgument(format!(
            "limit must be in [1, {MAX_LIMIT}], got {}",
            query.limit
        )));
    }
    Ok(())
}

async fn page_ids(
    command: &dyn CommandClient,
    prefix: &str,
    query: &ListJobsQuery,
) -> AdapterResult<Vec<String>> {
    let start = query.offset as i64;
    let stop = start + query.limit as i64 - 1;

    let ids = match query.status {
        JobStatus::Waiting => {
            let key = status_key(prefix, &query.queue, StatusIndex::Wait);
            command.lrange(&key, start, stop).await
        }
        JobStatus::Active => {
            let key = status_key(prefix, &query.queue, StatusIndex::Active);
            command.lrange(&key, start, stop).await
        }
        JobStatus::Completed => {
            let key = status_key(prefix, &query.queue, StatusIndex::Completed);
            command
                .zrevrange_withscores(&key, start, stop)
                .await
                .map(|members| members.into_iter().map(|m| m.member).collect())
        }
        JobStatus::Failed => {
            let key = status_key(prefix, &query.queue, StatusIndex::Failed);
            command
                .zrevrange_withscores(&key, start, stop)
                .await
                .map(|members| members.into_iter().map(|m| m.member).collect())
        }
        JobStatus::Delayed => {
            let key = status_key(prefix, &query.queue, StatusIndex::Delayed);
            command
                .zrange_withscores(&key, start, stop)
                .await
                .map(|members| members.into_iter().map(|m| m.member).collect())
        }
        JobStatus::Paused => unreachable!("rejected by validate()"),
    };

    ids.map_err(|e| AdapterError::Transport(format!("listing {:?} failed: {e}", query.status)))
}

/// Fetches one job's record; `None` means a tombstone (index entry whose
/// record has already been pruned by the broker) and is dropped silently
/// by the caller, not treated as an error (§7).
async fn fetch_one(
    command: &dyn CommandClient,
    prefix: &str,
    queue: &str,
    id: &str,
    status: JobStatus,
) -> AdapterResult<Option<Job>> {
    let key = job_key(prefix, queue, id);
    let record = command
        .hgetall(&key)
        .await
        .map_err(|e| AdapterError::Transport(e.to_string()))?;
    if record.is_empty() {
        return Ok(None);
    }
    decode_job(queue, id, status, &record).map(Some)
}

pub(crate) async fn list_jobs(
    command: &dyn CommandClient,
    prefix: &str,
    query: &ListJobsQuery,
    cancel: Option<&CancellationToken>,
) -> AdapterResult<Vec<Job>> {
    validate(query)?;
    if cancelled(cancel) {
        return Err(AdapterError::Cancelled);
    }
    let ids = page_ids(command, prefix, query).await?;
    if cancelled(cancel) {
        return Err(AdapterError::Cancelled);
    }

    let fetches = ids
        .iter()
        .map(|id| fetch_one(command, prefix, &query.queue, id, query.status));
    let fan_out = futures::future::join_all(fetches);

    let results = match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => return Err(AdapterError::Cancelled),
            results = fan_out => results,
        },
        None => fan_out.await,
    };

    let mut jobs = Vec::with_capacity(results.len());
    for result in results {
        if let Some(job) = result? {
            jobs.push(job);
        }
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeCommandClient;
    use std::collections::HashMap;

    fn record(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn query(status: JobStatus, offset: u64, limit: u32) -> ListJobsQuery {
        ListJobsQuery { queue: "emails".to_string(), status, offset, limit }
    }

    #[tokio::test]
    async fn completed_jobs_are_returned_newest_first() {
        let command = FakeCommandClient::default();
        command.seed_zset("bull:emails:completed", vec![("j4".into(), 1000.0), ("j5".into(), 2000.0)]);
        command.seed_hash("bull:emails:j4", record(&[("timestamp", "1000")]));
        command.seed_hash("bull:emails:j5", record(&[("timestamp", "1000")]));

        let jobs = list_jobs(&command, "bull", &query(JobStatus::Completed, 0, 10), None).await.unwrap();
        assert_eq!(jobs.iter().map(|j| j.id.as_str()).collect::<Vec<_>>(), vec!["j5", "j4"]);
    }

    #[tokio::test]
    async fn delayed_jobs_are_returned_soonest_first() {
        let command = FakeCommandClient::default();
        command.seed_zset("bull:emails:delayed", vec![("later".into(), 2000.0), ("sooner".into(), 1000.0)]);
        command.seed_hash("bull:emails:later", record(&[("timestamp", "1000")]));
        command.seed_hash("bull:emails:sooner", record(&[("timestamp", "1000")]));

        let jobs = list_jobs(&command, "bull", &query(JobStatus::Delayed, 0, 10), None).await.unwrap();
        assert_eq!(jobs.iter().map(|j| j.id.as_str()).collect::<Vec<_>>(), vec!["sooner", "later"]);
    }

    #[tokio::test]
    async fn tombstoned_ids_are_dropped_silently() {
        let command = FakeCommandClient::default();
        command.seed_list("bull:emails:wait", vec!["j1".into(), "j2".into()]);
        command.seed_hash("bull:emails:j1", record(&[("timestamp", "1000")]));
        // j2 has no backing record: simulates a tombstone.

        let jobs = list_jobs(&command, "bull", &query(JobStatus::Waiting, 0, 10), None).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "j1");
    }

    #[tokio::test]
    async fn pre_cancelled_token_is_rejected_before_any_fetch() {
        let command = FakeCommandClient::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = list_jobs(&command, "bull", &query(JobStatus::Waiting, 0, 10), Some(&cancel))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Cancelled));
    }

    #[tokio::test]
    async fn paused_status_is_rejected() {
        let command = FakeCommandClient::default();
        let err = list_jobs(&command, "bull", &query(JobStatus::Paused, 0, 10), None).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn zero_limit_is_rejected() {
        let command = FakeCommandClient::default();
        let err = list_jobs(&command, "bull", &query(JobStatus::Waiting, 0, 0), None).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn limit_above_one_hundred_is_rejected() {
        let command = FakeCommandClient::default();
        let err = list_jobs(&command, "bull", &query(JobStatus::Waiting, 0, 101), None).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidArgument(_)));
    }
}
