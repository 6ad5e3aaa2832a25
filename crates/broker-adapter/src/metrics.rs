//! `Metrics`: rolling-window aggregates over the completed/failed indexes
//! (§4.3 "Metrics").

use std::collections::HashMap;

use broker_store::{job_key, status_key, CommandClient, StatusIndex, ZMember};
use broker_types::{AdapterError, AdapterResult, Metrics};

const ONE_HOUR_MS: f64 = 3_600_000.0;

fn processing_time_ms(record: &HashMap<String, String>) -> Option<f64> {
    let processed: i64 = record.get("processedOn")?.parse().ok()?;
    let finished: i64 = record.get("finishedOn")?.parse().ok()?;
    Some((finished - processed) as f64)
}

async fn fetch_processing_time(
    command: &dyn CommandClient,
    prefix: &str,
    queue: &str,
    id: &str,
) -> AdapterResult<Option<f64>> {
    let record = command
        .hgetall(&job_key(prefix, queue, id))
        .await
        .map_err(|e| AdapterError::Transport(e.to_string()))?;
    // A missing record (pruned between the sample read and this fetch) is
    // skipped silently, same tombstone policy as ListJobs (§7).
    Ok(processing_time_ms(&record))
}

pub(crate) async fn metrics(
    command: &dyn CommandClient,
    prefix: &str,
    queue: &str,
    sample_horizon: u32,
) -> AdapterResult<Metrics> {
    metrics_at(command, prefix, queue, sample_horizon, chrono::Utc::now().timestamp_millis()).await
}

async fn metrics_at(
    command: &dyn CommandClient,
    prefix: &str,
    queue: &str,
    sample_horizon: u32,
    now_ms: i64,
) -> AdapterResult<Metrics> {
    let completed_key = status_key(prefix, queue, StatusIndex::Completed);
    let failed_key = status_key(prefix, queue, StatusIndex::Failed);
    let horizon = (sample_horizon.max(1) - 1) as i64;

    let (completed, failed): (Vec<ZMember>, Vec<ZMember>) = futures::try_join!(
        command.zrevrange_withscores(&completed_key, 0, horizon),
        command.zrevrange_withscores(&failed_key, 0, horizon),
    )
    .map_err(|e| AdapterError::Transport(format!("sampling metrics for {queue:?} failed: {e}")))?;

    let window_start = now_ms as f64 - ONE_HOUR_MS;
    let throughput = completed
        .iter()
        .chain(failed.iter())
        .filter(|m| m.score >= window_start)
        .count() as u64;

    let denominator = completed.len() + failed.len();
    let failure_rate = if denominator == 0 {
        0.0
    } else {
        failed.len() as f64 / denominator as f64
    };

    let processing_times: Vec<AdapterResult<Option<f64>>> = futures::future::join_all(
        completed
            .iter()
            .map(|member| fetch_processing_time(command, prefix, queue, &member.member)),
    )
    .await;
    let mut samples = Vec::with_capacity(processing_times.len());
    for result in processing_times {
        if let Some(ms) = result? {
            samples.push(ms);
        }
    }
    let avg_processing_ms = if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    };

    Ok(Metrics {
        throughput,
        failure_rate,
        avg_processing_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeCommandClient;
    use std::collections::HashMap;

    fn record(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn empty_queue_yields_all_zeros() {
        let command = FakeCommandClient::default();
        let snapshot = metrics_at(&command, "bull", "emails", 100, 10_000).await.unwrap();
        assert_eq!(snapshot.throughput, 0);
        assert_eq!(snapshot.failure_rate, 0.0);
        assert_eq!(snapshot.avg_processing_ms, 0.0);
    }

    #[tokio::test]
    async fn computes_throughput_failure_rate_and_average_processing_time() {
        let command = FakeCommandClient::default();
        let now: i64 = 7_200_000; // T = 2h, in ms, as an arbitrary wall clock
        command.seed_zset("bull:emails:completed", vec![("c1".into(), (now - 1_000) as f64)]);
        command.seed_zset(
            "bull:emails:failed",
            vec![
                ("f1".into(), (now - 30 * 60 * 1000) as f64),
                ("f2".into(), (now - 3 * 3_600_000) as f64),
            ],
        );
        command.seed_hash(
            "bull:emails:c1",
            record(&[("processedOn", "1000"), ("finishedOn", "1500")]),
        );

        let snapshot = metrics_at(&command, "bull", "emails", 100, now).await.unwrap();
        // c1 (1s ago) and f1 (30min ago) are within the last hour; f2 (3h ago) is not.
        assert_eq!(snapshot.throughput, 2);
        assert_eq!(snapshot.failure_rate, 2.0 / 3.0);
        assert_eq!(snapshot.avg_processing_ms, 500.0);
    }

    #[tokio::test]
    async fn sample_horizon_truncates_to_the_newest_members() {
        let command = FakeCommandClient::default();
        let members: Vec<(String, f64)> = (0..200).map(|i| (format!("j{i}"), i as f64)).collect();
        command.seed_zset("bull:emails:completed", members);

        let snapshot = metrics_at(&command, "bull", "emails", 100, 50).await.unwrap();
        // Only the newest 100 (scores 100..=199) are sampled; the window is
        // score >= 50 - 3_600_000, so every sampled member counts.
        assert_eq!(snapshot.throughput, 100);
    }

    #[tokio::test]
    async fn missing_record_for_a_completed_sample_is_skipped_silently() {
        let command = FakeCommandClient::default();
        command.seed_zset("bull:emails:completed", vec![("ghost".into(), 1.0)]);
        let snapshot = metrics_at(&command, "bull", "emails", 100, 1).await.unwrap();
        assert_eq!(snapshot.avg_processing_ms, 0.0);
    }
}
