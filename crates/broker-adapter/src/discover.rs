//! `Discover`: enumerate every queue the broker currently knows about (§4.3).

use broker_store::{is_reserved_suffix, meta_key_pattern, parse_key, status_key, CommandClient, ParsedKey, StatusIndex};
use broker_types::{AdapterError, AdapterResult, ConnectionDescriptor, Queue};
use tokio_util::sync::CancellationToken;

fn cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.is_some_and(|token| token.is_cancelled())
}

/// Cursor-scans for every `meta` key under `prefix`, dropping matches whose
/// queue name collides with a reserved suffix token (§9 "Event parsing
/// ambiguity": such a queue would be misparsed by every other operation, so
/// it is silently excluded rather than surfaced).
async fn scan_queue_names(
    command: &dyn CommandClient,
    prefix: &str,
    cancel: Option<&CancellationToken>,
) -> AdapterResult<Vec<String>> {
    let pattern = meta_key_pattern(prefix);
    let mut queues = Vec::new();
    let mut cursor = 0u64;
    loop {
        if cancelled(cancel) {
            return Err(AdapterError::Cancelled);
        }
        let batch = command.scan_match(cursor, &pattern).await.map_err(|e| {
            AdapterError::Transport(format!("scanning for meta keys failed: {e}"))
        })?;
        for key in batch.keys {
            if let Some(ParsedKey::Meta { queue }) = parse_key(prefix, &key) {
                if !queue.is_empty() && !is_reserved_suffix(&queue) {
                    queues.push(queue);
                }
            }
        }
        cursor = batch.next_cursor;
        if cursor == 0 {
            break;
        }
    }
    Ok(queues)
}

/// Fans the five status-count probes for one queue out concurrently.
async fn count_queue(
    command: &dyn CommandClient,
    prefix: &str,
    queue: &str,
    descriptor: &ConnectionDescriptor,
) -> AdapterResult<Queue> {
    let wait_key = status_key(prefix, queue, StatusIndex::Wait);
    let active_key = status_key(prefix, queue, StatusIndex::Active);
    let completed_key = status_key(prefix, queue, StatusIndex::Completed);
    let failed_key = status_key(prefix, queue, StatusIndex::Failed);
    let delayed_key = status_key(prefix, queue, StatusIndex::Delayed);

    let (waiting, active, completed, failed, delayed) = futures::try_join!(
        command.llen(&wait_key),
        command.llen(&active_key),
        command.zcard(&completed_key),
        command.zcard(&failed_key),
        command.zcard(&delayed_key),
    )
    .map_err(|e| AdapterError::Transport(format!("counting queue {queue:?} failed: {e}")))?;

    Ok(Queue {
        name: queue.to_string(),
        waiting,
        active,
        completed,
        failed,
        delayed,
        // The reference wire layout (§6) does not record a pause flag
        // anywhere the core can read; see DESIGN.md.
        paused: false,
        endpoint: descriptor.clone(),
    })
}

pub(crate) async fn discover(
    command: &dyn CommandClient,
    prefix: &str,
    descriptor: &ConnectionDescriptor,
    cancel: Option<&CancellationToken>,
) -> AdapterResult<Vec<Queue>> {
    let names = scan_queue_names(command, prefix, cancel).await?;
    if cancelled(cancel) {
        return Err(AdapterError::Cancelled);
    }
    let futures = names.iter().map(|queue| count_queue(command, prefix, queue, descriptor));
    futures::future::try_join_all(futures).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeCommandClient;

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: "localhost".to_string(),
            port: 6379,
            db_index: 0,
        }
    }

    #[tokio::test]
    async fn empty_broker_returns_empty_collection() {
        let command = FakeCommandClient::default();
        let queues = discover(&command, "bull", &descriptor(), None).await.unwrap();
        assert!(queues.is_empty());
    }

    #[tokio::test]
    async fn discovers_one_queue_with_expected_counts() {
        let command = FakeCommandClient::default();
        command.seed_meta_key("bull:emails:meta");
        command.seed_list("bull:emails:wait", vec!["j1".into(), "j2".into()]);
        command.seed_list("bull:emails:active", vec!["j3".into()]);
        command.seed_zset("bull:emails:completed", vec![("j4".into(), 1000.0), ("j5".into(), 2000.0)]);
        command.seed_zset("bull:emails:failed", vec![("j6".into(), 1500.0)]);
        command.seed_zset("bull:emails:delayed", vec![("j7".into(), 5_000_000_000.0)]);

        let queues = discover(&command, "bull", &descriptor(), None).await.unwrap();
        assert_eq!(queues.len(), 1);
        let queue = &queues[0];
        assert_eq!(queue.name, "emails");
        assert_eq!((queue.waiting, queue.active, queue.completed, queue.failed, queue.delayed), (2, 1, 2, 1, 1));
    }

    #[tokio::test]
    async fn queue_named_after_a_reserved_suffix_is_dropped() {
        let command = FakeCommandClient::default();
        command.seed_meta_key("bull:wait:meta");
        let queues = discover(&command, "bull", &descriptor(), None).await.unwrap();
        assert!(queues.is_empty());
    }
}
