//! In-memory fakes for `broker-store`'s client traits, used only by this
//! crate's unit and integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use broker_store::{KeyspaceMessage, ScanBatch, StoreError, SubscriberClient, ZMember};
use broker_store::CommandClient;
use tokio::sync::mpsc;

fn glob_match(pattern: &str, candidate: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == candidate;
    }
    let mut rest = candidate;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            let Some(after) = rest.strip_prefix(segment) else { return false };
            rest = after;
        } else if i == segments.len() - 1 {
            return rest.ends_with(segment);
        } else {
            let Some(pos) = rest.find(segment) else { return false };
            rest = &rest[pos + segment.len()..];
        }
    }
    true
}

#[derive(Default)]
pub(crate) struct FakeCommandClient {
    keys: Mutex<Vec<String>>,
    lists: Mutex<HashMap<String, Vec<String>>>,
    zsets: Mutex<HashMap<String, Vec<(String, f64)>>>,
    hashes: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl FakeCommandClient {
    pub(crate) fn seed_meta_key(&self, key: &str) {
        self.keys.lock().unwrap().push(key.to_string());
    }

    pub(crate) fn seed_list(&self, key: &str, members: Vec<String>) {
        self.lists.lock().unwrap().insert(key.to_string(), members);
    }

    pub(crate) fn seed_zset(&self, key: &str, members: Vec<(String, f64)>) {
        self.zsets.lock().unwrap().insert(key.to_string(), members);
    }

    pub(crate) fn seed_hash(&self, key: &str, fields: HashMap<String, String>) {
        self.hashes.lock().unwrap().insert(key.to_string(), fields);
    }
}

#[async_trait]
impl CommandClient for FakeCommandClient {
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        let lists = self.lists.lock().unwrap();
        let Some(list) = lists.get(key) else { return Ok(Vec::new()) };
        Ok(slice_inclusive(list, start, stop))
    }

    async fn llen(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.lists.lock().unwrap().get(key).map(Vec::len).unwrap_or(0) as u64)
    }

    async fn zrevrange_withscores(&self, key: &str, start: i64, stop: i64) -> Result<Vec<ZMember>, StoreError> {
        let zsets = self.zsets.lock().unwrap();
        let Some(set) = zsets.get(key) else { return Ok(Vec::new()) };
        let mut sorted = set.clone();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        Ok(slice_members(&sorted, start, stop))
    }

    async fn zrange_withscores(&self, key: &str, start: i64, stop: i64) -> Result<Vec<ZMember>, StoreError> {
        let zsets = self.zsets.lock().unwrap();
        let Some(set) = zsets.get(key) else { return Ok(Vec::new()) };
        let mut sorted = set.clone();
        sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
        Ok(slice_members(&sorted, start, stop))
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.zsets.lock().unwrap().get(key).map(Vec::len).unwrap_or(0) as u64)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        Ok(self
            .zsets
            .lock()
            .unwrap()
            .get(key)
            .and_then(|set| set.iter().find(|(m, _)| m == member).map(|(_, score)| *score)))
    }

    async fn lpos(&self, key: &str, member: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(key)
            .and_then(|list| list.iter().position(|m| m == member))
            .map(|p| p as i64))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        Ok(self.hashes.lock().unwrap().get(key).cloned().unwrap_or_default())
    }

    async fn scan_match(&self, _cursor: u64, pattern: &str) -> Result<ScanBatch, StoreError> {
        let keys = self.keys.lock().unwrap();
        let matched = keys.iter().filter(|k| glob_match(pattern, k)).cloned().collect();
        Ok(ScanBatch { next_cursor: 0, keys: matched })
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn slice_inclusive(list: &[String], start: i64, stop: i64) -> Vec<String> {
    if list.is_empty() {
        return Vec::new();
    }
    let len = list.len() as i64;
    let start = start.clamp(0, len);
    let stop = stop.clamp(-1, len - 1);
    if start > stop {
        return Vec::new();
    }
    list[start as usize..=stop as usize].to_vec()
}

fn slice_members(sorted: &[(String, f64)], start: i64, stop: i64) -> Vec<ZMember> {
    let len = sorted.len() as i64;
    if len == 0 {
        return Vec::new();
    }
    let start = start.clamp(0, len);
    let stop = stop.clamp(-1, len - 1);
    if start > stop {
        return Vec::new();
    }
    sorted[start as usize..=stop as usize]
        .iter()
        .map(|(member, score)| ZMember { member: member.clone(), score: *score })
        .collect()
}

/// Fake subscriber client backed by an mpsc channel: tests push
/// [`KeyspaceMessage`]s in and the delivery loop drains them out.
pub(crate) struct FakeSubscriberClient {
    rx: mpsc::UnboundedReceiver<KeyspaceMessage>,
}

impl FakeSubscriberClient {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<KeyspaceMessage>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl SubscriberClient for FakeSubscriberClient {
    async fn psubscribe(&mut self, _pattern: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<KeyspaceMessage>, StoreError> {
        Ok(self.rx.recv().await)
    }

    async fn unsubscribe_all(&mut self) -> Result<(), StoreError> {
        self.rx.close();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.rx.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_handles_a_single_middle_wildcard() {
        assert!(glob_match("bull:*:meta", "bull:emails:meta"));
        assert!(!glob_match("bull:*:meta", "bull:emails:wait"));
        assert!(glob_match("bull:*:meta", "bull:weird:queue:name:meta"));
    }
}
