use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process read-side cache for announcement views.
///
/// List views are keyed by their query signature; detail views by
/// announcement id. Structural transitions clear everything (membership
/// and ordering may have changed); leaf engagement mutations only drop
/// the touched entry. Readers racing an invalidation may observe stale
/// data; that is accepted eventual consistency.
pub struct ReadCache {
    lists: RwLock<HashMap<String, Value>>,
    entries: RwLock<HashMap<Uuid, Value>>,
}

impl ReadCache {
    pub fn new() -> Self {
        Self {
            lists: RwLock::new(HashMap::new()),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_list(&self, key: &str) -> Option<Value> {
        self.lists.read().await.get(key).cloned()
    }

    pub async fn put_list(&self, key: String, value: Value) {
        self.lists.write().await.insert(key, value);
    }

    pub async fn get_entry(&self, id: Uuid) -> Option<Value> {
        self.entries.read().await.get(&id).cloned()
    }

    pub async fn put_entry(&self, id: Uuid, value: Value) {
        self.entries.write().await.insert(id, value);
    }

    /// Broad invalidation: structural change.
    pub async fn invalidate_all(&self) {
        self.lists.write().await.clear();
        self.entries.write().await.clear();
    }

    /// Narrow invalidation: leaf engagement mutation on one announcement.
    pub async fn invalidate_entry(&self, id: Uuid) {
        self.entries.write().await.remove(&id);
    }
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn narrow_invalidation_keeps_lists() {
        let cache = ReadCache::new();
        let id = Uuid::new_v4();
        cache.put_list("sort=newest".to_string(), json!([1, 2])).await;
        cache.put_entry(id, json!({"id": id})).await;

        cache.invalidate_entry(id).await;
        assert!(cache.get_entry(id).await.is_none());
        assert!(cache.get_list("sort=newest").await.is_some());

        cache.invalidate_all().await;
        assert!(cache.get_list("sort=newest").await.is_none());
    }
}
