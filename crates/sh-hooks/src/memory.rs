//! In-process repositories
//!
//! Hooks are seeded from configuration; history lives only as long as the
//! process.

use async_trait::async_trait;
use anyhow::Result;
use parking_lot::{Mutex, RwLock};
use sh_common::{Hook, HookType, History};

use crate::repository::{HistoryRepository, HookRepository};

pub struct InMemoryHookRepository {
    hooks: RwLock<Vec<Hook>>,
}

impl InMemoryHookRepository {
    pub fn new(hooks: Vec<Hook>) -> Self {
        Self { hooks: RwLock::new(hooks) }
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }
}

#[async_trait]
impl HookRepository for InMemoryHookRepository {
    async fn find_active(&self, hook_type: HookType) -> Result<Vec<Hook>> {
        let mut hooks: Vec<Hook> = self.hooks.read()
            .iter()
            .filter(|h| h.enabled && h.hook_type == hook_type)
            .cloned()
            .collect();
        hooks.sort_by_key(|h| (h.priority, h.id));
        Ok(hooks)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Hook>> {
        Ok(self.hooks.read().iter().find(|h| h.id == id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryHistoryRepository {
    entries: Mutex<Vec<History>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in insertion order
    pub fn all(&self) -> Vec<History> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn insert(&self, history: &History) -> Result<i64> {
        let mut entries = self.entries.lock();
        let id = entries.len() as i64 + 1;
        let mut stored = history.clone();
        stored.id = id;
        entries.push(stored);
        Ok(id)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<History>> {
        Ok(self.entries.lock().iter().find(|h| h.id == id).cloned())
    }

    async fn find_by_hook(&self, hook_id: i64, limit: u32) -> Result<Vec<History>> {
        Ok(self.entries.lock()
            .iter()
            .rev()
            .filter(|h| h.hook_id == hook_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_recent(&self, limit: u32) -> Result<Vec<History>> {
        Ok(self.entries.lock().iter().rev().take(limit as usize).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_active_orders_by_priority() {
        let mut disabled = Hook::new(4, "off", HookType::NewOrder, "http://d").with_priority(0);
        disabled.enabled = false;

        let repo = InMemoryHookRepository::new(vec![
            Hook::new(1, "late", HookType::NewOrder, "http://a").with_priority(10),
            Hook::new(2, "early", HookType::NewOrder, "http://b").with_priority(1),
            Hook::new(3, "customer", HookType::NewCustomer, "http://c"),
            disabled,
        ]);

        let hooks = repo.find_active(HookType::NewOrder).await.unwrap();
        let ids: Vec<i64> = hooks.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_history_ids_and_recent_order() {
        let repo = InMemoryHistoryRepository::new();
        let hook = Hook::new(9, "h", HookType::NewOrder, "http://a");

        let first = repo.insert(&History::for_hook(&hook, "u1".into(), "".into())).await.unwrap();
        let second = repo.insert(&History::for_hook(&hook, "u2".into(), "".into())).await.unwrap();
        assert_eq!((first, second), (1, 2));

        let recent = repo.find_recent(1).await.unwrap();
        assert_eq!(recent[0].payload_url, "u2");

        let by_hook = repo.find_by_hook(9, 10).await.unwrap();
        assert_eq!(by_hook.len(), 2);
        assert!(repo.find_by_hook(1, 10).await.unwrap().is_empty());
    }
}
