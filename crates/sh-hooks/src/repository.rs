use async_trait::async_trait;
use sh_common::{Hook, HookType, History};
use anyhow::Result;

#[async_trait]
pub trait HookRepository: Send + Sync {
    /// Enabled hooks of `hook_type`, ordered by priority then id
    async fn find_active(&self, hook_type: HookType) -> Result<Vec<Hook>>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Hook>>;
}

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Persist a history entry and return its id
    async fn insert(&self, history: &History) -> Result<i64>;
    async fn find_by_id(&self, id: i64) -> Result<Option<History>>;
    async fn find_by_hook(&self, hook_id: i64, limit: u32) -> Result<Vec<History>>;
    /// Newest first
    async fn find_recent(&self, limit: u32) -> Result<Vec<History>>;
}
