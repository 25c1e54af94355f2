use async_trait::async_trait;
use anyhow::Result;
use sh_common::{join_list, Hook, HookType, History};
use sqlx::SqlitePool;
use tracing::debug;

use crate::repository::{HistoryRepository, HookRepository};
use crate::sql::{HistoryRow, HookColumns, HookRow, HISTORY_COLUMNS, HOOK_COLUMNS};

pub struct SqliteHookRepository {
    pool: SqlitePool,
}

impl SqliteHookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hooks (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 1,
                hook_type TEXT NOT NULL,
                store_ids TEXT NOT NULL DEFAULT '0',
                order_status TEXT,
                priority INTEGER NOT NULL DEFAULT 0,
                payload_url TEXT NOT NULL,
                method TEXT,
                authentication TEXT,
                username TEXT,
                password TEXT,
                headers TEXT,
                content_type TEXT,
                body TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_hooks_type_status ON hooks(hook_type, status);
            "#
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace a hook by id
    pub async fn upsert(&self, hook: &Hook) -> Result<()> {
        let cols = HookColumns::from_hook(hook)?;
        sqlx::query(
            r#"
            INSERT INTO hooks (id, name, status, hook_type, store_ids, order_status, priority, payload_url,
                               method, authentication, username, password, headers, content_type, body, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, status = excluded.status, hook_type = excluded.hook_type,
                store_ids = excluded.store_ids, order_status = excluded.order_status,
                priority = excluded.priority, payload_url = excluded.payload_url,
                method = excluded.method, authentication = excluded.authentication,
                username = excluded.username, password = excluded.password,
                headers = excluded.headers, content_type = excluded.content_type, body = excluded.body
            "#
        )
        .bind(hook.id)
        .bind(&hook.name)
        .bind(cols.status)
        .bind(hook.hook_type.as_str())
        .bind(&cols.store_ids)
        .bind(&cols.order_status)
        .bind(hook.priority as i64)
        .bind(&hook.payload_url)
        .bind(hook.method.as_str())
        .bind(hook.authentication.as_str())
        .bind(&hook.username)
        .bind(&hook.password)
        .bind(&cols.headers)
        .bind(&hook.content_type)
        .bind(&hook.body)
        .bind(cols.created_at)
        .execute(&self.pool)
        .await?;

        debug!(hook_id = hook.id, "Upserted hook (SQLite)");
        Ok(())
    }
}

#[async_trait]
impl HookRepository for SqliteHookRepository {
    async fn find_active(&self, hook_type: HookType) -> Result<Vec<Hook>> {
        let query = format!(
            "SELECT {} FROM hooks WHERE hook_type = ? AND status = 1 ORDER BY priority ASC, id ASC",
            HOOK_COLUMNS
        );
        let rows: Vec<HookRow> = sqlx::query_as(&query)
            .bind(hook_type.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Hook::try_from).collect()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Hook>> {
        let query = format!("SELECT {} FROM hooks WHERE id = ?", HOOK_COLUMNS);
        let row: Option<HookRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Hook::try_from).transpose()
    }
}

pub struct SqliteHistoryRepository {
    pool: SqlitePool,
}

impl SqliteHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hook_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hook_id INTEGER NOT NULL,
                hook_name TEXT NOT NULL,
                hook_type TEXT NOT NULL,
                store_ids TEXT NOT NULL,
                priority INTEGER NOT NULL,
                payload_url TEXT NOT NULL,
                body TEXT NOT NULL,
                response TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_hook_history_hook ON hook_history(hook_id);
            "#
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for SqliteHistoryRepository {
    async fn insert(&self, history: &History) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO hook_history (hook_id, hook_name, hook_type, store_ids, priority, payload_url,
                                      body, response, status, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(history.hook_id)
        .bind(&history.hook_name)
        .bind(history.hook_type.as_str())
        .bind(join_list(&history.store_ids))
        .bind(history.priority as i64)
        .bind(&history.payload_url)
        .bind(&history.body)
        .bind(&history.response)
        .bind(history.status.as_str())
        .bind(&history.message)
        .bind(history.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<History>> {
        let query = format!("SELECT {} FROM hook_history WHERE id = ?", HISTORY_COLUMNS);
        let row: Option<HistoryRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(History::try_from).transpose()
    }

    async fn find_by_hook(&self, hook_id: i64, limit: u32) -> Result<Vec<History>> {
        let query = format!(
            "SELECT {} FROM hook_history WHERE hook_id = ? ORDER BY id DESC LIMIT ?",
            HISTORY_COLUMNS
        );
        let rows: Vec<HistoryRow> = sqlx::query_as(&query)
            .bind(hook_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(History::try_from).collect()
    }

    async fn find_recent(&self, limit: u32) -> Result<Vec<History>> {
        let query = format!(
            "SELECT {} FROM hook_history ORDER BY id DESC LIMIT ?",
            HISTORY_COLUMNS
        );
        let rows: Vec<HistoryRow> = sqlx::query_as(&query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(History::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sh_common::{HistoryStatus, HttpMethod};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_hook_round_trip_and_ordering() {
        let repo = SqliteHookRepository::new(memory_pool().await);
        repo.init_schema().await.unwrap();

        let status_hook = Hook::new(1, "ERP", HookType::Order, "https://erp.example.com/{{ item.increment_id }}")
            .with_method(HttpMethod::Post)
            .with_priority(5)
            .with_stores(vec![1, 2])
            .with_order_status(&["processing", "complete"])
            .with_basic_auth("erp", "secret")
            .with_header("X-Token", "abc")
            .with_content_type("application/json")
            .with_body("{}");
        let first = Hook::new(2, "First", HookType::Order, "https://a.example.com").with_priority(1);
        let mut disabled = Hook::new(3, "Off", HookType::Order, "https://b.example.com");
        disabled.enabled = false;

        for hook in [&status_hook, &first, &disabled] {
            repo.upsert(hook).await.unwrap();
        }

        let hooks = repo.find_active(HookType::Order).await.unwrap();
        let ids: Vec<i64> = hooks.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![2, 1]);

        let loaded = repo.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(loaded.store_ids, vec![1, 2]);
        assert_eq!(loaded.order_status, vec!["processing", "complete"]);
        assert_eq!(loaded.headers[0].value, "abc");
        assert_eq!(loaded.username.as_deref(), Some("erp"));
        assert_eq!(loaded.method, HttpMethod::Post);
        assert!(repo.find_by_id(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let repo = SqliteHookRepository::new(memory_pool().await);
        repo.init_schema().await.unwrap();

        repo.upsert(&Hook::new(1, "Old", HookType::NewOrder, "https://old")).await.unwrap();
        repo.upsert(&Hook::new(1, "New", HookType::NewOrder, "https://new")).await.unwrap();

        let hook = repo.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(hook.name, "New");
        assert_eq!(hook.payload_url, "https://new");
    }

    #[tokio::test]
    async fn test_history_insert_and_query() {
        let repo = SqliteHistoryRepository::new(memory_pool().await);
        repo.init_schema().await.unwrap();

        let hook = Hook::new(4, "CRM", HookType::NewCustomer, "https://crm");
        let mut ok = History::for_hook(&hook, "https://crm/1".into(), "{}".into());
        ok.status = HistoryStatus::Success;
        ok.response = "HTTP/1.1 200 OK\r\n\r\n".into();
        let mut failed = History::for_hook(&hook, "https://crm/2".into(), "{}".into());
        failed.message = Some("boom".into());

        let first = repo.insert(&ok).await.unwrap();
        let second = repo.insert(&failed).await.unwrap();
        assert!(second > first);

        let loaded = repo.find_by_id(first).await.unwrap().unwrap();
        assert!(loaded.is_success());
        assert_eq!(loaded.hook_type, HookType::NewCustomer);

        let recent = repo.find_recent(10).await.unwrap();
        assert_eq!(recent[0].id, second);
        assert_eq!(recent[0].message.as_deref(), Some("boom"));

        assert_eq!(repo.find_by_hook(4, 1).await.unwrap().len(), 1);
    }
}
