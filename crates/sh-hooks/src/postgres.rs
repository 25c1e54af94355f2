use async_trait::async_trait;
use anyhow::Result;
use sh_common::{join_list, Hook, HookType, History};
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::repository::{HistoryRepository, HookRepository};
use crate::sql::{HistoryRow, HookColumns, HookRow, HISTORY_COLUMNS, HOOK_COLUMNS};

pub struct PostgresHookRepository {
    pool: PgPool,
}

impl PostgresHookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        // Postgres rejects several statements in one prepared query
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hooks (
                id BIGINT PRIMARY KEY,
                name TEXT NOT NULL,
                status BIGINT NOT NULL DEFAULT 1,
                hook_type TEXT NOT NULL,
                store_ids TEXT NOT NULL DEFAULT '0',
                order_status TEXT,
                priority BIGINT NOT NULL DEFAULT 0,
                payload_url TEXT NOT NULL,
                method TEXT,
                authentication TEXT,
                username TEXT,
                password TEXT,
                headers TEXT,
                content_type TEXT,
                body TEXT,
                created_at BIGINT NOT NULL
            )
            "#
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_hooks_type_status ON hooks(hook_type, status)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn upsert(&self, hook: &Hook) -> Result<()> {
        let cols = HookColumns::from_hook(hook)?;
        sqlx::query(
            r#"
            INSERT INTO hooks (id, name, status, hook_type, store_ids, order_status, priority, payload_url,
                               method, authentication, username, password, headers, content_type, body, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, status = EXCLUDED.status, hook_type = EXCLUDED.hook_type,
                store_ids = EXCLUDED.store_ids, order_status = EXCLUDED.order_status,
                priority = EXCLUDED.priority, payload_url = EXCLUDED.payload_url,
                method = EXCLUDED.method, authentication = EXCLUDED.authentication,
                username = EXCLUDED.username, password = EXCLUDED.password,
                headers = EXCLUDED.headers, content_type = EXCLUDED.content_type, body = EXCLUDED.body
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

        debug!(hook_id = hook.id, "Upserted hook (PostgreSQL)");
        Ok(())
    }
}

#[async_trait]
impl HookRepository for PostgresHookRepository {
    async fn find_active(&self, hook_type: HookType) -> Result<Vec<Hook>> {
        let query = format!(
            "SELECT {} FROM hooks WHERE hook_type = $1 AND status = 1 ORDER BY priority ASC, id ASC",
            HOOK_COLUMNS
        );
        let rows: Vec<HookRow> = sqlx::query_as(&query)
            .bind(hook_type.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Hook::try_from).collect()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Hook>> {
        let query = format!("SELECT {} FROM hooks WHERE id = $1", HOOK_COLUMNS);
        let row: Option<HookRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Hook::try_from).transpose()
    }
}

pub struct PostgresHistoryRepository {
    pool: PgPool,
}

impl PostgresHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hook_history (
                id BIGSERIAL PRIMARY KEY,
                hook_id BIGINT NOT NULL,
                hook_name TEXT NOT NULL,
                hook_type TEXT NOT NULL,
                store_ids TEXT NOT NULL,
                priority BIGINT NOT NULL,
                payload_url TEXT NOT NULL,
                body TEXT NOT NULL,
                response TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT,
                created_at BIGINT NOT NULL
            )
            "#
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_hook_history_hook ON hook_history(hook_id)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for PostgresHistoryRepository {
    async fn insert(&self, history: &History) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO hook_history (hook_id, hook_name, hook_type, store_ids, priority, payload_url,
                                      body, response, status, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
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
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<History>> {
        let query = format!("SELECT {} FROM hook_history WHERE id = $1", HISTORY_COLUMNS);
        let row: Option<HistoryRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(History::try_from).transpose()
    }

    async fn find_by_hook(&self, hook_id: i64, limit: u32) -> Result<Vec<History>> {
        let query = format!(
            "SELECT {} FROM hook_history WHERE hook_id = $1 ORDER BY id DESC LIMIT $2",
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
            "SELECT {} FROM hook_history ORDER BY id DESC LIMIT $1",
            HISTORY_COLUMNS
        );
        let rows: Vec<HistoryRow> = sqlx::query_as(&query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(History::try_from).collect()
    }
}
