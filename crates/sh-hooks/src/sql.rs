//! Row types shared by the SQL backends
//!
//! `store_ids` and `order_status` are stored as comma separated text,
//! `headers` as a JSON array, timestamps as epoch milliseconds.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sh_common::{
    join_list, parse_store_ids, split_list, Hook, History, HookHeader,
};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HookRow {
    pub id: i64,
    pub name: String,
    pub status: i64,
    pub hook_type: String,
    pub store_ids: String,
    pub order_status: Option<String>,
    pub priority: i64,
    pub payload_url: String,
    pub method: Option<String>,
    pub authentication: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub headers: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<String>,
    pub created_at: i64,
}

impl TryFrom<HookRow> for Hook {
    type Error = anyhow::Error;

    fn try_from(row: HookRow) -> Result<Self> {
        let headers: Vec<HookHeader> = match row.headers.as_deref() {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)?,
            _ => Vec::new(),
        };

        Ok(Hook {
            id: row.id,
            name: row.name,
            enabled: row.status == 1,
            hook_type: row.hook_type.parse()?,
            store_ids: parse_store_ids(&row.store_ids)?,
            order_status: row.order_status.as_deref().map(split_list).unwrap_or_default(),
            priority: row.priority as i32,
            payload_url: row.payload_url,
            method: row.method.as_deref().unwrap_or_default().parse()?,
            authentication: row.authentication.as_deref().unwrap_or_default().parse()?,
            username: row.username,
            password: row.password,
            headers,
            content_type: row.content_type.filter(|c| !c.is_empty()),
            body: row.body.unwrap_or_default(),
            created_at: millis_to_datetime(row.created_at)?,
        })
    }
}

/// Column values for writing a hook
pub(crate) struct HookColumns {
    pub status: i64,
    pub store_ids: String,
    pub order_status: String,
    pub headers: String,
    pub created_at: i64,
}

impl HookColumns {
    pub fn from_hook(hook: &Hook) -> Result<Self> {
        Ok(Self {
            status: if hook.enabled { 1 } else { 0 },
            store_ids: join_list(&hook.store_ids),
            order_status: join_list(&hook.order_status),
            headers: serde_json::to_string(&hook.headers)?,
            created_at: hook.created_at.timestamp_millis(),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HistoryRow {
    pub id: i64,
    pub hook_id: i64,
    pub hook_name: String,
    pub hook_type: String,
    pub store_ids: String,
    pub priority: i64,
    pub payload_url: String,
    pub body: String,
    pub response: String,
    pub status: String,
    pub message: Option<String>,
    pub created_at: i64,
}

impl TryFrom<HistoryRow> for History {
    type Error = anyhow::Error;

    fn try_from(row: HistoryRow) -> Result<Self> {
        Ok(History {
            id: row.id,
            hook_id: row.hook_id,
            hook_name: row.hook_name,
            hook_type: row.hook_type.parse()?,
            store_ids: parse_store_ids(&row.store_ids)?,
            priority: row.priority as i32,
            payload_url: row.payload_url,
            body: row.body,
            response: row.response,
            status: row.status.parse()?,
            message: row.message,
            created_at: millis_to_datetime(row.created_at)?,
        })
    }
}

pub(crate) const HOOK_COLUMNS: &str = "id, name, status, hook_type, store_ids, order_status, priority, payload_url, method, authentication, username, password, headers, content_type, body, created_at";

pub(crate) const HISTORY_COLUMNS: &str = "id, hook_id, hook_name, hook_type, store_ids, priority, payload_url, body, response, status, message, created_at";

fn millis_to_datetime(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts).ok_or_else(|| anyhow::anyhow!("Invalid timestamp"))
}
