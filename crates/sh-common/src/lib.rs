use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Hook Types
// ============================================================================

/// Entity change a hook subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookType {
    NewOrder,
    /// Order status update, filtered by `Hook::order_status`
    Order,
    NewCustomer,
    UpdateCustomer,
    DeleteCustomer,
}

impl HookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookType::NewOrder => "new_order",
            HookType::Order => "order",
            HookType::NewCustomer => "new_customer",
            HookType::UpdateCustomer => "update_customer",
            HookType::DeleteCustomer => "delete_customer",
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookType {
    type Err = StoreHooksError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "new_order" => Ok(HookType::NewOrder),
            "order" => Ok(HookType::Order),
            "new_customer" => Ok(HookType::NewCustomer),
            "update_customer" => Ok(HookType::UpdateCustomer),
            "delete_customer" => Ok(HookType::DeleteCustomer),
            other => Err(StoreHooksError::validation(format!("Unknown hook type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = StoreHooksError;

    /// Empty input maps to GET
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "" | "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(StoreHooksError::validation(format!("Unsupported HTTP method: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authentication {
    #[default]
    None,
    Basic,
}

impl Authentication {
    pub fn as_str(&self) -> &'static str {
        match self {
            Authentication::None => "none",
            Authentication::Basic => "basic",
        }
    }
}

impl FromStr for Authentication {
    type Err = StoreHooksError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "none" => Ok(Authentication::None),
            "basic" => Ok(Authentication::Basic),
            other => Err(StoreHooksError::validation(format!("Unsupported authentication: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookHeader {
    pub name: String,
    pub value: String,
}

// ============================================================================
// Hook
// ============================================================================

/// Store id that puts a hook in scope for every store
pub const ALL_STORES: u32 = 0;

/// A configured webhook subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub hook_type: HookType,
    #[serde(default = "default_store_ids")]
    pub store_ids: Vec<u32>,
    #[serde(default)]
    pub order_status: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    /// URL template
    pub payload_url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub authentication: Authentication,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub headers: Vec<HookHeader>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Body template
    #[serde(default)]
    pub body: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

fn default_store_ids() -> Vec<u32> {
    vec![ALL_STORES]
}

impl Hook {
    pub fn new(id: i64, name: impl Into<String>, hook_type: HookType, payload_url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            hook_type,
            store_ids: vec![ALL_STORES],
            order_status: Vec::new(),
            priority: 0,
            payload_url: payload_url.into(),
            method: HttpMethod::default(),
            authentication: Authentication::default(),
            username: None,
            password: None,
            headers: Vec::new(),
            content_type: None,
            body: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_stores(mut self, store_ids: Vec<u32>) -> Self {
        self.store_ids = store_ids;
        self
    }

    pub fn with_order_status(mut self, statuses: &[&str]) -> Self {
        self.order_status = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.authentication = Authentication::Basic;
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(HookHeader { name: name.into(), value: value.into() });
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// True when the hook applies to every store or lists `store_id`
    pub fn matches_store(&self, store_id: u32) -> bool {
        self.store_ids.iter().any(|id| *id == ALL_STORES || *id == store_id)
    }

    /// Order status hooks only fire for the listed statuses. Exact match.
    pub fn matches_order_status(&self, status: Option<&str>) -> bool {
        if self.hook_type != HookType::Order {
            return true;
        }
        match status {
            Some(status) => self.order_status.iter().any(|s| s.trim() == status),
            None => false,
        }
    }
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryStatus {
    Success,
    Error,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Success => "SUCCESS",
            HistoryStatus::Error => "ERROR",
        }
    }
}

impl FromStr for HistoryStatus {
    type Err = StoreHooksError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SUCCESS" => Ok(HistoryStatus::Success),
            "ERROR" => Ok(HistoryStatus::Error),
            other => Err(StoreHooksError::validation(format!("Unknown history status: {}", other))),
        }
    }
}

/// One delivery attempt of a hook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    /// Assigned by the repository on insert
    pub id: i64,
    pub hook_id: i64,
    pub hook_name: String,
    pub hook_type: HookType,
    pub store_ids: Vec<u32>,
    pub priority: i32,
    pub payload_url: String,
    pub body: String,
    /// Raw HTTP response transcript, empty when nothing was received
    pub response: String,
    pub status: HistoryStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl History {
    /// Start a history entry for `hook` with the rendered request.
    /// Status starts as error until a delivery outcome is applied.
    pub fn for_hook(hook: &Hook, payload_url: String, body: String) -> Self {
        Self {
            id: 0,
            hook_id: hook.id,
            hook_name: hook.name.clone(),
            hook_type: hook.hook_type,
            store_ids: hook.store_ids.clone(),
            priority: hook.priority,
            payload_url,
            body,
            response: String::new(),
            status: HistoryStatus::Error,
            message: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == HistoryStatus::Success
    }
}

// ============================================================================
// Comma List Storage Format
// ============================================================================

/// Join values into the comma separated column format
pub fn join_list<T: ToString>(values: &[T]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
}

/// Split a comma separated column, dropping blank entries
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn parse_store_ids(raw: &str) -> Result<Vec<u32>> {
    split_list(raw)
        .into_iter()
        .map(|s| s.parse::<u32>().map_err(|_| StoreHooksError::validation(format!("Invalid store id: {}", s))))
        .collect()
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreHooksError {
    #[error("Hook not found: {0}")]
    HookNotFound(i64),

    #[error("History not found: {0}")]
    HistoryNotFound(i64),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreHooksError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, StoreHooksError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_scope() {
        let hook = Hook::new(1, "all", HookType::NewOrder, "http://x").with_stores(vec![0]);
        assert!(hook.matches_store(3));

        let hook = hook.with_stores(vec![1, 2]);
        assert!(hook.matches_store(2));
        assert!(!hook.matches_store(3));
    }

    #[test]
    fn test_order_status_is_exact_match() {
        let hook = Hook::new(1, "status", HookType::Order, "http://x")
            .with_order_status(&["processing", " complete"]);

        assert!(hook.matches_order_status(Some("processing")));
        assert!(hook.matches_order_status(Some("complete")));
        assert!(!hook.matches_order_status(Some("process")));
        assert!(!hook.matches_order_status(None));
    }

    #[test]
    fn test_order_status_ignored_for_other_types() {
        let hook = Hook::new(1, "customer", HookType::NewCustomer, "http://x");
        assert!(hook.matches_order_status(None));
    }

    #[test]
    fn test_hook_type_parse() {
        assert_eq!("order".parse::<HookType>().unwrap(), HookType::Order);
        assert_eq!(HookType::UpdateCustomer.to_string(), "update_customer");
        assert!("refund".parse::<HookType>().is_err());
    }

    #[test]
    fn test_method_defaults_to_get() {
        assert_eq!("".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
    }

    #[test]
    fn test_list_format() {
        assert_eq!(join_list(&[0u32, 2]), "0,2");
        assert_eq!(parse_store_ids("0, 2,").unwrap(), vec![0, 2]);
        assert!(parse_store_ids("a").is_err());
        assert_eq!(split_list("pending,,processing"), vec!["pending", "processing"]);
    }

    #[test]
    fn test_hook_deserialize_defaults() {
        let hook: Hook = serde_json::from_str(
            r#"{"id": 4, "name": "Minimal", "hook_type": "new_order", "payload_url": "http://x"}"#,
        )
        .unwrap();

        assert!(hook.enabled);
        assert_eq!(hook.store_ids, vec![ALL_STORES]);
        assert_eq!(hook.method, HttpMethod::Get);
        assert_eq!(hook.authentication, Authentication::None);
        assert!(hook.body.is_empty());
    }
}
