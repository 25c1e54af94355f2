//! Hook Dispatcher
//!
//! Looks up the hooks subscribed to an entity change, renders each one
//! against the entity, delivers it and records a history entry. Hooks are
//! delivered one at a time in priority order; a failed delivery is recorded
//! and the loop moves on.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use sh_common::{Hook, HookType, History, HistoryStatus, StoreHooksError, ALL_STORES};
use sh_config::GeneralConfig;
use tracing::{debug, info, warn};

use crate::http_dispatcher::{DeliveryRequest, DeliveryResult, HookTransport};
use crate::repository::{HistoryRepository, HookRepository};
use crate::template::TemplateRenderer;

#[derive(Debug, Clone)]
pub struct HookDispatcherConfig {
    /// Global switch for all hooks
    pub enabled: bool,
    /// Store id used when the entity has none
    pub default_store_id: u32,
}

impl Default for HookDispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_store_id: 1,
        }
    }
}

impl From<&GeneralConfig> for HookDispatcherConfig {
    fn from(config: &GeneralConfig) -> Self {
        Self {
            enabled: config.enabled,
            default_store_id: config.default_store_id,
        }
    }
}

/// Rendered request for a hook, without sending it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookPreview {
    pub hook_id: i64,
    pub payload_url: String,
    pub body: String,
    pub request: DeliveryRequest,
}

pub struct HookDispatcher {
    config: HookDispatcherConfig,
    hooks: Arc<dyn HookRepository>,
    history: Arc<dyn HistoryRepository>,
    transport: Arc<dyn HookTransport>,
    renderer: TemplateRenderer,
}

impl HookDispatcher {
    pub fn new(
        config: HookDispatcherConfig,
        hooks: Arc<dyn HookRepository>,
        history: Arc<dyn HistoryRepository>,
        transport: Arc<dyn HookTransport>,
    ) -> Self {
        Self {
            config,
            hooks,
            history,
            transport,
            renderer: TemplateRenderer::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Store the entity belongs to: its `store_id` field (number or numeric
    /// string), otherwise the configured default store. Store 0 (admin)
    /// counts as unset.
    pub fn item_store(&self, item: &Value) -> u32 {
        let store_id = match item.get("store_id") {
            Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        store_id
            .filter(|id| *id != ALL_STORES)
            .unwrap_or(self.config.default_store_id)
    }

    /// Fire every matching hook of `hook_type` for `item`
    pub async fn send(&self, item: &Value, hook_type: HookType) -> Result<Vec<History>> {
        if !self.config.enabled {
            debug!(hook_type = %hook_type, "Hooks disabled, skipping");
            return Ok(Vec::new());
        }

        let store_id = self.item_store(item);
        let status = item.get("status").and_then(Value::as_str);

        let candidates = self.hooks.find_active(hook_type).await?;
        let matching: Vec<Hook> = candidates
            .into_iter()
            .filter(|h| h.matches_store(store_id))
            .filter(|h| h.matches_order_status(status))
            .collect();

        debug!(
            hook_type = %hook_type,
            store_id,
            matching = matching.len(),
            "Dispatching hooks"
        );

        let mut entries = Vec::with_capacity(matching.len());
        for hook in &matching {
            entries.push(self.send_hook(hook, item).await?);
        }
        Ok(entries)
    }

    /// Render, deliver and record a single hook
    pub async fn send_hook(&self, hook: &Hook, item: &Value) -> Result<History> {
        let payload_url = self.renderer.render(item, &hook.payload_url);
        let body = self.renderer.render(item, &hook.body);
        let request = DeliveryRequest::from_hook(hook, payload_url.clone(), body.clone());

        let history = History::for_hook(hook, payload_url, body);
        self.deliver_and_record(history, &request).await
    }

    /// Replay a history entry with its stored URL and body and the hook's
    /// current transport settings. The replay is recorded as a new entry.
    pub async fn resend(&self, history_id: i64) -> Result<History> {
        let previous = self.history.find_by_id(history_id).await?
            .ok_or(StoreHooksError::HistoryNotFound(history_id))?;
        let hook = self.hooks.find_by_id(previous.hook_id).await?
            .ok_or(StoreHooksError::HookNotFound(previous.hook_id))?;

        info!(history_id, hook_id = hook.id, "Resending hook");

        let request = DeliveryRequest::from_hook(&hook, previous.payload_url.clone(), previous.body.clone());
        let history = History::for_hook(&hook, previous.payload_url, previous.body);
        self.deliver_and_record(history, &request).await
    }

    /// Render a hook against `item` without sending it
    pub async fn preview(&self, hook_id: i64, item: &Value) -> Result<HookPreview> {
        let hook = self.hooks.find_by_id(hook_id).await?
            .ok_or(StoreHooksError::HookNotFound(hook_id))?;

        let payload_url = self.renderer.try_render(item, &hook.payload_url)?;
        let body = self.renderer.try_render(item, &hook.body)?;
        let request = DeliveryRequest::from_hook(&hook, payload_url.clone(), body.clone());

        Ok(HookPreview { hook_id, payload_url, body, request })
    }

    async fn deliver_and_record(&self, mut history: History, request: &DeliveryRequest) -> Result<History> {
        let result = self.transport.deliver(request).await;
        apply_result(&mut history, result);

        let status_label = if history.is_success() { "success" } else { "error" };
        metrics::counter!("storehooks_deliveries_total", "status" => status_label).increment(1);

        if history.is_success() {
            info!(hook_id = history.hook_id, url = %history.payload_url, "Hook delivered");
        } else {
            warn!(
                hook_id = history.hook_id,
                url = %history.payload_url,
                reason = history.message.as_deref().unwrap_or_default(),
                "Hook delivery failed"
            );
        }

        history.id = self.history.insert(&history).await?;
        Ok(history)
    }
}

fn apply_result(history: &mut History, result: DeliveryResult) {
    history.response = result.response;
    if result.success {
        history.status = HistoryStatus::Success;
        history.message = None;
    } else {
        history.status = HistoryStatus::Error;
        history.message = result.message;
    }
}
