//! Entity change observer
//!
//! Translates entity save/delete events into hook types and hands them to
//! the dispatcher. One observer lives for one batch of events (one incoming
//! request); a customer saved several times as new within that batch fires
//! `new_customer` only once.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sh_common::{History, HookType};
use tracing::debug;

use crate::dispatcher::HookDispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityAction {
    Saved,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEvent {
    pub entity: EntityKind,
    pub action: EntityAction,
    #[serde(default)]
    pub is_new: bool,
    pub item: Value,
}

impl EntityEvent {
    /// Hook type this event triggers, if any
    pub fn hook_type(&self) -> Option<HookType> {
        match (self.entity, self.action, self.is_new) {
            (EntityKind::Customer, EntityAction::Saved, true) => Some(HookType::NewCustomer),
            (EntityKind::Customer, EntityAction::Saved, false) => Some(HookType::UpdateCustomer),
            (EntityKind::Customer, EntityAction::Deleted, _) => Some(HookType::DeleteCustomer),
            (EntityKind::Order, EntityAction::Saved, true) => Some(HookType::NewOrder),
            (EntityKind::Order, EntityAction::Saved, false) => Some(HookType::Order),
            (EntityKind::Order, EntityAction::Deleted, _) => None,
        }
    }

    /// Identity of the entity, from `entity_id` or `id`
    pub fn entity_key(&self) -> String {
        ["entity_id", "id"]
            .iter()
            .find_map(|field| match self.item.get(*field) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

pub struct EntityObserver {
    dispatcher: Arc<HookDispatcher>,
    new_customers: HashSet<String>,
}

impl EntityObserver {
    pub fn new(dispatcher: Arc<HookDispatcher>) -> Self {
        Self {
            dispatcher,
            new_customers: HashSet::new(),
        }
    }

    pub async fn observe(&mut self, event: &EntityEvent) -> Result<Vec<History>> {
        let Some(hook_type) = event.hook_type() else {
            debug!(entity = ?event.entity, action = ?event.action, "No hook type for event");
            return Ok(Vec::new());
        };

        if hook_type == HookType::NewCustomer && !self.new_customers.insert(event.entity_key()) {
            debug!(entity_key = %event.entity_key(), "New customer already dispatched");
            return Ok(Vec::new());
        }

        self.dispatcher.send(&event.item, hook_type).await
    }

    /// Observe events in order, collecting every history entry
    pub async fn observe_all(&mut self, events: &[EntityEvent]) -> Result<Vec<History>> {
        let mut entries = Vec::new();
        for event in events {
            entries.extend(self.observe(event).await?);
        }
        Ok(entries)
    }
}
