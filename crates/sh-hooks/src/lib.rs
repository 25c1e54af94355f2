//! StoreHooks core
//!
//! Hook lookup, template rendering, HTTP delivery and history recording.
//! Storage backends: in-memory (always), SQLite and PostgreSQL behind the
//! `sqlite` / `postgres` features.

pub mod repository;
pub mod memory;
pub mod template;
pub mod response;
pub mod http_dispatcher;
pub mod dispatcher;
pub mod observer;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
mod sql;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export key types
pub use repository::{HookRepository, HistoryRepository};
pub use memory::{InMemoryHookRepository, InMemoryHistoryRepository};
pub use template::TemplateRenderer;
pub use response::RawResponse;
pub use http_dispatcher::{
    basic_auth_header, DeliveryRequest, DeliveryResult, HookTransport,
    HttpDispatcher, HttpDispatcherConfig, CONNECT_ERROR_MESSAGE,
};
pub use dispatcher::{HookDispatcher, HookDispatcherConfig, HookPreview};
pub use observer::{EntityAction, EntityEvent, EntityKind, EntityObserver};
