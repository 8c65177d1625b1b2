//! Record access layer over SQLite for the baseball card collection.
//!
//! A [`RecordStore`] serves one table through `<table>` and `<table>/<id>`
//! addresses, composes item-scoped predicates and publishes change
//! notifications; [`CardService`] builds the card use cases on top of it.

pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;

pub use db::{DbError, DbResult, StorageTarget};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::address::{AddressRouter, ResourceAddress, ResourceTarget, ResourceType};
pub use model::card::{BaseballCard, CardFilter, CardId, CardValidationError};
pub use model::predicate::{Predicate, PredicateError};
pub use model::value::{Record, Value};
pub use notify::{
    LocalNotificationBus, NotificationBus, NotificationKey, Subscription, SubscriptionSender,
};
pub use repo::record_store::{
    RecordCursor, RecordQuery, RecordSet, RecordStore, StoreConfig, StoreError, StoreResult,
};
pub use service::card_service::{open_card_store, CardError, CardResult, CardService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
