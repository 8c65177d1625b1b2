//! Card use-case services.
//!
//! # Responsibility
//! - Orchestrate record store calls into card-level APIs.
//! - Keep callers free of addresses, predicates and SQL.

pub mod card_service;
