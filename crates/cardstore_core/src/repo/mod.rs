//! Record access layer.
//!
//! # Responsibility
//! - Own the connection handles for one table.
//! - Translate address + predicate requests into parameterized SQL.
//!
//! # Invariants
//! - Mutations publish change notifications; reads register for them.
//! - Errors are returned, never swallowed or turned into panics.

mod handles;
pub mod record_store;
