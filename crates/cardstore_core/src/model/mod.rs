//! Value types shared by the record store and the card services.
//!
//! # Responsibility
//! - Define rows (`Record`), cells (`Value`), addresses and predicates.
//! - Define the baseball-card projection over generic rows.
//!
//! # Invariants
//! - Model types own their data; nothing here holds a connection.

pub mod address;
pub mod card;
pub mod predicate;
pub mod value;
