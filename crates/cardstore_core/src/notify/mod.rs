//! Change notification for record store mutations.
//!
//! # Responsibility
//! - Define the bus contract the record store publishes to.
//! - Provide an in-process bus for embedders without their own.

pub mod bus;

pub use bus::{
    LocalNotificationBus, NotificationBus, NotificationKey, Subscription, SubscriptionSender,
};
