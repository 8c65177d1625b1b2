//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise `cardstore_core` end to end against an in-memory store.
//! - Keep output deterministic for quick local sanity checks.

use cardstore_core::{
    core_version, BaseballCard, CardService, LocalNotificationBus, NotificationBus, StorageTarget,
};
use std::error::Error;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn Error>> {
    println!("cardstore_core version={}", core_version());

    let bus: Arc<dyn NotificationBus> = Arc::new(LocalNotificationBus::new());
    let service = CardService::open(StorageTarget::Memory, bus)?;
    let changes = service.watch_cards()?;

    let mut card = BaseballCard::new("Topps", 1952, "311", "Mickey Mantle");
    card.team = Some("Yankees".to_string());
    let created = service.add_card(&card)?;

    for card in service.list_cards()? {
        println!("{}", serde_json::to_string(&card)?);
    }
    println!(
        "created id={} changes={}",
        created.id.unwrap_or_default(),
        changes.drain().len()
    );
    Ok(())
}
