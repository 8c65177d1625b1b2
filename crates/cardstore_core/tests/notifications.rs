use cardstore_core::{
    LocalNotificationBus, NotificationBus, NotificationKey, Predicate, Record, RecordQuery,
    RecordStore, StorageTarget, StoreConfig, Subscription,
};
use std::sync::{Arc, Mutex};
use std::thread;

fn open_players(bus: Arc<dyn NotificationBus>) -> RecordStore {
    RecordStore::open_with_setup(
        StoreConfig::new(StorageTarget::Memory, "players"),
        bus,
        |conn| {
            conn.execute_batch(
                "CREATE TABLE players (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
            )?;
            Ok(())
        },
    )
    .unwrap()
}

/// Bus that records every publication in order.
#[derive(Default)]
struct RecordingBus {
    inner: LocalNotificationBus,
    published: Mutex<Vec<String>>,
}

impl RecordingBus {
    fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

impl NotificationBus for RecordingBus {
    fn publish(&self, key: &NotificationKey) {
        self.published.lock().unwrap().push(key.to_string());
        self.inner.publish(key);
    }

    fn subscribe(&self, key: &NotificationKey) -> Subscription {
        self.inner.subscribe(key)
    }
}

#[test]
fn insert_publishes_new_item_address() {
    let bus = Arc::new(RecordingBus::default());
    let store = open_players(bus.clone());

    let created = store
        .insert("players", &Record::new().with("name", "Ruth").with("id", 3))
        .unwrap();
    assert_eq!(created.to_string(), "players/3");
    assert_eq!(bus.published(), ["players/3"]);
}

#[test]
fn failed_insert_publishes_nothing() {
    let bus = Arc::new(RecordingBus::default());
    let store = open_players(bus.clone());

    assert!(store.insert("players", &Record::new()).is_err());
    assert!(store.insert("players/1", &Record::new().with("name", "x")).is_err());
    assert!(bus.published().is_empty());
}

#[test]
fn update_of_missing_item_still_notifies_once() {
    let bus = Arc::new(RecordingBus::default());
    let store = open_players(bus.clone());

    let affected = store
        .update(
            "players/42",
            &Record::new().with("name", "Nobody"),
            &Predicate::none(),
        )
        .unwrap();
    assert_eq!(affected, 0);
    assert_eq!(bus.published(), ["players/42"]);
}

#[test]
fn delete_notifies_original_address_even_when_nothing_matched() {
    let bus = Arc::new(RecordingBus::default());
    let store = open_players(bus.clone());

    assert_eq!(store.delete("players", &Predicate::none()).unwrap(), 0);
    assert_eq!(store.delete("players/7", &Predicate::none()).unwrap(), 0);
    assert_eq!(bus.published(), ["players", "players/7"]);
}

#[test]
fn query_results_observe_later_item_changes() {
    let bus: Arc<dyn NotificationBus> = Arc::new(LocalNotificationBus::new());
    let store = open_players(bus);
    store
        .insert("players", &Record::new().with("name", "Ruth").with("id", 1))
        .unwrap();

    // Registered under the collection key even though an item was queried.
    let result = store.query("players/1", &RecordQuery::all()).unwrap();
    assert_eq!(result.changes().key().as_str(), "players");
    assert!(result.changes().try_next().is_none());

    store
        .update(
            "players/1",
            &Record::new().with("name", "Babe Ruth"),
            &Predicate::none(),
        )
        .unwrap();
    store
        .insert("players", &Record::new().with("name", "Gehrig").with("id", 2))
        .unwrap();

    let seen: Vec<String> = result
        .changes()
        .drain()
        .into_iter()
        .map(|key| key.to_string())
        .collect();
    assert_eq!(seen, ["players/1", "players/2"]);
}

#[test]
fn cursor_subscription_can_outlive_the_cursor() {
    let bus: Arc<dyn NotificationBus> = Arc::new(LocalNotificationBus::new());
    let store = open_players(bus);

    let subscription = store
        .query_with("players", &RecordQuery::all(), |cursor| {
            Ok(cursor.take_subscription())
        })
        .unwrap()
        .unwrap();

    store
        .delete("players", &Predicate::none())
        .unwrap();
    assert_eq!(subscription.try_next().unwrap().as_str(), "players");
}

#[test]
fn item_watch_ignores_sibling_items() {
    let bus: Arc<dyn NotificationBus> = Arc::new(LocalNotificationBus::new());
    let store = open_players(bus);
    let watch = store.watch("players/1").unwrap();

    store
        .insert("players", &Record::new().with("name", "Gehrig").with("id", 2))
        .unwrap();
    assert!(watch.try_next().is_none());

    store.delete("players/1", &Predicate::none()).unwrap();
    assert_eq!(watch.try_next().unwrap().as_str(), "players/1");
    assert!(store.watch("teams").is_err());
}

#[test]
fn repeated_queries_do_not_accumulate_registrations() {
    let bus = Arc::new(LocalNotificationBus::new());
    let store = open_players(bus.clone());
    store
        .insert("players", &Record::new().with("name", "Ruth"))
        .unwrap();

    for _ in 0..10_000 {
        store.query("players", &RecordQuery::all()).unwrap();
    }
    assert!(bus.subscriber_count() <= 1);

    let kept = store.query("players", &RecordQuery::all()).unwrap();
    for _ in 0..100 {
        store
            .query_with("players", &RecordQuery::all(), |_| Ok(()))
            .unwrap();
    }
    assert!(bus.subscriber_count() <= 2);

    store.delete("players/1", &Predicate::none()).unwrap();
    assert_eq!(kept.changes().drain().len(), 1);
    assert_eq!(bus.subscriber_count(), 1);
}

#[test]
fn concurrent_writers_each_publish() {
    let bus = Arc::new(RecordingBus::default());
    let store = Arc::new(open_players(bus.clone()));

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for index in 0..10 {
                    store
                        .insert(
                            "players",
                            &Record::new().with("name", format!("p{worker}-{index}")),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(bus.published().len(), 40);
    assert_eq!(
        store.query("players", &RecordQuery::all()).unwrap().len(),
        40
    );
}
