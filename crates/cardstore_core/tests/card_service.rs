use cardstore_core::{
    BaseballCard, CardError, CardFilter, CardService, CardValidationError, LocalNotificationBus,
    NotificationBus, RecordQuery, ResourceType, StorageTarget, StoreError,
};
use std::sync::Arc;

fn service() -> CardService {
    let bus: Arc<dyn NotificationBus> = Arc::new(LocalNotificationBus::new());
    CardService::open(StorageTarget::Memory, bus).unwrap()
}

fn card(brand: &str, year: i64, number: &str, player: &str, team: Option<&str>) -> BaseballCard {
    let mut card = BaseballCard::new(brand, year, number, player);
    card.team = team.map(str::to_string);
    card
}

fn seed(service: &CardService) -> Vec<BaseballCard> {
    [
        card("Goudey", 1933, "144", "Babe Ruth", Some("Yankees")),
        card("Goudey", 1933, "92", "Lou Gehrig", Some("Yankees")),
        card("Topps", 1952, "311", "Mickey Mantle", Some("Yankees")),
        card("Topps", 1954, "128", "Hank Aaron", None),
    ]
    .iter()
    .map(|card| service.add_card(card).unwrap())
    .collect()
}

#[test]
fn add_and_get_round_trip() {
    let service = service();
    let mut ruth = card("Goudey", 1933, "144", "Babe Ruth", Some("Yankees"));
    ruth.value = 1_250_000;
    ruth.count = 2;
    ruth.player_position = Some("Outfield".to_string());
    ruth.autographed = true;

    let created = service.add_card(&ruth).unwrap();
    let id = created.id.unwrap();
    assert!(id > 0);

    let loaded = service.get_card(id).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(BaseballCard { id: None, ..loaded }, ruth);

    assert!(service.get_card(id + 100).unwrap().is_none());
}

#[test]
fn add_card_validates_before_writing() {
    let service = service();
    let err = service
        .add_card(&card("", 1933, "144", "Babe Ruth", None))
        .unwrap_err();
    assert!(matches!(
        err,
        CardError::Validation(CardValidationError::BlankField("brand"))
    ));
    assert!(service.list_cards().unwrap().is_empty());
}

#[test]
fn duplicate_brand_year_number_is_a_storage_error() {
    let service = service();
    let ruth = card("Goudey", 1933, "144", "Babe Ruth", None);
    service.add_card(&ruth).unwrap();

    let err = service.add_card(&ruth).unwrap_err();
    assert!(matches!(err, CardError::Store(StoreError::Db(_))));
}

#[test]
fn list_cards_orders_by_player_name() {
    let service = service();
    seed(&service);

    let players: Vec<String> = service
        .list_cards()
        .unwrap()
        .into_iter()
        .map(|card| card.player_name)
        .collect();
    assert_eq!(
        players,
        ["Babe Ruth", "Hank Aaron", "Lou Gehrig", "Mickey Mantle"]
    );
}

#[test]
fn find_cards_combines_filters() {
    let service = service();
    seed(&service);

    let goudey_1933 = CardFilter {
        brand: Some("goudey".to_string()),
        year: Some(1933),
        ..CardFilter::default()
    };
    assert_eq!(service.find_cards(&goudey_1933).unwrap().len(), 2);

    let lou = CardFilter {
        player_name: Some("Lou%".to_string()),
        team: Some("Yankees".to_string()),
        ..CardFilter::default()
    };
    let found = service.find_cards(&lou).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].number, "92");

    assert_eq!(service.find_cards(&CardFilter::default()).unwrap().len(), 4);
}

#[test]
fn update_and_delete_report_missing_cards() {
    let service = service();
    let cards = seed(&service);
    let mantle = &cards[2];
    let id = mantle.id.unwrap();

    let mut graded = mantle.clone();
    graded.value = 9_000_000;
    service.update_card(id, &graded).unwrap();
    assert_eq!(service.get_card(id).unwrap().unwrap().value, 9_000_000);

    assert!(matches!(
        service.update_card(999, &graded),
        Err(CardError::NotFound(999))
    ));

    service.delete_card(id).unwrap();
    assert!(service.get_card(id).unwrap().is_none());
    assert!(matches!(
        service.delete_card(id),
        Err(CardError::NotFound(missing)) if missing == id
    ));
}

#[test]
fn delete_cards_removes_listed_ids_only() {
    let service = service();
    let cards = seed(&service);
    let ids: Vec<i64> = cards.iter().filter_map(|card| card.id).collect();

    assert_eq!(service.delete_cards(&[]).unwrap(), 0);
    assert_eq!(service.delete_cards(&[ids[0], ids[3], 12_345]).unwrap(), 2);

    let remaining: Vec<String> = service
        .list_cards()
        .unwrap()
        .into_iter()
        .map(|card| card.player_name)
        .collect();
    assert_eq!(remaining, ["Lou Gehrig", "Mickey Mantle"]);
}

#[test]
fn distinct_lookups_skip_duplicates_and_nulls() {
    let service = service();
    seed(&service);

    assert_eq!(service.brands().unwrap(), ["Goudey", "Topps"]);
    assert_eq!(service.teams().unwrap(), ["Yankees"]);
    assert_eq!(service.player_names().unwrap().len(), 4);
}

#[test]
fn watch_cards_sees_every_mutation() {
    let service = service();
    let watch = service.watch_cards().unwrap();

    let cards = seed(&service);
    service.delete_card(cards[0].id.unwrap()).unwrap();

    assert_eq!(watch.drain().len(), 5);
}

#[test]
fn card_addresses_use_card_table_routes() {
    let service = service();
    let store = service.store();

    assert_eq!(store.table(), "baseball_cards");
    assert_eq!(store.id_column(), "_id");
    assert_eq!(
        store.resource_type("baseball_cards/3").unwrap(),
        ResourceType::Item
    );
    assert_eq!(
        store
            .resource_type("baseball_cards")
            .unwrap()
            .mime_type("baseball_card"),
        "vnd.cardstore.dir/baseball_card"
    );

    seed(&service);
    let json = serde_json::to_value(
        store
            .query("baseball_cards/1", &RecordQuery::all().columns(["_id", "brand"]))
            .unwrap()
            .records(),
    )
    .unwrap();
    assert_eq!(json, serde_json::json!([{ "_id": 1, "brand": "Goudey" }]));
}
