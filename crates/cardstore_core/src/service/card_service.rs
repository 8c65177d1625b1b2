//! Baseball card use-case service.
//!
//! # Responsibility
//! - Provide card-level CRUD and lookup entry points.
//! - Go through the record store's addresses so every change is published.
//!
//! # Invariants
//! - Write paths call `BaseballCard::validate()` before touching storage.
//! - Id-targeted updates and deletes report `NotFound` when no row matched.

use crate::db::schema::ensure_card_table;
use crate::db::{DbResult, StorageTarget};
use crate::model::card::{
    BaseballCard, CardFilter, CardId, CardValidationError, BRAND, CARD_ID, PLAYER_NAME,
    TABLE_NAME, TEAM,
};
use crate::model::predicate::Predicate;
use crate::model::value::Value;
use crate::notify::{NotificationBus, Subscription};
use crate::repo::record_store::{RecordQuery, RecordStore, StoreConfig, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type CardResult<T> = Result<T, CardError>;

#[derive(Debug)]
pub enum CardError {
    Validation(CardValidationError),
    NotFound(CardId),
    Store(StoreError),
}

impl Display for CardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "card not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NotFound(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<CardValidationError> for CardError {
    fn from(value: CardValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for CardError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Opens a record store over the card table, creating it when absent.
pub fn open_card_store(
    target: StorageTarget,
    bus: Arc<dyn NotificationBus>,
) -> DbResult<RecordStore> {
    let config = StoreConfig::new(target, TABLE_NAME).with_id_column(CARD_ID);
    RecordStore::open_with_setup(config, bus, ensure_card_table)
}

/// Card operations over a card-table record store.
pub struct CardService {
    store: RecordStore,
    collection: String,
}

impl CardService {
    pub fn new(store: RecordStore) -> Self {
        let collection = store.collection_address().to_string();
        Self { store, collection }
    }

    /// Opens the card table at `target` and wraps it in a service.
    pub fn open(target: StorageTarget, bus: Arc<dyn NotificationBus>) -> DbResult<Self> {
        open_card_store(target, bus).map(Self::new)
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn into_store(self) -> RecordStore {
        self.store
    }

    /// Persists a new card and returns it with its assigned id.
    pub fn add_card(&self, card: &BaseballCard) -> CardResult<BaseballCard> {
        card.validate()?;
        let created = self.store.insert(&self.collection, &card.to_record())?;
        let id = created
            .id()
            .ok_or_else(|| StoreError::InsertFailed(self.collection.clone()))?;
        Ok(BaseballCard {
            id: Some(id),
            ..card.clone()
        })
    }

    pub fn get_card(&self, id: CardId) -> CardResult<Option<BaseballCard>> {
        let address = self.store.item_address(id).to_string();
        let result = self.store.query(&address, &RecordQuery::all())?;
        match result.records().first() {
            Some(record) => Ok(Some(BaseballCard::from_record(record)?)),
            None => Ok(None),
        }
    }

    /// Replaces every field of card `id` with `card`'s values.
    pub fn update_card(&self, id: CardId, card: &BaseballCard) -> CardResult<()> {
        card.validate()?;
        let address = self.store.item_address(id).to_string();
        let affected = self
            .store
            .update(&address, &card.to_record(), &Predicate::none())?;
        if affected == 0 {
            return Err(CardError::NotFound(id));
        }
        Ok(())
    }

    pub fn delete_card(&self, id: CardId) -> CardResult<()> {
        let address = self.store.item_address(id).to_string();
        if self.store.delete(&address, &Predicate::none())? == 0 {
            return Err(CardError::NotFound(id));
        }
        Ok(())
    }

    /// Deletes every listed card that exists; returns how many were removed.
    pub fn delete_cards(&self, ids: &[CardId]) -> CardResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let predicate = Predicate::new(
            format!("{CARD_ID} IN ({placeholders})"),
            ids.iter().copied().map(Value::Integer),
        )
        .map_err(StoreError::from)?;
        Ok(self.store.delete(&self.collection, &predicate)?)
    }

    /// All cards ordered by player name, then id.
    pub fn list_cards(&self) -> CardResult<Vec<BaseballCard>> {
        self.load_cards(Predicate::none())
    }

    /// Cards matching every set field of `filter`.
    pub fn find_cards(&self, filter: &CardFilter) -> CardResult<Vec<BaseballCard>> {
        let predicate = match filter.to_clause() {
            Some((clause, args)) => Predicate::new(clause, args).map_err(StoreError::from)?,
            None => Predicate::none(),
        };
        self.load_cards(predicate)
    }

    pub fn brands(&self) -> CardResult<Vec<String>> {
        self.distinct_text(BRAND)
    }

    pub fn player_names(&self) -> CardResult<Vec<String>> {
        self.distinct_text(PLAYER_NAME)
    }

    pub fn teams(&self) -> CardResult<Vec<String>> {
        self.distinct_text(TEAM)
    }

    /// Subscription that fires on any change to the card table.
    pub fn watch_cards(&self) -> CardResult<Subscription> {
        Ok(self.store.watch(&self.collection)?)
    }

    fn load_cards(&self, predicate: Predicate) -> CardResult<Vec<BaseballCard>> {
        let query = RecordQuery::all()
            .filter(predicate)
            .sorted_by(format!("{PLAYER_NAME} ASC, {CARD_ID} ASC"));
        self.store.query_with(&self.collection, &query, |cursor| {
            let mut cards = Vec::new();
            while let Some(record) = cursor.next_record()? {
                cards.push(BaseballCard::from_record(&record));
            }
            Ok(cards)
        })?
        .into_iter()
        .map(|card| card.map_err(CardError::from))
        .collect()
    }

    fn distinct_text(&self, column: &str) -> CardResult<Vec<String>> {
        let query = RecordQuery::all()
            .columns([format!("DISTINCT {column}")])
            .filter(Predicate::raw(format!("{column} IS NOT NULL")).map_err(StoreError::from)?)
            .sorted_by(format!("{column} ASC"));
        let result = self.store.query(&self.collection, &query)?;
        Ok(result
            .records()
            .iter()
            .filter_map(|record| record.values().next().and_then(Value::as_text))
            .map(str::to_string)
            .collect())
    }
}
