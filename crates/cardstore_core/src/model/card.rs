//! Baseball card domain model and table contract.
//!
//! # Responsibility
//! - Name the table and columns shared by the store, schema and services.
//! - Convert between `BaseballCard` and generic `Record` rows.
//!
//! # Invariants
//! - `brand`, `number` and `player_name` are non-blank.
//! - `year >= 1800`, `count >= 1`, `value >= 0` (value is in cents).

use crate::model::value::{Record, Value};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const TABLE_NAME: &str = "baseball_cards";
/// MIME record kind reported for card addresses.
pub const RECORD_KIND: &str = "baseball_card";

pub const CARD_ID: &str = "_id";
pub const BRAND: &str = "brand";
pub const YEAR: &str = "year";
pub const NUMBER: &str = "number";
pub const VALUE: &str = "value";
pub const CARD_COUNT: &str = "card_count";
pub const PLAYER_NAME: &str = "player_name";
pub const TEAM: &str = "team";
pub const PLAYER_POSITION: &str = "player_position";
pub const AUTOGRAPHED: &str = "autographed";

const MIN_YEAR: i64 = 1800;

/// Row id of a persisted card.
pub type CardId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseballCard {
    /// `None` until the card has been persisted.
    pub id: Option<CardId>,
    pub brand: String,
    pub year: i64,
    pub number: String,
    /// Estimated value in cents.
    pub value: i64,
    pub count: i64,
    pub player_name: String,
    pub team: Option<String>,
    pub player_position: Option<String>,
    pub autographed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardValidationError {
    BlankField(&'static str),
    YearOutOfRange(i64),
    NonPositiveCount(i64),
    NegativeValue(i64),
    /// A stored row could not be decoded into a card.
    MalformedRow(String),
}

impl Display for CardValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "card field `{field}` must not be blank"),
            Self::YearOutOfRange(year) => {
                write!(f, "card year {year} is before {MIN_YEAR}")
            }
            Self::NonPositiveCount(count) => write!(f, "card count must be >= 1, got {count}"),
            Self::NegativeValue(value) => write!(f, "card value must be >= 0, got {value}"),
            Self::MalformedRow(message) => write!(f, "malformed card row: {message}"),
        }
    }
}

impl Error for CardValidationError {}

impl BaseballCard {
    pub fn new(
        brand: impl Into<String>,
        year: i64,
        number: impl Into<String>,
        player_name: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            brand: brand.into(),
            year,
            number: number.into(),
            value: 0,
            count: 1,
            player_name: player_name.into(),
            team: None,
            player_position: None,
            autographed: false,
        }
    }

    pub fn validate(&self) -> Result<(), CardValidationError> {
        for (field, value) in [
            (BRAND, &self.brand),
            (NUMBER, &self.number),
            (PLAYER_NAME, &self.player_name),
        ] {
            if value.trim().is_empty() {
                return Err(CardValidationError::BlankField(field));
            }
        }
        if self.year < MIN_YEAR {
            return Err(CardValidationError::YearOutOfRange(self.year));
        }
        if self.count < 1 {
            return Err(CardValidationError::NonPositiveCount(self.count));
        }
        if self.value < 0 {
            return Err(CardValidationError::NegativeValue(self.value));
        }
        Ok(())
    }

    /// Column values for insert/update. The id column is never included.
    pub fn to_record(&self) -> Record {
        Record::new()
            .with(BRAND, self.brand.as_str())
            .with(YEAR, self.year)
            .with(NUMBER, self.number.as_str())
            .with(VALUE, self.value)
            .with(CARD_COUNT, self.count)
            .with(PLAYER_NAME, self.player_name.as_str())
            .with(TEAM, self.team.clone())
            .with(PLAYER_POSITION, self.player_position.clone())
            .with(AUTOGRAPHED, self.autographed)
    }

    /// Decodes a full-projection row.
    pub fn from_record(record: &Record) -> Result<Self, CardValidationError> {
        Ok(Self {
            id: Some(required_integer(record, CARD_ID)?),
            brand: required_text(record, BRAND)?,
            year: required_integer(record, YEAR)?,
            number: required_text(record, NUMBER)?,
            value: required_integer(record, VALUE)?,
            count: required_integer(record, CARD_COUNT)?,
            player_name: required_text(record, PLAYER_NAME)?,
            team: optional_text(record, TEAM)?,
            player_position: optional_text(record, PLAYER_POSITION)?,
            autographed: required_integer(record, AUTOGRAPHED)? != 0,
        })
    }
}

/// Field filters for card searches; unset fields do not constrain results.
///
/// Text fields are matched with SQL `LIKE`, so `%` and `_` act as wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFilter {
    pub brand: Option<String>,
    pub year: Option<i64>,
    pub number: Option<String>,
    pub player_name: Option<String>,
    pub team: Option<String>,
}

impl CardFilter {
    /// Returns the `AND`-joined clause and its arguments, if any field is set.
    pub fn to_clause(&self) -> Option<(String, Vec<Value>)> {
        let mut parts = Vec::new();
        let mut args = Vec::new();

        for (column, pattern) in [
            (BRAND, &self.brand),
            (NUMBER, &self.number),
            (PLAYER_NAME, &self.player_name),
            (TEAM, &self.team),
        ] {
            if let Some(pattern) = pattern {
                parts.push(format!("{column} LIKE ?"));
                args.push(Value::from(pattern.as_str()));
            }
        }
        if let Some(year) = self.year {
            parts.push(format!("{YEAR} = ?"));
            args.push(Value::Integer(year));
        }

        if parts.is_empty() {
            None
        } else {
            Some((parts.join(" AND "), args))
        }
    }
}

fn required_integer(record: &Record, column: &'static str) -> Result<i64, CardValidationError> {
    record
        .get(column)
        .and_then(Value::as_integer)
        .ok_or_else(|| CardValidationError::MalformedRow(format!("`{column}` is not an integer")))
}

fn required_text(record: &Record, column: &'static str) -> Result<String, CardValidationError> {
    record
        .get(column)
        .and_then(Value::as_text)
        .map(str::to_string)
        .ok_or_else(|| CardValidationError::MalformedRow(format!("`{column}` is not text")))
}

fn optional_text(
    record: &Record,
    column: &'static str,
) -> Result<Option<String>, CardValidationError> {
    match record.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Text(text)) => Ok(Some(text.clone())),
        Some(_) => Err(CardValidationError::MalformedRow(format!(
            "`{column}` is not text"
        ))),
    }
}
