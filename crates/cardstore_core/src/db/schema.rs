//! Table introspection and the baseball-card table definition.
//!
//! # Responsibility
//! - Reject identifiers that cannot be spliced into SQL text verbatim.
//! - Confirm that a store's table exists before the store opens, and that
//!   its id column is an `INTEGER PRIMARY KEY` alias of the SQLite row id.
//! - Create the baseball-card table on first use.
//!
//! # Invariants
//! - The card table is created with `CREATE TABLE IF NOT EXISTS`; existing
//!   tables are never altered.

use super::{DbError, DbResult};
use crate::model::card::{
    AUTOGRAPHED, BRAND, CARD_COUNT, CARD_ID, NUMBER, PLAYER_NAME, PLAYER_POSITION, TABLE_NAME,
    TEAM, VALUE, YEAR,
};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Returns `value` when it is a plain SQL identifier.
pub fn validate_identifier(value: &str) -> DbResult<&str> {
    if IDENTIFIER_RE.is_match(value) {
        Ok(value)
    } else {
        Err(DbError::InvalidIdentifier(value.to_string()))
    }
}

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    /// 1-based position in the primary key, 0 when not part of it.
    pub primary_key: i64,
}

/// Verifies that `table` exists and that `id_column` aliases its row id.
///
/// Item addresses and insert results are row ids, so an id column that is
/// merely named right (plain `INTEGER`, `TEXT PRIMARY KEY`, part of a
/// composite key, or in a `WITHOUT ROWID` table) is rejected up front.
pub fn ensure_table_ready(conn: &Connection, table: &str, id_column: &str) -> DbResult<()> {
    validate_identifier(table)?;
    validate_identifier(id_column)?;

    if !table_exists(conn, table)? {
        return Err(DbError::MissingTable(table.to_string()));
    }
    let columns = table_columns(conn, table)?;
    if !columns
        .iter()
        .any(|column| column.name.eq_ignore_ascii_case(id_column))
    {
        return Err(DbError::MissingColumn {
            table: table.to_string(),
            column: id_column.to_string(),
        });
    }
    if !is_row_id_alias(&columns, id_column) || is_without_rowid(conn, table)? {
        return Err(DbError::IdColumnNotRowId {
            table: table.to_string(),
            column: id_column.to_string(),
        });
    }
    Ok(())
}

/// Creates the baseball-card table when it is absent.
pub fn ensure_card_table(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
            {CARD_ID} INTEGER PRIMARY KEY AUTOINCREMENT,
            {BRAND} TEXT NOT NULL,
            {YEAR} INTEGER NOT NULL,
            {NUMBER} TEXT NOT NULL,
            {VALUE} INTEGER NOT NULL DEFAULT 0,
            {CARD_COUNT} INTEGER NOT NULL DEFAULT 1,
            {PLAYER_NAME} TEXT NOT NULL,
            {TEAM} TEXT,
            {PLAYER_POSITION} TEXT,
            {AUTOGRAPHED} INTEGER NOT NULL DEFAULT 0,
            UNIQUE ({BRAND}, {YEAR}, {NUMBER})
        );"
    ))?;
    Ok(())
}

pub fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub fn table_columns(conn: &Connection, table: &str) -> DbResult<Vec<ColumnInfo>> {
    let table = validate_identifier(table)?;
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(ColumnInfo {
            name: row.get(1)?,
            declared_type: row.get(2)?,
            primary_key: row.get(5)?,
        });
    }
    Ok(columns)
}

fn is_row_id_alias(columns: &[ColumnInfo], id_column: &str) -> bool {
    let mut key_columns = columns.iter().filter(|column| column.primary_key > 0);
    match (key_columns.next(), key_columns.next()) {
        (Some(only), None) => {
            only.name.eq_ignore_ascii_case(id_column)
                && only.declared_type.trim().eq_ignore_ascii_case("INTEGER")
        }
        _ => false,
    }
}

fn is_without_rowid(conn: &Connection, table: &str) -> DbResult<bool> {
    let sql: Option<String> = conn.query_row(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1;",
        [table],
        |row| row.get(0),
    )?;
    let normalized = sql
        .unwrap_or_default()
        .to_ascii_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    Ok(normalized.contains("WITHOUT ROWID"))
}
