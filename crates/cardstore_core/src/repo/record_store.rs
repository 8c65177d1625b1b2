//! Single-table record store addressed by resource paths.
//!
//! # Responsibility
//! - Resolve `<table>` / `<table>/<id>` addresses through an owned router.
//! - Compose the effective predicate and run parameterized SQL.
//! - Publish change notifications after every successful mutation.
//!
//! # Invariants
//! - Callers never reach a connection directly; all SQL goes through here.
//! - Item-scoped operations always bind the id as the first argument.
//! - Reads use a pooled read-only handle, writes the read-write handle.
//! - Update and delete publish even when no row changed; insert publishes
//!   the new item address only on success.

use crate::db::schema::{ensure_table_ready, validate_identifier};
use crate::db::{DbError, DbResult, StorageTarget};
use crate::model::address::{AddressRouter, ResourceAddress, ResourceTarget, ResourceType};
use crate::model::predicate::{Predicate, PredicateError};
use crate::model::value::{Record, Value};
use crate::notify::{NotificationBus, NotificationKey, Subscription};
use crate::repo::handles::ConnectionHandles;
use log::{debug, info, warn};
use rusqlite::{params_from_iter, Connection, Rows};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced by record store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Address is malformed, or its shape is not accepted by the operation.
    InvalidAddress(String),
    InvalidPredicate(PredicateError),
    InvalidRecord(String),
    /// The engine accepted an insert but produced no row.
    InsertFailed(String),
    Db(DbError),
}

impl StoreError {
    /// Whether the failure is a caller bug rather than a storage condition.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_) | Self::InvalidPredicate(_) | Self::InvalidRecord(_)
        )
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAddress(address) => write!(f, "invalid resource address: {address}"),
            Self::InvalidPredicate(err) => write!(f, "invalid predicate: {err}"),
            Self::InvalidRecord(message) => write!(f, "invalid record: {message}"),
            Self::InsertFailed(address) => write!(f, "failed to insert row into {address}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPredicate(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PredicateError> for StoreError {
    fn from(value: PredicateError) -> Self {
        Self::InvalidPredicate(value)
    }
}

/// Location and table served by one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub target: StorageTarget,
    pub table: String,
    pub id_column: String,
}

impl StoreConfig {
    /// Config with the default `id` row-id column.
    pub fn new(target: StorageTarget, table: impl Into<String>) -> Self {
        Self {
            target,
            table: table.into(),
            id_column: "id".to_string(),
        }
    }

    pub fn with_id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = id_column.into();
        self
    }
}

/// Projection, filter and ordering for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    /// Raw column expressions; all columns when `None` or empty.
    pub columns: Option<Vec<String>>,
    pub predicate: Predicate,
    /// Raw `ORDER BY` expression.
    pub sort_order: Option<String>,
}

impl RecordQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn sorted_by(mut self, sort_order: impl Into<String>) -> Self {
        self.sort_order = Some(sort_order.into());
        self
    }

    fn projection_sql(&self) -> String {
        match self.columns.as_deref() {
            Some(columns) if !columns.is_empty() => columns.join(", "),
            _ => "*".to_string(),
        }
    }

    fn order_sql(&self) -> String {
        match self.sort_order.as_deref().map(str::trim) {
            Some(order) if !order.is_empty() => format!(" ORDER BY {order}"),
            _ => String::new(),
        }
    }
}

/// Forward-only view over the rows of one query.
///
/// Only reachable inside [`RecordStore::query_with`]; the result set is
/// released when that call returns.
pub struct RecordCursor<'stmt> {
    rows: Rows<'stmt>,
    columns: Vec<String>,
    subscription: Option<Subscription>,
    exhausted: bool,
}

impl RecordCursor<'_> {
    /// Column names in result order.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Next row, or `None` once the result set is exhausted.
    pub fn next_record(&mut self) -> StoreResult<Option<Record>> {
        if self.exhausted {
            return Ok(None);
        }
        let Some(row) = self.rows.next()? else {
            self.exhausted = true;
            return Ok(None);
        };

        let mut record = Record::new();
        for (index, column) in self.columns.iter().enumerate() {
            let value = Value::from_sql_ref(row.get_ref(index)?).ok_or_else(|| {
                StoreError::InvalidRecord(format!("column `{column}` holds a non-scalar value"))
            })?;
            record.set(column.as_str(), value);
        }
        Ok(Some(record))
    }

    /// Takes the change subscription registered for this query.
    pub fn take_subscription(&mut self) -> Option<Subscription> {
        self.subscription.take()
    }
}

impl Iterator for RecordCursor<'_> {
    type Item = StoreResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(record) => record.map(Ok),
            Err(err) => {
                self.exhausted = true;
                Some(Err(err))
            }
        }
    }
}

/// Materialized query result plus its change subscription.
#[derive(Debug)]
pub struct RecordSet {
    records: Vec<Record>,
    subscription: Subscription,
}

impl RecordSet {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Subscription on the collection key; signals that a re-query is due.
    pub fn changes(&self) -> &Subscription {
        &self.subscription
    }
}

/// Record access facade over one SQLite table.
pub struct RecordStore {
    table: String,
    id_column: String,
    router: AddressRouter,
    collection_key: NotificationKey,
    handles: ConnectionHandles,
    bus: Arc<dyn NotificationBus>,
}

impl RecordStore {
    /// Opens the store and verifies its table.
    ///
    /// # Errors
    /// - `DbError::InvalidIdentifier` for unusable table/id column names.
    /// - `DbError::Sqlite` when the engine cannot be opened.
    /// - `DbError::MissingTable` / `MissingColumn` when the table is absent.
    /// - `DbError::IdColumnNotRowId` when the id column is not an
    ///   `INTEGER PRIMARY KEY`.
    pub fn open(config: StoreConfig, bus: Arc<dyn NotificationBus>) -> DbResult<Self> {
        Self::open_with_setup(config, bus, |_| Ok(()))
    }

    /// Opens the store after running `setup` on the read-write connection.
    pub fn open_with_setup<F>(
        config: StoreConfig,
        bus: Arc<dyn NotificationBus>,
        setup: F,
    ) -> DbResult<Self>
    where
        F: FnOnce(&Connection) -> DbResult<()>,
    {
        let StoreConfig {
            target,
            table,
            id_column,
        } = config;
        validate_identifier(&table)?;
        validate_identifier(&id_column)?;

        let mode = target.mode();
        let handles = ConnectionHandles::open(target)?;
        let ready = handles.with_writer(|conn| -> DbResult<()> {
            setup(conn)?;
            ensure_table_ready(conn, &table, &id_column)
        });
        if let Err(err) = ready {
            warn!("event=store_open module=repo status=error mode={mode} table={table} error={err}");
            return Err(err);
        }
        info!("event=store_open module=repo status=ok mode={mode} table={table}");

        Ok(Self {
            router: AddressRouter::for_table(table.as_str()),
            collection_key: NotificationKey::new(table.as_str()),
            table,
            id_column,
            handles,
            bus,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn storage_target(&self) -> &StorageTarget {
        self.handles.target()
    }

    /// Whether reads have opened a dedicated connection yet.
    pub fn has_read_handle(&self) -> bool {
        self.handles.has_read_handle()
    }

    /// Read-only connections opened so far; always zero for in-memory stores.
    pub fn read_handles_opened(&self) -> usize {
        self.handles.read_handles_opened()
    }

    /// Key that every query result is registered under.
    pub fn collection_key(&self) -> &NotificationKey {
        &self.collection_key
    }

    pub fn collection_address(&self) -> ResourceAddress {
        ResourceAddress::collection(self.table.as_str())
    }

    pub fn item_address(&self, id: i64) -> ResourceAddress {
        ResourceAddress::item(self.table.as_str(), id)
    }

    /// Subscribes to changes under `address` without running a query.
    pub fn watch(&self, address: &str) -> StoreResult<Subscription> {
        let resolved = self.resolve_address(address)?;
        Ok(self.bus.subscribe(&NotificationKey::from(&resolved)))
    }

    pub fn resolve(&self, address: &str) -> StoreResult<ResourceTarget> {
        self.router
            .resolve(address)
            .ok_or_else(|| StoreError::InvalidAddress(address.to_string()))
    }

    pub fn resource_type(&self, address: &str) -> StoreResult<ResourceType> {
        Ok(self.resolve(address)?.resource_type())
    }

    /// Runs a query and collects every row.
    pub fn query(&self, address: &str, query: &RecordQuery) -> StoreResult<RecordSet> {
        self.query_with(address, query, |cursor| {
            let mut records = Vec::new();
            while let Some(record) = cursor.next_record()? {
                records.push(record);
            }
            Ok((records, cursor.take_subscription()))
        })
        .map(|(records, subscription)| RecordSet {
            records,
            subscription: subscription.unwrap_or_else(|| self.bus.subscribe(&self.collection_key)),
        })
    }

    /// Runs a query and hands a cursor over its rows to `consume`.
    ///
    /// The statement and the read handle are released when `consume`
    /// returns, whether it finished the rows, stopped early or failed.
    ///
    /// File stores may run further reads and writes from inside `consume`;
    /// a nested read checks out another read-only connection. In-memory
    /// stores have a single connection, so any operation on this store from
    /// inside `consume` fails with `DbError::HandleInUse`.
    pub fn query_with<T, F>(&self, address: &str, query: &RecordQuery, consume: F) -> StoreResult<T>
    where
        F: FnOnce(&mut RecordCursor<'_>) -> StoreResult<T>,
    {
        let started_at = Instant::now();
        let target = self.resolve(address)?;
        let predicate = self.effective_predicate(target, &query.predicate);
        let sql = format!(
            "SELECT {} FROM {}{}{}",
            query.projection_sql(),
            self.table,
            predicate.where_sql(),
            query.order_sql()
        );

        let subscription = self.bus.subscribe(&self.collection_key);
        let result = self.handles.with_reader(|conn| -> StoreResult<T> {
            let mut stmt = conn.prepare(&sql)?;
            let columns = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            let rows = stmt.query(params_from_iter(predicate.args()))?;

            let mut cursor = RecordCursor {
                rows,
                columns,
                subscription: Some(subscription),
                exhausted: false,
            };
            let result = consume(&mut cursor);
            drop(cursor);
            result
        });

        debug!(
            "event=record_query module=repo status={} address={address} duration_ms={}",
            if result.is_ok() { "ok" } else { "error" },
            started_at.elapsed().as_millis()
        );
        result
    }

    /// Inserts `record` into the collection and returns the new item address.
    ///
    /// An explicit id must be null or a positive integer; anything else is
    /// rejected as `InvalidRecord` before the row is written.
    pub fn insert(&self, address: &str, record: &Record) -> StoreResult<ResourceAddress> {
        if self.resolve(address)? != ResourceTarget::Collection {
            return Err(StoreError::InvalidAddress(address.to_string()));
        }
        self.check_explicit_id(record)?;

        let sql = if record.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.table)
        } else {
            let columns: Vec<String> = record.columns().map(quote_identifier).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                self.table,
                columns.join(", ")
            )
        };

        let (changed, row_id) = self.handles.with_writer(|conn| -> StoreResult<_> {
            let changed = conn.execute(&sql, params_from_iter(record.values()))?;
            Ok((changed, conn.last_insert_rowid()))
        })?;

        if changed == 0 || row_id <= 0 {
            warn!("event=record_insert module=repo status=error address={address} error_code=no_row");
            return Err(StoreError::InsertFailed(address.to_string()));
        }

        let created = self.item_address(row_id);
        debug!("event=record_insert module=repo status=ok address={created}");
        self.publish(&created);
        Ok(created)
    }

    /// Applies `patch` to the rows matched by `address` and `predicate`.
    pub fn update(
        &self,
        address: &str,
        patch: &Record,
        predicate: &Predicate,
    ) -> StoreResult<usize> {
        let resolved = self.resolve_address(address)?;
        if patch.is_empty() {
            return Err(StoreError::InvalidRecord(
                "update patch has no columns".to_string(),
            ));
        }

        let effective = self.effective_predicate(resolved.target(), predicate);
        let assignments: Vec<String> = patch
            .columns()
            .map(|column| format!("{} = ?", quote_identifier(column)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}{}",
            self.table,
            assignments.join(", "),
            effective.where_sql()
        );

        let affected = self.handles.with_writer(|conn| -> StoreResult<_> {
            Ok(conn.execute(
                &sql,
                params_from_iter(patch.values().chain(effective.args())),
            )?)
        })?;

        debug!("event=record_update module=repo status=ok address={resolved} affected={affected}");
        self.publish(&resolved);
        Ok(affected)
    }

    /// Deletes the rows matched by `address` and `predicate`.
    pub fn delete(&self, address: &str, predicate: &Predicate) -> StoreResult<usize> {
        let resolved = self.resolve_address(address)?;
        let effective = self.effective_predicate(resolved.target(), predicate);
        let sql = format!("DELETE FROM {}{}", self.table, effective.where_sql());

        let affected = self.handles.with_writer(|conn| -> StoreResult<_> {
            Ok(conn.execute(&sql, params_from_iter(effective.args()))?)
        })?;

        debug!("event=record_delete module=repo status=ok address={resolved} affected={affected}");
        self.publish(&resolved);
        Ok(affected)
    }

    /// Releases the read-write handle and every pooled read handle.
    pub fn close(self) -> DbResult<()> {
        let table = self.table;
        let result = self.handles.close();
        match &result {
            Ok(()) => info!("event=store_close module=repo status=ok table={table}"),
            Err(err) => warn!("event=store_close module=repo status=error table={table} error={err}"),
        }
        result
    }

    fn resolve_address(&self, address: &str) -> StoreResult<ResourceAddress> {
        Ok(match self.resolve(address)? {
            ResourceTarget::Collection => self.collection_address(),
            ResourceTarget::Item(id) => self.item_address(id),
        })
    }

    fn check_explicit_id(&self, record: &Record) -> StoreResult<()> {
        let explicit = record
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(&self.id_column));
        match explicit {
            None | Some((_, Value::Null)) | Some((_, Value::Integer(1..))) => Ok(()),
            Some((column, value)) => Err(StoreError::InvalidRecord(format!(
                "`{column}` must be a positive integer, got {value:?}"
            ))),
        }
    }

    fn effective_predicate(&self, target: ResourceTarget, predicate: &Predicate) -> Predicate {
        match target {
            ResourceTarget::Collection => predicate.clone(),
            ResourceTarget::Item(id) => predicate.scoped_to_item(&self.id_column, id),
        }
    }

    fn publish(&self, address: &ResourceAddress) {
        self.bus.publish(&NotificationKey::from(address));
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::{quote_identifier, RecordQuery};
    use crate::model::predicate::Predicate;

    #[test]
    fn quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier("name"), "\"name\"");
        assert_eq!(quote_identifier("odd\"col"), "\"odd\"\"col\"");
    }

    #[test]
    fn query_fragments_default_to_all_columns_and_no_order() {
        let query = RecordQuery::all();
        assert_eq!(query.projection_sql(), "*");
        assert_eq!(query.order_sql(), "");

        let query = RecordQuery::all()
            .columns(["name", "year"])
            .filter(Predicate::raw("year > 1950").unwrap())
            .sorted_by("name DESC");
        assert_eq!(query.projection_sql(), "name, year");
        assert_eq!(query.order_sql(), " ORDER BY name DESC");
    }
}
