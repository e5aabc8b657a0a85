//! CRUD execution over the driver pool.
//!
//! Statements compiled by [`crate::plan`] execute here: parameter
//! binding, row decoding per the compiled decode hints, insert pk
//! retrieval (RETURNING where available, last-insert-id plus offset on
//! MySQL), unique-violation translation, and the application-level
//! cascade/set-null policy for deletes.

use std::time::Instant;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::any::{AnyQueryResult, AnyRow};
use sqlx::{Column as _, Row as _};
use tracing::debug;

use crate::codec;
use crate::database::Database;
use crate::dsl::filter::{q, Query};
use crate::dsl::selector::Selector;
use crate::error::{Error, Result};
use crate::plan::{Assign, Compiler, DecodeHint, SelectSpec, Statement};
use crate::schema::{ColumnType, Registry, Table, PK};
use crate::sql::dialect::SqlDialect;
use crate::sql::dml::Delete;
use crate::sql::expr::{BindValue, Expr, Params};
use crate::util::and_;
use crate::value::{parse_datetime, Row, Value};

// =============================================================================
// Statement execution
// =============================================================================

fn bind_all<'q>(
    sql: &'q str,
    params: &'q [BindValue],
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = match value {
            BindValue::Bool(b) => query.bind(*b),
            BindValue::Int(n) => query.bind(*n),
            BindValue::Float(x) => query.bind(*x),
            BindValue::Str(s) => query.bind(s.as_str()),
            BindValue::Bytes(bytes) => query.bind(bytes.as_slice()),
        };
    }
    query
}

impl Database {
    pub(crate) async fn fetch_statement(&self, statement: &Statement) -> Result<Vec<AnyRow>> {
        let started = Instant::now();
        let result = {
            // Within one database, statements serialize on this lock,
            // which is also what routes them through an open transaction.
            let mut guard = self.txn_state().lock().await;
            match &mut *guard {
                Some(state) => {
                    bind_all(&statement.sql, &statement.params)
                        .fetch_all(&mut *state.conn)
                        .await
                }
                None => {
                    bind_all(&statement.sql, &statement.params)
                        .fetch_all(self.pool())
                        .await
                }
            }
        };
        let duration = started.elapsed();
        debug!(statement = %statement.sql, ?duration, "fetch");
        match result {
            Ok(rows) => {
                self.emit_audit(statement, duration, Some(rows.len() as u64), None);
                Ok(rows)
            }
            Err(error) => {
                self.emit_audit(statement, duration, None, Some(error.to_string()));
                Err(error.into())
            }
        }
    }

    pub(crate) async fn execute_statement(&self, statement: &Statement) -> Result<AnyQueryResult> {
        let started = Instant::now();
        let result = {
            let mut guard = self.txn_state().lock().await;
            match &mut *guard {
                Some(state) => {
                    bind_all(&statement.sql, &statement.params)
                        .execute(&mut *state.conn)
                        .await
                }
                None => {
                    bind_all(&statement.sql, &statement.params)
                        .execute(self.pool())
                        .await
                }
            }
        };
        let duration = started.elapsed();
        debug!(statement = %statement.sql, ?duration, "execute");
        match result {
            Ok(outcome) => {
                self.emit_audit(statement, duration, Some(outcome.rows_affected()), None);
                Ok(outcome)
            }
            Err(error) => {
                self.emit_audit(statement, duration, None, Some(error.to_string()));
                Err(error.into())
            }
        }
    }
}

// =============================================================================
// Row decoding
// =============================================================================

fn opt<T>(value: std::result::Result<Option<T>, sqlx::Error>) -> Option<Option<T>> {
    value.ok()
}

/// Decode a column without type expectations, by the driver's kind.
fn decode_raw(row: &AnyRow, index: usize) -> Value {
    if let Some(value) = opt(row.try_get::<Option<i64>, _>(index)) {
        return value.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Some(value) = opt(row.try_get::<Option<f64>, _>(index)) {
        return value.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Some(value) = opt(row.try_get::<Option<bool>, _>(index)) {
        return value.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Some(value) = opt(row.try_get::<Option<String>, _>(index)) {
        return value.map(Value::Str).unwrap_or(Value::Null);
    }
    if let Some(value) = opt(row.try_get::<Option<Vec<u8>>, _>(index)) {
        return value.map(Value::Bytes).unwrap_or(Value::Null);
    }
    Value::Null
}

fn decode_bool(row: &AnyRow, index: usize) -> Value {
    if let Some(value) = opt(row.try_get::<Option<bool>, _>(index)) {
        return value.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Some(value) = opt(row.try_get::<Option<i64>, _>(index)) {
        return value.map(|n| Value::Bool(n != 0)).unwrap_or(Value::Null);
    }
    Value::Null
}

fn decode_float(row: &AnyRow, index: usize) -> Value {
    if let Some(value) = opt(row.try_get::<Option<f64>, _>(index)) {
        return value.map(Value::Float).unwrap_or(Value::Null);
    }
    if let Some(value) = opt(row.try_get::<Option<i64>, _>(index)) {
        return value.map(|n| Value::Float(n as f64)).unwrap_or(Value::Null);
    }
    Value::Null
}

pub(crate) fn decode_value(row: &AnyRow, index: usize, hint: &DecodeHint) -> Value {
    match hint {
        DecodeHint::Typed(column_type) => match column_type {
            ColumnType::Boolean => decode_bool(row, index),
            ColumnType::Integer | ColumnType::ForeignKey => {
                match opt(row.try_get::<Option<i64>, _>(index)) {
                    Some(value) => value.map(Value::Int).unwrap_or(Value::Null),
                    None => decode_raw(row, index),
                }
            }
            ColumnType::Double => decode_float(row, index),
            ColumnType::String | ColumnType::StringWithLength => {
                match opt(row.try_get::<Option<String>, _>(index)) {
                    Some(value) => value.map(Value::Str).unwrap_or(Value::Null),
                    None => decode_raw(row, index),
                }
            }
            ColumnType::DateTime => match opt(row.try_get::<Option<String>, _>(index)) {
                Some(Some(text)) => parse_datetime(&text)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Str(text)),
                Some(None) => Value::Null,
                None => decode_raw(row, index),
            },
            ColumnType::Binary => match opt(row.try_get::<Option<Vec<u8>>, _>(index)) {
                Some(value) => value.map(Value::Bytes).unwrap_or(Value::Null),
                None => decode_raw(row, index),
            },
            ColumnType::Json => match opt(row.try_get::<Option<String>, _>(index)) {
                Some(Some(text)) => codec::from_json_text(&text).unwrap_or(Value::Str(text)),
                Some(None) => Value::Null,
                None => decode_raw(row, index),
            },
            ColumnType::BackRef | ColumnType::ManyToMany => Value::Null,
        },
        DecodeHint::Json => match decode_raw(row, index) {
            // Text-yielding dialects hand back the JSON rendering.
            Value::Str(text) => codec::from_json_text(&text).unwrap_or(Value::Str(text)),
            other => other,
        },
        DecodeHint::Int => match opt(row.try_get::<Option<i64>, _>(index)) {
            Some(value) => value.map(Value::Int).unwrap_or(Value::Null),
            None => decode_raw(row, index),
        },
        DecodeHint::Float => decode_float(row, index),
        DecodeHint::Bytes => match opt(row.try_get::<Option<Vec<u8>>, _>(index)) {
            Some(value) => value.map(Value::Bytes).unwrap_or(Value::Null),
            None => match opt(row.try_get::<Option<String>, _>(index)) {
                Some(value) => value
                    .map(|text| Value::Bytes(text.into_bytes()))
                    .unwrap_or(Value::Null),
                None => Value::Null,
            },
        },
        DecodeHint::Numeric => match opt(row.try_get::<Option<i64>, _>(index)) {
            Some(value) => value.map(Value::Int).unwrap_or(Value::Null),
            None => decode_float(row, index),
        },
        DecodeHint::Raw => decode_raw(row, index),
    }
}

// =============================================================================
// Unique-violation translation
// =============================================================================

fn violation_columns(message: &str, table: &Table) -> Vec<String> {
    static SQLITE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"UNIQUE constraint failed: ([^)]+)").expect("valid regex"));
    static NAMED: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"unique constraint "([^"]+)"|for key '([^']+)'"#).expect("valid regex")
    });

    if let Some(captures) = SQLITE.captures(message) {
        return captures[1]
            .split(',')
            .map(|part| {
                part.trim()
                    .rsplit('.')
                    .next()
                    .unwrap_or(part)
                    .to_string()
            })
            .collect();
    }
    if let Some(captures) = NAMED.captures(message) {
        let name = captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|m| m.as_str())
            .unwrap_or("");
        let name = name.rsplit('.').next().unwrap_or(name);
        for (constraint, columns) in table.unique_sets() {
            if constraint == name {
                return columns;
            }
        }
    }
    vec![]
}

fn violation_value(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Null => "null".to_string(),
        other => other.display(),
    }
}

fn translate_unique_violation(error: Error, table: &Table, rows: &[Row]) -> Error {
    let message = match &error {
        Error::Database(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => {
            db_error.message().to_string()
        }
        _ => return error,
    };
    let columns = violation_columns(&message, table);
    let mut parts = vec![];
    if let Some(row) = rows.first() {
        for column in &columns {
            if let Some(value) = row.get(column) {
                parts.push(format!("{column} '{}'", violation_value(value)));
            }
        }
    }
    if parts.is_empty() {
        Error::already_exists(format!("{} already exists", table.name))
    } else {
        Error::already_exists(format!("{} with {} already exists", table.name, and_(parts)))
    }
}

// =============================================================================
// Select
// =============================================================================

/// A pending SELECT.
#[must_use = "builders do nothing until executed"]
pub struct SelectBuilder {
    db: Database,
    table: String,
    spec: SelectSpec,
}

impl SelectBuilder {
    pub(crate) fn new(db: Database, table: &str) -> Self {
        Self {
            db,
            table: table.to_string(),
            spec: SelectSpec::default(),
        }
    }

    /// Project a single selector (column path, builder expression, or a
    /// relation name expanding to all of its columns).
    pub fn column(mut self, selector: impl Into<Selector>) -> Self {
        self.spec.selectors.push(selector.into());
        self
    }

    pub fn columns<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Selector>,
    {
        self.spec
            .selectors
            .extend(selectors.into_iter().map(Into::into));
        self
    }

    /// Conjoin a filter; repeated calls AND together.
    pub fn filter(mut self, query: Query) -> Self {
        self.spec.filter = std::mem::take(&mut self.spec.filter).and(query);
        self
    }

    pub fn order<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.order.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.spec.offset = Some(offset);
        self
    }

    /// Fetch all matching rows.
    pub async fn all(self) -> Result<Vec<Row>> {
        let (db, table, spec) = (self.db, self.table, self.spec);
        db.select_rows(&table, &spec).await
    }

    /// Fetch exactly one row; fails with `DoesNotExistError` when the
    /// filter matches nothing.
    pub async fn one(self) -> Result<Row> {
        let (db, table, spec) = (self.db, self.table, self.spec);
        let (name, plural) = {
            let registry = db.registry_snapshot();
            let resolved = registry.table(&table)?;
            (resolved.name.clone(), resolved.plural.clone())
        };
        let rows = db.select_rows(&table, &spec).await?;
        let mut rows = rows.into_iter();
        let Some(row) = rows.next() else {
            return Err(if spec.filter.is_empty() {
                Error::does_not_exist(format!("no {plural} exist"))
            } else {
                Error::does_not_exist(format!("{name} with {} doesn't exist", spec.filter))
            });
        };
        if rows.next().is_some() {
            return Err(Error::invalid(format!(
                "multiple {plural} match {}",
                spec.filter
            )));
        }
        Ok(row)
    }

    /// The rows as a finite, non-restartable stream.
    pub async fn stream(self) -> Result<BoxStream<'static, Result<Row>>> {
        let rows = self.all().await?;
        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }
}

impl Database {
    pub(crate) async fn select_rows(&self, table: &str, spec: &SelectSpec) -> Result<Vec<Row>> {
        let compiled = {
            let registry = self.registry_snapshot();
            Compiler::new(&registry, table)?.select(spec)?
        };
        let raw = self.fetch_statement(&compiled.statement).await?;
        let mut rows: Vec<Row> = raw
            .iter()
            .map(|any_row| {
                compiled
                    .outputs
                    .iter()
                    .enumerate()
                    .map(|(index, output)| {
                        (output.key.clone(), decode_value(any_row, index, &output.hint))
                    })
                    .collect()
            })
            .collect();
        if compiled.dedupe {
            let mut seen = std::collections::HashSet::new();
            rows.retain(|row| {
                let pk = match row.get(PK) {
                    Some(Value::Int(pk)) => *pk,
                    _ => return true,
                };
                seen.insert(pk)
            });
        }
        if compiled.hidden_pk {
            for row in &mut rows {
                row.shift_remove(PK);
            }
        }
        Ok(rows)
    }
}

// =============================================================================
// Count / exists
// =============================================================================

#[must_use = "builders do nothing until executed"]
pub struct CountBuilder {
    db: Database,
    table: String,
    filter: Query,
    distinct: Vec<String>,
}

impl CountBuilder {
    pub(crate) fn new(db: Database, table: &str) -> Self {
        Self {
            db,
            table: table.to_string(),
            filter: q(),
            distinct: vec![],
        }
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.filter = self.filter.and(query);
        self
    }

    /// Count distinct tuples of these column paths instead of rows.
    pub fn distinct<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.distinct.extend(keys.into_iter().map(Into::into));
        self
    }

    pub async fn get(self) -> Result<u64> {
        let statement = {
            let registry = self.db.registry_snapshot();
            Compiler::new(&registry, &self.table)?.count(&self.filter, &self.distinct)?
        };
        let rows = self.db.fetch_statement(&statement).await?;
        let row = rows.first().ok_or_else(|| {
            Error::invalid("count query returned no rows")
        })?;
        match decode_value(row, 0, &DecodeHint::Int) {
            Value::Int(count) => Ok(count.max(0) as u64),
            other => Err(Error::invalid(format!("unexpected count result {other:?}"))),
        }
    }
}

#[must_use = "builders do nothing until executed"]
pub struct ExistsBuilder {
    db: Database,
    table: String,
    filter: Query,
}

impl ExistsBuilder {
    pub(crate) fn new(db: Database, table: &str) -> Self {
        Self {
            db,
            table: table.to_string(),
            filter: q(),
        }
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.filter = self.filter.and(query);
        self
    }

    pub async fn get(self) -> Result<bool> {
        let statement = {
            let registry = self.db.registry_snapshot();
            Compiler::new(&registry, &self.table)?.exists(&self.filter)?
        };
        let rows = self.db.fetch_statement(&statement).await?;
        let row = rows
            .first()
            .ok_or_else(|| Error::invalid("exists query returned no rows"))?;
        match decode_bool(row, 0) {
            Value::Bool(exists) => Ok(exists),
            _ => Ok(false),
        }
    }
}

// =============================================================================
// Insert
// =============================================================================

#[derive(Debug, Clone)]
enum ConflictUpdate {
    Columns(Vec<String>),
    All,
}

#[must_use = "builders do nothing until executed"]
pub struct InsertBuilder {
    db: Database,
    table: String,
    rows: Vec<Row>,
    on_conflict: Option<Vec<String>>,
    update: Option<ConflictUpdate>,
    return_pks: bool,
}

impl InsertBuilder {
    pub(crate) fn new(db: Database, table: &str) -> Self {
        Self {
            db,
            table: table.to_string(),
            rows: vec![],
            on_conflict: None,
            update: None,
            return_pks: true,
        }
    }

    pub fn row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = Row>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Resolve conflicts on this unique column set instead of failing.
    /// Without [`InsertBuilder::update`], conflicting rows are ignored.
    pub fn on_conflict<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_conflict = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// On conflict, overwrite these columns with the incoming values.
    pub fn update<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update = Some(ConflictUpdate::Columns(
            columns.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// On conflict, overwrite every non-conflict-key column.
    pub fn update_all(mut self) -> Self {
        self.update = Some(ConflictUpdate::All);
        self
    }

    /// Skip pk retrieval; `execute` returns an empty list.
    pub fn return_pks(mut self, return_pks: bool) -> Self {
        self.return_pks = return_pks;
        self
    }

    /// Execute the insert; returns the new pks in row order.
    pub async fn execute(self) -> Result<Vec<i64>> {
        if self.rows.is_empty() {
            return Ok(vec![]);
        }
        let registry = self.db.registry_snapshot();
        let table = registry.table(&self.table)?.clone();
        let update_columns = match (&self.on_conflict, &self.update) {
            (Some(conflict), Some(ConflictUpdate::All)) => {
                let mut columns: Vec<String> = vec![];
                for row in &self.rows {
                    for key in row.keys() {
                        if !conflict.contains(key) && !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                }
                Some(columns)
            }
            (_, Some(ConflictUpdate::Columns(columns))) => Some(columns.clone()),
            _ => None,
        };
        let statement = Compiler::new(&registry, &self.table)?.insert(
            &self.rows,
            self.on_conflict.as_deref(),
            update_columns,
        )?;

        let supports_returning = self.db.dialect().supports_returning();
        if supports_returning {
            let result = self.db.fetch_statement(&statement).await;
            let rows = match result {
                Ok(rows) => rows,
                Err(error) => {
                    return Err(translate_unique_violation(error, &table, &self.rows))
                }
            };
            if !self.return_pks {
                return Ok(vec![]);
            }
            let mut pks = vec![];
            for row in &rows {
                match decode_value(row, 0, &DecodeHint::Int) {
                    Value::Int(pk) => pks.push(pk),
                    other => {
                        return Err(Error::invalid(format!("unexpected returned pk {other:?}")))
                    }
                }
            }
            Ok(pks)
        } else {
            let result = self.db.execute_statement(&statement).await;
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(error) => {
                    return Err(translate_unique_violation(error, &table, &self.rows))
                }
            };
            if !self.return_pks {
                return Ok(vec![]);
            }
            // MySQL reports the first generated id of the batch.
            let first = outcome.last_insert_id().unwrap_or(0);
            if first <= 0 {
                return Ok(vec![]);
            }
            Ok((0..self.rows.len() as i64).map(|offset| first + offset).collect())
        }
    }
}

// =============================================================================
// Update
// =============================================================================

#[must_use = "builders do nothing until executed"]
pub struct UpdateBuilder {
    db: Database,
    table: String,
    filter: Query,
    assignments: Vec<(String, Assign)>,
}

impl UpdateBuilder {
    pub(crate) fn new(db: Database, table: &str) -> Self {
        Self {
            db,
            table: table.to_string(),
            filter: q(),
            assignments: vec![],
        }
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.filter = self.filter.and(query);
        self
    }

    /// Assign a constant value.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments
            .push((column.into(), Assign::Value(value.into())));
        self
    }

    /// Assign a computed expression, e.g. `col("x") + 1`.
    pub fn set_expr(mut self, column: impl Into<String>, selector: Selector) -> Self {
        self.assignments
            .push((column.into(), Assign::Expr(selector)));
        self
    }

    /// Execute; returns the affected row count.
    pub async fn execute(self) -> Result<u64> {
        if self.assignments.is_empty() {
            return Err(Error::invalid("update requires at least one assignment"));
        }
        let statement = {
            let registry = self.db.registry_snapshot();
            Compiler::new(&registry, &self.table)?.update(&self.filter, &self.assignments)?
        };
        Ok(self.db.execute_statement(&statement).await?.rows_affected())
    }
}

// =============================================================================
// Delete (with cascade policy)
// =============================================================================

#[must_use = "builders do nothing until executed"]
pub struct DeleteBuilder {
    db: Database,
    table: String,
    filter: Query,
}

impl DeleteBuilder {
    pub(crate) fn new(db: Database, table: &str) -> Self {
        Self {
            db,
            table: table.to_string(),
            filter: q(),
        }
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.filter = self.filter.and(query);
        self
    }

    /// Execute; returns the number of rows deleted from the target
    /// table. Dependents cascade (non-nullable fks) or get nulled
    /// (nullable fks) first, inside the ambient transaction.
    pub async fn execute(self) -> Result<u64> {
        let (db, table, filter) = (self.db, self.table, self.filter);
        db.delete_rows(&table, filter).await
    }
}

impl Database {
    pub(crate) fn delete_rows<'a>(
        &'a self,
        table: &'a str,
        filter: Query,
    ) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            let registry = self.registry_snapshot();
            let children = registry.children(table)?;
            if children.is_empty() {
                let statement = Compiler::new(&registry, table)?.delete(&filter)?;
                return Ok(self.execute_statement(&statement).await?.rows_affected());
            }
            let scope = self.begin_scope(false).await?;
            let result = self.cascade_delete(&registry, table, &filter).await;
            self.end_scope(scope, result.is_ok()).await?;
            result
        })
    }

    async fn cascade_delete(
        &self,
        registry: &Registry,
        table: &str,
        filter: &Query,
    ) -> Result<u64> {
        let compiler = Compiler::new(registry, table)?;
        let pk_statement = compiler.pk_select(filter)?;
        let rows = self.fetch_statement(&pk_statement).await?;
        let mut pks = vec![];
        for row in &rows {
            if let Value::Int(pk) = decode_value(row, 0, &DecodeHint::Int) {
                pks.push(pk);
            }
        }
        if pks.is_empty() {
            return Ok(0);
        }
        let pk_list = Value::List(pks.iter().copied().map(Value::Int).collect());

        for child in registry.children(table)? {
            if child.is_link {
                // Link tables are not registry tables; delete directly.
                let mut params = Params::new();
                let delete = Delete::from(&child.table).filter(Expr::InList {
                    expr: Box::new(Expr::Column {
                        table: None,
                        column: child.column.clone(),
                    }),
                    values: pks.iter().map(|pk| BindValue::Int(*pk)).collect(),
                    negated: false,
                });
                let dialect = self.dialect();
                let sql = delete.to_tokens(dialect, &mut params).serialize(dialect);
                let statement = Statement {
                    sql,
                    params: params.into_values(),
                };
                self.execute_statement(&statement).await?;
            } else if child.nullable {
                let child_filter = q().is_in(&child.column, pk_list.clone());
                let statement = Compiler::new(registry, &child.table)?.update(
                    &child_filter,
                    &[(child.column.clone(), Assign::Value(Value::Null))],
                )?;
                self.execute_statement(&statement).await?;
            } else {
                let child_filter = q().is_in(&child.column, pk_list.clone());
                self.delete_rows(&child.table, child_filter).await?;
            }
        }

        let statement = compiler.delete(&q().is_in(PK, pk_list))?;
        Ok(self.execute_statement(&statement).await?.rows_affected())
    }
}

// =============================================================================
// Raw statements with named parameters
// =============================================================================

/// Rewrite `:name` placeholders to the dialect's positional form and
/// collect the bound values in occurrence order. `::` (PostgreSQL
/// casts) and quoted text are left alone.
pub(crate) fn translate_named(
    dialect: crate::sql::dialect::Dialect,
    statement: &str,
    values: &Row,
) -> Result<Statement> {
    let mut sql = String::with_capacity(statement.len());
    let mut params: Vec<BindValue> = vec![];
    let chars: Vec<char> = statement.chars().collect();
    let mut i = 0;
    let mut in_string = false;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            in_string = !in_string;
            sql.push(c);
            i += 1;
            continue;
        }
        if in_string || c != ':' {
            sql.push(c);
            i += 1;
            continue;
        }
        // A ':' outside a string: skip '::' casts, else read an identifier.
        if i + 1 < chars.len() && chars[i + 1] == ':' {
            sql.push_str("::");
            i += 2;
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
            end += 1;
        }
        if end == start {
            sql.push(c);
            i += 1;
            continue;
        }
        let name: String = chars[start..end].iter().collect();
        let value = values.get(&name).ok_or_else(|| {
            Error::invalid(format!("unknown parameter ':{name}'"))
        })?;
        if value.is_null() {
            sql.push_str("NULL");
        } else {
            params.push(BindValue::from_value(value)?);
            sql.push_str(&dialect.placeholder(params.len()));
        }
        i = end;
    }
    Ok(Statement { sql, params })
}

impl Database {
    /// Execute a raw statement with named `:param` binding; returns the
    /// affected row count.
    pub async fn execute(&self, statement: &str, values: Row) -> Result<u64> {
        let statement = translate_named(self.dialect(), statement, &values)?;
        Ok(self.execute_statement(&statement).await?.rows_affected())
    }

    /// Fetch rows from a raw statement with named `:param` binding.
    /// Columns decode by their driver types.
    pub async fn fetch(&self, statement: &str, values: Row) -> Result<Vec<Row>> {
        let statement = translate_named(self.dialect(), statement, &values)?;
        let rows = self.fetch_statement(&statement).await?;
        Ok(rows
            .iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .map(|(index, column)| (column.name().to_string(), decode_raw(row, index)))
                    .collect()
            })
            .collect())
    }

    /// Fetch a single scalar from a raw statement.
    pub async fn fetch_scalar(&self, statement: &str, values: Row) -> Result<Value> {
        let statement = translate_named(self.dialect(), statement, &values)?;
        let rows = self.fetch_statement(&statement).await?;
        let row = rows
            .first()
            .ok_or_else(|| Error::does_not_exist("statement returned no rows"))?;
        Ok(decode_raw(row, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::Dialect;

    #[test]
    fn test_translate_named() {
        let values = crate::row! { "n" => 1i64, "s" => "foo" };
        let statement =
            translate_named(Dialect::Sqlite, "INSERT INTO a (n, s) VALUES (:n, :s)", &values)
                .unwrap();
        assert_eq!(statement.sql, "INSERT INTO a (n, s) VALUES (?, ?)");
        assert_eq!(statement.params.len(), 2);

        let statement =
            translate_named(Dialect::Postgres, "SELECT :foo || :bar", &crate::row! {
                "foo" => "foo",
                "bar" => "bar",
            })
            .unwrap();
        assert_eq!(statement.sql, "SELECT $1 || $2");
    }

    #[test]
    fn test_translate_named_skips_casts_and_strings() {
        let values = crate::row! { "n" => 1i64 };
        let statement = translate_named(
            Dialect::Postgres,
            "SELECT ':n', x::int FROM t WHERE n = :n",
            &values,
        )
        .unwrap();
        assert_eq!(statement.sql, "SELECT ':n', x::int FROM t WHERE n = $1");
        assert_eq!(statement.params.len(), 1);
    }

    #[test]
    fn test_translate_named_unknown() {
        let error = translate_named(Dialect::Sqlite, "SELECT :missing", &crate::row! {})
            .unwrap_err()
            .to_string();
        assert_eq!(error, "unknown parameter ':missing'");
    }

    #[test]
    fn test_violation_columns() {
        use crate::schema::{ColumnSpec, TableSpec};
        let table = Table::new(
            "u",
            TableSpec::new()
                .column("s", ColumnSpec::sized_string(255).unique())
                .column("n1", ColumnSpec::integer())
                .column("n2", ColumnSpec::integer())
                .unique_together(["n1", "n2"]),
        );
        assert_eq!(
            violation_columns("UNIQUE constraint failed: u.s", &table),
            vec!["s"]
        );
        assert_eq!(
            violation_columns("UNIQUE constraint failed: u.n1, u.n2", &table),
            vec!["n1", "n2"]
        );
        assert_eq!(
            violation_columns(
                "duplicate key value violates unique constraint \"uq_u_n1_n2\"",
                &table
            ),
            vec!["n1", "n2"]
        );
        assert_eq!(
            violation_columns("Duplicate entry 'foo' for key 'u.uq_u_s'", &table),
            vec!["s"]
        );
    }
}
