//! Synchronous facade.
//!
//! The engine core is async; this module provides the second execution
//! shape: a [`Database`] that owns a runtime and drives the async engine
//! to completion per call. Builders are reached through
//! [`Database::handle`] and finished with [`Database::wait`]:
//!
//! ```ignore
//! let db = quarry::blocking::Database::new("sqlite::memory:")?;
//! db.add_table("t", spec)?;
//! db.create_tables()?;
//! let rows = db.wait(db.handle().select("t").filter(q().eq("n", 1)).all())?;
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::schema::{Relation, Table, TableSpec};
use crate::value::{Row, Value};

/// A blocking database handle owning its runtime.
#[derive(Clone)]
pub struct Database {
    inner: crate::Database,
    runtime: Arc<tokio::runtime::Runtime>,
}

impl Database {
    pub fn new(url: &str) -> Result<Database> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("tokio runtime");
        let _guard = runtime.enter();
        let inner = crate::Database::new(url)?;
        drop(_guard);
        Ok(Database {
            inner,
            runtime: Arc::new(runtime),
        })
    }

    /// Open a handle and verify the database is reachable.
    pub fn connect(url: &str) -> Result<Database> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("tokio runtime");
        let inner = runtime.block_on(crate::Database::connect(url))?;
        Ok(Database {
            inner,
            runtime: Arc::new(runtime),
        })
    }

    /// The async handle; combine with [`Database::wait`] for anything
    /// not covered by the conveniences below.
    pub fn handle(&self) -> &crate::Database {
        &self.inner
    }

    /// Drive a future on this database's runtime.
    pub fn wait<T>(&self, future: impl Future<Output = T>) -> T {
        self.runtime.block_on(future)
    }

    // Schema operations are synchronous in the core already.

    pub fn add_table(&self, name: &str, spec: TableSpec) -> Result<()> {
        self.inner.add_table(name, spec)
    }

    pub fn remove_table(&self, name: &str) -> Result<()> {
        self.inner.remove_table(name)
    }

    pub fn table(&self, name: &str) -> Result<Table> {
        self.inner.table(name)
    }

    pub fn relations_of(&self, name: &str) -> Result<indexmap::IndexMap<String, Relation>> {
        self.inner.relations_of(name)
    }

    pub fn create_tables(&self) -> Result<()> {
        self.wait(self.inner.create_tables())
    }

    pub fn drop_tables(&self) -> Result<()> {
        self.wait(self.inner.drop_tables())
    }

    // Common CRUD conveniences.

    pub fn insert(&self, table: &str, rows: impl IntoIterator<Item = Row>) -> Result<Vec<i64>> {
        self.wait(self.inner.insert(table).rows(rows).execute())
    }

    pub fn select_all(&self, table: &str) -> Result<Vec<Row>> {
        self.wait(self.inner.select(table).all())
    }

    pub fn count(&self, table: &str) -> Result<u64> {
        self.wait(self.inner.count(table).get())
    }

    pub fn exists(&self, table: &str) -> Result<bool> {
        self.wait(self.inner.exists(table).get())
    }

    pub fn execute(&self, statement: &str, values: Row) -> Result<u64> {
        self.wait(self.inner.execute(statement, values))
    }

    pub fn fetch(&self, statement: &str, values: Row) -> Result<Vec<Row>> {
        self.wait(self.inner.fetch(statement, values))
    }

    pub fn fetch_scalar(&self, statement: &str, values: Row) -> Result<Value> {
        self.wait(self.inner.fetch_scalar(statement, values))
    }

    /// Run `f` inside a transaction: commit on success, roll back on
    /// failure. The closure runs on the calling thread; use
    /// [`Database::wait`] inside it for individual operations.
    pub fn transaction<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.scoped(false, f)
    }

    /// Like [`Database::transaction`], but opens a savepoint inside an
    /// active transaction.
    pub fn nested_transaction<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.scoped(true, f)
    }

    fn scoped<T>(&self, nested: bool, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let handle = self.wait(self.inner.begin_transaction(nested))?;
        match f() {
            Ok(value) => {
                self.wait(handle.commit())?;
                Ok(value)
            }
            Err(error) => {
                self.wait(handle.rollback())?;
                Err(error)
            }
        }
    }

    pub fn stop(&self) {
        self.wait(self.inner.stop());
    }
}

impl std::fmt::Display for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}
