//! Transaction manager.
//!
//! A first-level scope begins a real transaction on a dedicated
//! connection; scopes entered inside it without `nested` share it (a
//! failure rolls back the innermost real scope immediately); scopes
//! entered with `nested` open a savepoint and roll back only to it.
//! While a transaction is active, every operation on the database routes
//! through its connection.

use sqlx::AnyConnection;
use sqlx::pool::PoolConnection;
use sqlx::Any;
use tracing::debug;

use crate::database::Database;
use crate::error::Result;
use crate::sql::dialect::SqlDialect;

/// Transaction state carried by a database while a transaction is open.
pub(crate) struct TxnState {
    pub(crate) conn: PoolConnection<Any>,
    savepoints: Vec<String>,
    sequence: usize,
    rolled_back: bool,
}

/// What one `transaction()` call turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Began the real transaction.
    Outer,
    /// Opened a savepoint with this name.
    Savepoint(String),
    /// Joined an enclosing scope.
    Passthrough,
}

async fn control(conn: &mut AnyConnection, sql: &str) -> Result<()> {
    debug!(statement = sql, "transaction control");
    sqlx::query(sql).execute(conn).await?;
    Ok(())
}

impl Database {
    /// Run `work` inside a transaction scope: commit on success, roll
    /// back on failure. The future only starts executing after the
    /// transaction has begun. Inside an active transaction this joins
    /// it; see [`Database::nested_transaction`] for savepoint scopes.
    pub async fn transaction<T>(
        &self,
        work: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        self.scoped(false, work).await
    }

    /// Run `work` inside a savepoint when a transaction is already
    /// active (and inside a plain transaction otherwise). A failure
    /// rolls back the savepoint only; enclosing work persists.
    pub async fn nested_transaction<T>(
        &self,
        work: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        self.scoped(true, work).await
    }

    async fn scoped<T>(
        &self,
        nested: bool,
        work: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        let scope = self.begin_scope(nested).await?;
        let _active = self.activate();
        match work.await {
            Ok(value) => {
                self.end_scope(scope, true).await?;
                Ok(value)
            }
            Err(error) => {
                self.end_scope(scope, false).await?;
                Err(error)
            }
        }
    }

    /// Enter a transaction scope. Exposed for the blocking facade;
    /// [`Database::transaction`] is the usual entry point.
    pub async fn begin_scope(&self, nested: bool) -> Result<Scope> {
        let dialect = self.dialect();
        let mut guard = self.txn_state().lock().await;
        if guard.is_none() {
            let mut conn = self.pool().acquire().await?;
            control(&mut conn, dialect.begin_transaction()).await?;
            *guard = Some(TxnState {
                conn,
                savepoints: vec![],
                sequence: 0,
                rolled_back: false,
            });
            return Ok(Scope::Outer);
        }
        let state = guard.as_mut().expect("transaction state present");
        if nested && !state.rolled_back {
            state.sequence += 1;
            let name = format!("sp_{}", state.sequence);
            control(&mut state.conn, &dialect.savepoint(&name)).await?;
            state.savepoints.push(name.clone());
            return Ok(Scope::Savepoint(name));
        }
        Ok(Scope::Passthrough)
    }

    /// Leave a transaction scope. `ok` carries the closure's outcome.
    pub async fn end_scope(&self, scope: Scope, ok: bool) -> Result<()> {
        let dialect = self.dialect();
        let mut guard = self.txn_state().lock().await;
        match scope {
            Scope::Outer => {
                let Some(mut state) = guard.take() else {
                    return Ok(());
                };
                if !state.rolled_back {
                    let sql = if ok {
                        dialect.commit_transaction()
                    } else {
                        dialect.rollback_transaction()
                    };
                    control(&mut state.conn, sql).await?;
                }
                // Dropping the connection returns it to the pool.
            }
            Scope::Savepoint(name) => {
                let Some(state) = guard.as_mut() else {
                    return Ok(());
                };
                state.savepoints.retain(|existing| existing != &name);
                if state.rolled_back {
                    return Ok(());
                }
                if !ok {
                    control(&mut state.conn, &dialect.rollback_to_savepoint(&name)).await?;
                }
                control(&mut state.conn, &dialect.release_savepoint(&name)).await?;
            }
            Scope::Passthrough => {
                if ok {
                    return Ok(());
                }
                let Some(state) = guard.as_mut() else {
                    return Ok(());
                };
                if state.rolled_back {
                    return Ok(());
                }
                // Roll back the innermost real scope right away; its
                // owner skips its own rollback later.
                match state.savepoints.last().cloned() {
                    Some(name) => {
                        control(&mut state.conn, &dialect.rollback_to_savepoint(&name)).await?;
                    }
                    None => {
                        control(&mut state.conn, dialect.rollback_transaction()).await?;
                        state.rolled_back = true;
                    }
                }
            }
        }
        Ok(())
    }
}

/// An explicit transaction handle for callers that cannot await a
/// scoped future (the blocking facade). Must be finished with
/// [`TransactionHandle::commit`] or [`TransactionHandle::rollback`].
pub struct TransactionHandle {
    db: Database,
    scope: Option<Scope>,
}

impl TransactionHandle {
    pub(crate) fn new(db: Database, scope: Scope) -> Self {
        Self {
            db,
            scope: Some(scope),
        }
    }

    pub async fn commit(mut self) -> Result<()> {
        if let Some(scope) = self.scope.take() {
            self.db.end_scope(scope, true).await?;
        }
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        if let Some(scope) = self.scope.take() {
            self.db.end_scope(scope, false).await?;
        }
        Ok(())
    }
}

impl Database {
    /// Begin an explicit transaction scope; finish it with the handle.
    pub async fn begin_transaction(&self, nested: bool) -> Result<TransactionHandle> {
        let scope = self.begin_scope(nested).await?;
        Ok(TransactionHandle::new(self.clone(), scope))
    }
}
