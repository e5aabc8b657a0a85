//! # Quarry
//!
//! A schema-aware relational data-access engine over SQLite, PostgreSQL
//! and MySQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Filter / Selector DSL (paths, q(), col())       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [path parser + schema registry]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Query compiler (joins, aliases, distinct)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [dialect adapter + token stream]
//! ┌─────────────────────────────────────────────────────────┐
//! │            SQL statement + ordered parameters            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor / transactions]
//! ┌─────────────────────────────────────────────────────────┐
//! │         Driver pool → rows → value codec → caller        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Tables, rows and relations are declared at runtime; queries traverse
//! foreign-key, back-reference and many-to-many edges at arbitrary
//! depth with JSON sub-navigation and per-column operator functions:
//!
//! ```ignore
//! use quarry::{q, Database};
//!
//! let db = Database::new("sqlite::memory:")?;
//! db.add_table("user", user_spec)?;
//! db.add_table("post", post_spec)?;
//! db.create_tables().await?;
//!
//! let writers = db
//!     .select("user")
//!     .filter(q().startswith("posts.content", "post 1"))
//!     .all()
//!     .await?;
//! ```

pub mod audit;
pub mod blocking;
pub mod codec;
pub mod database;
pub mod dsl;
pub mod error;
pub mod executor;
pub mod plan;
pub mod schema;
pub mod sql;
pub mod txn;
pub mod util;
pub mod value;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::audit::{AuditEvent, BufferedAudit};
    pub use crate::database::Database;
    pub use crate::dsl::{col, q, Query, Selector};
    pub use crate::error::{Error, Result};
    pub use crate::schema::{ColumnSpec, ColumnType, TableSpec};
    pub use crate::sql::dialect::Dialect;
    pub use crate::value::{Row, Value};
}

// Also export at crate root for convenience
pub use audit::{AuditEvent, BufferedAudit};
pub use database::{ActiveGuard, AuditGuard, Database};
pub use dsl::{col, q, register, FunctionGuard, Query, Selector};
pub use error::{Error, Result};
pub use schema::{ColumnSpec, ColumnType, Registry, Relation, TableSpec};
pub use sql::dialect::Dialect;
pub use value::{Row, Value};
