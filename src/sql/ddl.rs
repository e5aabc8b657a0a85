//! DDL statement builders: CREATE/DROP TABLE, secondary indexes, and
//! server-level CREATE/DROP DATABASE.
//!
//! Unique constraints are emitted as *named* table constraints so unique
//! violations can be mapped back to their columns on every dialect.

use super::dialect::{Dialect, SqlDialect};
use super::token::{Token, TokenStream};
use crate::schema::ColumnType;

/// A column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub length: Option<u32>,
    pub nullable: bool,
    /// The implicit auto-increment primary key.
    pub auto_pk: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            length: None,
            nullable: false,
            auto_pk: false,
        }
    }

    pub fn auto_pk(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Integer,
            length: None,
            nullable: false,
            auto_pk: true,
        }
    }

    pub fn length(mut self, length: Option<u32>) -> Self {
        self.length = length;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.name.clone()));
        ts.space();
        if self.auto_pk {
            ts.push(Token::Raw(dialect.auto_pk().into()));
            return ts;
        }
        ts.push(Token::Raw(dialect.column_type(&self.column_type, self.length)));
        if !self.nullable {
            ts.space().push(Token::Raw("NOT NULL".into()));
        }
        ts
    }
}

/// Table-level constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraint {
    /// Named unique constraint over one or more columns.
    Unique { name: String, columns: Vec<String> },
    /// Foreign key referencing another table's pk.
    ForeignKey {
        column: String,
        references: String,
    },
    /// Inline secondary index (dialects without CREATE INDEX IF NOT
    /// EXISTS keep index creation idempotent this way).
    Index {
        name: String,
        column: String,
        prefix: Option<u32>,
    },
}

impl TableConstraint {
    pub fn to_tokens(&self, _dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            TableConstraint::Unique { name, columns } => {
                ts.push(Token::Constraint).space();
                ts.push(Token::Ident(name.clone()));
                ts.space().push(Token::Unique).space().lparen();
                for (i, column) in columns.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.push(Token::Ident(column.clone()));
                }
                ts.rparen();
            }
            TableConstraint::ForeignKey { column, references } => {
                ts.push(Token::Raw("FOREIGN KEY".into())).space().lparen();
                ts.push(Token::Ident(column.clone()));
                ts.rparen();
                ts.space().push(Token::References).space();
                ts.push(Token::Ident(references.clone()));
                ts.space().lparen();
                ts.push(Token::Ident("pk".into()));
                ts.rparen();
            }
            TableConstraint::Index {
                name,
                column,
                prefix,
            } => {
                ts.push(Token::Index).space();
                ts.push(Token::Ident(name.clone()));
                ts.space().lparen();
                ts.push(Token::Ident(column.clone()));
                if let Some(prefix) = prefix {
                    ts.lparen();
                    ts.push(Token::LitInt(*prefix as i64));
                    ts.rparen();
                }
                ts.rparen();
            }
        }
        ts
    }
}

/// CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
    pub if_not_exists: bool,
}

impl CreateTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![],
            constraints: vec![],
            if_not_exists: true,
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn constraint(mut self, constraint: TableConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut ts = TokenStream::new();
        ts.push(Token::Create).space().push(Token::Table).space();
        if self.if_not_exists {
            ts.push(Token::IfNotExists).space();
        }
        ts.push(Token::Ident(self.name.clone()));
        ts.space().lparen();
        let mut first = true;
        for column in &self.columns {
            if !first {
                ts.comma().space();
            }
            first = false;
            ts.append(&column.to_tokens(dialect));
        }
        for constraint in &self.constraints {
            if !first {
                ts.comma().space();
            }
            first = false;
            ts.append(&constraint.to_tokens(dialect));
        }
        ts.rparen();
        ts.serialize(dialect)
    }
}

/// DROP TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub name: String,
    pub if_exists: bool,
}

impl DropTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            if_exists: true,
        }
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut ts = TokenStream::new();
        ts.push(Token::Drop).space().push(Token::Table).space();
        if self.if_exists {
            ts.push(Token::IfExists).space();
        }
        ts.push(Token::Ident(self.name.clone()));
        ts.serialize(dialect)
    }
}

/// CREATE INDEX statement (secondary indexes on marked columns).
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    pub name: String,
    pub table: String,
    pub column: String,
    /// Prefix length where the dialect can't index unbounded text.
    pub prefix: Option<u32>,
}

impl CreateIndex {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut ts = TokenStream::new();
        ts.push(Token::Create).space().push(Token::Index).space();
        if dialect != Dialect::MySql {
            // MySQL has no CREATE INDEX IF NOT EXISTS; create_tables is
            // made idempotent by the surrounding CREATE TABLE guard.
            ts.push(Token::IfNotExists).space();
        }
        ts.push(Token::Ident(self.name.clone()));
        ts.space().push(Token::On).space();
        ts.push(Token::Ident(self.table.clone()));
        ts.space().lparen();
        ts.push(Token::Ident(self.column.clone()));
        if let Some(prefix) = self.prefix {
            ts.lparen();
            ts.push(Token::LitInt(prefix as i64));
            ts.rparen();
        }
        ts.rparen();
        ts.serialize(dialect)
    }
}

/// CREATE DATABASE (server dialects only).
pub fn create_database(name: &str, dialect: Dialect) -> String {
    let mut ts = TokenStream::new();
    ts.push(Token::Create).space().push(Token::Database).space();
    ts.push(Token::Ident(name.to_string()));
    ts.serialize(dialect)
}

/// DROP DATABASE (server dialects only).
pub fn drop_database(name: &str, dialect: Dialect) -> String {
    let mut ts = TokenStream::new();
    ts.push(Token::Drop).space().push(Token::Database).space();
    ts.push(Token::IfExists).space();
    ts.push(Token::Ident(name.to_string()));
    ts.serialize(dialect)
}
