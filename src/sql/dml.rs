//! DML statement builders: INSERT, UPDATE, DELETE.
//!
//! Insert handles multi-row VALUES lists and conflict resolution in both
//! flavors: `ON CONFLICT` for SQLite/PostgreSQL and `ON DUPLICATE KEY
//! UPDATE` for MySQL (which applies to any unique key, so the conflict
//! columns only matter for the dialects that name them).

use super::dialect::{Dialect, SqlDialect};
use super::expr::{BindValue, Expr, Params};
use super::token::{Token, TokenStream};

/// A value in a VALUES tuple: bound, or a literal NULL (nulls are not
/// bound so drivers never have to infer a type for them).
#[derive(Debug, Clone, PartialEq)]
pub enum InsertValue {
    Bind(BindValue),
    Null,
}

/// Conflict resolution for [`Insert`].
#[derive(Debug, Clone, PartialEq)]
pub struct OnConflict {
    /// Columns of the unique constraint the conflict is expected on.
    pub columns: Vec<String>,
    /// Columns to overwrite on conflict; empty means ignore the row.
    pub update: Vec<String>,
}

/// INSERT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<InsertValue>>,
    on_conflict: Option<OnConflict>,
    returning: Option<String>,
}

impl Insert {
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec![],
            rows: vec![],
            on_conflict: None,
            returning: None,
        }
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn row(mut self, values: Vec<InsertValue>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = Some(on_conflict);
        self
    }

    /// Request the given column back from every inserted row, where the
    /// dialect supports RETURNING.
    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning = Some(column.into());
        self
    }

    pub fn to_tokens(&self, dialect: Dialect, params: &mut Params) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Insert).space().push(Token::Into).space();
        ts.push(Token::Ident(self.table.clone()));
        if self.columns.is_empty() {
            // A row of nothing but the auto pk.
            if dialect == Dialect::MySql {
                ts.space().lparen();
                ts.rparen();
                ts.space().push(Token::Values).space().lparen();
                ts.rparen();
            } else {
                ts.space().push(Token::Raw("DEFAULT VALUES".into()));
                if let Some(column) = &self.returning {
                    ts.space().push(Token::Returning).space();
                    ts.push(Token::Ident(column.clone()));
                }
            }
            return ts;
        }
        ts.space().lparen();
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(column.clone()));
        }
        ts.rparen();
        ts.space().push(Token::Values).space();
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.lparen();
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    ts.comma().space();
                }
                match value {
                    InsertValue::Bind(value) => {
                        let token = params.push(value.clone());
                        ts.push(token);
                    }
                    InsertValue::Null => {
                        ts.push(Token::Null);
                    }
                }
            }
            ts.rparen();
        }
        if let Some(on_conflict) = &self.on_conflict {
            ts.space();
            ts.append(&self.conflict_tokens(dialect, on_conflict));
        }
        if let Some(column) = &self.returning {
            if dialect.supports_returning() {
                ts.space().push(Token::Returning).space();
                ts.push(Token::Ident(column.clone()));
            }
        }
        ts
    }

    fn conflict_tokens(&self, dialect: Dialect, on_conflict: &OnConflict) -> TokenStream {
        let mut ts = TokenStream::new();
        if dialect == Dialect::MySql {
            ts.push(Token::Raw("ON DUPLICATE KEY UPDATE".into())).space();
            if on_conflict.update.is_empty() {
                // No-op assignment; MySQL has no DO NOTHING.
                ts.push(Token::Ident("pk".into()));
                ts.space().push(Token::Eq).space();
                ts.push(Token::Ident("pk".into()));
            } else {
                for (i, column) in on_conflict.update.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.push(Token::Ident(column.clone()));
                    ts.space().push(Token::Eq).space();
                    ts.push(Token::FunctionName("VALUES".into()));
                    ts.lparen();
                    ts.push(Token::Ident(column.clone()));
                    ts.rparen();
                }
            }
            return ts;
        }
        ts.push(Token::Raw("ON CONFLICT".into())).space().lparen();
        for (i, column) in on_conflict.columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(column.clone()));
        }
        ts.rparen();
        ts.space();
        if on_conflict.update.is_empty() {
            ts.push(Token::Raw("DO NOTHING".into()));
        } else {
            ts.push(Token::Raw("DO UPDATE SET".into())).space();
            for (i, column) in on_conflict.update.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(Token::Ident(column.clone()));
                ts.space().push(Token::Eq).space();
                ts.push(Token::Raw("excluded".into()));
                ts.push(Token::Dot);
                ts.push(Token::Ident(column.clone()));
            }
        }
        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> (String, Vec<BindValue>) {
        let mut params = Params::new();
        let sql = self.to_tokens(dialect, &mut params).serialize(dialect);
        (sql, params.into_values())
    }
}

/// UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    assignments: Vec<(String, Expr)>,
    filter: Option<Expr>,
}

impl Update {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: vec![],
            filter: None,
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: Expr) -> Self {
        self.assignments.push((column.into(), value));
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    pub fn to_tokens(&self, dialect: Dialect, params: &mut Params) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Update).space();
        ts.push(Token::Ident(self.table.clone()));
        ts.space().push(Token::Set).space();
        for (i, (column, value)) in self.assignments.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(column.clone()));
            ts.space().push(Token::Eq).space();
            ts.append(&value.to_tokens(dialect, params));
        }
        if let Some(filter) = &self.filter {
            ts.space().push(Token::Where).space();
            ts.append(&filter.to_tokens(dialect, params));
        }
        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> (String, Vec<BindValue>) {
        let mut params = Params::new();
        let sql = self.to_tokens(dialect, &mut params).serialize(dialect);
        (sql, params.into_values())
    }
}

/// DELETE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    table: String,
    filter: Option<Expr>,
}

impl Delete {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    pub fn to_tokens(&self, dialect: Dialect, params: &mut Params) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Delete).space().push(Token::From).space();
        ts.push(Token::Ident(self.table.clone()));
        if let Some(filter) = &self.filter {
            ts.space().push(Token::Where).space();
            ts.append(&filter.to_tokens(dialect, params));
        }
        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> (String, Vec<BindValue>) {
        let mut params = Params::new();
        let sql = self.to_tokens(dialect, &mut params).serialize(dialect);
        (sql, params.into_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{col, param, ExprExt};

    fn insert() -> Insert {
        Insert::into("u")
            .columns(["s", "n"])
            .row(vec![
                InsertValue::Bind(BindValue::Str("foo".into())),
                InsertValue::Bind(BindValue::Int(1)),
            ])
            .row(vec![
                InsertValue::Bind(BindValue::Str("bar".into())),
                InsertValue::Null,
            ])
    }

    #[test]
    fn test_insert_multi_row() {
        let (sql, params) = insert().to_sql(Dialect::Sqlite);
        assert_eq!(
            sql,
            "INSERT INTO \"u\" (\"s\", \"n\") VALUES (?, ?), (?, NULL)"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_insert_returning() {
        let (sql, _) = insert().returning("pk").to_sql(Dialect::Postgres);
        assert_eq!(
            sql,
            "INSERT INTO \"u\" (\"s\", \"n\") VALUES ($1, $2), ($3, NULL) RETURNING \"pk\""
        );
        // MySQL has no RETURNING; pks come from last-insert-id.
        let (sql, _) = insert().returning("pk").to_sql(Dialect::MySql);
        assert_eq!(sql, "INSERT INTO `u` (`s`, `n`) VALUES (?, ?), (?, NULL)");
    }

    #[test]
    fn test_insert_on_conflict_ignore() {
        let conflict = OnConflict {
            columns: vec!["s".into()],
            update: vec![],
        };
        let (sql, _) = insert().on_conflict(conflict.clone()).to_sql(Dialect::Postgres);
        assert!(sql.ends_with("ON CONFLICT (\"s\") DO NOTHING"));
        let (sql, _) = insert().on_conflict(conflict).to_sql(Dialect::MySql);
        assert!(sql.ends_with("ON DUPLICATE KEY UPDATE `pk` = `pk`"));
    }

    #[test]
    fn test_insert_on_conflict_update() {
        let conflict = OnConflict {
            columns: vec!["s".into()],
            update: vec!["n".into()],
        };
        let (sql, _) = insert().on_conflict(conflict.clone()).to_sql(Dialect::Sqlite);
        assert!(sql.ends_with("ON CONFLICT (\"s\") DO UPDATE SET \"n\" = excluded.\"n\""));
        let (sql, _) = insert().on_conflict(conflict).to_sql(Dialect::MySql);
        assert!(sql.ends_with("ON DUPLICATE KEY UPDATE `n` = VALUES(`n`)"));
    }

    #[test]
    fn test_update() {
        let statement = Update::table("t")
            .set("b", Expr::Param(BindValue::Bool(true)))
            .set("x", col("x").add(Expr::Param(BindValue::Int(1))))
            .filter(col("n").eq(param(BindValue::Int(10))));
        let (sql, params) = statement.to_sql(Dialect::Sqlite);
        assert_eq!(
            sql,
            "UPDATE \"t\" SET \"b\" = ?, \"x\" = \"x\" + ? WHERE \"n\" = ?"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_delete() {
        let statement = Delete::from("t").filter(col("n").eq(param(BindValue::Int(1))));
        let (sql, _) = statement.to_sql(Dialect::MySql);
        assert_eq!(sql, "DELETE FROM `t` WHERE `n` = ?");
    }
}
