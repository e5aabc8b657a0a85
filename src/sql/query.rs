//! SELECT statement builder.

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, Params};
use super::token::{Token, TokenStream};

/// A table reference with an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The name other clauses refer to this table by.
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.table.clone()));
        if let Some(alias) = &self.alias {
            ts.space().push(Token::As).space();
            ts.push(Token::Ident(alias.clone()));
        }
        ts
    }
}

/// What the query selects from: a table or a derived table.
#[derive(Debug, Clone, PartialEq)]
pub enum FromSource {
    Table(TableRef),
    Subquery(Box<Select>, String),
}

/// Join types used by the compiler: filters demand a match, selectors
/// and order keys must not drop the base row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinType,
    pub table: TableRef,
    pub on: Expr,
}

impl Join {
    pub fn to_tokens(&self, dialect: Dialect, params: &mut Params) -> TokenStream {
        let mut ts = TokenStream::new();
        match self.kind {
            JoinType::Inner => {
                ts.push(Token::Inner);
            }
            JoinType::Left => {
                ts.push(Token::Left);
            }
        }
        ts.space().push(Token::Join).space();
        ts.append(&self.table.to_tokens());
        ts.space().push(Token::On).space();
        ts.append(&self.on.to_tokens(dialect, params));
        ts
    }
}

/// A selected expression with an optional output alias.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self, dialect: Dialect, params: &mut Params) -> TokenStream {
        let mut ts = self.expr.to_tokens(dialect, params);
        if let Some(alias) = &self.alias {
            ts.space().push(Token::As).space();
            ts.push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: SortDir,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Desc,
        }
    }

    pub fn to_tokens(&self, dialect: Dialect, params: &mut Params) -> TokenStream {
        let mut ts = self.expr.to_tokens(dialect, params);
        ts.space();
        ts.push(match self.dir {
            SortDir::Asc => Token::Asc,
            SortDir::Desc => Token::Desc,
        });
        ts
    }
}

/// A SELECT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub from: FromSource,
    pub columns: Vec<SelectExpr>,
    pub joins: Vec<Join>,
    pub filter: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub distinct: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    /// SELECT from a table.
    pub fn from_table(table: TableRef) -> Self {
        Self {
            from: FromSource::Table(table),
            columns: vec![],
            joins: vec![],
            filter: None,
            order_by: vec![],
            distinct: false,
            limit: None,
            offset: None,
        }
    }

    /// SELECT from a derived table.
    pub fn from_subquery(query: Select, alias: impl Into<String>) -> Self {
        Self {
            from: FromSource::Subquery(Box::new(query), alias.into()),
            columns: vec![],
            joins: vec![],
            filter: None,
            order_by: vec![],
            distinct: false,
            limit: None,
            offset: None,
        }
    }

    pub fn column(mut self, column: impl Into<SelectExpr>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(expr);
        self
    }

    pub fn order_by(mut self, order: OrderByExpr) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: Option<u64>) -> Self {
        self.offset = offset;
        self
    }

    pub fn to_tokens(&self, dialect: Dialect, params: &mut Params) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Select).space();
        if self.distinct {
            ts.push(Token::Distinct).space();
        }
        if self.columns.is_empty() {
            ts.push(Token::Star).space();
        } else {
            for (i, column) in self.columns.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&column.to_tokens(dialect, params));
            }
            ts.space();
        }
        ts.push(Token::From).space();
        match &self.from {
            FromSource::Table(table) => {
                ts.append(&table.to_tokens());
            }
            FromSource::Subquery(query, alias) => {
                ts.lparen();
                ts.append(&query.to_tokens(dialect, params));
                ts.rparen();
                ts.space().push(Token::As).space();
                ts.push(Token::Ident(alias.clone()));
            }
        }
        for join in &self.joins {
            ts.space();
            ts.append(&join.to_tokens(dialect, params));
        }
        if let Some(filter) = &self.filter {
            ts.space().push(Token::Where).space();
            ts.append(&filter.to_tokens(dialect, params));
        }
        if !self.order_by.is_empty() {
            ts.space().push(Token::OrderBy).space();
            for (i, order) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order.to_tokens(dialect, params));
            }
        }
        if self.limit.is_some() || self.offset.is_some() {
            let pagination = dialect.emit_limit_offset(self.limit, self.offset);
            ts.space();
            ts.append(&pagination);
        }
        ts
    }

    /// Serialize to SQL for a dialect, returning the parameter list.
    pub fn to_sql(&self, dialect: Dialect) -> (String, Vec<super::expr::BindValue>) {
        let mut params = Params::new();
        let sql = self.to_tokens(dialect, &mut params).serialize(dialect);
        (sql, params.into_values())
    }
}
