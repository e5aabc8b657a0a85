//! Expression AST - the core of SQL expression building.
//!
//! Expressions are dialect-agnostic; [`Expr::to_tokens`] resolves the
//! dialect-specific pieces (JSON access, casts, concatenation, regular
//! expressions) and collects bound values in statement order, so the
//! emitted placeholders always line up with the parameter list.

use super::dialect::{Dialect, JsonSegment, SqlDialect};
use super::query::Select;
use super::token::{Token, TokenStream};

/// A value bound as a statement parameter. Nulls never bind; they are
/// emitted as literals to keep every driver's type inference happy.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

/// Parameters collected while tokenizing a statement.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: Vec<BindValue>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bound value and get its placeholder token.
    pub fn push(&mut self, value: BindValue) -> Token {
        self.values.push(value);
        Token::Param(self.values.len())
    }

    pub fn into_values(self) -> Vec<BindValue> {
        self.values
    }

    pub fn values(&self) -> &[BindValue] {
        &self.values
    }
}

impl BindValue {
    /// Encode a native value for binding outside JSON contexts:
    /// datetimes become ISO-8601 UTC text, containers become JSON text.
    /// Nulls never bind; callers emit [`Expr::Null`] instead.
    pub fn from_value(value: &crate::value::Value) -> crate::error::Result<BindValue> {
        use crate::value::Value;
        match value {
            Value::Bool(b) => Ok(BindValue::Bool(*b)),
            Value::Int(n) => Ok(BindValue::Int(*n)),
            Value::Float(x) => Ok(BindValue::Float(*x)),
            Value::Str(s) => Ok(BindValue::Str(s.clone())),
            Value::Bytes(bytes) => Ok(BindValue::Bytes(bytes.clone())),
            Value::DateTime(dt) => Ok(BindValue::Str(crate::value::format_datetime(dt))),
            Value::List(_) | Value::Map(_) => {
                Ok(BindValue::Str(crate::codec::to_json_text(value)))
            }
            Value::Null => Err(crate::error::Error::invalid(
                "null values cannot be bound as parameters",
            )),
        }
    }
}

/// A native value as an expression: a bound parameter, or a NULL literal.
pub fn value_expr(value: &crate::value::Value) -> crate::error::Result<Expr> {
    if value.is_null() {
        Ok(Expr::Null)
    } else {
        Ok(Expr::Param(BindValue::from_value(value)?))
    }
}

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens` - the compiler enforces
/// this.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_table.column
    Column {
        table: Option<String>,
        column: String,
    },

    /// Bound parameter.
    Param(BindValue),

    /// Structural literals (never user data).
    LitInt(i64),
    LitString(String),
    Null,

    /// Binary operation: left op right
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// NOT expr
    Not(Box<Expr>),

    /// Function call: name(args...)
    Func { name: String, args: Vec<Expr> },

    /// Dialect-specific casts.
    CastDouble(Box<Expr>),
    CastBinary(Box<Expr>),

    /// JSON navigation through the dialect accessor.
    JsonExtract {
        expr: Box<Expr>,
        path: Vec<JsonSegment>,
    },

    /// JSON path existence.
    JsonHas {
        expr: Box<Expr>,
        path: Vec<JsonSegment>,
    },

    /// JSON array membership of a bound value.
    JsonContains { expr: Box<Expr>, value: BindValue },

    /// Regular-expression match against a bound pattern.
    RegexMatch { expr: Box<Expr>, pattern: BindValue },

    /// LIKE with an arbitrary pattern expression.
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },

    /// expr IN (v1, v2, …)
    InList {
        expr: Box<Expr>,
        values: Vec<BindValue>,
        negated: bool,
    },

    /// expr IN (SELECT …)
    InSubquery {
        expr: Box<Expr>,
        query: Box<Select>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// EXISTS (SELECT …)
    Exists(Box<Select>),

    /// String concatenation: `||` or CONCAT() per dialect.
    Concat(Vec<Expr>),

    /// Wildcard: * or table.*
    Star { table: Option<String> },

    /// Parenthesized expression.
    Paren(Box<Expr>),

    /// Raw SQL fragment. Never carries user input.
    Raw(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

fn binary_op_token(op: BinaryOp) -> Token {
    match op {
        BinaryOp::Eq => Token::Eq,
        BinaryOp::Ne => Token::Ne,
        BinaryOp::Lt => Token::Lt,
        BinaryOp::Le => Token::Le,
        BinaryOp::Gt => Token::Gt,
        BinaryOp::Ge => Token::Ge,
        BinaryOp::And => Token::And,
        BinaryOp::Or => Token::Or,
        BinaryOp::Add => Token::Plus,
        BinaryOp::Sub => Token::Minus,
        BinaryOp::Mul => Token::Mul,
        BinaryOp::Div => Token::Div,
        BinaryOp::Mod => Token::Mod,
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Unqualified column reference.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

/// Qualified column reference.
pub fn table_col(table: impl Into<String>, name: impl Into<String>) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: name.into(),
    }
}

/// Bound parameter.
pub fn param(value: BindValue) -> Expr {
    Expr::Param(value)
}

/// Function call.
pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Func {
        name: name.into(),
        args,
    }
}

/// Extension methods for building expressions fluently.
pub trait ExprExt: Sized {
    fn binary(self, op: BinaryOp, right: Expr) -> Expr;

    fn eq(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Eq, right)
    }
    fn ne(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Ne, right)
    }
    fn lt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Lt, right)
    }
    fn le(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Le, right)
    }
    fn gt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Gt, right)
    }
    fn ge(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Ge, right)
    }
    fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOp::And, right)
    }
    fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Or, right)
    }
    fn add(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Add, right)
    }
    fn sub(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Sub, right)
    }
    fn mul(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Mul, right)
    }
    fn div(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Div, right)
    }
}

impl ExprExt for Expr {
    fn binary(self, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }
}

// =============================================================================
// Expression to tokens
// =============================================================================

impl Expr {
    /// Convert this expression to a token stream, collecting bound values
    /// in emission order.
    pub fn to_tokens(&self, dialect: Dialect, params: &mut Params) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            Expr::Column { table, column } => match table {
                Some(table) => {
                    ts.push(Token::QualifiedIdent {
                        table: table.clone(),
                        column: column.clone(),
                    });
                }
                None => {
                    ts.push(Token::Ident(column.clone()));
                }
            },

            Expr::Param(value) => {
                let token = params.push(value.clone());
                ts.push(token);
            }

            Expr::LitInt(n) => {
                ts.push(Token::LitInt(*n));
            }
            Expr::LitString(s) => {
                ts.push(Token::LitString(s.clone()));
            }
            Expr::Null => {
                ts.push(Token::Null);
            }

            Expr::Binary { left, op, right } => {
                ts.append(&left.to_tokens(dialect, params));
                ts.space().push(binary_op_token(*op)).space();
                ts.append(&right.to_tokens(dialect, params));
            }

            Expr::Not(inner) => {
                ts.push(Token::Not).space();
                ts.append(&inner.to_tokens(dialect, params));
            }

            Expr::Func { name, args } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens(dialect, params));
                }
                ts.rparen();
            }

            Expr::CastDouble(inner) => {
                let inner = inner.to_tokens(dialect, params);
                ts.append(&dialect.cast_double(&inner));
            }

            Expr::CastBinary(inner) => {
                let inner = inner.to_tokens(dialect, params);
                ts.append(&dialect.cast_binary(&inner));
            }

            Expr::JsonExtract { expr, path } => {
                let inner = expr.to_tokens(dialect, params);
                ts.append(&dialect.json_extract(&inner, path));
            }

            Expr::JsonHas { expr, path } => {
                let inner = expr.to_tokens(dialect, params);
                ts.append(&dialect.json_has(&inner, path));
            }

            Expr::JsonContains { expr, value } => {
                let inner = expr.to_tokens(dialect, params);
                let token = params.push(value.clone());
                ts.append(&dialect.json_contains(&inner, token));
            }

            Expr::RegexMatch { expr, pattern } => {
                let inner = expr.to_tokens(dialect, params);
                let token = params.push(pattern.clone());
                ts.append(&dialect.regex_match(&inner, token));
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                ts.append(&expr.to_tokens(dialect, params));
                ts.space();
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::Like).space();
                ts.append(&pattern.to_tokens(dialect, params));
            }

            Expr::InList {
                expr,
                values,
                negated,
            } => {
                ts.append(&expr.to_tokens(dialect, params));
                ts.space();
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::In).space().lparen();
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    let token = params.push(value.clone());
                    ts.push(token);
                }
                ts.rparen();
            }

            Expr::InSubquery {
                expr,
                query,
                negated,
            } => {
                ts.append(&expr.to_tokens(dialect, params));
                ts.space();
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::In).space().lparen();
                ts.append(&query.to_tokens(dialect, params));
                ts.rparen();
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens(dialect, params));
                ts.space();
                ts.push(if *negated {
                    Token::IsNotNull
                } else {
                    Token::IsNull
                });
            }

            Expr::Exists(query) => {
                ts.push(Token::Exists).space().lparen();
                ts.append(&query.to_tokens(dialect, params));
                ts.rparen();
            }

            Expr::Concat(parts) => {
                if dialect.supports_concat_operator() {
                    for (i, part) in parts.iter().enumerate() {
                        if i > 0 {
                            ts.space().push(Token::Raw("||".into())).space();
                        }
                        ts.append(&part.to_tokens(dialect, params));
                    }
                } else {
                    ts.push(Token::FunctionName("CONCAT".into()));
                    ts.lparen();
                    for (i, part) in parts.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&part.to_tokens(dialect, params));
                    }
                    ts.rparen();
                }
            }

            Expr::Star { table } => {
                if let Some(table) = table {
                    ts.push(Token::Ident(table.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens(dialect, params));
                ts.rparen();
            }

            Expr::Raw(fragment) => {
                ts.push(Token::Raw(fragment.clone()));
            }
        }
        ts
    }

    /// Serialize to SQL for a dialect, returning the parameter list.
    pub fn to_sql(&self, dialect: Dialect) -> (String, Vec<BindValue>) {
        let mut params = Params::new();
        let sql = self.to_tokens(dialect, &mut params).serialize(dialect);
        (sql, params.into_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison() {
        let expr = table_col("t", "n").gt(param(BindValue::Int(4)));
        let (sql, params) = expr.to_sql(Dialect::Sqlite);
        assert_eq!(sql, "\"t\".\"n\" > ?");
        assert_eq!(params, vec![BindValue::Int(4)]);
        let (sql, _) = expr.to_sql(Dialect::Postgres);
        assert_eq!(sql, "\"t\".\"n\" > $1");
    }

    #[test]
    fn test_param_ordering() {
        let expr = col("a")
            .eq(param(BindValue::Int(1)))
            .and(col("b").eq(param(BindValue::Int(2))));
        let (sql, params) = expr.to_sql(Dialect::Postgres);
        assert_eq!(sql, "\"a\" = $1 AND \"b\" = $2");
        assert_eq!(params, vec![BindValue::Int(1), BindValue::Int(2)]);
    }

    #[test]
    fn test_json_extract_per_dialect() {
        let expr = Expr::JsonExtract {
            expr: Box::new(table_col("t", "d")),
            path: vec![JsonSegment::Key("x".into())],
        };
        let (sql, _) = expr.to_sql(Dialect::Sqlite);
        assert_eq!(sql, "json_extract(\"t\".\"d\", '$.x')");
        let (sql, _) = expr.to_sql(Dialect::Postgres);
        assert_eq!(sql, "(\"t\".\"d\"::json #>> '{x}')");
        let (sql, _) = expr.to_sql(Dialect::MySql);
        assert_eq!(sql, "JSON_UNQUOTE(JSON_EXTRACT(`t`.`d`, '$.x'))");
    }

    #[test]
    fn test_concat_per_dialect() {
        let expr = Expr::Concat(vec![
            Expr::LitString("%".into()),
            param(BindValue::Str("foo".into())),
        ]);
        let (sql, _) = expr.to_sql(Dialect::Sqlite);
        assert_eq!(sql, "'%' || ?");
        let (sql, _) = expr.to_sql(Dialect::MySql);
        assert_eq!(sql, "CONCAT('%', ?)");
    }

    #[test]
    fn test_in_list() {
        let expr = Expr::InList {
            expr: Box::new(col("n")),
            values: vec![BindValue::Int(1), BindValue::Int(2)],
            negated: true,
        };
        let (sql, params) = expr.to_sql(Dialect::Sqlite);
        assert_eq!(sql, "\"n\" NOT IN (?, ?)");
        assert_eq!(params.len(), 2);
    }
}
