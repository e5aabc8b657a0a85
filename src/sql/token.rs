//! SQL tokens - the atomic units of SQL output.
//!
//! Tokens are dialect-agnostic representations that serialize to
//! dialect-specific strings. Bound values never appear in the token
//! stream; they travel separately and surface as [`Token::Param`]
//! placeholders rendered in the dialect's placeholder style.

use super::dialect::{Dialect, SqlDialect};

/// A SQL token.
///
/// Adding a new variant here will cause compile errors everywhere
/// it needs to be handled (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    On,
    Join,
    Inner,
    Left,
    GroupBy,
    OrderBy,
    Asc,
    Desc,
    In,
    Like,
    IsNull,
    IsNotNull,
    Distinct,
    Exists,
    Null,

    // === DDL keywords ===
    Create,
    Drop,
    Table,
    Index,
    Database,
    Constraint,
    PrimaryKey,
    References,
    Unique,
    IfNotExists,
    IfExists,

    // === DML keywords ===
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Returning,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,

    // === Whitespace ===
    Space,

    // === Dynamic content ===
    /// Quoted identifier (table, column, alias).
    Ident(String),
    /// Qualified column reference: table.column.
    QualifiedIdent { table: String, column: String },
    /// Integer literal (limits, offsets, json indexes).
    LitInt(i64),
    /// String literal (json paths, LIKE fragments).
    LitString(String),
    /// Bound parameter, 1-based.
    Param(usize),
    /// Function name, rendered as-is.
    FunctionName(String),

    // === Escape hatch ===
    /// Raw SQL passed directly to output without escaping. Never carries
    /// user input; only trusted dialect-specific fragments.
    Raw(String),
}

impl Token {
    /// Serialize this token to a string for the given dialect.
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::Not => "NOT".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Join => "JOIN".into(),
            Token::Inner => "INNER".into(),
            Token::Left => "LEFT".into(),
            Token::GroupBy => "GROUP BY".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Asc => "ASC".into(),
            Token::Desc => "DESC".into(),
            Token::In => "IN".into(),
            Token::Like => "LIKE".into(),
            Token::IsNull => "IS NULL".into(),
            Token::IsNotNull => "IS NOT NULL".into(),
            Token::Distinct => "DISTINCT".into(),
            Token::Exists => "EXISTS".into(),
            Token::Null => "NULL".into(),

            Token::Create => "CREATE".into(),
            Token::Drop => "DROP".into(),
            Token::Table => "TABLE".into(),
            Token::Index => "INDEX".into(),
            Token::Database => "DATABASE".into(),
            Token::Constraint => "CONSTRAINT".into(),
            Token::PrimaryKey => "PRIMARY KEY".into(),
            Token::References => "REFERENCES".into(),
            Token::Unique => "UNIQUE".into(),
            Token::IfNotExists => "IF NOT EXISTS".into(),
            Token::IfExists => "IF EXISTS".into(),

            Token::Insert => "INSERT".into(),
            Token::Into => "INTO".into(),
            Token::Values => "VALUES".into(),
            Token::Update => "UPDATE".into(),
            Token::Set => "SET".into(),
            Token::Delete => "DELETE".into(),
            Token::Returning => "RETURNING".into(),

            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Star => "*".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            Token::Eq => "=".into(),
            Token::Ne => "<>".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Le => "<=".into(),
            Token::Ge => ">=".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Mul => "*".into(),
            Token::Div => "/".into(),
            Token::Mod => "%".into(),

            Token::Space => " ".into(),

            Token::Ident(name) => dialect.quote_identifier(name),
            Token::QualifiedIdent { table, column } => format!(
                "{}.{}",
                dialect.quote_identifier(table),
                dialect.quote_identifier(column)
            ),
            Token::LitInt(n) => n.to_string(),
            Token::LitString(s) => format!("'{}'", s.replace('\'', "''")),
            Token::Param(index) => dialect.placeholder(*index),
            Token::FunctionName(name) => name.clone(),

            Token::Raw(s) => s.clone(),
        }
    }
}

/// A stream of tokens that can be serialized to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Extend with multiple tokens.
    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    /// Serialize all tokens to a SQL string.
    pub fn serialize(&self, dialect: Dialect) -> String {
        self.tokens.iter().map(|t| t.serialize(dialect)).collect()
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_serialize() {
        assert_eq!(Token::Select.serialize(Dialect::Sqlite), "SELECT");
        assert_eq!(Token::OrderBy.serialize(Dialect::MySql), "ORDER BY");
    }

    #[test]
    fn test_ident_serialize() {
        let token = Token::Ident("users".into());
        assert_eq!(token.serialize(Dialect::Sqlite), "\"users\"");
        assert_eq!(token.serialize(Dialect::Postgres), "\"users\"");
        assert_eq!(token.serialize(Dialect::MySql), "`users`");
    }

    #[test]
    fn test_param_serialize() {
        assert_eq!(Token::Param(1).serialize(Dialect::Sqlite), "?");
        assert_eq!(Token::Param(3).serialize(Dialect::Postgres), "$3");
        assert_eq!(Token::Param(3).serialize(Dialect::MySql), "?");
    }

    #[test]
    fn test_string_literal_escaping() {
        assert_eq!(
            Token::LitString("it's".into()).serialize(Dialect::Postgres),
            "'it''s'"
        );
    }

    #[test]
    fn test_token_stream() {
        let mut ts = TokenStream::new();
        ts.push(Token::Select)
            .space()
            .push(Token::Ident("name".into()))
            .space()
            .push(Token::From)
            .space()
            .push(Token::Ident("users".into()));
        assert_eq!(
            ts.serialize(Dialect::Postgres),
            "SELECT \"name\" FROM \"users\""
        );
    }
}
