//! SQLite dialect.
//!
//! JSON navigation goes through `json_extract`, which returns values with
//! their native affinity, so bound comparison values stay native too.
//! Regular expressions rely on the driver-registered REGEXP function.

use super::{dollar_path, JsonSegment, SqlDialect};
use crate::schema::ColumnType;
use crate::sql::token::{Token, TokenStream};

#[derive(Debug)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn json_parameters_as_text(&self) -> bool {
        false
    }

    fn json_extract(&self, column: &TokenStream, path: &[JsonSegment]) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("json_extract".into()));
        ts.lparen();
        ts.append(column);
        ts.comma().space();
        ts.push(Token::LitString(dollar_path(path)));
        ts.rparen();
        ts
    }

    fn json_has(&self, column: &TokenStream, path: &[JsonSegment]) -> TokenStream {
        // json_type is NULL for paths that don't exist.
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("json_type".into()));
        ts.lparen();
        ts.append(column);
        ts.comma().space();
        ts.push(Token::LitString(dollar_path(path)));
        ts.rparen();
        ts.space().push(Token::IsNotNull);
        ts
    }

    fn json_contains(&self, column: &TokenStream, param: Token) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Exists).space().lparen();
        ts.push(Token::Select)
            .space()
            .push(Token::LitInt(1))
            .space()
            .push(Token::From)
            .space()
            .push(Token::FunctionName("json_each".into()));
        ts.lparen();
        ts.append(column);
        ts.rparen();
        ts.space().push(Token::Where).space();
        ts.push(Token::Raw("json_each.value".into()));
        ts.space().push(Token::Eq).space().push(param);
        ts.rparen();
        ts
    }

    fn regex_match(&self, column: &TokenStream, param: Token) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.append(column);
        ts.space().push(Token::Raw("REGEXP".into())).space();
        ts.push(param);
        ts
    }

    fn cast_double(&self, expr: &TokenStream) -> TokenStream {
        cast(expr, "REAL")
    }

    fn cast_binary(&self, expr: &TokenStream) -> TokenStream {
        cast(expr, "BLOB")
    }

    fn column_type(&self, column_type: &ColumnType, length: Option<u32>) -> String {
        match column_type {
            ColumnType::Boolean => "BOOLEAN".into(),
            ColumnType::Integer | ColumnType::ForeignKey => "BIGINT".into(),
            ColumnType::Double => "DOUBLE PRECISION".into(),
            ColumnType::String | ColumnType::Json => "TEXT".into(),
            ColumnType::StringWithLength => {
                format!("VARCHAR({})", length.unwrap_or(255))
            }
            ColumnType::DateTime => "TEXT".into(),
            ColumnType::Binary => "BLOB".into(),
            ColumnType::BackRef | ColumnType::ManyToMany => {
                unreachable!("virtual columns have no storage type")
            }
        }
    }

    fn auto_pk(&self) -> &'static str {
        "INTEGER PRIMARY KEY AUTOINCREMENT"
    }
}

fn cast(expr: &TokenStream, target: &str) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName("CAST".into()));
    ts.lparen();
    ts.append(expr);
    ts.space().push(Token::As).space();
    ts.push(Token::Raw(target.into()));
    ts.rparen();
    ts
}
