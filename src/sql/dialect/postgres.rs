//! PostgreSQL dialect.
//!
//! JSON columns are stored as text and cast on access: `#>>` yields the
//! extracted value as text, `@>` on a jsonb cast handles array
//! membership. Placeholders are numbered (`$1`, `$2`, …).

use super::{JsonSegment, SqlDialect};
use crate::schema::ColumnType;
use crate::sql::token::{Token, TokenStream};

#[derive(Debug)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn json_extract(&self, column: &TokenStream, path: &[JsonSegment]) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.lparen();
        ts.append(column);
        ts.push(Token::Raw("::json".into()));
        ts.space().push(Token::Raw("#>>".into())).space();
        ts.push(Token::LitString(brace_path(path)));
        ts.rparen();
        ts
    }

    fn json_has(&self, column: &TokenStream, path: &[JsonSegment]) -> TokenStream {
        let mut ts = self.json_extract(column, path);
        ts.space().push(Token::IsNotNull);
        ts
    }

    fn json_contains(&self, column: &TokenStream, param: Token) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.lparen();
        ts.append(column);
        ts.push(Token::Raw("::jsonb".into()));
        ts.rparen();
        ts.space().push(Token::Raw("@>".into())).space();
        ts.push(param);
        ts.push(Token::Raw("::jsonb".into()));
        ts
    }

    fn regex_match(&self, column: &TokenStream, param: Token) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.append(column);
        ts.space().push(Token::Raw("~".into())).space();
        ts.push(param);
        ts
    }

    fn cast_double(&self, expr: &TokenStream) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.lparen();
        ts.append(expr);
        ts.rparen();
        ts.push(Token::Raw("::double precision".into()));
        ts
    }

    fn cast_binary(&self, expr: &TokenStream) -> TokenStream {
        // There is no text-to-bytea cast; convert_to encodes the string.
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("convert_to".into()));
        ts.lparen();
        ts.append(expr);
        ts.comma().space();
        ts.push(Token::LitString("UTF8".into()));
        ts.rparen();
        ts
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
            ColumnType::Binary => "BYTEA".into(),
            ColumnType::BackRef | ColumnType::ManyToMany => {
                unreachable!("virtual columns have no storage type")
            }
        }
    }

    fn auto_pk(&self) -> &'static str {
        "BIGSERIAL PRIMARY KEY"
    }
}

/// Render a path in the `{a,0,b}` form `#>>` expects.
fn brace_path(path: &[JsonSegment]) -> String {
    let parts: Vec<String> = path
        .iter()
        .map(|segment| match segment {
            JsonSegment::Key(key) => key.clone(),
            JsonSegment::Index(index) => index.to_string(),
        })
        .collect();
    format!("{{{}}}", parts.join(","))
}
