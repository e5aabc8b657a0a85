//! MySQL dialect.
//!
//! Identifiers are backtick-quoted, `||` is logical OR so concatenation
//! goes through CONCAT(), RETURNING is unavailable (pks come from
//! last-insert-id plus the row offset), and unique string columns must
//! declare an explicit length. JSON values extract as unquoted text.

use super::{dollar_path, JsonSegment, SqlDialect};
use crate::schema::ColumnType;
use crate::sql::token::{Token, TokenStream};

#[derive(Debug)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn supports_concat_operator(&self) -> bool {
        false
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn unique_string_requires_length(&self) -> bool {
        true
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        // OFFSET is only valid after a LIMIT; the documented idiom for
        // "no limit" is the maximum unsigned value.
        let mut ts = TokenStream::new();
        if limit.is_none() && offset.is_none() {
            return ts;
        }
        ts.push(Token::Raw("LIMIT".into())).space();
        match limit {
            Some(limit) => {
                ts.push(Token::LitInt(limit as i64));
            }
            None => {
                ts.push(Token::Raw("18446744073709551615".into()));
            }
        }
        if let Some(offset) = offset {
            ts.space()
                .push(Token::Raw("OFFSET".into()))
                .space()
                .push(Token::LitInt(offset as i64));
        }
        ts
    }

    fn json_extract(&self, column: &TokenStream, path: &[JsonSegment]) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("JSON_UNQUOTE".into()));
        ts.lparen();
        ts.push(Token::FunctionName("JSON_EXTRACT".into()));
        ts.lparen();
        ts.append(column);
        ts.comma().space();
        ts.push(Token::LitString(dollar_path(path)));
        ts.rparen();
        ts.rparen();
        ts
    }

    fn json_has(&self, column: &TokenStream, path: &[JsonSegment]) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("JSON_CONTAINS_PATH".into()));
        ts.lparen();
        ts.append(column);
        ts.comma().space();
        ts.push(Token::LitString("one".into()));
        ts.comma().space();
        ts.push(Token::LitString(dollar_path(path)));
        ts.rparen();
        ts
    }

    fn json_contains(&self, column: &TokenStream, param: Token) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::FunctionName("JSON_CONTAINS".into()));
        ts.lparen();
        ts.append(column);
        ts.comma().space();
        ts.push(Token::FunctionName("CAST".into()));
        ts.lparen();
        ts.push(param);
        ts.space().push(Token::As).space();
        ts.push(Token::Raw("JSON".into()));
        ts.rparen();
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
        cast(expr, "DOUBLE")
    }

    fn cast_binary(&self, expr: &TokenStream) -> TokenStream {
        cast(expr, "BINARY")
    }

    fn column_type(&self, column_type: &ColumnType, length: Option<u32>) -> String {
        match column_type {
            ColumnType::Boolean => "BOOLEAN".into(),
            ColumnType::Integer | ColumnType::ForeignKey => "BIGINT".into(),
            ColumnType::Double => "DOUBLE".into(),
            ColumnType::String => "TEXT".into(),
            ColumnType::StringWithLength => {
                format!("VARCHAR({})", length.unwrap_or(255))
            }
            ColumnType::DateTime => "VARCHAR(64)".into(),
            ColumnType::Binary => "LONGBLOB".into(),
            ColumnType::Json => "LONGTEXT".into(),
            ColumnType::BackRef | ColumnType::ManyToMany => {
                unreachable!("virtual columns have no storage type")
            }
        }
    }

    fn auto_pk(&self) -> &'static str {
        "BIGINT AUTO_INCREMENT PRIMARY KEY"
    }

    fn index_prefix_length(&self) -> Option<u32> {
        Some(255)
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
