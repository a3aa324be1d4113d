//! Portable-to-native placeholder rewriting.
//!
//! Statements are written with `?` positional placeholders and backtick
//! quoted identifiers. MySQL and SQLite accept that form as is. PostgreSQL
//! wants `$1, $2, ...` and double-quoted identifiers, so the statement is
//! tokenized (with [sqlparser](https://docs.rs/sqlparser/)) and only
//! placeholder and identifier tokens are replaced. A `?` inside a string
//! literal or a quoted identifier is never a placeholder token, so it
//! survives untouched.

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Word};
use std::borrow::Cow;

const PORTABLE_PLACEHOLDER: &str = "?";

/// Rewrite a portable statement into the backend's native syntax.
pub fn to_native(sql: &str, db_type: DatabaseType) -> DbResult<Cow<'_, str>> {
    match db_type {
        DatabaseType::MySQL | DatabaseType::SQLite => Ok(Cow::Borrowed(sql)),
        DatabaseType::PostgreSQL => rewrite_for_postgres(sql).map(Cow::Owned),
    }
}

fn rewrite_for_postgres(sql: &str) -> DbResult<String> {
    // Unescape off keeps literal text byte-for-byte when tokens are rendered back.
    let tokens = Tokenizer::new(&MySqlDialect {}, sql)
        .with_unescape(false)
        .tokenize()
        .map_err(|e| DbError::invalid_input(format!("Failed to tokenize SQL: {}", e)))?;

    let mut position = 0usize;
    let mut out = String::with_capacity(sql.len() + 8);
    for token in tokens {
        let rendered = match token {
            Token::Placeholder(p) if p == PORTABLE_PLACEHOLDER => {
                position += 1;
                Token::Placeholder(format!("${}", position))
            }
            Token::Word(word) if word.quote_style == Some('`') => Token::Word(Word {
                value: word.value.replace("``", "`").replace('"', "\"\""),
                quote_style: Some('"'),
                ..word
            }),
            other => other,
        };
        out.push_str(&rendered.to_string());
    }
    Ok(out)
}
