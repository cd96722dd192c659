use super::classify::classify;
use super::lexer::{tokenize, TokenKind};
use super::stream::Stream;
use super::{
    fingerprint, rewrite, tables, Classification, SqlExtractor, SqlSplitter, TableConstraint,
    TableRef, WhereColumns,
};
use crate::error::SqlError;

/// Token-based splitter and extractor for the MySQL dialect.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalSql;

impl LexicalSql {
    pub fn new() -> Self {
        Self
    }

    fn stream(sql: &str) -> Result<Stream<'_>, SqlError> {
        let s = Stream::new(sql);
        if s.is_empty() {
            return Err(SqlError::Empty);
        }
        Ok(s)
    }
}

impl SqlSplitter for LexicalSql {
    fn split(&self, text: &str) -> Vec<String> {
        let mut statements = Vec::new();
        let mut current = String::new();
        // End of the last kept token; `None` at the start of a statement.
        let mut cursor: Option<usize> = None;
        let mut after_comment = false;

        for tok in tokenize(text) {
            match tok.kind {
                TokenKind::Semicolon => {
                    let stmt = current.trim();
                    if !stmt.is_empty() {
                        statements.push(stmt.to_string());
                    }
                    current.clear();
                    cursor = None;
                    after_comment = false;
                }
                TokenKind::Comment => {
                    after_comment = cursor.is_some();
                }
                _ => {
                    if let Some(c) = cursor {
                        // A comment and its surrounding blanks collapse to one space.
                        if after_comment {
                            current.push(' ');
                        } else {
                            current.push_str(&text[c..tok.start]);
                        }
                    }
                    current.push_str(tok.text);
                    cursor = Some(tok.end);
                    after_comment = false;
                }
            }
        }

        let stmt = current.trim();
        if !stmt.is_empty() {
            statements.push(stmt.to_string());
        }
        statements
    }
}

impl SqlExtractor for LexicalSql {
    fn classify(&self, sql: &str) -> Result<Classification, SqlError> {
        classify(&Self::stream(sql)?)
    }

    fn touched_tables(&self, sql: &str, default_db: &str) -> Result<Vec<TableRef>, SqlError> {
        let s = Self::stream(sql)?;
        let class = classify(&s)?;
        Ok(tables::touched(&s, &class, default_db).0)
    }

    fn related_tables(&self, sql: &str, default_db: &str) -> Result<Vec<TableRef>, SqlError> {
        let s = Self::stream(sql)?;
        let class = classify(&s)?;
        Ok(tables::related(&s, &class, default_db))
    }

    fn where_columns(&self, sql: &str, default_db: &str) -> Result<WhereColumns, SqlError> {
        let s = Self::stream(sql)?;
        let class = classify(&s)?;
        Ok(tables::where_columns(&s, &class, default_db))
    }

    fn table_constraints(&self, sql: &str) -> Result<Vec<TableConstraint>, SqlError> {
        tables::table_constraints(&Self::stream(sql)?)
    }

    fn fingerprint(&self, sql: &str) -> String {
        fingerprint(sql)
    }

    fn insert_row_count(&self, sql: &str) -> Result<i64, SqlError> {
        tables::insert_row_count(&Self::stream(sql)?)
    }

    fn to_select(&self, sql: &str) -> Result<String, SqlError> {
        rewrite::to_select(&Self::stream(sql)?)
    }

    fn to_count(&self, select: &str) -> Result<String, SqlError> {
        rewrite::to_count(&Self::stream(select)?)
    }
}
