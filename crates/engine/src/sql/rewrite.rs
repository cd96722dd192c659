//! DML to query rewrites used for affected-row estimation.

use super::stream::Stream;
use crate::error::SqlError;

fn strip(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim_end().to_string()
}

/// `DELETE ... FROM t WHERE ..` and `UPDATE t SET .. WHERE ..` become
/// `SELECT * FROM t WHERE ..`; `INSERT ... SELECT` yields its query.
pub(super) fn to_select(s: &Stream<'_>) -> Result<String, SqlError> {
    let verb = s.word(0);
    match verb.as_str() {
        "select" | "with" => Ok(strip(s.src)),
        "" if s.punct(0, "(") => Ok(strip(s.src)),
        "delete" => {
            let from = s
                .find_top(1, &["from"])
                .ok_or_else(|| SqlError::NotRewritable("delete without FROM".into()))?;
            Ok(strip(&format!("SELECT * {}", s.text_from(from))))
        }
        "update" => {
            let set = s
                .find_top(1, &["set"])
                .ok_or_else(|| SqlError::NotRewritable("update without SET".into()))?;
            let mut first = 1;
            while s.kw_any(first, &["low_priority", "ignore"]) {
                first += 1;
            }
            let refs = s.text_between(first, set);
            let select = match s.find_top(set + 1, &["where"]) {
                Some(w) => format!("SELECT * FROM {} {}", refs, s.text_from(w)),
                None => format!("SELECT * FROM {}", refs),
            };
            Ok(strip(&select))
        }
        "insert" | "replace" => {
            let select = (1..s.len())
                .find(|&i| s.kw(i, "select"))
                .ok_or_else(|| SqlError::NotRewritable(format!("{} without a query source", verb)))?;
            if s.depth(select) == 0 {
                return Ok(strip(s.text_from(select)));
            }
            // INSERT INTO t (SELECT ...): cut at the closing parenthesis.
            let close = (select + 1..s.len())
                .find(|&j| s.punct(j, ")") && s.depth(j) + 1 == s.depth(select));
            Ok(match close {
                Some(close) => strip(s.text_between(select, close)),
                None => strip(s.text_from(select)),
            })
        }
        _ => Err(SqlError::NotRewritable(format!(
            "'{}' statements have no query form",
            s.get(0).map(|t| t.text).unwrap_or_default()
        ))),
    }
}

/// Replace the select list with `COUNT(*) AS row_count`.
pub(super) fn to_count(s: &Stream<'_>) -> Result<String, SqlError> {
    if !s.kw(0, "select") {
        return Err(SqlError::NotRewritable("only plain SELECT can be counted".into()));
    }
    let from = s
        .find_top(1, &["from"])
        .ok_or_else(|| SqlError::NotRewritable("query without FROM".into()))?;
    Ok(strip(&format!("SELECT COUNT(*) AS row_count {}", s.text_from(from))))
}
