use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use super::lexer::{tokenize, TokenKind};

/// A parenthesised group allowing one level of nesting: `(1, now(), 'a')`.
const GROUP: &str = r"\((?:[^()]|\([^()]*\))*\)";

static VALUES_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\bvalues?\s*{GROUP}(?:\s*,\s*{GROUP})*")).expect("values regex is valid")
});

static IN_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bin\s*\(\s*\?(?:\s*,\s*\?)*\s*\)").expect("in-list regex is valid")
});

/// Normalized signature: lowercase, literals as `?`, single spaces,
/// value tuples as `values(?+)`, literal `IN` lists as `in(?+)`, no
/// trailing `;`.
pub fn fingerprint(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last_end = None;
    let mut gap = false;

    for tok in tokenize(sql) {
        if let Some(end) = last_end {
            if end < tok.start {
                gap = true;
            }
        }
        last_end = Some(tok.end);
        if tok.kind == TokenKind::Comment {
            gap = true;
            continue;
        }
        if gap && !out.is_empty() {
            out.push(' ');
        }
        gap = false;
        match tok.kind {
            TokenKind::Str | TokenKind::Number => out.push('?'),
            _ => out.push_str(&tok.text.to_lowercase()),
        }
    }

    let out = VALUES_LIST.replace_all(&out, "values(?+)");
    let out = IN_LIST.replace_all(&out, "in(?+)");
    let out = out.trim();
    out.strip_suffix(';').unwrap_or(out).trim_end().to_string()
}

/// Short stable id of a fingerprint: 16 uppercase hex digits.
pub fn fingerprint_id(fingerprint: &str) -> String {
    let digest = Sha256::digest(fingerprint.as_bytes());
    hex_upper(&digest[..8])
}

/// Statement id: hex SHA-256 of the statement text.
pub fn statement_id(sql: &str) -> String {
    Sha256::digest(sql.as_bytes()).iter().map(|b| format!("{:02x}", b)).collect()
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
