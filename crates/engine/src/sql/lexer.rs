//! MySQL-flavoured tokenizer with byte offsets.
//!
//! Quoting and comment rules follow MySQL: `'..'` and `".."` are strings
//! (backslash escapes and doubled quotes), backticks quote identifiers,
//! `-- ` (dash dash + whitespace), `#` and `/* */` are comments.
//! Unterminated quotes and comments run to the end of input.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Keyword or bare identifier.
    Word,
    /// Backtick-quoted identifier.
    QuotedIdent,
    Str,
    Number,
    Punct,
    Semicolon,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl<'a> Token<'a> {
    /// Case-insensitive keyword match.
    pub fn is_kw(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_ident(&self) -> bool {
        matches!(self.kind, TokenKind::Word | TokenKind::QuotedIdent)
    }

    /// Identifier text with backtick quoting removed.
    pub fn ident(&self) -> String {
        match self.kind {
            TokenKind::QuotedIdent => {
                let inner = self.text.strip_prefix('`').unwrap_or(self.text);
                let inner = inner.strip_suffix('`').unwrap_or(inner);
                inner.replace("``", "`")
            }
            _ => self.text.to_string(),
        }
    }
}

const MULTI_PUNCT: [&str; 10] = ["<=>", "<=", ">=", "<>", "!=", ":=", "||", "&&", "<<", ">>"];

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Tokenize `src`, keeping comments (whitespace is dropped).
pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let start = i;

        let kind = match b {
            _ if b.is_ascii_whitespace() => {
                i += 1;
                continue;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-')
                && bytes.get(i + 2).map_or(true, |c| c.is_ascii_whitespace()) =>
            {
                i = line_end(bytes, i);
                TokenKind::Comment
            }
            b'#' => {
                i = line_end(bytes, i);
                TokenKind::Comment
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = match src[i + 2..].find("*/") {
                    Some(off) => i + 2 + off + 2,
                    None => bytes.len(),
                };
                TokenKind::Comment
            }
            b'\'' | b'"' => {
                i = quoted_end(bytes, i, b, true);
                TokenKind::Str
            }
            b'`' => {
                i = quoted_end(bytes, i, b'`', false);
                TokenKind::QuotedIdent
            }
            b';' => {
                i += 1;
                TokenKind::Semicolon
            }
            _ if b.is_ascii_digit()
                || (b == b'.' && bytes.get(i + 1).is_some_and(|c| c.is_ascii_digit())) =>
            {
                i = number_end(bytes, i);
                // `1st_table` style identifiers start with digits.
                if bytes.get(i).is_some_and(|c| is_ident_byte(*c)) {
                    while i < bytes.len() && is_ident_byte(bytes[i]) {
                        i += 1;
                    }
                    TokenKind::Word
                } else {
                    TokenKind::Number
                }
            }
            _ if is_ident_byte(b) => {
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
                TokenKind::Word
            }
            _ => {
                let rest = &src[i..];
                let len = MULTI_PUNCT
                    .iter()
                    .find(|p| rest.starts_with(*p))
                    .map_or(1, |p| p.len());
                i += len;
                TokenKind::Punct
            }
        };

        tokens.push(Token { kind, text: &src[start..i], start, end: i });
    }
    tokens
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&c| c == b'\n')
        .map_or(bytes.len(), |off| from + off)
}

/// Offset just past the closing quote. A doubled quote is an escaped quote.
fn quoted_end(bytes: &[u8], open: usize, quote: u8, backslash: bool) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        let c = bytes[i];
        if backslash && c == b'\\' {
            i += 2;
            continue;
        }
        if c == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn number_end(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    if bytes[i] == b'0' && matches!(bytes.get(i + 1), Some(b'x' | b'X')) {
        i += 2;
        while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
            i += 1;
        }
        return i;
    }
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        if bytes.get(j).is_some_and(|c| c.is_ascii_digit()) {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

/// Non-comment tokens.
pub(crate) fn meaningful<'a>(tokens: &[Token<'a>]) -> Vec<Token<'a>> {
    tokens.iter().copied().filter(|t| t.kind != TokenKind::Comment).collect()
}
