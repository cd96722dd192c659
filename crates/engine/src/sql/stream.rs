use super::lexer::{meaningful, tokenize, Token, TokenKind};

/// Meaningful tokens of one statement with their parenthesis depth.
///
/// `(` and its matching `)` carry the depth of the surrounding tokens;
/// everything between them is one level deeper.
pub(super) struct Stream<'a> {
    pub src: &'a str,
    pub toks: Vec<Token<'a>>,
    depth: Vec<u32>,
}

impl<'a> Stream<'a> {
    pub fn new(src: &'a str) -> Self {
        let toks = meaningful(&tokenize(src));
        let mut depth = Vec::with_capacity(toks.len());
        let mut d: u32 = 0;
        for t in &toks {
            if t.is_punct(")") {
                d = d.saturating_sub(1);
            }
            depth.push(d);
            if t.is_punct("(") {
                d += 1;
            }
        }
        Self { src, toks, depth }
    }

    pub fn len(&self) -> usize {
        self.toks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toks.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Token<'a>> {
        self.toks.get(i)
    }

    pub fn depth(&self, i: usize) -> u32 {
        self.depth.get(i).copied().unwrap_or(0)
    }

    pub fn kw(&self, i: usize, word: &str) -> bool {
        self.get(i).is_some_and(|t| t.is_kw(word))
    }

    pub fn kw_any(&self, i: usize, words: &[&str]) -> bool {
        self.get(i).is_some_and(|t| words.iter().any(|w| t.is_kw(w)))
    }

    pub fn punct(&self, i: usize, p: &str) -> bool {
        self.get(i).is_some_and(|t| t.is_punct(p))
    }

    /// Lowercased keyword text at `i`, empty for non-words.
    pub fn word(&self, i: usize) -> String {
        match self.get(i) {
            Some(t) if t.kind == TokenKind::Word => t.text.to_ascii_lowercase(),
            _ => String::new(),
        }
    }

    /// First keyword from `words` at depth 0, starting at `from`.
    pub fn find_top(&self, from: usize, words: &[&str]) -> Option<usize> {
        (from..self.len()).find(|&i| self.depth(i) == 0 && self.kw_any(i, words))
    }

    /// Index of the `)` closing the `(` at `open`.
    pub fn close_of(&self, open: usize) -> Option<usize> {
        let d = self.depth(open);
        (open + 1..self.len()).find(|&i| self.punct(i, ")") && self.depth(i) == d)
    }

    /// Index of the `(` enclosing `i`, if any.
    pub fn open_of(&self, i: usize) -> Option<usize> {
        let d = self.depth(i);
        if d == 0 {
            return None;
        }
        (0..i).rev().find(|&j| self.punct(j, "(") && self.depth(j) == d - 1)
    }

    /// Source text from token `i` to the end.
    pub fn text_from(&self, i: usize) -> &'a str {
        match self.get(i) {
            Some(t) => self.src[t.start..].trim_end(),
            None => "",
        }
    }

    /// Source text from token `i` up to (not including) token `j`.
    pub fn text_between(&self, i: usize, j: usize) -> &'a str {
        match (self.get(i), self.get(j)) {
            (Some(a), Some(b)) if a.start <= b.start => self.src[a.start..b.start].trim(),
            (Some(_), None) => self.text_from(i),
            _ => "",
        }
    }

    /// Parse `name` or `db.name` at `i`: `(database, name, next index)`.
    pub fn object_name(&self, i: usize) -> Option<(Option<String>, String, usize)> {
        let first = self.get(i).filter(|t| t.is_ident())?;
        if self.punct(i + 1, ".") {
            if let Some(second) = self.get(i + 2).filter(|t| t.is_ident()) {
                return Some((Some(first.ident()), second.ident(), i + 3));
            }
        }
        Some((None, first.ident(), i + 1))
    }

    /// Skip an optional `IF [NOT] EXISTS`.
    pub fn skip_if_exists(&self, i: usize) -> usize {
        if self.kw(i, "if") {
            if self.kw(i + 1, "exists") {
                return i + 2;
            }
            if self.kw(i + 1, "not") && self.kw(i + 2, "exists") {
                return i + 3;
            }
        }
        i
    }
}
