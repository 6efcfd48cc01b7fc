//! Text canonicalization for comparing extracted page text against cleaned-up passages.
//!
//! Every normalization is built as a sequence of passes over `(char, source_index)` pairs, so
//! the result remembers where each output character came from. A match found in normalized
//! space is mapped back to the original page text through that record instead of being
//! searched for a second time.

use std::ops::Range;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Every quotation-mark-family character is folded to this sentinel.
pub const QUOTE_SENTINEL: char = '@';

type Tracked = Vec<(char, usize)>;

/// Collapse every run of Unicode whitespace to a single ASCII space.
///
/// ```
/// use spanlight::normalize::normalize_whitespace;
///
/// assert_eq!(normalize_whitespace("Hello,   world!\nThis"), "Hello, world! This");
/// ```
pub fn normalize_whitespace(s: &str) -> String {
    Normalized::whitespace(s).into_string()
}

/// Aggressive normalization for matching PDF text against re-flowed text.
///
/// Folds quotes and dashes, drops soft hyphens, rejoins words hyphenated across a line break,
/// collapses whitespace, tightens spacing before clause punctuation and trims. Case is left
/// alone.
///
/// ```
/// use spanlight::normalize::normalize_aggressive;
///
/// assert_eq!(normalize_aggressive("it sug-\ngests \u{201C}free will\u{201D} ."), "it suggests @free will@.");
/// ```
pub fn normalize_aggressive(s: &str) -> String {
    Normalized::aggressive(s).into_string()
}

/// Normalized text plus, for every output character, the index of the source character it
/// derives from. Indices are in chars, not bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    text: String,
    origin: Vec<usize>,
    source_len: usize,
}

impl Normalized {
    /// Identity view of `s`.
    pub fn raw(s: &str) -> Self {
        Self::from_tracked(track(s), s.chars().count())
    }

    /// Whitespace-collapsed view of `s`.
    pub fn whitespace(s: &str) -> Self {
        Self::from_tracked(collapse_whitespace(track(s)), s.chars().count())
    }

    /// Aggressively normalized view of `s`.
    pub fn aggressive(s: &str) -> Self {
        let tracked = compose(track(s));
        let tracked = fold_symbols(tracked);
        let tracked = join_hyphenated(tracked);
        let tracked = collapse_whitespace(tracked);
        let tracked = tighten_punctuation(tracked);
        let tracked = trim(tracked);
        // A combining mark can end up next to a new base once whitespace is removed.
        let tracked = compose(tracked);
        Self::from_tracked(tracked, s.chars().count())
    }

    /// Lowercased copy; multi-char lowercase expansions share the origin of their source char.
    pub fn folded(&self) -> Self {
        let tracked: Tracked = self
            .text
            .chars()
            .zip(self.origin.iter().copied())
            .flat_map(|(c, o)| c.to_lowercase().map(move |l| (l, o)))
            .collect();
        Self::from_tracked(tracked, self.source_len)
    }

    fn from_tracked(tracked: Tracked, source_len: usize) -> Self {
        let mut text = String::with_capacity(tracked.len());
        let mut origin = Vec::with_capacity(tracked.len());
        for (c, o) in tracked {
            text.push(c);
            origin.push(o);
        }
        Self {
            text,
            origin,
            source_len,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn chars(&self) -> Vec<char> {
        self.text.chars().collect()
    }

    /// Length in chars.
    pub fn len(&self) -> usize {
        self.origin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origin.is_empty()
    }

    /// Char length of the text this view was derived from.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Char position of the first occurrence of `needle`.
    pub fn find(&self, needle: &str) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        self.text
            .find(needle)
            .map(|byte| self.text[..byte].chars().count())
    }

    /// Char positions of non-overlapping occurrences of `needle`, at most `limit` of them
    /// (`0` means unlimited).
    pub fn find_all(&self, needle: &str, limit: usize) -> Vec<usize> {
        if needle.is_empty() {
            return Vec::new();
        }

        let mut positions = Vec::new();
        let mut last_byte = 0;
        let mut last_char = 0;
        for (byte, _) in self.text.match_indices(needle) {
            last_char += self.text[last_byte..byte].chars().count();
            last_byte = byte;
            positions.push(last_char);
            if limit > 0 && positions.len() >= limit {
                break;
            }
        }
        positions
    }

    /// Map a char range of this view back to a char range of the source text.
    ///
    /// The end extends up to the next surviving character, so trailing marks or deleted
    /// whitespace that belonged to the last matched character are covered.
    pub fn source_range(&self, start: usize, end: usize) -> Range<usize> {
        let end = end.min(self.origin.len());
        if start >= end {
            let at = self.origin.get(start).copied().unwrap_or(self.source_len);
            return at..at;
        }

        let source_start = self.origin[start];
        let last = self.origin[end - 1] + 1;
        let source_end = match self.origin.get(end) {
            Some(&next) => next.max(last),
            None => last,
        };
        source_start..source_end.min(self.source_len)
    }
}

fn track(s: &str) -> Tracked {
    s.chars().enumerate().map(|(i, c)| (c, i)).collect()
}

fn is_quote(c: char) -> bool {
    matches!(
        c,
        '"' | '\'' | '`' | '\u{00B4}' | '\u{2018}'..='\u{201F}'
    )
}

fn is_dash(c: char) -> bool {
    matches!(
        c,
        '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{FE58}' | '\u{FE63}' | '\u{FF0D}'
    )
}

fn is_clause_punctuation(c: char) -> bool {
    matches!(c, ',' | '.' | '!' | '?' | ';' | ':')
}

/// Canonical composition per base character and its trailing combining marks.
fn compose(input: Tracked) -> Tracked {
    if !input.iter().any(|&(c, _)| is_combining_mark(c)) {
        return input;
    }

    let mut out = Vec::with_capacity(input.len());
    let mut cluster = String::new();
    let mut cluster_origin = 0;

    for (c, i) in input {
        if is_combining_mark(c) && !cluster.is_empty() {
            cluster.push(c);
            continue;
        }
        out.extend(cluster.nfc().map(|n| (n, cluster_origin)));
        cluster.clear();
        cluster.push(c);
        cluster_origin = i;
    }
    out.extend(cluster.nfc().map(|n| (n, cluster_origin)));
    out
}

fn fold_symbols(input: Tracked) -> Tracked {
    input
        .into_iter()
        .filter_map(|(c, i)| match c {
            '\u{00AD}' => None,
            c if is_quote(c) => Some((QUOTE_SENTINEL, i)),
            c if is_dash(c) => Some(('-', i)),
            c => Some((c, i)),
        })
        .collect()
}

/// `sug-\n gests` → `suggests`: a hyphen followed by whitespace is dropped together with the
/// whitespace.
fn join_hyphenated(input: Tracked) -> Tracked {
    let mut out = Vec::with_capacity(input.len());
    let mut iter = input.into_iter().peekable();

    while let Some((c, i)) = iter.next() {
        if c == '-' && iter.peek().is_some_and(|&(n, _)| n.is_whitespace()) {
            while iter.peek().is_some_and(|&(n, _)| n.is_whitespace()) {
                iter.next();
            }
            continue;
        }
        out.push((c, i));
    }
    out
}

fn collapse_whitespace(input: Tracked) -> Tracked {
    let mut out = Vec::with_capacity(input.len());
    let mut in_run = false;

    for (c, i) in input {
        if c.is_whitespace() {
            if !in_run {
                out.push((' ', i));
                in_run = true;
            }
        } else {
            out.push((c, i));
            in_run = false;
        }
    }
    out
}

/// Input is whitespace-collapsed, so a single space before punctuation is the only case and
/// spacing after punctuation is already exactly one space.
fn tighten_punctuation(input: Tracked) -> Tracked {
    let mut out: Tracked = Vec::with_capacity(input.len());
    for (c, i) in input {
        if is_clause_punctuation(c) {
            while out.last().is_some_and(|&(p, _)| p == ' ') {
                out.pop();
            }
        }
        out.push((c, i));
    }
    out
}

fn trim(mut input: Tracked) -> Tracked {
    while input.last().is_some_and(|&(c, _)| c == ' ') {
        input.pop();
    }
    let leading = input.iter().take_while(|&&(c, _)| c == ' ').count();
    input.drain(..leading);
    input
}
