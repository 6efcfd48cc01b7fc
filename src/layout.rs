//! Word geometry: offset validation, mapping page text onto words, and visual lines.
//!
//! Lines are grouped from word boxes (or extractor line tags) and kept in an R-tree so the
//! anchor locator can ask for every line inside a vertical band.

use std::ops::Range;

use rstar::{RTree, RTreeObject, AABB};
use tracing::{event, Level};

use crate::error::{Error, Result};
use crate::geo::Rect;
use crate::logging::LAYOUT;
use crate::page::Word;

/// How far ahead in the word stream a page-text character may be matched before it is treated
/// as text the words do not cover.
const ALIGN_LOOKAHEAD: usize = 8;

/// Ordered words with validated character offsets.
#[derive(Debug, Clone, Copy)]
pub struct WordIndex<'p> {
    words: &'p [Word],
}

impl<'p> WordIndex<'p> {
    /// Validate the join convention: every range is non-empty and each word starts exactly one
    /// unit after the previous one ends.
    pub fn build(words: &'p [Word]) -> Result<Self> {
        for (index, word) in words.iter().enumerate() {
            if word.char_start >= word.char_end {
                return Err(Error::InconsistentOffsets {
                    index,
                    reason: format!("empty range {}..{}", word.char_start, word.char_end),
                });
            }
            if index > 0 {
                let previous_end = words[index - 1].char_end;
                if word.char_start != previous_end + 1 {
                    return Err(Error::InconsistentOffsets {
                        index,
                        reason: format!(
                            "starts at {} but previous word ends at {}",
                            word.char_start, previous_end
                        ),
                    });
                }
            }
        }
        Ok(Self { words })
    }

    pub fn words(&self) -> &'p [Word] {
        self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Indices of the words overlapping `start..end`. Contiguous because offsets are sorted.
    pub fn word_span(&self, start: usize, end: usize) -> Range<usize> {
        let first = self.words.partition_point(|w| w.char_end <= start);
        let last = self.words.partition_point(|w| w.char_start < end);
        first..last.max(first)
    }

    /// Rectangle of every word with `char_end > start && char_start < end`, in word order.
    pub fn words_in_range(&self, start: usize, end: usize) -> Vec<Rect> {
        self.words[self.word_span(start, end)]
            .iter()
            .map(|w| w.rect)
            .collect()
    }
}

/// Maps page-text character positions into word-offset space.
///
/// Page text may use any whitespace between words (line breaks, runs of spaces) while word
/// offsets assume single spaces. Non-whitespace characters are paired with word characters in
/// order; characters the word stream does not contain map to nothing.
#[derive(Debug, Clone)]
pub struct TextAlignment {
    map: Vec<Option<usize>>,
}

impl TextAlignment {
    pub fn build(text: &str, words: &[Word]) -> Self {
        let word_chars: Vec<(char, usize)> = words
            .iter()
            .flat_map(|w| {
                let last = w.char_end.saturating_sub(1);
                w.text
                    .chars()
                    .enumerate()
                    .map(move |(i, c)| (c, (w.char_start + i).min(last)))
            })
            .filter(|(c, _)| !c.is_whitespace())
            .collect();

        let mut map = Vec::with_capacity(text.len());
        let mut cursor = 0;
        let mut unmatched = 0usize;

        for c in text.chars() {
            if c.is_whitespace() {
                map.push(None);
                continue;
            }
            let found = word_chars[cursor..]
                .iter()
                .take(ALIGN_LOOKAHEAD)
                .position(|&(w, _)| w == c);
            match found {
                Some(skip) => {
                    map.push(Some(word_chars[cursor + skip].1));
                    cursor += skip + 1;
                }
                None => {
                    unmatched += 1;
                    map.push(None);
                }
            }
        }

        if unmatched > 0 {
            event!(
                target: LAYOUT,
                Level::DEBUG,
                unmatched,
                text_chars = map.len(),
                "Page text has characters not covered by words"
            );
        }

        Self { map }
    }

    /// Word-offset range covered by the page-text range `start..end`, `None` when no character
    /// in it belongs to a word.
    pub fn to_word_range(&self, start: usize, end: usize) -> Option<Range<usize>> {
        let end = end.min(self.map.len());
        let start = start.min(end);
        let mut mapped = self.map[start..end].iter().flatten().copied();
        let first = mapped.next()?;
        let (min, max) = mapped.fold((first, first), |(lo, hi), o| (lo.min(o), hi.max(o)));
        Some(min..max + 1)
    }
}

/// A visual line: a run of consecutive words and their bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub rect: Rect,
    pub words: Range<usize>,
}

impl TextLine {
    pub fn from_words(words: &[Word], range: Range<usize>) -> Self {
        let mut line_min_x = f32::MAX;
        let mut line_min_y = f32::MAX;
        let mut line_max_x = f32::MIN;
        let mut line_max_y = f32::MIN;

        for word in &words[range.clone()] {
            line_min_x = line_min_x.min(word.rect.left());
            line_max_x = line_max_x.max(word.rect.right());
            line_min_y = line_min_y.min(word.rect.top());
            line_max_y = line_max_y.max(word.rect.bottom());
        }

        let line = TextLine {
            rect: Rect::from_points(line_min_x, line_min_y, line_max_x, line_max_y),
            words: range,
        };

        event!(
            target: LAYOUT,
            Level::TRACE,
            first_word = line.words.start,
            word_count = line.words.len(),
            "Created text line at y={:.1}",
            line.rect.y
        );

        line
    }
}

/// Group words into lines.
///
/// Words tagged with extractor block/line numbers are grouped by those. Otherwise a new line
/// starts when a word's top differs from the line's first word by at least
/// `line_join_threshold` or when the word starts left of its predecessor.
pub fn group_words_into_lines(words: &[Word], line_join_threshold: f32) -> Vec<TextLine> {
    if words.is_empty() {
        return Vec::new();
    }

    let tagged = words.iter().all(|w| w.block.is_some() && w.line.is_some());
    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut last_y = words[0].rect.top();

    for i in 1..words.len() {
        let (prev, word) = (&words[i - 1], &words[i]);
        let breaks = if tagged {
            (prev.block, prev.line) != (word.block, word.line)
        } else {
            (last_y - word.rect.top()).abs() >= line_join_threshold
                || word.rect.left() < prev.rect.left()
        };
        if breaks {
            lines.push(TextLine::from_words(words, line_start..i));
            line_start = i;
            last_y = word.rect.top();
        }
    }
    lines.push(TextLine::from_words(words, line_start..words.len()));

    event!(
        target: LAYOUT,
        Level::DEBUG,
        lines = lines.len(),
        words = words.len(),
        tagged,
        "Grouped words into lines"
    );

    lines
}

#[derive(Debug, Clone)]
struct SpatialLine {
    rect: Rect,
    line: usize,
}

impl RTreeObject for SpatialLine {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.left(), self.rect.top()],
            [self.rect.right(), self.rect.bottom()],
        )
    }
}

/// Lines of a page plus an R-tree over their boxes for band queries.
#[derive(Debug)]
pub struct LineIndex {
    lines: Vec<TextLine>,
    line_of_word: Vec<usize>,
    tree: RTree<SpatialLine>,
}

impl LineIndex {
    pub fn build(words: &[Word], line_join_threshold: f32) -> Self {
        let lines = group_words_into_lines(words, line_join_threshold);

        let mut line_of_word = vec![0; words.len()];
        for (i, line) in lines.iter().enumerate() {
            for w in line.words.clone() {
                line_of_word[w] = i;
            }
        }

        let tree = RTree::bulk_load(
            lines
                .iter()
                .enumerate()
                .map(|(line, l)| SpatialLine { rect: l.rect, line })
                .collect(),
        );

        Self {
            lines,
            line_of_word,
            tree,
        }
    }

    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    /// The line containing word `word`.
    pub fn line_of_word(&self, word: usize) -> Option<&TextLine> {
        self.line_of_word.get(word).and_then(|&i| self.lines.get(i))
    }

    /// Boxes of every line lying entirely within the vertical band `top..=bottom`, in reading
    /// order.
    pub fn lines_within(&self, top: f32, bottom: f32) -> Vec<Rect> {
        if bottom < top {
            return Vec::new();
        }
        let band = AABB::from_corners([f32::MIN, top], [f32::MAX, bottom]);
        let mut hits: Vec<&SpatialLine> = self.tree.locate_in_envelope(&band).collect();
        hits.sort_by_key(|l| l.line);
        hits.into_iter().map(|l| l.rect).collect()
    }
}
