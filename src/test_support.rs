//! Grid page layout shared by the unit tests: 5pt per char, one 5pt gap between words, rows
//! 14.4pt apart starting at 72pt.

use crate::geo::{PageBounds, Rect};
use crate::page::{assign_offsets, Page, Word};

pub(crate) fn row_top(row: usize) -> f32 {
    72.0 + row as f32 * 14.4
}

pub(crate) fn grid_words(lines: &[&str]) -> Vec<Word> {
    let mut words = Vec::new();
    for (row, line) in lines.iter().enumerate() {
        let mut x = 72.0;
        for text in line.split_whitespace() {
            let width = text.chars().count() as f32 * 5.0;
            words.push(Word::new(Rect::new(x, row_top(row), width, 12.0), text, 0, 0));
            x += width + 5.0;
        }
    }

    let offsets = assign_offsets(words.iter().map(|w| w.text.as_str()));
    for (word, (start, end)) in words.iter_mut().zip(offsets) {
        word.char_start = start;
        word.char_end = end;
    }
    words
}

/// Page whose text is `lines` joined by newlines.
pub(crate) fn grid_page(lines: &[&str]) -> Page {
    Page::new(lines.join("\n"), grid_words(lines), PageBounds::new(612.0, 792.0))
        .expect("valid test page")
}
