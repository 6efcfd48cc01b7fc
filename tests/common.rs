#![allow(dead_code)]

use spanlight::page::assign_offsets;
use spanlight::{Page, PageBounds, Rect, Word};

pub const LEFT_MARGIN: f32 = 72.0;
pub const TOP_MARGIN: f32 = 72.0;
pub const CHAR_WIDTH: f32 = 5.0;
pub const WORD_GAP: f32 = 5.0;
pub const LINE_HEIGHT: f32 = 12.0;
pub const LINE_PITCH: f32 = 14.4;

/// Lays out page text on a fixed grid: every char is `CHAR_WIDTH` wide, words on a text line
/// share a row, rows are `LINE_PITCH` apart. The page text is kept exactly as given.
pub struct PageBuilder {
    text: String,
    bounds: PageBounds,
    tag_lines: bool,
}

impl PageBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bounds: PageBounds::new(612.0, 792.0),
            tag_lines: false,
        }
    }

    pub fn from_lines(lines: &[&str]) -> Self {
        Self::new(lines.join("\n"))
    }

    pub fn bounds(mut self, width: f32, height: f32) -> Self {
        self.bounds = PageBounds::new(width, height);
        self
    }

    /// Give every word block 0 and its row as line number.
    pub fn tag_lines(mut self) -> Self {
        self.tag_lines = true;
        self
    }

    pub fn words(&self) -> Vec<Word> {
        let mut words = Vec::new();
        for (row, line) in self.text.split('\n').enumerate() {
            let mut x = LEFT_MARGIN;
            let y = TOP_MARGIN + row as f32 * LINE_PITCH;
            for text in line.split_whitespace() {
                let width = text.chars().count() as f32 * CHAR_WIDTH;
                let mut word = Word::new(Rect::new(x, y, width, LINE_HEIGHT), text, 0, 0);
                if self.tag_lines {
                    word = word.with_line(0, row as u32);
                }
                words.push(word);
                x += width + WORD_GAP;
            }
        }

        let offsets = assign_offsets(words.iter().map(|w| w.text.as_str()));
        for (word, (start, end)) in words.iter_mut().zip(offsets) {
            word.char_start = start;
            word.char_end = end;
        }
        words
    }

    pub fn build(self) -> Page {
        let words = self.words();
        Page::new(self.text, words, self.bounds).expect("valid test page")
    }
}

pub const RIVER_LINES: [&str; 5] = [
    "Chapter Three describes how the committee reviewed every proposal in detail.",
    "The river flooded the lower valley every spring, forcing the farmers to move",
    "their cattle to higher ground until the waters receded in early summer.",
    "Nobody in the village could remember a year when the flood had failed to come.",
    "Meanwhile the town council debated new levees, though funding remained scarce.",
];

/// Five lines of running prose, one sentence wrapping across rows 1 and 2.
pub fn river_page() -> Page {
    PageBuilder::from_lines(&RIVER_LINES).build()
}

/// Top of text row `row` on a [`PageBuilder`] page.
pub fn row_top(row: usize) -> f32 {
    TOP_MARGIN + row as f32 * LINE_PITCH
}

pub fn union_bottom(rects: &[Rect]) -> f32 {
    rects.iter().map(|r| r.bottom()).fold(f32::MIN, f32::max)
}
