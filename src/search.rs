//! Exact and normalized search over one prepared page.

use std::ops::Range;

use once_cell::unsync::OnceCell;
use tracing::{event, Level};

use crate::config::LocatorConfig;
use crate::error::Result;
use crate::geo::{PageBounds, Rect};
use crate::layout::{LineIndex, TextAlignment, WordIndex};
use crate::logging::LAYOUT;
use crate::normalize::Normalized;
use crate::page::Page;

/// Which canonical form of the page text to search in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Raw,
    Whitespace,
    Aggressive,
}

impl View {
    pub const ALL: [View; 3] = [View::Raw, View::Whitespace, View::Aggressive];

    pub fn apply(self, text: &str) -> Normalized {
        match self {
            View::Raw => Normalized::raw(text),
            View::Whitespace => Normalized::whitespace(text),
            View::Aggressive => Normalized::aggressive(text),
        }
    }

    fn slot(self, folded: bool) -> usize {
        self as usize * 2 + usize::from(folded)
    }
}

/// One located occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Char range in the page text.
    pub text: Range<usize>,
    /// Indices of the words it covers.
    pub words: Range<usize>,
    pub rects: Vec<Rect>,
}

/// Rectangles of `hits` (in page order) with every word emitted once, so occurrences sharing a
/// word do not repeat its box.
pub fn merge_hits(hits: &[Hit]) -> Vec<Rect> {
    let mut rects = Vec::new();
    let mut next_word: usize = 0;
    for hit in hits {
        let skip = next_word.saturating_sub(hit.words.start);
        rects.extend(hit.rects.iter().skip(skip).copied());
        next_word = next_word.max(hit.words.end);
    }
    rects
}

/// A page prepared for repeated searching: validated word offsets, the page-text alignment and
/// lazily built normalized views.
pub struct PageSearcher<'p> {
    page: &'p Page,
    index: WordIndex<'p>,
    alignment: TextAlignment,
    views: [OnceCell<Normalized>; 6],
    lines: OnceCell<LineIndex>,
    max_hits: usize,
    line_join_threshold: f32,
}

impl<'p> PageSearcher<'p> {
    pub fn new(page: &'p Page, config: &LocatorConfig) -> Result<Self> {
        let index = WordIndex::build(&page.words)?;
        let alignment = TextAlignment::build(&page.text, &page.words);

        event!(
            target: LAYOUT,
            Level::TRACE,
            words = index.len(),
            text_chars = page.text.chars().count(),
            "Prepared page for search"
        );

        Ok(Self {
            page,
            index,
            alignment,
            views: Default::default(),
            lines: OnceCell::new(),
            max_hits: config.max_hits,
            line_join_threshold: config.line_join_threshold,
        })
    }

    pub fn bounds(&self) -> PageBounds {
        self.page.bounds
    }

    pub fn lines(&self) -> &LineIndex {
        self.lines
            .get_or_init(|| LineIndex::build(&self.page.words, self.line_join_threshold))
    }

    /// The page text in the given form, optionally lowercased.
    pub fn view(&self, view: View, folded: bool) -> &Normalized {
        self.views[view.slot(folded)].get_or_init(|| {
            let base = view.apply(&self.page.text);
            if folded {
                base.folded()
            } else {
                base
            }
        })
    }

    /// Characters `range` of the page text.
    pub fn slice(&self, range: Range<usize>) -> String {
        self.page
            .text
            .chars()
            .skip(range.start)
            .take(range.len())
            .collect()
    }

    /// Word rectangles covering a page-text char range.
    pub fn hit_for_text_range(&self, range: Range<usize>) -> Option<Hit> {
        let offsets = self.alignment.to_word_range(range.start, range.end)?;
        let words = self.index.word_span(offsets.start, offsets.end);
        if words.is_empty() {
            return None;
        }
        let rects = self.index.words()[words.clone()]
            .iter()
            .map(|w| w.rect)
            .collect();
        Some(Hit {
            text: range,
            words,
            rects,
        })
    }

    /// Every non-overlapping occurrence of `literal` in the raw page text, capped at
    /// `max_hits`, in page order.
    pub fn search_for(&self, literal: &str) -> Vec<Hit> {
        self.find_in_view(literal, View::Raw, false)
    }

    /// Normalize `query` like `view` (and lowercase it when `folded`), then find it in the
    /// matching view of the page. Hits are mapped back to the page text through the view's
    /// origin map.
    pub fn find_normalized(&self, query: &str, view: View, folded: bool) -> Vec<Hit> {
        let needle = view.apply(query);
        let needle = if folded { needle.folded() } else { needle };
        let needle = match view {
            View::Raw => needle.as_str(),
            _ => needle.as_str().trim_matches(' '),
        };
        self.find_in_view(needle, view, folded)
    }

    fn find_in_view(&self, needle: &str, view: View, folded: bool) -> Vec<Hit> {
        if needle.trim().is_empty() {
            return Vec::new();
        }
        let haystack = self.view(view, folded);
        let needle_chars = needle.chars().count();
        haystack
            .find_all(needle, self.max_hits)
            .into_iter()
            .filter_map(|start| {
                self.hit_for_text_range(haystack.source_range(start, start + needle_chars))
            })
            .collect()
    }

    /// Case-insensitive lookup: find `query` in a lowercased view, take the text that actually
    /// occurs on the page at that spot and exact-search it. Views are tried raw, then
    /// whitespace-normalized, then aggressive.
    pub fn find_case_insensitive(&self, query: &str) -> Vec<Hit> {
        for view in View::ALL {
            let Some(hit) = self.find_normalized(query, view, true).into_iter().next() else {
                continue;
            };
            let occurring = self.slice(hit.text.clone());
            let hits = self.search_for(&occurring);
            if !hits.is_empty() {
                return hits;
            }
            return vec![hit];
        }
        Vec::new()
    }

    /// Exact search, then the whitespace-normalized and aggressive views.
    pub fn find_with_fallbacks(&self, fragment: &str) -> Vec<Hit> {
        let hits = self.search_for(fragment);
        if !hits.is_empty() {
            return hits;
        }
        for view in [View::Whitespace, View::Aggressive] {
            let hits = self.find_normalized(fragment, view, false);
            if !hits.is_empty() {
                return hits;
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::grid_page as page;

    #[test]
    fn test_search_for_all_occurrences() {
        let page = page(&["the cat and the dog", "and the bird"]);
        let searcher = PageSearcher::new(&page, &LocatorConfig::default()).unwrap();

        let hits = searcher.search_for("the");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].words, 0..1);
        assert_eq!(hits[1].words, 3..4);
        assert_eq!(hits[2].words, 6..7);
        assert_eq!(hits[2].rects[0].top(), 72.0 + 14.4);
    }

    #[test]
    fn test_search_for_respects_max_hits() {
        let page = page(&["a a a a a a"]);
        let config = LocatorConfig::default().with_max_hits(2);
        let searcher = PageSearcher::new(&page, &config).unwrap();
        assert_eq!(searcher.search_for("a").len(), 2);
    }

    #[test]
    fn test_find_normalized_across_line_break() {
        let page = page(&["Hello,   world!", "This is a  test."]);
        let searcher = PageSearcher::new(&page, &LocatorConfig::default()).unwrap();

        assert!(searcher.search_for("world! This").is_empty());
        let hits = searcher.find_normalized("world!  This", View::Whitespace, false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].rects.len(), 2);
    }

    #[test]
    fn test_find_aggressive_with_smart_quotes() {
        let page = page(&["he said \u{201C}free will\u{201D} matters"]);
        let searcher = PageSearcher::new(&page, &LocatorConfig::default()).unwrap();
        let hits = searcher.find_normalized("\"free will\"", View::Aggressive, false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].words, 2..4);
    }

    #[test]
    fn test_find_case_insensitive_slices_page_text() {
        let page = page(&["The Quick Brown fox"]);
        let searcher = PageSearcher::new(&page, &LocatorConfig::default()).unwrap();
        let hits = searcher.find_case_insensitive("quick brown");
        assert_eq!(hits.len(), 1);
        assert_eq!(searcher.slice(hits[0].text.clone()), "Quick Brown");
        assert_eq!(hits[0].words, 1..3);
    }

    #[test]
    fn test_find_with_fallbacks() {
        let page = page(&["it sug-", "gests a way"]);
        let searcher = PageSearcher::new(&page, &LocatorConfig::default()).unwrap();
        let hits = searcher.find_with_fallbacks("suggests a");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].words, 1..4);
        assert!(searcher.find_with_fallbacks("nowhere").is_empty());
    }

    #[test]
    fn test_inconsistent_offsets_fail_preparation() {
        let mut page = page(&["one two"]);
        page.words[1].char_start = 7;
        assert!(PageSearcher::new(&page, &LocatorConfig::default()).is_err());
    }

    #[test]
    fn test_merge_hits_emits_each_word_once() {
        let page = page(&["banana split", "and banana"]);
        let searcher = PageSearcher::new(&page, &LocatorConfig::default()).unwrap();

        let hits = searcher.search_for("an");
        assert_eq!(hits.len(), 5);
        let rects = merge_hits(&hits);
        assert_eq!(rects, vec![page.words[0].rect, page.words[2].rect, page.words[3].rect]);

        let spanning = searcher.search_for("ana spl");
        assert_eq!(merge_hits(&spanning), vec![page.words[0].rect, page.words[1].rect]);
        assert!(merge_hits(&[]).is_empty());
    }
}
