//! Locating long passages by their start and end fragments.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{event, Level};

use crate::config::LocatorConfig;
use crate::geo::Rect;
use crate::logging::ANCHORS;
use crate::search::{merge_hits, Hit, PageSearcher, View};

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?](?:\s|$)").unwrap());

/// Text up to and including the first `.`, `!` or `?` that is followed by whitespace or the
/// end of the text, trimmed. `None` without such a boundary.
///
/// ```
/// use spanlight::anchors::first_sentence;
///
/// assert_eq!(first_sentence("  It works. Mostly."), Some("It works."));
/// assert_eq!(first_sentence("v1.2 is out"), None);
/// ```
pub fn first_sentence(text: &str) -> Option<&str> {
    SENTENCE_END
        .find(text)
        .map(|m| text[..m.end()].trim())
        .filter(|s| !s.is_empty())
}

pub fn leading_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

pub fn trailing_chars(text: &str, n: usize) -> String {
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(n)).collect()
}

pub fn leading_words(text: &str, n: usize) -> String {
    text.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

pub fn trailing_words(text: &str, n: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    words[words.len().saturating_sub(n)..].join(" ")
}

/// Confidence is 1.0 when the whole passage was recovered, otherwise the share of the passage
/// covered by the two anchors.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorMatch {
    pub rects: Vec<Rect>,
    pub confidence: f64,
}

/// Locate `full` through its `start` and `end` fragments.
///
/// Both fragments must be found (exact, then normalized). The full passage is then looked up
/// case-insensitively in the normalized page text; when found, the text actually printed there
/// is searched exactly. Otherwise every line lying between the top of the start anchor's line
/// and the bottom of the end anchor's line is returned.
pub fn by_anchors(
    searcher: &PageSearcher<'_>,
    full: &str,
    start: &str,
    end: &str,
) -> Option<AnchorMatch> {
    let start_hit = searcher.find_with_fallbacks(start).into_iter().next();
    let Some(start_hit) = start_hit else {
        event!(target: ANCHORS, Level::DEBUG, anchor = "start", fragment = start, "Anchor not found");
        return None;
    };

    let end_hits = searcher.find_with_fallbacks(end);
    let end_hit = end_hits
        .iter()
        .find(|h| h.text.start >= start_hit.text.start)
        .or_else(|| end_hits.first());
    let Some(end_hit) = end_hit else {
        event!(target: ANCHORS, Level::DEBUG, anchor = "end", fragment = end, "Anchor not found");
        return None;
    };

    if let Some(rects) = full_passage(searcher, full) {
        event!(
            target: ANCHORS,
            Level::DEBUG,
            rects = rects.len(),
            "Anchors found, full passage located"
        );
        return Some(AnchorMatch {
            rects,
            confidence: 1.0,
        });
    }

    let rects = line_band(searcher, &start_hit, end_hit);
    if rects.is_empty() {
        event!(
            target: ANCHORS,
            Level::DEBUG,
            start = start_hit.text.start,
            end = end_hit.text.start,
            "Nothing between anchors"
        );
        return None;
    }

    let full_chars = full.chars().count().max(1);
    let anchored = start.chars().count() + end.chars().count();
    let confidence = (anchored as f64 / full_chars as f64).min(1.0);

    event!(
        target: ANCHORS,
        Level::DEBUG,
        lines = rects.len(),
        confidence,
        "Anchors found, returning line band"
    );

    Some(AnchorMatch {
        rects,
        confidence,
    })
}

/// Try the leading/trailing character fragments, then the leading/trailing word fragments.
pub fn by_default_anchors(
    searcher: &PageSearcher<'_>,
    query: &str,
    config: &LocatorConfig,
) -> Option<AnchorMatch> {
    let by_chars = (
        leading_chars(query, config.anchor_chars),
        trailing_chars(query, config.anchor_chars),
    );
    let by_words = (
        leading_words(query, config.anchor_words),
        trailing_words(query, config.anchor_words),
    );

    [by_chars, by_words]
        .iter()
        .filter(|(start, end)| !start.trim().is_empty() && !end.trim().is_empty())
        .find_map(|(start, end)| by_anchors(searcher, query, start, end))
}

fn full_passage(searcher: &PageSearcher<'_>, full: &str) -> Option<Vec<Rect>> {
    let hit = [View::Whitespace, View::Aggressive]
        .into_iter()
        .find_map(|view| searcher.find_normalized(full, view, true).into_iter().next())?;

    let printed = searcher.slice(hit.text.clone());
    let hits = searcher.search_for(&printed);
    let rects = if hits.is_empty() {
        hit.rects
    } else {
        merge_hits(&hits)
    };
    (!rects.is_empty()).then_some(rects)
}

fn line_band(searcher: &PageSearcher<'_>, start: &Hit, end: &Hit) -> Vec<Rect> {
    let lines = searcher.lines();
    let top = lines.line_of_word(start.words.start).map(|l| l.rect.top());
    let bottom = end
        .words
        .end
        .checked_sub(1)
        .and_then(|w| lines.line_of_word(w))
        .map(|l| l.rect.bottom());

    match (top, bottom) {
        (Some(top), Some(bottom)) => lines.lines_within(top, bottom),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::grid_page as page;

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("One. Two."), Some("One."));
        assert_eq!(first_sentence("Really?! Yes"), Some("Really?!"));
        assert_eq!(first_sentence("Ends here."), Some("Ends here."));
        assert_eq!(first_sentence("no boundary"), None);
        assert_eq!(first_sentence(". leading"), Some("."));
    }

    #[test]
    fn test_fragments() {
        let text = "alpha beta gamma delta epsilon";
        assert_eq!(leading_chars(text, 5), "alpha");
        assert_eq!(trailing_chars(text, 7), "epsilon");
        assert_eq!(trailing_chars("ab", 7), "ab");
        assert_eq!(leading_words(text, 3), "alpha beta gamma");
        assert_eq!(trailing_words(text, 3), "gamma delta epsilon");
        assert_eq!(trailing_words("one", 3), "one");
    }

    #[test]
    fn test_by_anchors_full_passage() {
        let page = page(&["intro line here", "Start of passage and", "the END of it", "outro"]);
        let searcher = PageSearcher::new(&page, &LocatorConfig::default()).unwrap();
        let found = by_anchors(
            &searcher,
            "start of passage and the end of it",
            "Start of",
            "of it",
        )
        .unwrap();
        assert_eq!(found.confidence, 1.0);
        assert_eq!(found.rects.len(), 8);
    }

    #[test]
    fn test_by_anchors_line_band() {
        let page = page(&["intro line here", "Start of passage", "totally different middle", "the end", "outro"]);
        let searcher = PageSearcher::new(&page, &LocatorConfig::default()).unwrap();
        let found = by_anchors(
            &searcher,
            "Start of passage with a reworded middle section the end",
            "Start of",
            "the end",
        )
        .unwrap();
        assert_eq!(found.rects.len(), 3);
        assert_eq!(found.rects[0].top(), 72.0 + 14.4);
        assert!(found.confidence > 0.0 && found.confidence < 1.0);
    }

    #[test]
    fn test_by_anchors_missing_anchor() {
        let page = page(&["Start of passage", "the end"]);
        let searcher = PageSearcher::new(&page, &LocatorConfig::default()).unwrap();
        assert!(by_anchors(&searcher, "Start x the finish", "Start", "finish").is_none());
        assert!(by_anchors(&searcher, "Begin x the end", "Begin", "the end").is_none());
    }

    #[test]
    fn test_end_anchor_prefers_occurrence_after_start() {
        let page = page(&["the end came early", "Start here", "middle", "the end"]);
        let searcher = PageSearcher::new(&page, &LocatorConfig::default()).unwrap();
        let found = by_anchors(&searcher, "Start here then something else the end", "Start here", "the end")
            .unwrap();
        assert_eq!(found.rects.len(), 3);
        assert_eq!(found.rects[2].top(), 72.0 + 3.0 * 14.4);
    }
}
