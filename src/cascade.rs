//! The strategy cascade: try each configured strategy in order, first non-empty result wins.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug_span, event, Level};

use crate::anchors::{by_anchors, by_default_anchors, first_sentence, leading_chars, trailing_chars};
use crate::config::LocatorConfig;
use crate::error::{Error, Result};
use crate::expand::expand;
use crate::geo::Rect;
use crate::logging::CASCADE;
use crate::page::{Document, Page, Query};
use crate::search::{merge_hits, Hit, PageSearcher, View};
use crate::similarity::fuzzy_find;

/// Identifies one locating strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    Exact,
    NormalizedWhitespace,
    NormalizedAggressive,
    Fuzzy,
    CaseInsensitive,
    FirstSentence,
    Anchors,
    PrefixExpansion,
}

impl StrategyId {
    /// Default order.
    pub const ALL: [StrategyId; 8] = [
        StrategyId::Exact,
        StrategyId::NormalizedWhitespace,
        StrategyId::NormalizedAggressive,
        StrategyId::Fuzzy,
        StrategyId::CaseInsensitive,
        StrategyId::FirstSentence,
        StrategyId::Anchors,
        StrategyId::PrefixExpansion,
    ];

    /// Strategies that only return boxes of words found on the page.
    pub const SELECTION: [StrategyId; 4] = [
        StrategyId::Exact,
        StrategyId::NormalizedWhitespace,
        StrategyId::NormalizedAggressive,
        StrategyId::Fuzzy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::Exact => "exact",
            StrategyId::NormalizedWhitespace => "normalized_whitespace",
            StrategyId::NormalizedAggressive => "normalized_aggressive",
            StrategyId::Fuzzy => "fuzzy",
            StrategyId::CaseInsensitive => "case_insensitive",
            StrategyId::FirstSentence => "first_sentence",
            StrategyId::Anchors => "anchors",
            StrategyId::PrefixExpansion => "prefix_expansion",
        }
    }

    /// 1-based position in the default order.
    pub fn priority(&self) -> usize {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .map_or(Self::ALL.len(), |p| p + 1)
    }

    /// Strategies that only run for queries longer than `long_query_chars`.
    pub fn requires_long_query(&self) -> bool {
        matches!(
            self,
            StrategyId::FirstSentence | StrategyId::Anchors | StrategyId::PrefixExpansion
        )
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown strategy {s:?}")))
    }
}

/// Outcome of one locate call. Empty rectangles with confidence 0 means nothing was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub rectangles: Vec<Rect>,
    pub strategy: Option<StrategyId>,
    pub confidence: f64,
}

impl MatchResult {
    pub fn none() -> Self {
        Self {
            rectangles: Vec::new(),
            strategy: None,
            confidence: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rectangles.is_empty()
    }
}

struct Found {
    rects: Vec<Rect>,
    confidence: f64,
}

impl Found {
    fn exact(hits: Vec<Hit>) -> Option<Self> {
        let rects = merge_hits(&hits);
        (!rects.is_empty()).then_some(Self {
            rects,
            confidence: 1.0,
        })
    }
}

/// The locating engine. Holds configuration only, so one instance can serve any number of
/// pages and threads.
#[derive(Debug, Clone, Default)]
pub struct Locator {
    config: LocatorConfig,
}

impl Locator {
    pub fn new(config: LocatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Locate `query` on `page`.
    ///
    /// Errors only for an empty query or word offsets that break the join convention; a
    /// passage that cannot be found yields [`MatchResult::none`].
    pub fn locate(&self, page: &Page, query: &str) -> Result<MatchResult> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }

        let query_chars = query.chars().count();
        let span = debug_span!(target: CASCADE, "locate", query_chars);
        let _enter = span.enter();

        let searcher = PageSearcher::new(page, &self.config)?;
        let long = query_chars > self.config.long_query_chars;

        for &strategy in &self.config.strategies {
            if strategy.requires_long_query() && !long {
                event!(
                    target: CASCADE,
                    Level::DEBUG,
                    strategy = strategy.as_str(),
                    matched = false,
                    skipped = true,
                    rects = 0usize,
                    confidence = 0.0
                );
                continue;
            }

            let found = self.run(strategy, &searcher, query, query_chars);
            let (rects, confidence) = found
                .as_ref()
                .map_or((0, 0.0), |f| (f.rects.len(), f.confidence));

            event!(
                target: CASCADE,
                Level::DEBUG,
                strategy = strategy.as_str(),
                matched = found.is_some(),
                skipped = false,
                rects,
                confidence
            );

            if let Some(found) = found {
                return Ok(MatchResult {
                    rectangles: found.rects,
                    strategy: Some(strategy),
                    confidence: found.confidence,
                });
            }
        }

        event!(target: CASCADE, Level::INFO, query_chars, "No strategy located the passage");
        Ok(MatchResult::none())
    }

    /// Locate a query on its 1-indexed page of `document`.
    pub fn locate_in_document(&self, document: &Document, query: &Query) -> Result<MatchResult> {
        let page = document.page(query.page)?;
        self.locate(page, &query.text)
    }

    /// Evaluate independent queries in parallel. Results keep the order of `queries`.
    pub fn locate_many(&self, document: &Document, queries: &[Query]) -> Vec<Result<MatchResult>> {
        queries
            .par_iter()
            .map(|query| self.locate_in_document(document, query))
            .collect()
    }

    fn run(
        &self,
        strategy: StrategyId,
        searcher: &PageSearcher<'_>,
        query: &str,
        query_chars: usize,
    ) -> Option<Found> {
        match strategy {
            StrategyId::Exact => Found::exact(searcher.search_for(query)),
            StrategyId::NormalizedWhitespace => {
                Found::exact(searcher.find_normalized(query, View::Whitespace, false))
            }
            StrategyId::NormalizedAggressive => {
                Found::exact(searcher.find_normalized(query, View::Aggressive, false))
            }
            StrategyId::Fuzzy => self.fuzzy(searcher, query),
            StrategyId::CaseInsensitive => Found::exact(searcher.find_case_insensitive(query)),
            StrategyId::FirstSentence => self.first_sentence(searcher, query, query_chars),
            StrategyId::Anchors => {
                by_default_anchors(searcher, query, &self.config).map(|m| Found {
                    rects: m.rects,
                    confidence: m.confidence,
                })
            }
            StrategyId::PrefixExpansion => self.prefix_expansion(searcher, query, query_chars),
        }
    }

    fn fuzzy(&self, searcher: &PageSearcher<'_>, query: &str) -> Option<Found> {
        let haystack = searcher.view(View::Aggressive, true);
        let hit = fuzzy_find(haystack, query, &self.config)?;
        if !hit.passes() {
            return None;
        }
        let range = haystack.source_range(hit.offset, hit.offset + hit.len);
        let located = searcher.hit_for_text_range(range)?;
        Some(Found {
            rects: located.rects,
            confidence: hit.ratio,
        })
    }

    fn first_sentence(
        &self,
        searcher: &PageSearcher<'_>,
        query: &str,
        query_chars: usize,
    ) -> Option<Found> {
        let sentence = first_sentence(query)?;
        let sentence_chars = sentence.chars().count();
        if sentence_chars < self.config.min_sentence_chars {
            return None;
        }

        let mut hits = searcher.search_for(sentence);
        if hits.is_empty() {
            hits = searcher.find_normalized(sentence, View::Whitespace, false);
        }
        let first = hits.into_iter().next()?;

        let end = trailing_chars(query, self.config.anchor_chars);
        if let Some(anchored) = by_anchors(searcher, query, sentence, &end) {
            return Some(Found {
                rects: anchored.rects,
                confidence: anchored.confidence,
            });
        }

        Some(Found {
            rects: expand(
                &first.rects,
                sentence_chars,
                query_chars,
                searcher.bounds(),
                &self.config,
            ),
            confidence: ratio_of(sentence_chars, query_chars),
        })
    }

    fn prefix_expansion(
        &self,
        searcher: &PageSearcher<'_>,
        query: &str,
        query_chars: usize,
    ) -> Option<Found> {
        let prefix = leading_chars(query, self.config.prefix_chars);
        let prefix_chars = prefix.chars().count();

        let mut hits = searcher.search_for(&prefix);
        if hits.is_empty() {
            hits = searcher.find_normalized(&prefix, View::Whitespace, false);
        }
        let first = hits.into_iter().next()?;

        Some(Found {
            rects: expand(
                &first.rects,
                prefix_chars,
                query_chars,
                searcher.bounds(),
                &self.config,
            ),
            confidence: ratio_of(prefix_chars, query_chars),
        })
    }
}

fn ratio_of(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64).min(1.0)
}
