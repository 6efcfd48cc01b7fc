//! Locator tunables.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cascade::StrategyId;
use crate::error::{Error, Result};

/// Named strategy orders.
///
/// `Full` runs the whole cascade. `Selection` stops after the fuzzy strategy, so it only ever
/// returns rectangles of words actually found on the page, never synthesized ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Full,
    Selection,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Full => "full",
            Mode::Selection => "selection",
        }
    }

    pub fn strategies(&self) -> &'static [StrategyId] {
        match self {
            Mode::Full => &StrategyId::ALL,
            Mode::Selection => &StrategyId::SELECTION,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Mode::Full),
            "selection" => Ok(Mode::Selection),
            _ => Err(Error::InvalidConfig(format!(
                "unknown mode {s:?}, expected \"full\" or \"selection\""
            ))),
        }
    }
}

/// Thresholds and limits handed to [`crate::cascade::Locator`] at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Minimum similarity ratio for a fuzzy match.
    pub fuzzy_threshold: f64,
    /// Floor applied to the fuzzy threshold for short queries.
    pub short_query_threshold: f64,
    /// Queries shorter than this many chars use `short_query_threshold`.
    pub short_query_chars: usize,
    /// The similarity scan stops once a window scores above this.
    pub early_exit_ratio: f64,
    /// Sentence, anchor and prefix strategies only run for queries longer than this.
    pub long_query_chars: usize,
    pub anchor_chars: usize,
    pub anchor_words: usize,
    pub min_sentence_chars: usize,
    pub prefix_chars: usize,
    /// Single-line expansion switches to multi-line past this fraction of the page width.
    pub right_margin_ratio: f32,
    /// Synthesized line pitch as a multiple of the line height.
    pub line_spacing: f32,
    /// Max vertical distance between word tops on the same line, when words carry no line ids.
    pub line_join_threshold: f32,
    /// Cap on occurrences returned by one exact search.
    pub max_hits: usize,
    /// Window offsets scored per parallel batch.
    pub scan_batch: usize,
    /// Strategies in the order they are tried.
    pub strategies: Vec<StrategyId>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LocatorConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            fuzzy_threshold: 0.85,
            short_query_threshold: 0.90,
            short_query_chars: 50,
            early_exit_ratio: 0.95,
            long_query_chars: 100,
            anchor_chars: 50,
            anchor_words: 3,
            min_sentence_chars: 20,
            prefix_chars: 100,
            right_margin_ratio: 0.95,
            line_spacing: 1.2,
            line_join_threshold: 5.0,
            max_hits: 16,
            scan_batch: 64,
            strategies: StrategyId::ALL.to_vec(),
        }
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("fuzzy_threshold", self.fuzzy_threshold),
            ("short_query_threshold", self.short_query_threshold),
            ("early_exit_ratio", self.early_exit_ratio),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if !(self.right_margin_ratio > 0.0 && self.right_margin_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "right_margin_ratio must be within (0, 1], got {}",
                self.right_margin_ratio
            )));
        }
        if !(self.line_spacing.is_finite() && self.line_spacing > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "line_spacing must be positive, got {}",
                self.line_spacing
            )));
        }
        if !(self.line_join_threshold.is_finite() && self.line_join_threshold >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "line_join_threshold must not be negative, got {}",
                self.line_join_threshold
            )));
        }

        let counts = [
            ("anchor_chars", self.anchor_chars),
            ("anchor_words", self.anchor_words),
            ("prefix_chars", self.prefix_chars),
            ("scan_batch", self.scan_batch),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be at least 1")));
            }
        }

        if self.strategies.is_empty() {
            return Err(Error::InvalidConfig("no strategies enabled".to_string()));
        }
        for (i, strategy) in self.strategies.iter().enumerate() {
            if self.strategies[..i].contains(strategy) {
                return Err(Error::InvalidConfig(format!(
                    "strategy {strategy} listed twice"
                )));
            }
        }

        Ok(())
    }

    /// Effective fuzzy threshold for a query of `query_chars` characters.
    pub fn threshold_for(&self, query_chars: usize) -> f64 {
        if query_chars < self.short_query_chars {
            self.fuzzy_threshold.max(self.short_query_threshold)
        } else {
            self.fuzzy_threshold
        }
    }

    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    pub fn with_max_hits(mut self, max_hits: usize) -> Self {
        self.max_hits = max_hits;
        self
    }

    pub fn with_scan_batch(mut self, batch: usize) -> Self {
        self.scan_batch = batch;
        self
    }

    /// Defaults with the [`Mode::Selection`] strategy order.
    pub fn selection() -> Self {
        Self::new().with_mode(Mode::Selection)
    }

    /// Replace the strategy order with a preset.
    pub fn with_mode(self, mode: Mode) -> Self {
        self.with_strategies(mode.strategies())
    }

    /// Replace the strategy order.
    pub fn with_strategies(mut self, strategies: impl Into<Vec<StrategyId>>) -> Self {
        self.strategies = strategies.into();
        self
    }
}
