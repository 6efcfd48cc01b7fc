//! Sliding-window approximate matching.
//!
//! Scores follow the classical sequence-matcher ratio `2*M / (|a| + |b|)`, where `M` counts the
//! characters in the matching blocks found by recursively taking the longest common block and
//! recursing on both sides of it. No characters are treated as junk.

use std::cmp::Reverse;
use std::collections::HashMap;

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use tracing::{event, Level};

use crate::config::LocatorConfig;
use crate::logging::SCANNER;
use crate::normalize::Normalized;

/// Best window found by [`fuzzy_find`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyHit {
    /// Char offset of the window in the scanned text.
    pub offset: usize,
    /// Window length in chars.
    pub len: usize,
    pub ratio: f64,
    /// Threshold the ratio has to reach for the hit to count.
    pub threshold: f64,
}

impl FuzzyHit {
    pub fn passes(&self) -> bool {
        self.ratio >= self.threshold
    }
}

/// Similarity ratio in `[0, 1]`; two empty inputs are identical.
///
/// The greedy block recursion depends on argument order, so both orders are tried and the
/// larger match count wins. This makes the ratio symmetric.
///
/// ```
/// use spanlight::similarity::ratio;
///
/// let a: Vec<char> = "abcd".chars().collect();
/// let b: Vec<char> = "bcde".chars().collect();
/// assert_eq!(ratio(&a, &b), 0.75);
/// ```
pub fn ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let forward = matching_chars(a, b);
    let upper = intersection_count(a, b);
    let matched = if forward < upper {
        forward.max(matching_chars(b, a))
    } else {
        forward
    };
    2.0 * matched as f64 / total as f64
}

pub fn ratio_str(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio(&a, &b)
}

/// Upper bound on [`ratio`] from character multiset intersection.
pub fn quick_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * intersection_count(a, b) as f64 / total as f64
}

fn intersection_count(a: &[char], b: &[char]) -> usize {
    let mut available: HashMap<char, usize> = HashMap::with_capacity(b.len());
    for &c in b {
        *available.entry(c).or_default() += 1;
    }
    a.iter()
        .filter(|c| match available.get_mut(c) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        })
        .count()
}

/// Total size of the matching blocks of `a` against `b`.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &c) in b.iter().enumerate() {
        b2j.entry(c).or_default().push(j);
    }

    let mut scratch = BlockScratch::new(b.len());
    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = scratch.longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Row buffers for the longest-common-block dynamic program. Index `j + 1` holds the length of
/// the common run ending at `b[j]`.
struct BlockScratch {
    previous: Vec<usize>,
    current: Vec<usize>,
}

impl BlockScratch {
    fn new(b_len: usize) -> Self {
        Self {
            previous: vec![0; b_len + 1],
            current: vec![0; b_len + 1],
        }
    }

    /// Longest block `a[i..i+k] == b[j..j+k]` within the given bounds. Ties go to the smallest
    /// `i`, then the smallest `j`.
    fn longest_match(
        &mut self,
        a: &[char],
        b2j: &HashMap<char, Vec<usize>>,
        alo: usize,
        ahi: usize,
        blo: usize,
        bhi: usize,
    ) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
        self.previous[blo..=bhi].fill(0);

        for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
            self.current[blo..=bhi].fill(0);
            if let Some(positions) = b2j.get(c) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = self.previous[j] + 1;
                    self.current[j + 1] = k;
                    if k > best_k {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_k = k;
                    }
                }
            }
            std::mem::swap(&mut self.previous, &mut self.current);
        }

        (best_i, best_j, best_k)
    }
}

/// Window advance for a query of `query_chars` characters.
pub fn step_for(query_chars: usize) -> usize {
    (query_chars / 20).clamp(5, 10)
}

/// Slide a window the length of the normalized query over `haystack` and return the best
/// scoring window.
///
/// `haystack` must already be aggressively normalized and case-folded; `query` is raw and gets
/// the same treatment here. Step size and the short-query threshold are derived from the raw
/// query length. Windows are scored in parallel batches, but batches are reduced in order, so
/// the lowest offset wins ties and the scan stops at the first window above the early-exit
/// ratio, exactly as a sequential scan would.
pub fn fuzzy_find(haystack: &Normalized, query: &str, config: &LocatorConfig) -> Option<FuzzyHit> {
    let query_chars = query.chars().count();
    let needle = Normalized::aggressive(query).folded().chars();
    let window = needle.len();
    let text = haystack.chars();

    if window == 0 || text.len() < window {
        return None;
    }

    let threshold = config.threshold_for(query_chars);
    let step = step_for(query_chars);
    let offsets: Vec<usize> = (0..=text.len() - window).step_by(step).collect();

    let mut best: Option<(usize, f64)> = None;
    let mut scanned = 0;
    let mut early_exit = false;

    for batch in offsets.chunks(config.scan_batch.max(1)) {
        let floor = best.map(|(_, r)| r).unwrap_or(-1.0);
        let scores: Vec<(usize, f64)> = batch
            .par_iter()
            .map(|&offset| {
                let candidate = &text[offset..offset + window];
                let score = if best.is_some() && quick_ratio(&needle, candidate) <= floor {
                    0.0
                } else {
                    ratio(&needle, candidate)
                };
                (offset, score)
            })
            .collect();

        let exit_at = scores
            .iter()
            .position(|&(_, r)| r > config.early_exit_ratio);
        let considered = match exit_at {
            Some(p) => &scores[..=p],
            None => &scores[..],
        };
        scanned += considered.len();
        early_exit = exit_at.is_some();

        let batch_best = considered
            .iter()
            .copied()
            .max_by_key(|&(offset, r)| (OrderedFloat(r), Reverse(offset)));
        if let Some((offset, r)) = batch_best {
            if best.map_or(true, |(_, b)| r > b) {
                best = Some((offset, r));
            }
        }
        if early_exit {
            break;
        }
    }

    let (offset, best_ratio) = best?;

    event!(
        target: SCANNER,
        Level::DEBUG,
        windows = scanned,
        total_windows = offsets.len(),
        window,
        step,
        offset,
        ratio = best_ratio,
        threshold,
        early_exit,
        "Similarity scan finished"
    );

    Some(FuzzyHit {
        offset,
        len: window,
        ratio: best_ratio,
        threshold,
    })
}
