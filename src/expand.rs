//! Approximate rectangles for a passage of which only a prefix was matched.

use tracing::{event, Level};

use crate::config::LocatorConfig;
use crate::geo::{merge_into_lines, PageBounds, Rect};
use crate::logging::EXPAND;

/// Extend `matched` (word boxes of the first `matched_len` chars) to cover `full_len` chars.
///
/// The per-character width is taken from the matched boxes. If the remaining characters fit
/// on the last matched line without passing `right_margin_ratio` of the page width, that line
/// is extended to the right. Otherwise lines at the left margin of the match are appended,
/// `line_spacing` line heights apart, until `ceil(full_len / chars_per_line)` lines exist.
/// Synthesized lines that would end below the page are dropped.
pub fn expand(
    matched: &[Rect],
    matched_len: usize,
    full_len: usize,
    bounds: PageBounds,
    config: &LocatorConfig,
) -> Vec<Rect> {
    let mut lines = merge_into_lines(matched);
    if matched_len == 0 || full_len <= matched_len {
        return lines;
    }
    let Some(&last) = lines.last() else {
        return lines;
    };

    let total_width: f32 = lines.iter().map(|l| l.width).sum();
    let char_width = total_width / matched_len as f32;
    if !(char_width.is_finite() && char_width > 0.0) {
        return lines;
    }

    let missing = (full_len - matched_len) as f32;
    let extended_right = last.right() + char_width * missing;

    if extended_right < bounds.width * config.right_margin_ratio {
        if let Some(line) = lines.last_mut() {
            line.width = extended_right.min(bounds.width) - line.x;
        }
        event!(
            target: EXPAND,
            Level::DEBUG,
            char_width,
            right = extended_right,
            "Extended last line"
        );
        return lines;
    }

    let left = lines.iter().map(|l| l.left()).fold(f32::INFINITY, f32::min);
    let widest = lines.iter().map(|l| l.width).fold(0.0, f32::max);
    let chars_per_line = (widest / char_width).max(1.0);
    let total_lines = (full_len as f32 / chars_per_line).ceil() as usize;
    let extra_lines = total_lines.saturating_sub(lines.len()).max(1);
    let line_width = widest.min(bounds.width - left).max(0.0);
    let pitch = last.height * config.line_spacing;

    let mut added = 0;
    for n in 1..=extra_lines {
        let line = Rect::new(left, last.y + pitch * n as f32, line_width, last.height);
        if line.bottom() > bounds.height {
            break;
        }
        lines.push(line);
        added += 1;
    }

    event!(
        target: EXPAND,
        Level::DEBUG,
        char_width,
        chars_per_line,
        requested = extra_lines,
        added,
        "Expanded to multiple lines"
    );

    lines
}
