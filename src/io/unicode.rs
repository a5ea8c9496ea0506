//! Unicode utilities for text shown to users or sent to services.
//!
//! Report text is frequently Japanese, so every cut happens on a grapheme
//! cluster or at least a character boundary.

use unicode_segmentation::UnicodeSegmentation;

/// Marker appended to truncated text.
pub const ELLIPSIS: &str = "...";

/// Finds a valid UTF-8 character boundary at or before the given position.
///
/// # Examples
///
/// ```
/// use steward_rs::io::find_char_boundary;
///
/// let s = "Hello 世界";
/// assert_eq!(find_char_boundary(s, 6), 6); // Before '世'
/// assert_eq!(find_char_boundary(s, 7), 6); // Middle of '世', backs up
/// ```
#[must_use]
pub const fn find_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let bytes = s.as_bytes();
    let mut boundary = pos;
    // UTF-8 continuation bytes start with 10xxxxxx (0x80-0xBF)
    while boundary > 0 && (bytes[boundary] & 0xC0) == 0x80 {
        boundary -= 1;
    }
    boundary
}

/// Cuts a string to at most `max_bytes` bytes on a character boundary.
#[must_use]
pub fn clip_bytes(s: &str, max_bytes: usize) -> &str {
    &s[..find_char_boundary(s, max_bytes)]
}

/// Truncates a string at a grapheme cluster boundary.
///
/// Returns a slice containing at most `max_graphemes` grapheme clusters.
#[must_use]
pub fn truncate_graphemes(s: &str, max_graphemes: usize) -> &str {
    let mut end_byte = 0;

    for (count, grapheme) in s.graphemes(true).enumerate() {
        if count >= max_graphemes {
            break;
        }
        end_byte += grapheme.len();
    }

    &s[..end_byte]
}

/// Truncates to `max_graphemes` and appends [`ELLIPSIS`] when text was cut.
#[must_use]
pub fn ellipsize(s: &str, max_graphemes: usize) -> String {
    let truncated = truncate_graphemes(s, max_graphemes);
    if truncated.len() < s.len() {
        format!("{truncated}{ELLIPSIS}")
    } else {
        s.to_string()
    }
}

/// Collapses line breaks so text fits on one output line.
#[must_use]
pub fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
