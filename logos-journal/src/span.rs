//! Change spans: one contiguous replacement inside a file's text.
//!
//! Offsets are UTF-8 byte offsets into the text the span was computed
//! against. A list of spans for one file is ascending and non-overlapping.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::CodecError;

/// Replace `start..end` of the old text with `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl ChangeSpan {
    pub fn new(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Length of the replaced region in the old text.
    pub fn removed_len(&self) -> usize {
        self.end - self.start
    }

    /// Signed length change this span introduces.
    pub fn drift(&self) -> isize {
        self.text.len() as isize - self.removed_len() as isize
    }
}

/// Check that `spans` can be applied to `text` in order.
pub fn validate(text: &str, spans: &[ChangeSpan]) -> Result<(), CodecError> {
    let len = text.len();
    let mut last_end = 0;
    for span in spans {
        let reason = if span.end < span.start {
            Some("end before start")
        } else if span.end > len {
            Some("past end of text")
        } else if span.start < last_end {
            Some("overlaps or precedes previous span")
        } else if !text.is_char_boundary(span.start) || !text.is_char_boundary(span.end) {
            Some("not on a char boundary")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(CodecError::InvalidSpan {
                start: span.start,
                end: span.end,
                len,
                reason,
            });
        }
        last_end = span.end;
    }
    Ok(())
}

/// Apply `spans` to `text` left to right, writing the result into `out`.
///
/// `out` is cleared first so callers can hand in a reused buffer.
pub fn apply_into(text: &str, spans: &[ChangeSpan], out: &mut String) -> Result<(), CodecError> {
    validate(text, spans)?;
    out.clear();
    let grown = spans.iter().map(ChangeSpan::drift).sum::<isize>();
    out.reserve((text.len() as isize + grown).max(0) as usize);

    let mut copied = 0;
    for span in spans {
        out.push_str(&text[copied..span.start]);
        out.push_str(&span.text);
        copied = span.end;
    }
    out.push_str(&text[copied..]);
    Ok(())
}

/// Convenience wrapper around [`apply_into`].
pub fn apply(text: &str, spans: &[ChangeSpan]) -> Result<String, CodecError> {
    let mut out = String::new();
    apply_into(text, spans, &mut out)?;
    Ok(out)
}
