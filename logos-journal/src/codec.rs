//! Compact undo/redo blobs for one file's change spans.
//!
//! Blob layout, one entry per span, in order:
//! ```text
//! redo: start            [removed_len]   [replacement]
//! undo: start + drift    [inserted_len]  [original]
//!        varint           varint          varint len + UTF-8
//! ```
//! Bracketed fields are omitted when the corresponding text is the same
//! for every span ([`SharedText`]). Batch renames and plain find/replace
//! hit that case almost always, which shrinks blobs by an order of
//! magnitude.
//!
//! Undo offsets are shifted by the cumulative length change of the
//! preceding spans so they address the *new* text directly.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::host::Direction;
use crate::span::{self, ChangeSpan};

/// Find/replace text common to every span of a file, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedText {
    /// Original text of every span, when identical across the file.
    pub find: Option<String>,
    /// Replacement text of every span, when identical across the file.
    pub replace: Option<String>,
}

impl SharedText {
    /// Detect shared text for `spans` computed against `old_text`.
    ///
    /// Spans must already be validated against `old_text`.
    pub fn detect(old_text: &str, spans: &[ChangeSpan]) -> Self {
        let Some(first) = spans.first() else {
            return Self::default();
        };
        let find = &old_text[first.range()];
        let find = spans
            .iter()
            .all(|s| &old_text[s.range()] == find)
            .then(|| find.to_string());
        let replace = spans
            .iter()
            .all(|s| s.text == first.text)
            .then(|| first.text.clone());
        Self { find, replace }
    }
}

/// Encoder/decoder for one file's delta.
#[derive(Debug, Clone, Default)]
pub struct DeltaCodec {
    shared: SharedText,
}

impl DeltaCodec {
    pub fn new(shared: SharedText) -> Self {
        Self { shared }
    }

    /// Codec for freshly captured spans, detecting shared text.
    pub fn for_spans(old_text: &str, spans: &[ChangeSpan]) -> Self {
        Self::new(SharedText::detect(old_text, spans))
    }

    pub fn shared(&self) -> &SharedText {
        &self.shared
    }

    pub fn into_shared(self) -> SharedText {
        self.shared
    }

    /// Encode the blob that turns the new text back into `old_text`.
    pub fn encode_undo(
        &self,
        old_text: &str,
        spans: &[ChangeSpan],
        buf: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        buf.clear();
        let mut drift: isize = 0;
        for s in spans {
            write_varint(buf, (s.start as isize + drift) as u64)?;
            drift += s.drift();
            if self.shared.replace.is_none() {
                write_varint(buf, s.text.len() as u64)?;
            }
            if self.shared.find.is_none() {
                write_str(buf, &old_text[s.range()])?;
            }
        }
        Ok(())
    }

    /// Encode the blob that turns the old text into the new text.
    pub fn encode_redo(&self, spans: &[ChangeSpan], buf: &mut Vec<u8>) -> Result<(), CodecError> {
        buf.clear();
        for s in spans {
            write_varint(buf, s.start as u64)?;
            if self.shared.find.is_none() {
                write_varint(buf, s.removed_len() as u64)?;
            }
            if self.shared.replace.is_none() {
                write_str(buf, &s.text)?;
            }
        }
        Ok(())
    }

    /// Decode `blob` into absolute spans against the text it applies to.
    pub fn decode_into(
        &self,
        blob: &[u8],
        direction: Direction,
        out: &mut Vec<ChangeSpan>,
    ) -> Result<(), CodecError> {
        out.clear();
        // Redo removes `find` and inserts `replace`; undo is the mirror image.
        let (removed, inserted) = match direction {
            Direction::Redo => (&self.shared.find, &self.shared.replace),
            Direction::Undo => (&self.shared.replace, &self.shared.find),
        };
        let mut bytes = blob;
        while !bytes.is_empty() {
            let start = read_varint(&mut bytes)?;
            let len = match removed {
                Some(s) => s.len(),
                None => read_varint(&mut bytes)?,
            };
            let text = match inserted {
                Some(s) => s.clone(),
                None => read_str(&mut bytes)?.to_string(),
            };
            let end = start
                .checked_add(len)
                .ok_or_else(|| CodecError::Varint(format!("span {start}+{len} overflows")))?;
            out.push(ChangeSpan::new(start, end, text));
        }
        Ok(())
    }

    /// Decode `blob` and apply it to `target`, writing the result to `out`.
    ///
    /// `spans` and `out` are scratch buffers; both are cleared first.
    pub fn apply_into(
        &self,
        target: &str,
        blob: &[u8],
        direction: Direction,
        spans: &mut Vec<ChangeSpan>,
        out: &mut String,
    ) -> Result<(), CodecError> {
        self.decode_into(blob, direction, spans)?;
        span::apply_into(target, spans, out)
    }

    /// Allocating form of [`apply_into`](Self::apply_into).
    pub fn apply(&self, target: &str, blob: &[u8], direction: Direction) -> Result<String, CodecError> {
        let mut spans = Vec::new();
        let mut out = String::new();
        self.apply_into(target, blob, direction, &mut spans, &mut out)?;
        Ok(out)
    }
}

fn write_varint(buf: &mut Vec<u8>, value: u64) -> Result<(), CodecError> {
    leb128::write::unsigned(buf, value).map_err(|e| CodecError::Varint(e.to_string()))?;
    Ok(())
}

fn write_str(buf: &mut Vec<u8>, s: &str) -> Result<(), CodecError> {
    write_varint(buf, s.len() as u64)?;
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn read_varint(bytes: &mut &[u8]) -> Result<usize, CodecError> {
    let value = leb128::read::unsigned(bytes).map_err(|e| CodecError::Varint(e.to_string()))?;
    usize::try_from(value).map_err(|e| CodecError::Varint(e.to_string()))
}

fn read_str<'a>(bytes: &mut &'a [u8]) -> Result<&'a str, CodecError> {
    let len = read_varint(bytes)?;
    if bytes.len() < len {
        return Err(CodecError::Truncated {
            needed: len,
            available: bytes.len(),
        });
    }
    let (head, tail) = bytes.split_at(len);
    *bytes = tail;
    Ok(std::str::from_utf8(head)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs(old: &str, spans: &[ChangeSpan]) -> (DeltaCodec, Vec<u8>, Vec<u8>) {
        let codec = DeltaCodec::for_spans(old, spans);
        let mut undo = Vec::new();
        let mut redo = Vec::new();
        codec.encode_undo(old, spans, &mut undo).unwrap();
        codec.encode_redo(spans, &mut redo).unwrap();
        (codec, undo, redo)
    }

    fn check_both_ways(old: &str, spans: &[ChangeSpan]) {
        let new = span::apply(old, spans).unwrap();
        let (codec, undo, redo) = blobs(old, spans);
        assert_eq!(codec.apply(old, &redo, Direction::Redo).unwrap(), new);
        assert_eq!(codec.apply(&new, &undo, Direction::Undo).unwrap(), old);
    }

    #[test]
    fn test_shared_find_and_replace_detected() {
        let old = "foo bar foo";
        let spans = vec![ChangeSpan::new(0, 3, "baz"), ChangeSpan::new(8, 11, "baz")];
        let shared = SharedText::detect(old, &spans);
        assert_eq!(shared.find.as_deref(), Some("foo"));
        assert_eq!(shared.replace.as_deref(), Some("baz"));
        check_both_ways(old, &spans);
    }

    #[test]
    fn test_shared_blobs_hold_offsets_only() {
        let old = "foo bar foo";
        let spans = vec![ChangeSpan::new(0, 3, "quux"), ChangeSpan::new(8, 11, "quux")];
        let (_, undo, redo) = blobs(old, &spans);
        // one single-byte varint per span
        assert_eq!(redo, vec![0, 8]);
        // second span shifted by the first span's growth
        assert_eq!(undo, vec![0, 9]);
    }

    #[test]
    fn test_regex_style_replacement_keeps_texts() {
        let old = "let a = 1; let bb = 22;";
        let spans = vec![ChangeSpan::new(4, 5, "x_a"), ChangeSpan::new(15, 17, "x_bb")];
        let shared = SharedText::detect(old, &spans);
        assert_eq!(shared, SharedText::default());
        check_both_ways(old, &spans);
    }

    #[test]
    fn test_only_find_shared() {
        let old = "id id id";
        let spans = vec![
            ChangeSpan::new(0, 2, "one"),
            ChangeSpan::new(3, 5, "2"),
            ChangeSpan::new(6, 8, "three"),
        ];
        let shared = SharedText::detect(old, &spans);
        assert_eq!(shared.find.as_deref(), Some("id"));
        assert!(shared.replace.is_none());
        check_both_ways(old, &spans);
    }

    #[test]
    fn test_insertions_and_deletions() {
        check_both_ways("abcdef", &[ChangeSpan::new(0, 0, ">> "), ChangeSpan::new(6, 6, " <<")]);
        check_both_ways("abcdef", &[ChangeSpan::new(1, 3, ""), ChangeSpan::new(4, 6, "")]);
    }

    #[test]
    fn test_multibyte_text() {
        let old = "naïve café, naïve";
        let spans = vec![ChangeSpan::new(0, 6, "naive"), ChangeSpan::new(14, 20, "naive")];
        check_both_ways(old, &spans);
    }

    #[test]
    fn test_large_offsets_use_multibyte_varints() {
        let old = format!("{}needle{}needle", "x".repeat(300), "y".repeat(20_000));
        let first = old.find("needle").unwrap();
        let second = old.rfind("needle").unwrap();
        let spans = vec![
            ChangeSpan::new(first, first + 6, "pin"),
            ChangeSpan::new(second, second + 6, "pin"),
        ];
        check_both_ways(&old, &spans);
    }

    #[test]
    fn test_truncated_blob_is_an_error() {
        let old = "let a = 1;";
        let spans = vec![ChangeSpan::new(4, 5, "bee"), ChangeSpan::new(8, 9, "22")];
        let (codec, _, mut redo) = blobs(old, &spans);
        redo.pop();
        assert!(matches!(
            codec.apply(old, &redo, Direction::Redo),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_overflowing_span_is_an_error() {
        let codec = DeltaCodec::new(SharedText::default());
        let mut blob = Vec::new();
        leb128::write::unsigned(&mut blob, usize::MAX as u64).unwrap();
        leb128::write::unsigned(&mut blob, 1).unwrap();
        leb128::write::unsigned(&mut blob, 0).unwrap();
        let mut spans = Vec::new();
        assert!(matches!(
            codec.decode_into(&blob, Direction::Redo, &mut spans),
            Err(CodecError::Varint(_))
        ));
    }

    #[test]
    fn test_blob_against_wrong_text_is_rejected() {
        let old = "foo bar foo";
        let spans = vec![ChangeSpan::new(8, 11, "baz")];
        let (codec, _, redo) = blobs(old, &spans);
        assert!(codec.apply("foo", &redo, Direction::Redo).is_err());
    }

    #[test]
    fn test_decode_reuses_output() {
        let old = "a a";
        let spans = vec![ChangeSpan::new(0, 1, "b"), ChangeSpan::new(2, 3, "b")];
        let (codec, _, redo) = blobs(old, &spans);
        let mut out = vec![ChangeSpan::new(9, 9, "leftover")];
        codec.decode_into(&redo, Direction::Redo, &mut out).unwrap();
        assert_eq!(out, spans);
    }
}
