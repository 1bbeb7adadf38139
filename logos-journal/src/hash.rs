//! Content digests used to detect drift between a recorded delta and the
//! file it is about to be applied to.
//!
//! MD5 is plenty here: the digest guards against accidental edits made
//! outside the journal, not against tampering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 128-bit digest of a file's full text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 16]);

impl ContentHash {
    /// Digest of `text` (UTF-8 bytes).
    pub fn of(text: &str) -> Self {
        Self(md5::compute(text.as_bytes()).0)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Whether `text` still has this digest.
    pub fn matches(&self, text: &str) -> bool {
        Self::of(text) == *self
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({self})")
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
