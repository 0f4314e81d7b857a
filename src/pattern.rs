//! Glob patterns for the KEYS command.
//!
//! Only two wildcards are recognised:
//!
//! - `*` matches any sequence of bytes, including the empty one
//! - `?` matches exactly one byte
//!
//! Every other byte is literal. The glob is translated into an anchored
//! byte-oriented regular expression in which each literal byte is emitted as
//! an escape, so characters like `.`, `+`, `(` or `[` in a key pattern can
//! never leak into the regex syntax.
//!
//! ## Example
//!
//! ```
//! use driftkv::pattern::GlobPattern;
//!
//! let pattern = GlobPattern::new(b"user:*").unwrap();
//! assert!(pattern.matches(b"user:1"));
//! assert!(!pattern.matches(b"users:1"));
//! ```

use crate::error::KeyspaceError;
use regex::bytes::{Regex, RegexBuilder};

/// Default upper bound on the compiled size of a pattern (10 MB, the regex
/// crate's own default).
pub const DEFAULT_SIZE_LIMIT: usize = 10 * (1 << 20);

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    regex: Regex,
}

impl GlobPattern {
    /// Compiles `pattern` with the default size limit.
    pub fn new(pattern: &[u8]) -> Result<Self, KeyspaceError> {
        Self::with_size_limit(pattern, DEFAULT_SIZE_LIMIT)
    }

    /// Compiles `pattern`, failing with `InvalidPattern` if the compiled
    /// program would exceed `size_limit` bytes.
    pub fn with_size_limit(pattern: &[u8], size_limit: usize) -> Result<Self, KeyspaceError> {
        let source = translate(pattern);
        let regex = RegexBuilder::new(&source)
            .unicode(false)
            .dot_matches_new_line(true)
            .size_limit(size_limit)
            .build()
            .map_err(|e| KeyspaceError::InvalidPattern(e.to_string()))?;

        Ok(Self { regex })
    }

    /// Returns true if the whole of `key` matches the pattern.
    #[inline]
    pub fn matches(&self, key: &[u8]) -> bool {
        self.regex.is_match(key)
    }

    /// The regular expression the glob was translated into.
    pub fn as_regex_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Translates a glob into regex source.
fn translate(pattern: &[u8]) -> String {
    let mut source = String::with_capacity(pattern.len() * 4 + 4);
    source.push_str(r"\A");

    for &byte in pattern {
        match byte {
            b'*' => source.push_str(".*"),
            b'?' => source.push('.'),
            b if b.is_ascii_alphanumeric() => source.push(b as char),
            b => source.push_str(&format!(r"\x{:02X}", b)),
        }
    }

    source.push_str(r"\z");
    source
}
