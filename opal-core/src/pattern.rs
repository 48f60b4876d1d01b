//! The scrubber-facing pattern contract.

use std::fmt;

/// One redaction pattern: a secret's bytes and the placeholder that
/// replaces them.
#[derive(Clone, PartialEq, Eq)]
pub struct ScrubPattern {
    /// The byte sequence to redact.
    pub value: Vec<u8>,
    /// The bytes emitted in its place.
    pub placeholder: Vec<u8>,
}

impl ScrubPattern {
    /// Create a pattern from a secret and its placeholder.
    pub fn new(value: impl Into<Vec<u8>>, placeholder: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            placeholder: placeholder.into(),
        }
    }
}

// The value bytes are cleartext. Never log them.
impl fmt::Debug for ScrubPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrubPattern")
            .field("value", &"[REDACTED]")
            .field("placeholder", &String::from_utf8_lossy(&self.placeholder))
            .finish()
    }
}

/// Source of the current redaction pattern set.
///
/// The scrubber calls [`patterns`](SecretProvider::patterns) on every
/// chunk, so a provider backed by live vault state picks up newly
/// resolved secrets on the next write. Already-emitted bytes are not
/// retroactively redacted.
///
/// Providers must not return patterns with an empty `value` — the
/// empty pattern matches everywhere.
pub trait SecretProvider: Send + Sync {
    /// The current set of `{value, placeholder}` pairs.
    fn patterns(&self) -> Vec<ScrubPattern>;
}

/// A fixed pattern list. Handy for tests and for scrubbing streams
/// whose secrets are known up front.
#[derive(Debug, Clone, Default)]
pub struct StaticPatterns(pub Vec<ScrubPattern>);

impl SecretProvider for StaticPatterns {
    fn patterns(&self) -> Vec<ScrubPattern> {
        self.0.clone()
    }
}
