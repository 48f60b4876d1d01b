#![deny(missing_docs)]
//! Streaming secret scrubber for opal.
//!
//! [`Scrubber`] wraps any `std::io::Write` sink and replaces every
//! known secret flowing through it with the secret's display
//! placeholder, safely across chunk boundaries. Patterns come from a
//! [`SecretProvider`](opal_core::pattern::SecretProvider) — typically
//! the live handle returned by `opal_vault::Vault::secret_provider` —
//! and are re-read on every chunk, so secrets resolved mid-stream are
//! redacted from the next write onward.
//!
//! ## Variant contract
//!
//! Each registered secret is also matched in the following encoded and
//! obfuscated forms, all mapping to the same placeholder:
//!
//! - lowercase hex, uppercase hex
//! - standard base64, URL-safe base64, each padded and unpadded
//! - URL query-escaped (space as `+`), URL path-escaped
//! - byte-reversed
//! - character-separated with each of `-`, `_`, `.`, `:`
//!
//! This list is a contract: adding or removing a variant changes the
//! redaction surface for every consumer. Matching is longest-first, so
//! registering both `SECRET` and `SECRET_EXTENDED` never leaks the
//! `_EXTENDED` suffix.
//!
//! ## Usage
//!
//! ```
//! use opal_core::pattern::{ScrubPattern, StaticPatterns};
//! use opal_scrub::Scrubber;
//! use std::sync::Arc;
//!
//! let patterns = StaticPatterns(vec![ScrubPattern::new(
//!     b"password123".to_vec(),
//!     b"opal:ABCDEFGHIJKLMNOPQRSTUV".to_vec(),
//! )]);
//! let mut sink = Vec::new();
//! let scrubber = Scrubber::new(&mut sink, Arc::new(patterns));
//! scrubber.write(b"pass=password123").unwrap();
//! scrubber.close().unwrap();
//! drop(scrubber);
//! assert_eq!(sink, b"pass=opal:ABCDEFGHIJKLMNOPQRSTUV".to_vec());
//! ```
//!
//! Close on every exit path: until [`Scrubber::close`] runs, up to
//! `max_secret_len − 1` trailing bytes are withheld as carry. Dropping
//! an unclosed scrubber closes best-effort, discarding any error.

mod fingerprint;
mod variants;
mod writer;

pub use writer::Scrubber;
