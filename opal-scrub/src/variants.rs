//! Expansion of a registered secret into its encoded/obfuscated forms.
//!
//! The variant set is part of the crate contract (see the crate docs).
//! Every variant maps back to the same placeholder as the original.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use opal_core::pattern::ScrubPattern;
use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Escape everything outside the RFC 3986 unreserved set.
const URL_QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Path segments keep the sub-delims a path escaper leaves alone.
const URL_PATH: &AsciiSet = &URL_QUERY
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Separators used for character-separated obfuscations.
pub(crate) const SEPARATORS: [u8; 4] = [b'-', b'_', b'.', b':'];

/// Expand one secret into itself plus every variant form, deduplicated.
/// Empty secrets expand to nothing — the empty pattern matches
/// everywhere.
pub(crate) fn expand(pattern: &ScrubPattern) -> Vec<ScrubPattern> {
    let value = &pattern.value;
    if value.is_empty() {
        return Vec::new();
    }
    let mut out = vec![pattern.clone()];

    push(&mut out, pattern, hex::encode(value).into_bytes());
    push(&mut out, pattern, hex::encode_upper(value).into_bytes());

    push(&mut out, pattern, STANDARD.encode(value).into_bytes());
    push(&mut out, pattern, URL_SAFE.encode(value).into_bytes());
    push(&mut out, pattern, STANDARD_NO_PAD.encode(value).into_bytes());
    push(&mut out, pattern, URL_SAFE_NO_PAD.encode(value).into_bytes());

    push(&mut out, pattern, query_escape(value));
    push(&mut out, pattern, path_escape(value));

    push(&mut out, pattern, value.iter().rev().copied().collect());

    if value.len() >= 2 {
        for sep in SEPARATORS {
            push(&mut out, pattern, separated(value, sep));
        }
    }

    out
}

fn push(out: &mut Vec<ScrubPattern>, origin: &ScrubPattern, bytes: Vec<u8>) {
    if bytes.is_empty() || out.iter().any(|p| p.value == bytes) {
        return;
    }
    out.push(ScrubPattern::new(bytes, origin.placeholder.clone()));
}

fn query_escape(value: &[u8]) -> Vec<u8> {
    // Query strings carry spaces as `+`.
    percent_encode(value, URL_QUERY)
        .collect::<String>()
        .replace("%20", "+")
        .into_bytes()
}

fn path_escape(value: &[u8]) -> Vec<u8> {
    percent_encode(value, URL_PATH).collect::<String>().into_bytes()
}

fn separated(value: &[u8], sep: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() * 2 - 1);
    for (i, b) in value.iter().enumerate() {
        if i > 0 {
            out.push(sep);
        }
        out.push(*b);
    }
    out
}
