//! Canonical byte serialization of secret values.

use serde_json::Value;

/// Canonical bytes of a value, the input to every keyed hash over values.
///
/// - Strings: the raw UTF-8 bytes themselves, no quoting.
/// - Everything else: canonical JSON — object keys sorted
///   lexicographically (the `serde_json` default map), no whitespace.
///
/// # Panics
///
/// A value that cannot be serialized is a fatal invariant violation.
/// `serde_json::Value` cannot hold non-finite numbers or non-string map
/// keys, so this does not fire for values the vault accepts.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::String(s) => s.as_bytes().to_vec(),
        other => serde_json::to_vec(other)
            .unwrap_or_else(|e| panic!("invariant violation: value canonicalization failed: {e}")),
    }
}
