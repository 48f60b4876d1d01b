//! Keyed hashing primitives: content addresses, display IDs, site IDs.
//!
//! Display and site IDs truncate a (keyed) SHA-256 digest to 16 bytes
//! and encode base64url without padding. With a plan key the digest is
//! HMAC-SHA-256; without one (test mode) it degrades to a plain SHA-256
//! so fixtures stay deterministic, and site IDs collapse to the empty
//! string so nothing can be mistaken for an authority.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use opal_core::id::{DisplayId, ExprId, SiteId, TransportId};
use opal_core::value::canonical_bytes;
use serde_json::Value;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Truncation length for display and site IDs, pre-encoding.
const ID_BYTES: usize = 16;

/// Leading digest bytes kept in an expression's content address.
const EXPR_ID_BYTES: usize = 8;

/// Content address of an expression: `<transport>:<hex>` where the hex
/// is the leading 8 bytes of SHA-256 over transport ‖ 0x00 ‖ raw.
///
/// Two declarations of the same raw text in the same transport collide
/// here on purpose — that collision is the deduplication rule.
pub(crate) fn expr_id(transport: &TransportId, raw: &str) -> ExprId {
    let mut hasher = Sha256::new();
    hasher.update(transport.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(raw.as_bytes());
    let digest = hasher.finalize();
    ExprId::new(format!(
        "{}:{}",
        transport.as_str(),
        hex::encode(&digest[..EXPR_ID_BYTES])
    ))
}

fn keyed_digest(plan_key: &[u8], data: &[u8]) -> [u8; 32] {
    if plan_key.is_empty() {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().into()
    } else {
        let mut mac =
            HmacSha256::new_from_slice(plan_key).expect("hmac accepts any key length");
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}

/// Display placeholder for a resolved value under the given plan key.
pub(crate) fn display_id(plan_key: &[u8], value: &Value) -> DisplayId {
    let digest = keyed_digest(plan_key, &canonical_bytes(value));
    DisplayId::new(format!(
        "{}{}",
        DisplayId::PREFIX,
        URL_SAFE_NO_PAD.encode(&digest[..ID_BYTES])
    ))
}

/// Site ID for a canonical site path. Empty without a plan key: in test
/// mode there are no authorities.
pub(crate) fn site_id(plan_key: &[u8], site: &str) -> SiteId {
    if plan_key.is_empty() {
        return SiteId::new("");
    }
    let digest = keyed_digest(plan_key, site.as_bytes());
    SiteId::new(URL_SAFE_NO_PAD.encode(&digest[..ID_BYTES]))
}
