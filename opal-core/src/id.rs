//! Typed ID wrappers for expression, display, site, and transport identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The transport every vault starts in.
pub const LOCAL_TRANSPORT: &str = "local";

/// Typed ID wrappers prevent mixing up expression IDs, display IDs, etc.
/// These are just strings underneath — the construction rules (content
/// addressing, keyed hashing) live in `opal-vault`, which is the only
/// producer of well-formed values.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new typed ID from anything that converts to String.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the inner string is empty.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(
    ExprId,
    "Content-addressed identifier of a tracked expression: `<transport>:<hex>`. \
     Internal to the vault — never serialized into a plan."
);
typed_id!(
    DisplayId,
    "User-visible placeholder for a resolved secret value: `opal:<base64url>`. \
     Empty until the expression resolves."
);
typed_id!(
    SiteId,
    "Unforgeable identifier of a use-site, keyed-hashed from the canonical \
     site path. Empty in test mode (no plan key)."
);
typed_id!(
    TransportId,
    "A session scope name: `local`, `ssh:server1`, `docker:build`, …"
);

impl DisplayId {
    /// Prefix carried by every resolved display ID.
    pub const PREFIX: &'static str = "opal:";
}

impl TransportId {
    /// The initial transport context.
    pub fn local() -> Self {
        Self(LOCAL_TRANSPORT.to_owned())
    }

    /// Returns true if this is the local transport.
    pub fn is_local(&self) -> bool {
        self.0 == LOCAL_TRANSPORT
    }
}

impl Default for TransportId {
    fn default() -> Self {
        Self::local()
    }
}
