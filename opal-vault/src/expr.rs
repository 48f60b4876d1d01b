//! The tracked expression record.

use opal_core::id::{DisplayId, TransportId};
use serde_json::Value;
use std::fmt;

/// One value-producing construct tracked by the vault.
///
/// Created at declaration or first tracking; gains a value via
/// `store_unresolved_value`; frozen by `resolve_all_touched`. Once
/// `resolved` is true the record never changes again.
pub struct Expression {
    pub(crate) raw: String,
    pub(crate) value: Option<Value>,
    pub(crate) display_id: DisplayId,
    pub(crate) resolved: bool,
    pub(crate) transport_sensitive: bool,
    pub(crate) declared_transport: TransportId,
}

impl Expression {
    pub(crate) fn new(raw: String, transport_sensitive: bool, declared_transport: TransportId) -> Self {
        Self {
            raw,
            value: None,
            display_id: DisplayId::new(""),
            resolved: false,
            transport_sensitive,
            declared_transport,
        }
    }

    /// Original textual source, e.g. `@env.HOME` or `literal:42`.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The display placeholder. Empty iff the expression is unresolved.
    pub fn display_id(&self) -> &DisplayId {
        &self.display_id
    }

    /// Whether the value has been frozen.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Whether the value may not leave its declared transport.
    pub fn is_transport_sensitive(&self) -> bool {
        self.transport_sensitive
    }

    /// Transport context captured at declaration. Resolution never
    /// overwrites this.
    pub fn declared_transport(&self) -> &TransportId {
        &self.declared_transport
    }
}

// The value is cleartext once stored. Never log it.
impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("raw", &self.raw)
            .field("value", &self.value.as_ref().map(|_| "[REDACTED]"))
            .field("display_id", &self.display_id)
            .field("resolved", &self.resolved)
            .field("transport_sensitive", &self.transport_sensitive)
            .field("declared_transport", &self.declared_transport)
            .finish()
    }
}
