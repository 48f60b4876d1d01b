//! # opal-core — vocabulary for the opal security subsystem
//!
//! This crate defines the shared data types that cross the boundaries
//! between the vault, the scrubber, the planner adapter, and transport
//! sessions. It contains no behavior beyond construction, formatting,
//! and canonicalization — the interesting logic lives in the crates
//! above it.
//!
//! | Concern | Types |
//! |---------|-------|
//! | Identifiers | [`ExprId`], [`DisplayId`], [`SiteId`], [`TransportId`] |
//! | Plan records | [`SecretUse`] |
//! | Redaction | [`ScrubPattern`], [`SecretProvider`] |
//! | Values | [`canonical_bytes`] over `serde_json::Value` |
//! | Sessions | [`Session`], [`RunOptions`], [`RunOutput`] |
//! | Errors | [`VaultError`], [`ScrubError`], [`SessionError`] |
//!
//! ## Design Principle
//!
//! Secret values are `serde_json::Value` — string, integer, boolean,
//! map, sequence. JSON is the interchange format of the surrounding
//! runtime, and `serde_json`'s default object representation (sorted
//! keys, compact encoding) doubles as the canonical serialization that
//! feeds every keyed hash in the system.
//!
//! ## Error discipline
//!
//! Recoverable conditions (unknown expression, missing authority,
//! transport boundary refusal, writer failures) are returned as typed
//! errors. Programmer errors — popping the root path segment, duplicate
//! declarations that disagree on sensitivity, scope cycles, resolving a
//! touched expression that has no value — are invariant violations and
//! panic with a diagnostic. Error messages never contain cleartext.

#![deny(missing_docs)]

pub mod error;
pub mod id;
pub mod pattern;
pub mod secret_use;
pub mod session;
pub mod value;

// Re-exports for convenience
pub use error::{ScrubError, SessionError, VaultError};
pub use id::{DisplayId, ExprId, SiteId, TransportId, LOCAL_TRANSPORT};
pub use pattern::{ScrubPattern, SecretProvider, StaticPatterns};
pub use secret_use::SecretUse;
pub use session::{
    RunOptions, RunOutput, Session, EXIT_CANCELLED, EXIT_NOT_FOUND, EXIT_SUCCESS, EXIT_TIMEOUT,
};
pub use value::canonical_bytes;
