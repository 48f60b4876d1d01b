#![deny(missing_docs)]
//! Secret vault for opal — the expression registry and authorizer.
//!
//! The vault tracks every value-producing expression the planner walks
//! over, scopes variables in a lookup trie, records each syntactic site
//! that references an expression, and gates every unwrap behind two
//! checks: an unforgeable site authority (keyed hash of the canonical
//! site path) and the transport boundary (a transport-sensitive value
//! never resolves outside the transport it was declared in).
//!
//! ## Identity model
//!
//! - Expressions are content-addressed: same raw text in the same
//!   transport collapses to one [`ExprId`](opal_core::ExprId).
//! - Resolved values get a [`DisplayId`](opal_core::DisplayId) — an
//!   HMAC of the canonical value bytes under the plan key, so
//!   placeholders are stable within a plan and uncorrelated across
//!   plans.
//! - Sites get a [`SiteId`](opal_core::SiteId) the same way. Without
//!   the plan key an attacker cannot predict which site maps to which
//!   authority.
//!
//! ## Phases
//!
//! Plan time uses [`Vault::access`]; execution uses only
//! [`Vault::resolve_display_id_with_transport`] and the pattern
//! provider from [`Vault::secret_provider`]. The vault itself does not
//! model phases — the planner adapter (`opal-plan`) keeps `access` off
//! the execution path by construction.

mod expr;
mod hashing;
mod path;
mod provider;
mod scope;
mod vault;

pub use expr::Expression;
pub use provider::VaultSecretProvider;
pub use vault::{SiteRef, Vault, MIN_PLAN_KEY_BYTES};
