#![deny(missing_docs)]
//! # opal — umbrella crate
//!
//! Provides a single import surface for the opal security subsystem.
//! Re-exports the vault, scrubber, and planner adapter behind feature
//! flags, plus a `prelude` for the happy path.

#[cfg(feature = "core")]
pub use opal_core;
#[cfg(feature = "core")]
pub use opal_plan;
#[cfg(feature = "core")]
pub use opal_scrub;
#[cfg(feature = "session-local")]
pub use opal_session_local;
#[cfg(feature = "core")]
pub use opal_vault;

/// Happy-path imports for planning, executing, and scrubbing.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use opal_core::{
        canonical_bytes, DisplayId, ExprId, RunOptions, RunOutput, ScrubError, ScrubPattern,
        SecretProvider, SecretUse, Session, SessionError, SiteId, StaticPatterns, TransportId,
        VaultError, EXIT_CANCELLED, EXIT_NOT_FOUND, EXIT_SUCCESS, EXIT_TIMEOUT,
    };

    #[cfg(feature = "core")]
    pub use opal_vault::{Vault, VaultSecretProvider};

    #[cfg(feature = "core")]
    pub use opal_scrub::Scrubber;

    #[cfg(feature = "core")]
    pub use opal_plan::{Executor, PlanContract, Planner, PrunePolicy, ValueProducer};

    #[cfg(feature = "session-local")]
    pub use opal_session_local::LocalSession;
}
