//! Error types for the vault, the scrubber, and transport sessions.
//!
//! Security errors carry the expression ID, site path, and transport
//! names involved — never the cleartext value. Invariant violations are
//! not represented here: they are programmer errors and panic at the
//! point of detection.

use thiserror::Error;

/// Vault errors. All variants are recoverable by the caller; the planner
/// typically promotes `NotFound`/`NotResolved` to planning errors and
/// surfaces the security variants verbatim.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum VaultError {
    /// The expression is unknown to the vault.
    #[error("expression not found: {0}")]
    NotFound(String),

    /// The display ID is unknown to the vault (never resolved or pruned).
    #[error("display id not found: {0}")]
    DisplayIdNotFound(String),

    /// No expression registered under this variable name in the current
    /// scope or any parent scope.
    #[error("variable not found: {0}")]
    VariableNotFound(String),

    /// The expression has no resolved value yet.
    #[error("expression not resolved: {0}")]
    NotResolved(String),

    /// The current site holds no authority over this expression.
    #[error("no authority for {expr_id} at {site}")]
    Unauthorized {
        /// The expression that was asked for.
        expr_id: String,
        /// The canonical site path of the denied access.
        site: String,
    },

    /// A transport-sensitive expression was used outside the transport
    /// it was declared in.
    #[error(
        "transport boundary violation: {expr_id} declared in '{declared}', used in '{current}'"
    )]
    TransportBoundary {
        /// The expression that was asked for.
        expr_id: String,
        /// Transport the expression was declared in.
        declared: String,
        /// Transport the access was attempted from.
        current: String,
    },
}

/// Scrubber errors. Writer failures propagate; the remaining variants
/// are scrubber-local conditions.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ScrubError {
    /// The underlying writer failed.
    #[error("writer error: {0}")]
    Writer(#[from] std::io::Error),

    /// The underlying writer accepted fewer bytes than it was given.
    #[error("short write to underlying writer")]
    ShortWrite,

    /// A write was attempted after `close()`.
    #[error("write after close")]
    Closed,

    /// The ambient cancellation token fired. Carry bytes are still
    /// redacted and flushed by `close()`.
    #[error("scrub cancelled")]
    Cancelled,
}

/// Transport session errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
    /// The command could not be spawned (maps to exit code 127).
    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    /// An I/O failure while talking to the session.
    #[error("session io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_error_display_all_variants() {
        assert_eq!(
            VaultError::NotFound("local:0011223344556677".into()).to_string(),
            "expression not found: local:0011223344556677"
        );
        assert_eq!(
            VaultError::DisplayIdNotFound("opal:deadbeef".into()).to_string(),
            "display id not found: opal:deadbeef"
        );
        assert_eq!(
            VaultError::VariableNotFound("TOKEN".into()).to_string(),
            "variable not found: TOKEN"
        );
        assert_eq!(
            VaultError::NotResolved("local:0011223344556677".into()).to_string(),
            "expression not resolved: local:0011223344556677"
        );
        assert_eq!(
            VaultError::Unauthorized {
                expr_id: "local:00".into(),
                site: "root/step-1/@timeout[0]/params/duration".into(),
            }
            .to_string(),
            "no authority for local:00 at root/step-1/@timeout[0]/params/duration"
        );
        assert_eq!(
            VaultError::TransportBoundary {
                expr_id: "local:00".into(),
                declared: "local".into(),
                current: "ssh:server1".into(),
            }
            .to_string(),
            "transport boundary violation: local:00 declared in 'local', used in 'ssh:server1'"
        );
    }

    #[test]
    fn scrub_error_display() {
        assert_eq!(ScrubError::ShortWrite.to_string(), "short write to underlying writer");
        assert_eq!(ScrubError::Closed.to_string(), "write after close");
        assert_eq!(ScrubError::Cancelled.to_string(), "scrub cancelled");
    }

    #[test]
    fn security_errors_never_mention_values() {
        // The error surface only carries identifiers and paths; a value
        // would have to be smuggled through one of these strings.
        let err = VaultError::Unauthorized {
            expr_id: "local:aa".into(),
            site: "root/step-1/@shell[0]/params/command".into(),
        };
        assert!(!err.to_string().contains("secret-value"));
    }
}
