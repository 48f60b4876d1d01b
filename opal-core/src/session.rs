//! The transport session contract — how commands run inside a transport.
//!
//! A `Session` is the execution surface of one transport context: the
//! local process, an SSH connection, a container. Transport-boundary
//! decorators open sessions; the vault only ever sees the transport
//! *name* (see `TransportId`), never the session itself.

use crate::error::SessionError;
use crate::id::TransportId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Exit code for a successful command.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code reported when a command exceeds its timeout.
pub const EXIT_TIMEOUT: i32 = 124;
/// Exit code for command-not-found and decorator precondition failures.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when execution is cancelled.
pub const EXIT_CANCELLED: i32 = -1;

/// Options for a single command execution.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Kill the command and report [`EXIT_TIMEOUT`] after this long.
    pub timeout: Option<Duration>,
    /// Ambient cancellation. A fired token reports [`EXIT_CANCELLED`].
    pub cancel: Option<CancellationToken>,
}

/// Captured result of a command execution.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// The reserved-code-aware exit status.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

impl RunOutput {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.exit_code == EXIT_SUCCESS
    }
}

/// One transport session.
///
/// Sessions are immutable-by-derivation: `with_env` and `with_workdir`
/// produce derived sessions and never mutate the parent. This is what
/// lets `@workdir` and env-mutating decorators nest without interfering
/// with sibling branches running on the same transport.
///
/// Implementations:
/// - `LocalSession` (opal-session-local): the current process
/// - SSH and container sessions live with their boundary decorators
#[async_trait]
pub trait Session: Send + Sync {
    /// The transport this session executes in.
    fn transport(&self) -> TransportId;

    /// Environment-variable map of the session.
    async fn env(&self) -> Result<HashMap<String, String>, SessionError>;

    /// Current working directory of the session.
    async fn cwd(&self) -> Result<PathBuf, SessionError>;

    /// Run a command and capture its output. `argv[0]` is the program.
    async fn run(&self, argv: &[String], opts: RunOptions) -> Result<RunOutput, SessionError>;

    /// Derive a session with additional/overridden environment variables.
    fn with_env(&self, delta: HashMap<String, String>) -> Arc<dyn Session>;

    /// Derive a session with a different working directory.
    fn with_workdir(&self, dir: PathBuf) -> Arc<dyn Session>;
}
