#![deny(missing_docs)]
//! Local (passthrough) implementation of opal-core's Session trait.
//!
//! No isolation and no remote hop: commands execute in the current
//! process's world, under a snapshot of its environment and working
//! directory taken at construction. Derived sessions (`with_env`,
//! `with_workdir`) copy and adjust the snapshot without touching the
//! parent, so sibling decorator branches cannot observe each other's
//! mutations.

use async_trait::async_trait;
use opal_core::error::SessionError;
use opal_core::id::TransportId;
use opal_core::session::{
    RunOptions, RunOutput, Session, EXIT_CANCELLED, EXIT_NOT_FOUND, EXIT_TIMEOUT,
};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// The local transport session.
///
/// Environment and working directory are immutable snapshots; every
/// `run` builds its command from them rather than from the live
/// process state, so a derived session is a complete description of
/// where and how its commands execute.
pub struct LocalSession {
    env: HashMap<String, String>,
    cwd: PathBuf,
}

impl LocalSession {
    /// Snapshot the current process environment and working directory.
    pub fn new() -> Result<Self, SessionError> {
        Ok(Self {
            env: std::env::vars().collect(),
            cwd: std::env::current_dir()?,
        })
    }

    /// Build a session from an explicit snapshot.
    pub fn with_snapshot(env: HashMap<String, String>, cwd: PathBuf) -> Self {
        Self { env, cwd }
    }
}

#[async_trait]
impl Session for LocalSession {
    fn transport(&self) -> TransportId {
        TransportId::local()
    }

    async fn env(&self) -> Result<HashMap<String, String>, SessionError> {
        Ok(self.env.clone())
    }

    async fn cwd(&self) -> Result<PathBuf, SessionError> {
        Ok(self.cwd.clone())
    }

    async fn run(&self, argv: &[String], opts: RunOptions) -> Result<RunOutput, SessionError> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(RunOutput {
                exit_code: EXIT_NOT_FOUND,
                stdout: Vec::new(),
                stderr: b"empty argv".to_vec(),
            });
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .env_clear()
            .envs(&self.env)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(program = %program, args = args.len(), "session.local.run");

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(RunOutput {
                    exit_code: EXIT_NOT_FOUND,
                    stdout: Vec::new(),
                    stderr: format!("command not found: {program}").into_bytes(),
                });
            }
            Err(e) => return Err(SessionError::SpawnFailed(e.to_string())),
        };

        let wait = child.wait_with_output();
        tokio::pin!(wait);

        let cancelled = async {
            match &opts.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let timed_out = async {
            match opts.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            output = &mut wait => {
                let output = output?;
                Ok(RunOutput {
                    exit_code: output.status.code().unwrap_or(EXIT_CANCELLED),
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
            _ = cancelled => {
                tracing::debug!(program = %program, "session.local.cancelled");
                Ok(RunOutput {
                    exit_code: EXIT_CANCELLED,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                })
            }
            _ = timed_out => {
                tracing::debug!(program = %program, "session.local.timeout");
                Ok(RunOutput {
                    exit_code: EXIT_TIMEOUT,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                })
            }
        }
    }

    fn with_env(&self, delta: HashMap<String, String>) -> Arc<dyn Session> {
        let mut env = self.env.clone();
        env.extend(delta);
        Arc::new(Self {
            env,
            cwd: self.cwd.clone(),
        })
    }

    fn with_workdir(&self, dir: PathBuf) -> Arc<dyn Session> {
        Arc::new(Self {
            env: self.env.clone(),
            cwd: dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn run_captures_stdout_and_exit_code() {
        let session = LocalSession::new().unwrap();
        let out = session
            .run(&argv(&["sh", "-c", "echo hello"]), RunOptions::default())
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_code_is_reported() {
        let session = LocalSession::new().unwrap();
        let out = session
            .run(&argv(&["sh", "-c", "exit 3"]), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
    }

    #[tokio::test]
    async fn missing_command_maps_to_127() {
        let session = LocalSession::new().unwrap();
        let out = session
            .run(
                &argv(&["definitely-not-a-command-xyz"]),
                RunOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(out.exit_code, EXIT_NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_argv_maps_to_127() {
        let session = LocalSession::new().unwrap();
        let out = session.run(&[], RunOptions::default()).await.unwrap();
        assert_eq!(out.exit_code, EXIT_NOT_FOUND);
    }

    #[tokio::test]
    async fn timeout_maps_to_124() {
        let session = LocalSession::new().unwrap();
        let mut opts = RunOptions::default();
        opts.timeout = Some(Duration::from_millis(50));
        let out = session
            .run(&argv(&["sh", "-c", "sleep 5"]), opts)
            .await
            .unwrap();
        assert_eq!(out.exit_code, EXIT_TIMEOUT);
    }

    #[tokio::test]
    async fn cancellation_maps_to_minus_one() {
        let session = LocalSession::new().unwrap();
        let token = CancellationToken::new();
        let mut opts = RunOptions::default();
        opts.cancel = Some(token.clone());
        let args = argv(&["sh", "-c", "sleep 5"]);
        let run = session.run(&args, opts);
        token.cancel();
        let out = run.await.unwrap();
        assert_eq!(out.exit_code, EXIT_CANCELLED);
    }

    #[tokio::test]
    async fn with_env_derives_without_mutating_parent() {
        let session = LocalSession::new().unwrap();
        let derived = session.with_env(HashMap::from([(
            "OPAL_TEST_MARKER".to_string(),
            "derived".to_string(),
        )]));
        assert_eq!(
            derived.env().await.unwrap().get("OPAL_TEST_MARKER"),
            Some(&"derived".to_string())
        );
        assert!(!session.env().await.unwrap().contains_key("OPAL_TEST_MARKER"));
    }

    #[tokio::test]
    async fn with_workdir_changes_command_cwd() {
        let session = LocalSession::new().unwrap();
        let derived = session.with_workdir(PathBuf::from("/"));
        let out = derived
            .run(&argv(&["sh", "-c", "pwd"]), RunOptions::default())
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "/");
        assert_ne!(session.cwd().await.unwrap(), PathBuf::from("/"));
    }

    #[tokio::test]
    async fn explicit_snapshot_is_authoritative() {
        let session = LocalSession::with_snapshot(
            HashMap::from([("PATH".to_string(), "/usr/bin:/bin".to_string())]),
            PathBuf::from("/"),
        );
        assert!(session.transport().is_local());
        let env = session.env().await.unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(session.cwd().await.unwrap(), PathBuf::from("/"));
    }

    #[tokio::test]
    async fn run_uses_the_session_env_snapshot() {
        let session = LocalSession::new().unwrap();
        let derived = session.with_env(HashMap::from([(
            "OPAL_SNAPSHOT_VAR".to_string(),
            "visible".to_string(),
        )]));
        let out = derived
            .run(
                &argv(&["sh", "-c", "printf %s \"$OPAL_SNAPSHOT_VAR\""]),
                RunOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout), "visible");
    }
}
