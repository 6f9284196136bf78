use crate::context::RunContext;
use async_trait::async_trait;
use std::{process::Stdio, time::Duration};
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to start hook '{command}'")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("error reading output of hook '{command}'")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("hook '{command}' failed [{}]{}", exit_code_text(.exit_code), stderr_suffix(.stderr))]
    Failed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("hook '{command}' was interrupted")]
    Cancelled { command: String },
}

impl HookError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            HookError::Failed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

fn exit_code_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "unknown exit code".to_owned(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    match stderr.trim() {
        "" => String::new(),
        s => format!(": {}", s),
    }
}

/// Runs user-supplied hook commands.
#[async_trait]
pub trait HookRunner: Send + Sync {
    /// Runs `command` with the context's environment added to the process
    /// environment.
    async fn run(&self, ctx: &RunContext, command: &str) -> Result<(), HookError>;
}

/// Runs hooks through the platform shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct Shell;

impl Shell {
    const KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

    #[cfg(not(windows))]
    fn command(command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }

    #[cfg(windows)]
    fn command(command: &str) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
}

#[async_trait]
impl HookRunner for Shell {
    async fn run(&self, ctx: &RunContext, command: &str) -> Result<(), HookError> {
        if ctx.print_commands() {
            tracing::info!("$ {}", command);
        }

        let mut child = Self::command(command)
            .envs(ctx.env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HookError::Spawn {
                command: command.to_owned(),
                source,
            })?;

        let outcome = {
            let wait = async {
                let stderr = crate::output::forward(&mut child, ctx.source()).await?;
                let status = child.wait().await?;
                Ok::<_, std::io::Error>((status, stderr))
            };
            tokio::pin!(wait);
            tokio::select! {
                result = &mut wait => Some(result),
                _ = ctx.cancellation().cancelled() => None,
            }
        };

        let (status, stderr) = match outcome {
            Some(result) => result.map_err(|source| HookError::Io {
                command: command.to_owned(),
                source,
            })?,
            None => {
                let _ = child.start_kill();
                let _ = tokio::time::timeout(Self::KILL_GRACE_PERIOD, child.wait()).await;
                return Err(HookError::Cancelled {
                    command: command.to_owned(),
                });
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(HookError::Failed {
                command: command.to_owned(),
                exit_code: status.code(),
                stderr,
            })
        }
    }
}
