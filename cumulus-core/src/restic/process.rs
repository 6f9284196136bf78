use super::Error;
use crate::context::RunContext;
use std::time::Duration;
use tokio::process::{Child, ChildStdout};

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum ExitStatus {
    Successful,
    Failed(Option<i32>),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        self == &ExitStatus::Successful
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Successful => Some(0),
            ExitStatus::Failed(code) => *code,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if status.success() {
            ExitStatus::Successful
        } else {
            ExitStatus::Failed(status.code())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    /// the last lines restic wrote to stderr, if stderr was captured
    pub stderr: String,
}

#[cfg(unix)]
fn ask_to_terminate(child: &mut Child) -> Result<(), Error> {
    match child.id() {
        Some(pid) => {
            unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            Ok(())
        }
        // already reaped
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn ask_to_terminate(child: &mut Child) -> Result<(), Error> {
    child
        .start_kill()
        .map_err(Error::SubprocessTerminateError)?;
    Ok(())
}

#[derive(Debug)]
pub struct ResticProcess {
    pub(crate) child: Child,
    pub(crate) source: &'static str,
}

impl ResticProcess {
    pub const TERMINATE_GRACE_PERIOD: Duration = Duration::from_secs(5);

    pub fn stdout(&mut self) -> &mut Option<ChildStdout> {
        &mut self.child.stdout
    }

    pub async fn wait(&mut self) -> Result<ExitStatus, Error> {
        let status = self
            .child
            .wait()
            .await
            .map_err(Error::SubprocessStatusError)?;
        Ok(status.into())
    }

    /// Forwards captured output to the log and waits for the process to exit.
    pub async fn wait_with_output(&mut self) -> Result<ProcessOutput, Error> {
        let stderr = crate::output::forward(&mut self.child, self.source)
            .await
            .map_err(Error::SubprocessIoError)?;
        let status = self.wait().await?;
        Ok(ProcessOutput { status, stderr })
    }

    /// Like [`wait_with_output`](Self::wait_with_output), but terminates the
    /// process when the context is cancelled first.
    pub async fn finish(mut self, ctx: &RunContext) -> Result<ProcessOutput, Error> {
        let outcome = {
            let wait = self.wait_with_output();
            tokio::pin!(wait);
            tokio::select! {
                result = &mut wait => Some(result),
                _ = ctx.cancellation().cancelled() => None,
            }
        };
        match outcome {
            Some(result) => result,
            None => {
                self.terminate(Self::TERMINATE_GRACE_PERIOD).await?;
                Err(Error::Cancelled)
            }
        }
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(pid = self.child.id(), grace_period_secs = grace_period.as_secs_f64())
    )]
    pub async fn terminate(&mut self, grace_period: Duration) -> Result<(), Error> {
        tracing::debug!("trying to terminate gracefully");
        ask_to_terminate(&mut self.child)?;
        match tokio::time::timeout(grace_period, self.wait()).await {
            Ok(result) => {
                tracing::debug!("process terminated before timeout");
                result?;
            }
            Err(_) => {
                tracing::debug!("process did not terminate before timeout, killing it instead");
                self.child
                    .kill()
                    .await
                    .map_err(Error::SubprocessTerminateError)?;
            }
        };
        Ok(())
    }
}
