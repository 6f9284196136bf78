use cumulus_core::{paths::StateDirError, restic, shell::HookError};
use std::path::PathBuf;

pub mod backup;
pub mod handler;
pub mod healthchecks;
pub mod scheduler;

pub use backup::JobErrors;
pub use handler::PanicError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("'{name}' is already running (lock file {})", .path.display())]
    LockContention { name: String, path: PathBuf },
    #[error("failed to acquire lock file {}", .0.display())]
    Lock(PathBuf, #[source] std::io::Error),
    #[error(transparent)]
    StateDir(#[from] StateDirError),
    #[error("before hooks failed")]
    BeforeHooks(#[source] HookError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Operation(#[from] restic::Error),
    #[error(transparent)]
    Panic(#[from] PanicError),
    #[error("failed to save schedule state to {}", .0.display())]
    SchedulePersist(PathBuf, #[source] std::io::Error),
    #[error(transparent)]
    Jobs(#[from] JobErrors),
    #[error("interrupted")]
    Cancelled,
}

/// Formats an error followed by all of its sources, separated by `: `.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
