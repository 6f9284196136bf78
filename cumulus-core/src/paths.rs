use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StateDirError {
    #[error("can't determine a state directory for this user")]
    NoStateDir,
    #[error("failed to create state directory {}", .0.display())]
    CreateFailed(PathBuf, #[source] std::io::Error),
}

/// The per-user directory that holds lock files and the cron watermark.
pub fn default_state_dir() -> Result<PathBuf, StateDirError> {
    dirs_next::data_local_dir()
        .map(|dir| dir.join("cumulus"))
        .ok_or(StateDirError::NoStateDir)
}

/// Creates `dir` if needed. New directories are only accessible by the owner.
pub async fn ensure_state_dir(dir: &Path) -> Result<(), StateDirError> {
    if tokio::fs::metadata(dir).await.is_ok() {
        return Ok(());
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StateDirError::CreateFailed(dir.to_owned(), e))?;
    restrict_permissions(dir)
        .await
        .map_err(|e| StateDirError::CreateFailed(dir.to_owned(), e))
}

#[cfg(unix)]
async fn restrict_permissions(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
