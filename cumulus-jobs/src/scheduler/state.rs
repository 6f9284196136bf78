use cumulus_core::Timestamp;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Record {
    last_run: Timestamp,
}

/// The persisted scheduler watermark, a small JSON file holding the time of
/// the last scheduler evaluation.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateFile { path: path.into() }
    }

    pub fn for_config(state_dir: &Path, stem: &str) -> Self {
        Self::new(state_dir.join(format!("cumulus-cron-{}.json", stem)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the watermark. Missing or unreadable state is logged and reported
    /// as `None`.
    pub async fn load(&self) -> Option<Timestamp> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no scheduler state yet");
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "failed to read scheduler state: {}",
                    e
                );
                return None;
            }
        };
        match serde_json::from_slice::<Record>(&data) {
            Ok(record) => Some(record.last_run),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "corrupt scheduler state: {}", e);
                None
            }
        }
    }

    pub async fn save(&self, last_run: Timestamp) -> std::io::Result<()> {
        let data = serde_json::to_vec(&Record { last_run })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}
