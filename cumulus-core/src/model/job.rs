use super::{Options, Repository};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(pub String);

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Hooks {
    pub before: Vec<String>,
    pub success: Vec<String>,
    pub failure: Vec<String>,
}

impl Hooks {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.success.is_empty() && self.failure.is_empty()
    }
}

#[derive(Debug, Default, PartialEq, Clone)]
pub struct BackupJob {
    pub name: Name,
    pub cron: Option<String>,
    pub healthcheck_url: Option<String>,
    pub from: Vec<String>,
    pub to: Arc<Repository>,
    pub ignore_missing_xattrs: bool,
    pub options: Options,
    pub hooks: Hooks,
}

#[derive(Debug, Default, PartialEq, Clone)]
pub struct CopyJob {
    pub name: Name,
    pub cron: Option<String>,
    pub healthcheck_url: Option<String>,
    pub from: Arc<Repository>,
    pub to: Arc<Repository>,
    pub options: Options,
    pub hooks: Hooks,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Job {
    Backup(BackupJob),
    Copy(CopyJob),
}

impl Job {
    pub fn name(&self) -> &Name {
        match self {
            Job::Backup(job) => &job.name,
            Job::Copy(job) => &job.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Job::Backup(_) => "backup",
            Job::Copy(_) => "copy",
        }
    }

    pub fn cron(&self) -> Option<&str> {
        match self {
            Job::Backup(job) => job.cron.as_deref(),
            Job::Copy(job) => job.cron.as_deref(),
        }
    }

    pub fn healthcheck_url(&self) -> Option<&str> {
        match self {
            Job::Backup(job) => job.healthcheck_url.as_deref(),
            Job::Copy(job) => job.healthcheck_url.as_deref(),
        }
    }

    pub fn hooks(&self) -> &Hooks {
        match self {
            Job::Backup(job) => &job.hooks,
            Job::Copy(job) => &job.hooks,
        }
    }

    /// The repository the job writes to.
    pub fn target(&self) -> &Arc<Repository> {
        match self {
            Job::Backup(job) => &job.to,
            Job::Copy(job) => &job.to,
        }
    }
}
