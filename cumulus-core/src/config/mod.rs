use crate::model::{BackupJob, CopyJob, Job, Repository};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    sync::Arc,
};

pub mod job;
pub mod repo;

pub const FILE_NAME: &str = "cumulus.toml";

/// A commented configuration file covering every setting.
pub const EXAMPLE: &str = include_str!("cumulus.example.toml");

#[derive(Debug, Default, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timezone {
    #[default]
    Local,
    Utc,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    #[serde(alias = "restic_binary", skip_serializing_if = "Option::is_none")]
    pub restic_binary: Option<String>,
    /// used for jobs that don't declare their own healthcheck URL
    #[serde(alias = "healthcheck_url", skip_serializing_if = "Option::is_none")]
    pub healthcheck_url: Option<String>,
    pub timezone: Timezone,
    pub repositories: BTreeMap<repo::Name, repo::Definition>,
    pub jobs: Vec<job::Definition>,

    /// path of the configuration file, if the configuration was loaded from a file
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("invalid configuration string")]
    InvalidConfigString(#[source] toml::de::Error),
    #[error("invalid configuration file {}", .0.display())]
    InvalidConfigFile(PathBuf, #[source] toml::de::Error),
    #[error("i/o error reading configuration file {}", .0.display())]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("configuration file {} does not exist", .0.display())]
    MissingConfigFile(PathBuf),
    #[error("no configuration file found, looked in: {}", display_paths(.0))]
    NoConfigFile(Vec<PathBuf>),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("job #{0} has an empty name")]
    EmptyJobName(usize),
    #[error("duplicate job name '{0}'")]
    DuplicateJobName(job::Name),
    #[error("unknown repositories: {}", join(.0))]
    UnknownRepositories(Vec<repo::Name>),
    #[error("unknown jobs: {}", join(.0))]
    UnknownJobs(Vec<job::Name>),
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Config {
    pub fn parse(s: &str) -> Result<Config, ConfigLoadError> {
        toml::from_str(s).map_err(ConfigLoadError::InvalidConfigString)
    }

    pub async fn parse_file(p: &Path) -> Result<Config, ConfigLoadError> {
        let config_string = tokio::fs::read_to_string(p)
            .await
            .map_err(|e| ConfigLoadError::IoError(p.to_owned(), e))?;
        let mut config: Config = toml::from_str(&config_string)
            .map_err(|e| ConfigLoadError::InvalidConfigFile(p.to_owned(), e))?;
        config.source = Some(p.to_owned());
        Ok(config)
    }

    /// Loads the configuration from `explicit` if given, otherwise from the
    /// first default location that has a file.
    pub async fn load(explicit: Option<&Path>) -> Result<Config, ConfigLoadError> {
        let path = find_config_file(explicit, &default_locations())?;
        Self::parse_file(&path).await
    }

    /// Turns the definitions into jobs with shared repository references.
    pub fn resolve(&self) -> Result<Resolved, ConfigError> {
        let repositories: BTreeMap<repo::Name, Arc<Repository>> = self
            .repositories
            .iter()
            .map(|(name, definition)| {
                let repository = Repository {
                    name: name.clone(),
                    path: definition.path.clone(),
                    password_command: definition.password_command.clone(),
                    forget_options: definition.forget_options.clone(),
                };
                (name.clone(), Arc::new(repository))
            })
            .collect();

        let mut seen = BTreeSet::new();
        for (idx, definition) in self.jobs.iter().enumerate() {
            let name = definition.name();
            if name.0.trim().is_empty() {
                return Err(ConfigError::EmptyJobName(idx + 1));
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateJobName(name.clone()));
            }
        }

        let mut missing = BTreeSet::new();
        let mut lookup = |name: &repo::Name| match repositories.get(name) {
            Some(repository) => repository.clone(),
            None => {
                missing.insert(name.clone());
                Default::default()
            }
        };

        let jobs: Vec<Job> = self
            .jobs
            .iter()
            .map(|definition| match definition {
                job::Definition::Backup(d) => Job::Backup(BackupJob {
                    name: d.name.clone(),
                    cron: d.cron.clone(),
                    healthcheck_url: d
                        .healthcheck_url
                        .clone()
                        .or_else(|| self.healthcheck_url.clone()),
                    from: d.from.clone(),
                    to: lookup(&d.to),
                    ignore_missing_xattrs: d.ignore_missing_xattrs,
                    options: d.options.clone(),
                    hooks: d.hooks.clone(),
                }),
                job::Definition::Copy(d) => Job::Copy(CopyJob {
                    name: d.name.clone(),
                    cron: d.cron.clone(),
                    healthcheck_url: d
                        .healthcheck_url
                        .clone()
                        .or_else(|| self.healthcheck_url.clone()),
                    from: lookup(&d.from),
                    to: lookup(&d.to),
                    options: d.options.clone(),
                    hooks: d.hooks.clone(),
                }),
            })
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::UnknownRepositories(
                missing.into_iter().collect(),
            ));
        }

        Ok(Resolved { jobs, repositories })
    }
}

/// A configuration with all repository references checked and shared.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    pub jobs: Vec<Job>,
    pub repositories: BTreeMap<repo::Name, Arc<Repository>>,
}

impl Resolved {
    /// Returns all jobs when `names` is empty, otherwise the named jobs in
    /// configuration order.
    pub fn select_jobs(&self, names: &[String]) -> Result<Vec<Job>, ConfigError> {
        if names.is_empty() {
            return Ok(self.jobs.clone());
        }
        let unknown = names
            .iter()
            .filter(|name| !self.jobs.iter().any(|job| &job.name().0 == *name))
            .map(|name| job::Name(name.clone()))
            .collect::<BTreeSet<_>>();
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownJobs(unknown.into_iter().collect()));
        }
        Ok(self
            .jobs
            .iter()
            .filter(|job| names.contains(&job.name().0))
            .cloned()
            .collect())
    }

    /// Returns all repositories when `names` is empty, otherwise the named
    /// ones in the given order.
    pub fn select_repositories(
        &self,
        names: &[String],
    ) -> Result<Vec<Arc<Repository>>, ConfigError> {
        if names.is_empty() {
            return Ok(self.repositories.values().cloned().collect());
        }
        let mut selected = Vec::new();
        let mut unknown = BTreeSet::new();
        for name in names {
            let name = repo::Name(name.clone());
            match self.repositories.get(&name) {
                Some(repository) => selected.push(repository.clone()),
                None => {
                    unknown.insert(name);
                }
            }
        }
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownRepositories(
                unknown.into_iter().collect(),
            ));
        }
        Ok(selected)
    }
}

pub fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(FILE_NAME)];
    if let Some(config_dir) = dirs_next::config_dir() {
        locations.push(config_dir.join("cumulus").join(FILE_NAME));
    }
    if let Some(home_dir) = dirs_next::home_dir() {
        locations.push(home_dir.join(".cumulus").join(FILE_NAME));
    }
    locations
}

fn find_config_file(
    explicit: Option<&Path>,
    candidates: &[PathBuf],
) -> Result<PathBuf, ConfigLoadError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_owned())
        } else {
            Err(ConfigLoadError::MissingConfigFile(path.to_owned()))
        };
    }
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| ConfigLoadError::NoConfigFile(candidates.to_vec()))
}
