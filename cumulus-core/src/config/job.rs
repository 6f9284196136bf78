use crate::model::{Hooks, Options};
use serde::{Deserialize, Serialize};

use super::repo;
pub use crate::model::job::Name;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Definition {
    Backup(BackupDefinition),
    Copy(CopyDefinition),
}

impl Definition {
    pub fn name(&self) -> &Name {
        match self {
            Definition::Backup(d) => &d.name,
            Definition::Copy(d) => &d.name,
        }
    }
}

#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BackupDefinition {
    pub name: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(
        default,
        alias = "healthcheck_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub healthcheck_url: Option<String>,
    pub to: repo::Name,
    #[serde(default, alias = "ignore_missing_xattrs")]
    pub ignore_missing_xattrs: bool,
    pub from: Vec<String>,
    #[serde(default, skip_serializing_if = "Options::is_empty")]
    pub options: Options,
    #[serde(default, skip_serializing_if = "Hooks::is_empty")]
    pub hooks: Hooks,
}

#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CopyDefinition {
    pub name: Name,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(
        default,
        alias = "healthcheck_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub healthcheck_url: Option<String>,
    pub from: repo::Name,
    pub to: repo::Name,
    #[serde(default, skip_serializing_if = "Options::is_empty")]
    pub options: Options,
    #[serde(default, skip_serializing_if = "Hooks::is_empty")]
    pub hooks: Hooks,
}
