use super::Options;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(pub String);

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A restic repository as referenced by jobs and repository commands.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct Repository {
    pub name: Name,
    pub path: String,
    pub password_command: String,
    pub forget_options: Options,
}
