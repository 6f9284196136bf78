use crate::model::Options;
use serde::{Deserialize, Serialize};

pub use crate::model::repo::Name;

#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Definition {
    pub path: String,
    #[serde(alias = "password_command")]
    pub password_command: String,
    #[serde(
        default,
        alias = "forget_options",
        skip_serializing_if = "Options::is_empty"
    )]
    pub forget_options: Options,
}
