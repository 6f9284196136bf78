pub mod config;
pub mod context;
pub mod model;
pub mod paths;
pub mod restic;
pub mod shell;

mod output;

pub type Timestamp = chrono::DateTime<chrono::Utc>;

pub const VERSION: Option<&str> = option_env!("CUMULUS_VERSION");

pub mod timestamp {
    pub fn now() -> crate::Timestamp {
        chrono::Utc::now()
    }
}
