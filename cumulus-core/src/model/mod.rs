pub mod job;
pub mod options;
pub mod repo;

pub use job::{BackupJob, CopyJob, Hooks, Job};
pub use options::{OptionValue, Options};
pub use repo::Repository;
