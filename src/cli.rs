use std::path::PathBuf;

/// Runs restic backup and copy jobs from a configuration file.
#[derive(clap::Parser)]
#[command(name = "cumulus", disable_version_flag = true)]
pub struct Cli {
    /// Sets a custom configuration file path
    #[arg(short, long, env = "CUMULUS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Sets the directory for lock and scheduler state files
    #[arg(long, env = "CUMULUS_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Sets the minimum level of log messages
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,

    /// Logs without colors, for non-interactive environments
    #[arg(long, global = true, conflicts_with = "json")]
    pub ci: bool,

    /// Logs JSON objects and asks restic for JSON output
    #[arg(long, global = true)]
    pub json: bool,

    /// Logs every restic and hook command line before running it
    #[arg(long, global = true)]
    pub print_commands: bool,

    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(clap::ValueEnum, Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(clap::Subcommand)]
pub enum Cmd {
    /// Runs backup and copy jobs
    Backup(backup::Cli),

    /// Runs the jobs whose cron schedule is due, for use from a system scheduler
    Cron,

    /// Initializes repositories if needed and checks their integrity
    Check(RepoSelection),

    /// Applies the retention policy of repositories
    Forget(forget::Cli),

    /// Removes stale locks from repositories
    Unlock(RepoSelection),

    /// Restores a snapshot
    Restore(restore::Cli),

    /// Runs a restic command against repositories
    Exec(exec::Cli),

    /// Prints the active configuration
    Config,

    /// Prints an example configuration file with comments
    #[command(name = "config.example")]
    ConfigExample,

    /// Generates a shell completion script
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Prints version information
    Version,
}

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
pub struct RepoSelection {
    /// Selects all repositories
    #[arg(short, long)]
    pub all: bool,

    /// Selects repositories by name
    #[arg(short, long = "repo", value_name = "REPOSITORY", value_delimiter = ',')]
    pub repos: Vec<String>,
}

pub mod backup {
    #[derive(clap::Args, Debug)]
    pub struct Cli {
        #[command(flatten)]
        pub selection: JobSelection,

        /// Shows what would be done without writing any data
        #[arg(long)]
        pub dry_run: bool,
    }

    #[derive(clap::Args, Debug)]
    #[group(required = true, multiple = false)]
    pub struct JobSelection {
        /// Selects all jobs
        #[arg(short, long)]
        pub all: bool,

        /// Selects jobs by name
        #[arg(short, long = "job", value_name = "JOB", value_delimiter = ',')]
        pub jobs: Vec<String>,
    }
}

pub mod forget {
    #[derive(clap::Args, Debug)]
    pub struct Cli {
        #[command(flatten)]
        pub selection: super::RepoSelection,

        /// Shows what would be removed without removing anything
        #[arg(long)]
        pub dry_run: bool,

        /// Also prunes unreferenced data
        #[arg(long)]
        pub prune: bool,
    }
}

pub mod restore {
    #[derive(clap::Args, Debug)]
    pub struct Cli {
        /// The repository to restore from
        #[arg(short, long = "repo", value_name = "REPOSITORY")]
        pub repo: String,

        /// The directory to restore into
        #[arg(short, long)]
        pub target: String,

        /// The snapshot to restore
        #[arg(short, long, default_value = "latest")]
        pub snapshot: String,
    }
}

pub mod exec {
    #[derive(clap::Args, Debug)]
    pub struct Cli {
        #[command(flatten)]
        pub selection: super::RepoSelection,

        /// The restic command followed by its arguments
        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "COMMAND"
        )]
        pub cmd: Vec<String>,
    }
}
