use crate::{context::RunContext, model::repo};
use std::{path::PathBuf, process::Stdio};
use tokio::process::Command;

pub use process::*;

mod commands;
mod process;
mod util;

#[derive(Debug, Default, Copy, Clone)]
pub enum Output {
    Null,
    Inherit,
    #[default]
    Capture,
}

impl From<Output> for Stdio {
    fn from(v: Output) -> Self {
        match v {
            Output::Null => Stdio::null(),
            Output::Inherit => Stdio::inherit(),
            Output::Capture => Stdio::piped(),
        }
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct Options {
    pub stdout: Output,
    pub stderr: Output,
}

impl Options {
    pub fn inherit_output() -> Options {
        Options {
            stdout: Output::Inherit,
            stderr: Output::Inherit,
        }
    }

    pub fn silent() -> Options {
        Options {
            stdout: Output::Null,
            stderr: Output::Null,
        }
    }
}

#[derive(Debug)]
pub struct CommandConfig {
    pub path: PathBuf,
}

impl CommandConfig {
    pub fn from_path(path: PathBuf) -> Self {
        CommandConfig { path }
    }

    fn to_command(&self) -> Command {
        Command::new(&self.path)
    }
}

#[derive(Debug)]
pub struct Config {
    pub primary: CommandConfig,
    pub fallback: Option<CommandConfig>,
}

impl Config {
    /// Uses `binary` if configured, otherwise `restic` from the search path
    /// with a binary next to the current executable as fallback.
    pub fn from_binary(binary: Option<&str>) -> Self {
        let primary = CommandConfig::from_path(binary.unwrap_or("restic").into());
        let fallback = match binary {
            Some(_) => None,
            None => std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|dir| dir.join(bundled_binary_name())))
                .map(CommandConfig::from_path),
        };
        Config { primary, fallback }
    }
}

fn bundled_binary_name() -> &'static str {
    if cfg!(windows) {
        "restic.exe"
    } else {
        "restic"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to start restic process")]
    FailedToStartResticProcess(#[source] std::io::Error),
    #[error("error reading from subprocess output")]
    SubprocessIoError(#[source] std::io::Error),
    #[error("error getting subprocess status")]
    SubprocessStatusError(#[source] std::io::Error),
    #[error("error killing process")]
    SubprocessTerminateError(#[source] std::io::Error),
    #[error("repository {repo}: restic {command} failed [{}]: {}", exit_code_text(.status), stderr_text(.stderr))]
    CommandFailed {
        repo: repo::Name,
        command: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("restic was interrupted")]
    Cancelled,
    #[error("couldn't determine restic version from output")]
    FailedToGetResticVersion,
}

impl Error {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::CommandFailed { status, .. } => status.code(),
            _ => None,
        }
    }
}

fn exit_code_text(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "unknown exit code".to_owned(),
    }
}

fn stderr_text(stderr: &str) -> &str {
    if stderr.trim().is_empty() {
        "no error output"
    } else {
        stderr.trim()
    }
}

#[derive(Debug)]
pub struct Restic {
    config: Config,
}

impl Restic {
    pub fn new(config: Config) -> Self {
        Restic { config }
    }

    pub fn new_with_path(path: impl Into<PathBuf>) -> Self {
        Self::new(Config {
            primary: CommandConfig::from_path(path.into()),
            fallback: None,
        })
    }

    /// Starts restic with `args`. The first argument is the restic
    /// subcommand; `--json` goes right after it when the context asks for
    /// JSON output.
    pub fn run(
        &self,
        ctx: &RunContext,
        args: &[impl AsRef<str>],
        options: &Options,
    ) -> Result<ResticProcess, Error> {
        self.run_with_config(&self.config.primary, ctx, args, options)
            .or_else(|e| match &self.config.fallback {
                Some(fallback) => self.run_with_config(fallback, ctx, args, options),
                None => Err(e),
            })
    }

    fn run_with_config(
        &self,
        config: &CommandConfig,
        ctx: &RunContext,
        args: &[impl AsRef<str>],
        options: &Options,
    ) -> Result<ResticProcess, Error> {
        let args = command_args(ctx, args);
        if ctx.print_commands() {
            let program = config.path.display().to_string();
            tracing::info!("$ {}", crate::output::format_command(&program, &args));
        }

        let mut cmd = config.to_command();
        cmd.stdin(Stdio::null())
            .stdout(options.stdout)
            .stderr(options.stderr)
            .envs(ctx.env())
            .args(&args)
            // kill-on-drop is a final fallback, normally the process gets terminated gracefully
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(Error::FailedToStartResticProcess)?;
        Ok(ResticProcess {
            child,
            source: ctx.source(),
        })
    }
}

fn command_args(ctx: &RunContext, args: &[impl AsRef<str>]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(args.len() + 1);
    let mut args = args.iter().map(|a| a.as_ref().to_owned());
    if let Some(subcommand) = args.next() {
        result.push(subcommand);
        if ctx.json() {
            result.push("--json".to_owned());
        }
    }
    result.extend(args);
    result
}
