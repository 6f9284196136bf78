use super::{Error, ExitStatus, Options, ProcessOutput, Restic};
use crate::{
    context::RunContext,
    model::{BackupJob, CopyJob, Repository},
};

/// restic backup exits with 3 when some source files couldn't be read, e.g.
/// because extended attributes on a FUSE mount are inaccessible. The snapshot
/// is still created.
pub const BACKUP_EXIT_CODE_INCOMPLETE: i32 = 3;

/// restic stats exits with 10 when the repository doesn't exist.
pub const STATS_EXIT_CODE_NO_REPOSITORY: i32 = 10;

fn repo_args(repo: &Repository) -> [&str; 4] {
    [
        "-r",
        &repo.path,
        "--password-command",
        &repo.password_command,
    ]
}

impl Restic {
    async fn run_to_completion(
        &self,
        ctx: &RunContext,
        args: &[String],
        options: &Options,
    ) -> Result<ProcessOutput, Error> {
        self.run(ctx, args, options)?.finish(ctx).await
    }

    async fn run_checked(
        &self,
        ctx: &RunContext,
        repo: &Repository,
        command: &str,
        args: Vec<String>,
        options: &Options,
    ) -> Result<(), Error> {
        let output = self.run_to_completion(ctx, &args, options).await?;
        check(repo, command, output)
    }

    pub async fn init(&self, ctx: &RunContext, repo: &Repository) -> Result<(), Error> {
        tracing::info!("initializing repository");
        let args = with_repo("init", repo, []);
        self.run_checked(ctx, repo, "init", args, &Options::default())
            .await
    }

    pub async fn is_initialized(&self, ctx: &RunContext, repo: &Repository) -> Result<bool, Error> {
        tracing::debug!("checking if repository is initialized");
        let args = with_repo("stats", repo, []);
        let output = self
            .run_to_completion(ctx, &args, &Options::silent())
            .await?;
        match output.status {
            ExitStatus::Successful => Ok(true),
            ExitStatus::Failed(Some(STATS_EXIT_CODE_NO_REPOSITORY)) => Ok(false),
            _ => check(repo, "stats", output).map(|_| false),
        }
    }

    pub async fn backup(&self, ctx: &RunContext, job: &BackupJob) -> Result<(), Error> {
        tracing::info!("starting backup");
        let mut extra = Vec::new();
        if ctx.dry_run() {
            extra.push("--dry-run".to_owned());
        }
        extra.extend(job.options.to_args());
        extra.extend(job.from.iter().cloned());
        let args = with_repo("backup", &job.to, extra);

        let output = self
            .run_to_completion(ctx, &args, &Options::default())
            .await?;
        if job.ignore_missing_xattrs
            && output.status == ExitStatus::Failed(Some(BACKUP_EXIT_CODE_INCOMPLETE))
        {
            tracing::warn!("backup couldn't read some source data, ignoring as configured");
            return Ok(());
        }
        check(&job.to, "backup", output)
    }

    pub async fn copy(&self, ctx: &RunContext, job: &CopyJob) -> Result<(), Error> {
        tracing::info!(from = %job.from.name, "starting copy");
        let base: [&str; 9] = [
            "copy",
            "-r",
            &job.to.path,
            "--from-repo",
            &job.from.path,
            "--password-command",
            &job.to.password_command,
            "--from-password-command",
            &job.from.password_command,
        ];
        let mut args: Vec<String> = base.iter().map(|s| s.to_string()).collect();
        args.extend(job.options.to_args());

        if ctx.dry_run() {
            tracing::info!(args = ?args, "dry run, not executing restic copy");
            return Ok(());
        }

        let command = format!("copy from {}", job.from.name);
        self.run_checked(ctx, &job.to, &command, args, &Options::default())
            .await
    }

    pub async fn check(&self, ctx: &RunContext, repo: &Repository) -> Result<(), Error> {
        tracing::info!("running integrity check");
        let args = with_repo("check", repo, []);
        self.run_checked(ctx, repo, "check", args, &Options::default())
            .await
    }

    /// Applies the repository's retention options. `extra` is merged over the
    /// configured options.
    pub async fn forget(
        &self,
        ctx: &RunContext,
        repo: &Repository,
        extra: &crate::model::Options,
    ) -> Result<(), Error> {
        tracing::info!("running forget");
        let mut args = Vec::new();
        if ctx.dry_run() {
            args.push("--dry-run".to_owned());
        }
        args.extend(repo.forget_options.merge(extra).to_args());
        let args = with_repo("forget", repo, args);
        self.run_checked(ctx, repo, "forget", args, &Options::default())
            .await
    }

    pub async fn unlock(&self, ctx: &RunContext, repo: &Repository) -> Result<(), Error> {
        tracing::info!("unlocking repository");
        let args = with_repo("unlock", repo, []);
        self.run_checked(ctx, repo, "unlock", args, &Options::default())
            .await
    }

    pub async fn restore(
        &self,
        ctx: &RunContext,
        repo: &Repository,
        target: &str,
        snapshot: &str,
    ) -> Result<(), Error> {
        tracing::info!(restore_target = target, snapshot = snapshot, "starting restore");
        let args = with_repo(
            "restore",
            repo,
            ["--target".to_owned(), target.to_owned(), snapshot.to_owned()],
        );
        self.run_checked(ctx, repo, "restore", args, &Options::default())
            .await
    }

    /// Runs an arbitrary restic command against `repo` with the terminal as
    /// its output.
    pub async fn exec(
        &self,
        ctx: &RunContext,
        repo: &Repository,
        command: &str,
        args: &[String],
    ) -> Result<(), Error> {
        tracing::debug!(command = command, "executing restic command");
        let args = with_repo(command, repo, args.iter().cloned());
        self.run_checked(ctx, repo, command, args, &Options::inherit_output())
            .await
    }
}

fn with_repo(
    command: &str,
    repo: &Repository,
    extra: impl IntoIterator<Item = String>,
) -> Vec<String> {
    let mut args = vec![command.to_owned()];
    args.extend(repo_args(repo).iter().map(|s| s.to_string()));
    args.extend(extra);
    args
}

fn check(repo: &Repository, command: &str, output: ProcessOutput) -> Result<(), Error> {
    if output.status.success() {
        return Ok(());
    }
    tracing::error!(
        cmd = command,
        exit_code = output.status.code(),
        "restic command failed"
    );
    Err(Error::CommandFailed {
        repo: repo.name.clone(),
        command: command.to_owned(),
        status: output.status,
        stderr: output.stderr,
    })
}
