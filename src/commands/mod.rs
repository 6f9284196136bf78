use crate::cli;
use clap::CommandFactory;
use cumulus_core::{
    config::{Config, Resolved},
    context::RunContext,
    restic::Restic,
    shell::Shell,
};
use cumulus_jobs::{
    backup::JobRunner,
    handler::{chain, with_panic_recovery},
    healthchecks,
    scheduler::{cron_handler, Scheduler, StateFile},
};
use std::{path::PathBuf, sync::Arc};

pub mod repo;

/// Everything a command needs from the loaded configuration.
pub struct App {
    pub config: Config,
    pub resolved: Resolved,
    pub restic: Arc<Restic>,
    pub state_dir: PathBuf,
}

impl App {
    fn job_runner(&self) -> eyre::Result<JobRunner> {
        Ok(JobRunner::new(
            self.restic.clone(),
            Arc::new(Shell),
            Arc::new(healthchecks::Client::new()?),
        ))
    }

    /// The file stem of the configuration file, used to keep cron state of
    /// different configurations apart.
    fn config_stem(&self) -> String {
        self.config
            .source
            .as_ref()
            .and_then(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cumulus".to_owned())
    }
}

pub async fn backup(app: &App, ctx: RunContext, args: cli::backup::Cli) -> eyre::Result<()> {
    let names = if args.selection.all {
        Vec::new()
    } else {
        args.selection.jobs
    };
    let jobs = app.resolved.select_jobs(&names)?;
    let handler = chain(
        app.job_runner()?.batch_handler(),
        vec![with_panic_recovery()],
    );
    handler.handle(ctx.with_dry_run(args.dry_run), jobs).await?;
    Ok(())
}

pub async fn cron(app: &App, ctx: RunContext) -> eyre::Result<()> {
    let stem = app.config_stem();
    let scheduler = Scheduler::new(
        StateFile::for_config(&app.state_dir, &stem),
        app.config.timezone,
    );
    let handler = cron_handler(
        scheduler,
        app.job_runner()?.batch_handler(),
        app.state_dir.clone(),
        format!("cumulus-cron-{}", stem),
    );
    handler.handle(ctx, app.resolved.jobs.clone()).await?;
    Ok(())
}

pub fn config(config: &Config) -> eyre::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

pub fn config_example() -> eyre::Result<()> {
    print!("{}", cumulus_core::config::EXAMPLE);
    Ok(())
}

pub fn completion(shell: clap_complete::Shell) -> eyre::Result<()> {
    clap_complete::generate(
        shell,
        &mut cli::Cli::command(),
        "cumulus",
        &mut std::io::stdout(),
    );
    Ok(())
}

pub async fn version(restic: &Restic, ctx: &RunContext) -> eyre::Result<()> {
    if let Some(version) = cumulus_core::VERSION {
        println!("cumulus: {}", version);
    } else {
        println!("cumulus: [untagged build]")
    }

    match restic.version_string(ctx).await {
        Ok(restic_version) => println!("restic: {}", restic_version),
        Err(err) => println!(
            "Could not determine restic version ({}), is restic installed correctly?",
            err
        ),
    }
    Ok(())
}
