use clap::Parser;
use cumulus_core::{config::Config, context::RunContext, paths, restic};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod cli;
mod commands;
mod logger;
mod signal_handler;

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(1);

async fn run(cli: cli::Cli, ctx: RunContext) -> eyre::Result<()> {
    let config = Config::load(cli.config.as_deref()).await;
    let restic = restic::Restic::new(restic::Config::from_binary(
        config
            .as_ref()
            .ok()
            .and_then(|config| config.restic_binary.as_deref()),
    ));

    let config = match cli.command {
        cli::Cmd::Version => return commands::version(&restic, &ctx).await,
        cli::Cmd::ConfigExample => return commands::config_example(),
        cli::Cmd::Completion { shell } => return commands::completion(shell),
        _ => config?,
    };
    if let cli::Cmd::Config = cli.command {
        return commands::config(&config);
    }

    let state_dir = match cli.state_dir {
        Some(state_dir) => state_dir,
        None => paths::default_state_dir()?,
    };
    let resolved = config.resolve()?;
    let app = commands::App {
        config,
        resolved,
        restic: std::sync::Arc::new(restic),
        state_dir,
    };

    match cli.command {
        cli::Cmd::Backup(args) => commands::backup(&app, ctx, args).await,
        cli::Cmd::Cron => commands::cron(&app, ctx).await,
        cli::Cmd::Check(args) => commands::repo::check(&app, ctx, args).await,
        cli::Cmd::Forget(args) => commands::repo::forget(&app, ctx, args).await,
        cli::Cmd::Unlock(args) => commands::repo::unlock(&app, ctx, args).await,
        cli::Cmd::Restore(args) => commands::repo::restore(&app, ctx, args).await,
        cli::Cmd::Exec(args) => commands::repo::exec(&app, ctx, args).await,
        cli::Cmd::Config
        | cli::Cmd::ConfigExample
        | cli::Cmd::Completion { .. }
        | cli::Cmd::Version => Ok(()),
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = cli::Cli::parse();

    let format = if cli.json {
        logger::Format::Json
    } else if cli.ci {
        logger::Format::Ci
    } else {
        logger::Format::Terminal
    };
    logger::setup_logger(cli.log_level, format)?;

    let ctx = RunContext::new(CancellationToken::new())
        .with_print_commands(cli.print_commands)
        .with_json(cli.json);

    let command = run(cli, ctx.clone());
    tokio::pin!(command);
    tokio::select! {
        result = &mut command => result,
        signal = signal_handler::shutdown_signal() => {
            let signal = signal?;
            tracing::warn!(signal = ?signal, "interrupted, shutting down");
            ctx.cancellation().cancel();
            match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, &mut command).await {
                Ok(Err(e)) => tracing::error!("{:#}", e),
                Ok(Ok(())) => {}
                Err(_) => tracing::warn!("grace period elapsed before the command finished"),
            }
            std::process::exit(signal.exit_code());
        }
    }
}
