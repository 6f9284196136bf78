use super::App;
use crate::cli;
use cumulus_core::{
    context::RunContext,
    model::{Options, Repository},
};
use cumulus_jobs::backup::ensure_initialized;
use std::sync::Arc;
use tracing::Instrument;

fn selected(app: &App, selection: &cli::RepoSelection) -> eyre::Result<Vec<Arc<Repository>>> {
    let names: &[String] = if selection.all { &[] } else { &selection.repos };
    Ok(app.resolved.select_repositories(names)?)
}

fn repo_span(repo: &Repository) -> tracing::Span {
    tracing::info_span!("repo", repo = %repo.name)
}

pub async fn check(app: &App, ctx: RunContext, args: cli::RepoSelection) -> eyre::Result<()> {
    for repo in selected(app, &args)? {
        async {
            ensure_initialized(app.restic.as_ref(), &ctx, &repo).await?;
            app.restic.check(&ctx, &repo).await?;
            Ok::<_, eyre::Report>(())
        }
        .instrument(repo_span(&repo))
        .await?;
    }
    Ok(())
}

pub async fn forget(app: &App, ctx: RunContext, args: cli::forget::Cli) -> eyre::Result<()> {
    let ctx = ctx.with_dry_run(args.dry_run);
    let extra = if args.prune {
        Options::default().with("prune", true)
    } else {
        Options::default()
    };
    for repo in selected(app, &args.selection)? {
        app.restic
            .forget(&ctx, &repo, &extra)
            .instrument(repo_span(&repo))
            .await?;
    }
    Ok(())
}

pub async fn unlock(app: &App, ctx: RunContext, args: cli::RepoSelection) -> eyre::Result<()> {
    for repo in selected(app, &args)? {
        app.restic
            .unlock(&ctx, &repo)
            .instrument(repo_span(&repo))
            .await?;
    }
    Ok(())
}

pub async fn restore(app: &App, ctx: RunContext, args: cli::restore::Cli) -> eyre::Result<()> {
    let repos = app
        .resolved
        .select_repositories(std::slice::from_ref(&args.repo))?;
    for repo in repos {
        app.restic
            .restore(&ctx, &repo, &args.target, &args.snapshot)
            .instrument(repo_span(&repo))
            .await?;
    }
    Ok(())
}

pub async fn exec(app: &App, ctx: RunContext, args: cli::exec::Cli) -> eyre::Result<()> {
    let (command, command_args) = args
        .cmd
        .split_first()
        .ok_or_else(|| eyre::eyre!("no restic command given"))?;
    for repo in selected(app, &args.selection)? {
        app.restic
            .exec(&ctx, &repo, command, command_args)
            .instrument(repo_span(&repo))
            .await?;
    }
    Ok(())
}
