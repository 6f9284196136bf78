use crate::{
    error_chain,
    handler::{BoxHandler, Handler, Middleware},
    Error,
};
use async_trait::async_trait;
use cumulus_core::{
    context::RunContext,
    model::Job,
    shell::{HookError, HookRunner},
};
use std::sync::Arc;

pub const JOB_NAME_VAR: &str = "CUMULUS_JOB_NAME";
pub const ERROR_VAR: &str = "CUMULUS_ERROR";

async fn run_hooks(
    runner: &dyn HookRunner,
    ctx: &RunContext,
    hooks: &[String],
) -> Result<(), HookError> {
    for hook in hooks {
        runner.run(ctx, hook).await?;
    }
    Ok(())
}

async fn run_failure_hooks(
    runner: &dyn HookRunner,
    ctx: &RunContext,
    hooks: &[String],
    error: String,
) {
    let ctx = ctx.with_env([(ERROR_VAR, error)]);
    if let Err(e) = run_hooks(runner, &ctx, hooks).await {
        tracing::warn!("failure hook failed: {}", error_chain(&e));
    }
}

struct Hooks {
    runner: Arc<dyn HookRunner>,
    next: BoxHandler<Job>,
}

#[async_trait]
impl Handler<Job> for Hooks {
    async fn handle(&self, ctx: RunContext, job: Job) -> Result<(), Error> {
        let hooks = job.hooks().clone();
        let hook_ctx = ctx
            .with_source("hooks")
            .with_env([(JOB_NAME_VAR, job.name().0.clone())]);
        let runner = self.runner.as_ref();

        if let Err(e) = run_hooks(runner, &hook_ctx, &hooks.before).await {
            run_failure_hooks(runner, &hook_ctx, &hooks.failure, error_chain(&e)).await;
            return Err(Error::BeforeHooks(e));
        }

        if let Err(e) = self.next.handle(ctx, job).await {
            run_failure_hooks(runner, &hook_ctx, &hooks.failure, error_chain(&e)).await;
            return Err(e);
        }

        run_hooks(runner, &hook_ctx, &hooks.success)
            .await
            .map_err(Error::Hook)
    }
}

/// Runs the job's before hooks ahead of the inner handler and its success or
/// failure hooks afterwards. A failing before hook skips the job.
pub fn with_hooks(runner: Arc<dyn HookRunner>) -> Middleware<Job> {
    Box::new(move |next: BoxHandler<Job>| Box::new(Hooks { runner, next }) as BoxHandler<Job>)
}
