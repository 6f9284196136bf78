use async_trait::async_trait;
use cumulus_core::{
    context::RunContext,
    model::{BackupJob, CopyJob, Options, Repository},
    restic::{Error, Restic},
};

#[async_trait]
pub trait BackupTool: Send + Sync {
    async fn init(&self, ctx: &RunContext, repo: &Repository) -> Result<(), Error>;
    async fn is_initialized(&self, ctx: &RunContext, repo: &Repository) -> Result<bool, Error>;
    async fn backup(&self, ctx: &RunContext, job: &BackupJob) -> Result<(), Error>;
    async fn copy(&self, ctx: &RunContext, job: &CopyJob) -> Result<(), Error>;
    async fn check(&self, ctx: &RunContext, repo: &Repository) -> Result<(), Error>;
    async fn forget(&self, ctx: &RunContext, repo: &Repository, extra: &Options)
        -> Result<(), Error>;
}

#[async_trait]
impl BackupTool for Restic {
    async fn init(&self, ctx: &RunContext, repo: &Repository) -> Result<(), Error> {
        Restic::init(self, ctx, repo).await
    }

    async fn is_initialized(&self, ctx: &RunContext, repo: &Repository) -> Result<bool, Error> {
        Restic::is_initialized(self, ctx, repo).await
    }

    async fn backup(&self, ctx: &RunContext, job: &BackupJob) -> Result<(), Error> {
        Restic::backup(self, ctx, job).await
    }

    async fn copy(&self, ctx: &RunContext, job: &CopyJob) -> Result<(), Error> {
        Restic::copy(self, ctx, job).await
    }

    async fn check(&self, ctx: &RunContext, repo: &Repository) -> Result<(), Error> {
        Restic::check(self, ctx, repo).await
    }

    async fn forget(
        &self,
        ctx: &RunContext,
        repo: &Repository,
        extra: &Options,
    ) -> Result<(), Error> {
        Restic::forget(self, ctx, repo, extra).await
    }
}
