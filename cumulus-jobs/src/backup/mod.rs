//! The backup batch driver: runs each selected job through the per-job
//! middleware stack and collects failures without stopping the batch.

use crate::{
    error_chain,
    handler::{chain, with_panic_recovery, BoxHandler, Handler},
    healthchecks::Monitor,
    Error,
};
use async_trait::async_trait;
use cumulus_core::{
    context::RunContext,
    model::{BackupJob, CopyJob, Job, Options, Repository},
    shell::HookRunner,
};
use std::sync::Arc;
use tracing::Instrument;

mod healthcheck;
mod hooks;
mod job_errors;
mod tool;

pub use healthcheck::with_healthcheck;
pub use hooks::{with_hooks, ERROR_VAR, JOB_NAME_VAR};
pub use job_errors::JobErrors;
pub use tool::BackupTool;

/// Initializes `repo` unless restic reports it as initialized already.
pub async fn ensure_initialized(
    tool: &dyn BackupTool,
    ctx: &RunContext,
    repo: &Repository,
) -> Result<(), Error> {
    if !tool.is_initialized(ctx, repo).await? {
        tracing::info!("repository is not initialized, initializing");
        tool.init(ctx, repo).await?;
    }
    Ok(())
}

fn repo_span(repo: &Repository) -> tracing::Span {
    tracing::info_span!("repo", repo = %repo.name)
}

struct RunJob {
    tool: Arc<dyn BackupTool>,
}

impl RunJob {
    async fn backup(&self, ctx: &RunContext, job: &BackupJob) -> Result<(), Error> {
        let tool = self.tool.as_ref();
        async {
            ensure_initialized(tool, ctx, &job.to).await?;
            tool.backup(ctx, job).await?;
            tool.check(ctx, &job.to).await?;
            tool.forget(ctx, &job.to, &Options::default()).await?;
            Ok::<_, Error>(())
        }
        .instrument(repo_span(&job.to))
        .await
    }

    async fn copy(&self, ctx: &RunContext, job: &CopyJob) -> Result<(), Error> {
        let tool = self.tool.as_ref();
        ensure_initialized(tool, ctx, &job.from)
            .instrument(repo_span(&job.from))
            .await?;
        async {
            ensure_initialized(tool, ctx, &job.to).await?;
            tool.copy(ctx, job).await?;
            tool.check(ctx, &job.to).await?;
            tool.forget(ctx, &job.to, &Options::default()).await?;
            Ok::<_, Error>(())
        }
        .instrument(repo_span(&job.to))
        .await
    }
}

#[async_trait]
impl Handler<Job> for RunJob {
    async fn handle(&self, ctx: RunContext, job: Job) -> Result<(), Error> {
        match &job {
            Job::Backup(backup) => {
                tracing::info!("processing backup");
                self.backup(&ctx, backup).await
            }
            Job::Copy(copy) => {
                tracing::info!(from = %copy.from.name, "processing copy");
                self.copy(&ctx, copy).await
            }
        }
    }
}

#[derive(Clone)]
pub struct JobRunner {
    pub tool: Arc<dyn BackupTool>,
    pub hooks: Arc<dyn HookRunner>,
    pub monitor: Arc<dyn Monitor>,
}

impl JobRunner {
    pub fn new(
        tool: Arc<dyn BackupTool>,
        hooks: Arc<dyn HookRunner>,
        monitor: Arc<dyn Monitor>,
    ) -> Self {
        JobRunner {
            tool,
            hooks,
            monitor,
        }
    }

    /// One job: panic containment, then healthcheck signals, then hooks,
    /// around init-if-needed, the backup or copy itself, check and forget.
    pub fn job_handler(&self) -> BoxHandler<Job> {
        chain(
            Box::new(RunJob {
                tool: self.tool.clone(),
            }),
            vec![
                with_panic_recovery(),
                with_healthcheck(self.monitor.clone()),
                with_hooks(self.hooks.clone()),
            ],
        )
    }

    pub fn batch_handler(&self) -> BoxHandler<Vec<Job>> {
        Box::new(Batch {
            job: self.job_handler(),
        })
    }
}

pub struct Batch {
    job: BoxHandler<Job>,
}

impl Batch {
    pub fn new(job: BoxHandler<Job>) -> Self {
        Batch { job }
    }
}

#[async_trait]
impl Handler<Vec<Job>> for Batch {
    async fn handle(&self, ctx: RunContext, jobs: Vec<Job>) -> Result<(), Error> {
        if ctx.dry_run() {
            tracing::info!("dry run, no data will be written");
        }

        let mut errors = JobErrors::new();
        for job in jobs {
            if ctx.is_cancelled() {
                tracing::warn!("interrupted, skipping remaining jobs");
                break;
            }
            let name = job.name().clone();
            let span = tracing::info_span!("job", name = %name, kind = job.kind());
            let result = async {
                let result = self.job.handle(ctx.clone(), job).await;
                match &result {
                    Ok(()) => tracing::info!("job finished"),
                    Err(e) => tracing::error!("job failed: {}", error_chain(e)),
                }
                result
            }
            .instrument(span)
            .await;
            if let Err(e) = result {
                errors.add(name, e);
            }
        }

        errors.into_result()?;
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::healthcheck::tests::RecordingMonitor;
    use super::hooks::tests::RecordingRunner;
    use super::*;
    use cumulus_core::{
        model::{job, repo},
        restic,
    };
    use parking_lot::Mutex;
    use std::collections::BTreeSet;

    #[derive(Default)]
    pub struct RecordingTool {
        pub calls: Mutex<Vec<String>>,
        pub dry_runs: Mutex<Vec<bool>>,
        pub uninitialized: BTreeSet<String>,
        pub failing: BTreeSet<String>,
        pub panicking: BTreeSet<String>,
    }

    impl RecordingTool {
        fn record(&self, ctx: &RunContext, call: String) -> Result<(), restic::Error> {
            self.calls.lock().push(call.clone());
            self.dry_runs.lock().push(ctx.dry_run());
            if self.panicking.contains(&call) {
                panic!("{} exploded", call);
            }
            if self.failing.contains(&call) {
                return Err(restic::Error::Cancelled);
            }
            Ok(())
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl BackupTool for RecordingTool {
        async fn init(&self, ctx: &RunContext, repo: &Repository) -> Result<(), restic::Error> {
            self.record(ctx, format!("init {}", repo.name))
        }

        async fn is_initialized(
            &self,
            ctx: &RunContext,
            repo: &Repository,
        ) -> Result<bool, restic::Error> {
            self.record(ctx, format!("stats {}", repo.name))?;
            Ok(!self.uninitialized.contains(&repo.name.0))
        }

        async fn backup(&self, ctx: &RunContext, job: &BackupJob) -> Result<(), restic::Error> {
            self.record(ctx, format!("backup {}", job.name))
        }

        async fn copy(&self, ctx: &RunContext, job: &CopyJob) -> Result<(), restic::Error> {
            self.record(ctx, format!("copy {}", job.name))
        }

        async fn check(&self, ctx: &RunContext, repo: &Repository) -> Result<(), restic::Error> {
            self.record(ctx, format!("check {}", repo.name))
        }

        async fn forget(
            &self,
            ctx: &RunContext,
            repo: &Repository,
            _extra: &Options,
        ) -> Result<(), restic::Error> {
            self.record(ctx, format!("forget {}", repo.name))
        }
    }

    fn repository(name: &str) -> Arc<Repository> {
        Arc::new(Repository {
            name: repo::Name(name.to_owned()),
            path: format!("/srv/{}", name),
            password_command: "echo secret".to_owned(),
            ..Default::default()
        })
    }

    fn backup(name: &str, to: &str) -> Job {
        Job::Backup(BackupJob {
            name: job::Name(name.to_owned()),
            from: vec!["/home".to_owned()],
            to: repository(to),
            ..Default::default()
        })
    }

    fn runner(tool: Arc<RecordingTool>) -> JobRunner {
        JobRunner::new(
            tool,
            Arc::new(RecordingRunner::default()),
            Arc::new(RecordingMonitor::default()),
        )
    }

    mod single_job {
        use super::*;

        #[tokio::test]
        async fn should_backup_check_and_forget_target() {
            let tool = Arc::new(RecordingTool::default());

            runner(tool.clone())
                .job_handler()
                .handle(RunContext::default(), backup("home", "local"))
                .await
                .unwrap();

            assert_eq!(
                tool.calls(),
                vec!["stats local", "backup home", "check local", "forget local"]
            );
        }

        #[tokio::test]
        async fn should_initialize_missing_repository_first() {
            let tool = Arc::new(RecordingTool {
                uninitialized: maplit::btreeset! {"local".to_owned()},
                ..Default::default()
            });

            runner(tool.clone())
                .job_handler()
                .handle(RunContext::default(), backup("home", "local"))
                .await
                .unwrap();

            assert_eq!(
                tool.calls(),
                vec![
                    "stats local",
                    "init local",
                    "backup home",
                    "check local",
                    "forget local"
                ]
            );
        }

        #[tokio::test]
        async fn should_initialize_both_repositories_for_copy() {
            let tool = Arc::new(RecordingTool {
                uninitialized: maplit::btreeset! {"offsite".to_owned()},
                ..Default::default()
            });
            let job = Job::Copy(CopyJob {
                name: job::Name("mirror".to_owned()),
                from: repository("local"),
                to: repository("offsite"),
                ..Default::default()
            });

            runner(tool.clone())
                .job_handler()
                .handle(RunContext::default(), job)
                .await
                .unwrap();

            assert_eq!(
                tool.calls(),
                vec![
                    "stats local",
                    "stats offsite",
                    "init offsite",
                    "copy mirror",
                    "check offsite",
                    "forget offsite"
                ]
            );
        }

        #[tokio::test]
        async fn should_stop_job_at_first_failure() {
            let tool = Arc::new(RecordingTool {
                failing: maplit::btreeset! {"backup home".to_owned()},
                ..Default::default()
            });

            let result = runner(tool.clone())
                .job_handler()
                .handle(RunContext::default(), backup("home", "local"))
                .await;

            assert!(matches!(result, Err(Error::Operation(_))));
            assert_eq!(tool.calls(), vec!["stats local", "backup home"]);
        }

        #[tokio::test]
        async fn should_pass_dry_run_to_every_operation() {
            let tool = Arc::new(RecordingTool::default());

            runner(tool.clone())
                .job_handler()
                .handle(
                    RunContext::default().with_dry_run(true),
                    backup("home", "local"),
                )
                .await
                .unwrap();

            assert_eq!(tool.dry_runs.lock().len(), 4);
            assert!(tool.dry_runs.lock().iter().all(|dry_run| *dry_run));
        }
    }

    mod batch {
        use super::*;

        #[tokio::test]
        async fn should_continue_after_failed_job() {
            let tool = Arc::new(RecordingTool {
                failing: maplit::btreeset! {"backup two".to_owned()},
                ..Default::default()
            });
            let jobs = vec![
                backup("one", "local"),
                backup("two", "local"),
                backup("three", "local"),
            ];

            let result = runner(tool.clone())
                .batch_handler()
                .handle(RunContext::default(), jobs)
                .await;

            let errors = match result {
                Err(Error::Jobs(errors)) => errors,
                other => panic!("unexpected result {:?}", other),
            };
            assert_eq!(errors.len(), 1);
            assert!(errors.get(&job::Name("two".to_owned())).is_some());
            let calls = tool.calls();
            for name in ["one", "two", "three"] {
                assert!(calls.contains(&format!("backup {}", name)));
            }
        }

        #[tokio::test]
        async fn should_contain_panic_to_its_job() {
            let tool = Arc::new(RecordingTool {
                panicking: maplit::btreeset! {"backup one".to_owned()},
                ..Default::default()
            });
            let jobs = vec![backup("one", "local"), backup("two", "local")];

            let result = runner(tool.clone())
                .batch_handler()
                .handle(RunContext::default(), jobs)
                .await;

            let errors = match result {
                Err(Error::Jobs(errors)) => errors,
                other => panic!("unexpected result {:?}", other),
            };
            assert!(matches!(
                errors.get(&job::Name("one".to_owned())),
                Some(Error::Panic(_))
            ));
            assert!(tool.calls().contains(&"backup two".to_owned()));
        }

        #[tokio::test]
        async fn should_skip_remaining_jobs_once_cancelled() {
            let tool = Arc::new(RecordingTool::default());
            let ctx = RunContext::default();
            ctx.cancellation().cancel();

            let result = runner(tool.clone())
                .batch_handler()
                .handle(ctx, vec![backup("one", "local")])
                .await;

            assert!(matches!(result, Err(Error::Cancelled)));
            assert!(tool.calls().is_empty());
        }

        #[tokio::test]
        async fn should_succeed_for_empty_batch() {
            let tool = Arc::new(RecordingTool::default());

            let result = runner(tool)
                .batch_handler()
                .handle(RunContext::default(), vec![])
                .await;

            assert!(result.is_ok());
        }
    }
}
