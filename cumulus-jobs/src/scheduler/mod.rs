//! Picks the jobs whose cron schedule fired since the previous evaluation.

use crate::{
    handler::{chain, with_lock, with_panic_recovery, BoxHandler, Handler},
    Error,
};
use async_trait::async_trait;
use cumulus_core::{config::Timezone, context::RunContext, model::Job, timestamp, Timestamp};
use std::path::PathBuf;

mod schedule;
mod state;

pub use schedule::{ParseError, Schedule};
pub use state::StateFile;

#[derive(Debug, Clone)]
pub struct Scheduler {
    state: StateFile,
    timezone: Timezone,
}

impl Scheduler {
    pub fn new(state: StateFile, timezone: Timezone) -> Self {
        Scheduler { state, timezone }
    }

    fn is_due(&self, job: &Job, last_run: Timestamp, now: Timestamp) -> bool {
        let expression = match job.cron() {
            Some(expression) => expression,
            None => {
                tracing::debug!(job = %job.name(), "no cron expression, skipping");
                return false;
            }
        };
        let schedule = match expression.parse::<Schedule>() {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!(
                    job = %job.name(),
                    cron = expression,
                    "failed to parse cron expression, skipping job: {}",
                    crate::error_chain(&e)
                );
                return false;
            }
        };
        match schedule.next_after(last_run, self.timezone) {
            Some(next) if next <= now => {
                tracing::debug!(job = %job.name(), cron = expression, run_at = %next, "job is due");
                true
            }
            next => {
                tracing::debug!(
                    job = %job.name(),
                    cron = expression,
                    run_at = ?next,
                    "job is not due"
                );
                false
            }
        }
    }

    /// Returns the jobs due between the stored watermark and `now`, then
    /// stores `now` as the new watermark. Without a stored watermark nothing
    /// is due.
    pub async fn due_jobs(
        &self,
        ctx: &RunContext,
        jobs: Vec<Job>,
        now: Timestamp,
    ) -> Result<Vec<Job>, Error> {
        let last_run = self.state.load().await.unwrap_or_else(|| {
            tracing::warn!("no previous scheduler run, using current time");
            now
        });
        tracing::debug!(last_run = %last_run, now = %now, "evaluating schedules");

        let due: Vec<Job> = jobs
            .into_iter()
            .filter(|job| self.is_due(job, last_run, now))
            .collect();

        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.state
            .save(now)
            .await
            .map_err(|e| Error::SchedulePersist(self.state.path().to_owned(), e))?;
        Ok(due)
    }
}

struct Cron {
    scheduler: Scheduler,
    batch: BoxHandler<Vec<Job>>,
}

#[async_trait]
impl Handler<Vec<Job>> for Cron {
    async fn handle(&self, ctx: RunContext, jobs: Vec<Job>) -> Result<(), Error> {
        let due = self
            .scheduler
            .due_jobs(&ctx, jobs, timestamp::now())
            .await?;
        if due.is_empty() {
            tracing::info!("no jobs due");
            return Ok(());
        }
        tracing::info!(count = due.len(), "running due jobs");
        self.batch.handle(ctx, due).await
    }
}

/// The periodic entry point: under the lock `<lock_name>.lock`, with panic
/// containment, evaluates the schedules of all given jobs and runs the due
/// ones through `batch`.
pub fn cron_handler(
    scheduler: Scheduler,
    batch: BoxHandler<Vec<Job>>,
    state_dir: PathBuf,
    lock_name: String,
) -> BoxHandler<Vec<Job>> {
    chain(
        Box::new(Cron { scheduler, batch }),
        vec![with_lock(state_dir, lock_name), with_panic_recovery()],
    )
}
