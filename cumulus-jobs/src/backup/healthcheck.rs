use crate::{
    error_chain,
    handler::{BoxHandler, Handler, Middleware},
    healthchecks::{Monitor, Payload, Signal},
    Error,
};
use async_trait::async_trait;
use cumulus_core::{context::RunContext, model::Job};
use std::{sync::Arc, time::Instant};
use uuid::Uuid;

fn host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_owned())
}

struct Healthcheck {
    monitor: Arc<dyn Monitor>,
    host: String,
    next: BoxHandler<Job>,
}

impl Healthcheck {
    async fn send(&self, url: &str, signal: Signal, rid: Uuid, payload: Payload) {
        if let Err(e) = self.monitor.signal(url, signal, rid, &payload).await {
            tracing::warn!(
                signal = ?signal,
                rid = %rid,
                "failed to send healthcheck signal: {}",
                error_chain(&e)
            );
        }
    }
}

#[async_trait]
impl Handler<Job> for Healthcheck {
    async fn handle(&self, ctx: RunContext, job: Job) -> Result<(), Error> {
        let url = match job.healthcheck_url() {
            Some(url) => url.to_owned(),
            None => return self.next.handle(ctx, job).await,
        };
        let rid = Uuid::new_v4();
        let payload = Payload {
            job_name: job.name().0.clone(),
            host: self.host.clone(),
            error: None,
            elapsed_secs: None,
        };

        self.send(&url, Signal::Start, rid, payload.clone()).await;
        let started = Instant::now();
        let result = self.next.handle(ctx, job).await;
        let elapsed_secs = Some(started.elapsed().as_secs_f64());

        match &result {
            Ok(()) => {
                let payload = Payload {
                    elapsed_secs,
                    ..payload
                };
                self.send(&url, Signal::Success, rid, payload).await;
            }
            Err(e) => {
                let payload = Payload {
                    error: Some(error_chain(e)),
                    elapsed_secs,
                    ..payload
                };
                self.send(&url, Signal::Fail, rid, payload).await;
            }
        }
        result
    }
}

/// Reports the start and outcome of each job with a healthcheck URL to
/// `monitor`. Delivery failures are logged and never change the job's result.
pub fn with_healthcheck(monitor: Arc<dyn Monitor>) -> Middleware<Job> {
    Box::new(move |next: BoxHandler<Job>| {
        Box::new(Healthcheck {
            monitor,
            host: host_name(),
            next,
        }) as BoxHandler<Job>
    })
}
