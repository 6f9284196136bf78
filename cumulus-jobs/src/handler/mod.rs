//! Composable job handlers.
//!
//! A [`Handler`] runs one command. A [`Middleware`] takes the next inner
//! handler and returns a handler wrapping it, so cross-cutting behaviour
//! (locking, panic containment, hooks, monitoring) can be stacked around a
//! base operation with [`chain`].

use crate::Error;
use async_trait::async_trait;
use cumulus_core::context::RunContext;
use std::future::Future;

mod lock;
mod panic;

pub use lock::{with_lock, FileLock};
pub use panic::{with_panic_recovery, PanicError};

#[async_trait]
pub trait Handler<C: Send + 'static>: Send + Sync {
    async fn handle(&self, ctx: RunContext, cmd: C) -> Result<(), Error>;
}

pub type BoxHandler<C> = Box<dyn Handler<C>>;

pub type Middleware<C> = Box<dyn FnOnce(BoxHandler<C>) -> BoxHandler<C> + Send>;

/// Wraps `base` in `middlewares`. The first middleware is the outermost one:
/// its "before" part runs first and its "after" part runs last.
pub fn chain<C: Send + 'static>(
    base: BoxHandler<C>,
    middlewares: Vec<Middleware<C>>,
) -> BoxHandler<C> {
    middlewares
        .into_iter()
        .rev()
        .fold(base, |next, middleware| middleware(next))
}

pub struct HandlerFn<F>(F);

#[async_trait]
impl<C, F, Fut> Handler<C> for HandlerFn<F>
where
    C: Send + 'static,
    F: Fn(RunContext, C) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), Error>> + Send,
{
    async fn handle(&self, ctx: RunContext, cmd: C) -> Result<(), Error> {
        (self.0)(ctx, cmd).await
    }
}

pub fn handler_fn<C, F, Fut>(f: F) -> BoxHandler<C>
where
    C: Send + 'static,
    F: Fn(RunContext, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    Box::new(HandlerFn(f))
}
