use super::{BoxHandler, Handler, Middleware};
use crate::Error;
use async_trait::async_trait;
use cumulus_core::context::RunContext;
use futures::FutureExt;
use std::{
    any::Any,
    backtrace::Backtrace,
    cell::RefCell,
    fmt,
    panic::AssertUnwindSafe,
    sync::Once,
};

#[derive(Debug)]
pub struct PanicError {
    pub message: String,
    pub backtrace: Option<String>,
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

impl std::error::Error for PanicError {}

impl PanicError {
    fn from_payload(payload: Box<dyn Any + Send>, backtrace: Option<String>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_owned()
        };
        PanicError { message, backtrace }
    }
}

tokio::task_local! {
    static CAPTURED_BACKTRACE: RefCell<Option<String>>;
}

static INSTALL_HOOK: Once = Once::new();

// Panics inside a recovery scope only record their backtrace; everything
// else goes to the previously installed hook.
fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let captured = CAPTURED_BACKTRACE.try_with(|slot| {
                *slot.borrow_mut() = Some(Backtrace::force_capture().to_string());
            });
            if captured.is_err() {
                previous(info);
            }
        }));
    });
}

struct PanicRecovery<C: Send + 'static> {
    next: BoxHandler<C>,
}

#[async_trait]
impl<C: Send + 'static> Handler<C> for PanicRecovery<C> {
    async fn handle(&self, ctx: RunContext, cmd: C) -> Result<(), Error> {
        install_hook();
        let (result, backtrace) = CAPTURED_BACKTRACE
            .scope(RefCell::new(None), async {
                let result = AssertUnwindSafe(self.next.handle(ctx, cmd))
                    .catch_unwind()
                    .await;
                let backtrace = CAPTURED_BACKTRACE.with(|slot| slot.borrow_mut().take());
                (result, backtrace)
            })
            .await;

        match result {
            Ok(result) => result,
            Err(payload) => {
                let error = PanicError::from_payload(payload, backtrace);
                tracing::error!(
                    backtrace = error.backtrace.as_deref().unwrap_or("unavailable"),
                    "recovered from panic: {}",
                    error.message
                );
                Err(Error::Panic(error))
            }
        }
    }
}

/// Converts a panic in any inner handler into [`Error::Panic`].
pub fn with_panic_recovery<C: Send + 'static>() -> Middleware<C> {
    Box::new(|next: BoxHandler<C>| Box::new(PanicRecovery { next }) as BoxHandler<C>)
}
