use std::{collections::BTreeMap, sync::Arc};
use tokio_util::sync::CancellationToken;

/// Per-invocation settings threaded through every layer of a job run.
///
/// A context is never mutated in place. Layers that need to add something
/// derive a new context with one of the `with_*` methods and pass that one
/// inward, so outer layers keep seeing their own values.
#[derive(Debug, Clone)]
pub struct RunContext {
    dry_run: bool,
    print_commands: bool,
    json: bool,
    source: &'static str,
    env: Arc<BTreeMap<String, String>>,
    cancellation: CancellationToken,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl RunContext {
    pub const DEFAULT_SOURCE: &'static str = "cumulus";

    pub fn new(cancellation: CancellationToken) -> Self {
        RunContext {
            dry_run: false,
            print_commands: false,
            json: false,
            source: Self::DEFAULT_SOURCE,
            env: Default::default(),
            cancellation,
        }
    }

    pub fn with_dry_run(&self, dry_run: bool) -> Self {
        Self {
            dry_run,
            ..self.clone()
        }
    }

    pub fn with_print_commands(&self, print_commands: bool) -> Self {
        Self {
            print_commands,
            ..self.clone()
        }
    }

    pub fn with_json(&self, json: bool) -> Self {
        Self {
            json,
            ..self.clone()
        }
    }

    pub fn with_source(&self, source: &'static str) -> Self {
        Self {
            source,
            ..self.clone()
        }
    }

    /// Returns a context whose environment is this one's plus `vars`.
    /// Variables in `vars` replace existing ones with the same name.
    pub fn with_env<K, V>(&self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut env = (*self.env).clone();
        env.extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        Self {
            env: Arc::new(env),
            ..self.clone()
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn print_commands(&self) -> bool {
        self.print_commands
    }

    pub fn json(&self) -> bool {
        self.json
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
