//! Name-keyed registries for hook handlers and executable actions
use crate::executable::{Executable, run_action_hook};
use crate::hooks::{Hook, HookBinding};
use crate::request::Request;
use std::collections::HashMap;
use std::sync::Arc;

pub type HookFn = Arc<dyn Fn(&Request) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default, Clone)]
pub struct HookRegistry {
    handlers: HashMap<String, HookFn>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn register<F>(&mut self, key: impl Into<String>, handler: F)
    where
        F: Fn(&Request) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(key.into(), Arc::new(handler));
    }
    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }
    pub fn get(&self, key: &str) -> Option<&HookFn> {
        self.handlers.get(key)
    }
}

#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Executable>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    /// Register an action under its own [`Executable::name`].
    pub fn register(&mut self, action: Arc<dyn Executable>) {
        self.actions.insert(action.name().to_string(), action);
    }
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Executable>> {
        self.actions.get(name).cloned()
    }
}

/// Run whatever `hook` is bound to on `request`. Unbound hooks are a no-op.
pub(crate) fn invoke_hook(
    hooks: &HookRegistry,
    actions: &ActionRegistry,
    request: &Request,
    hook: Hook,
) -> anyhow::Result<()> {
    let Some(binding) = request.hook(hook) else {
        return Ok(());
    };

    tracing::debug!(code = %request.code, hook = %hook, ?binding, "running hook");

    match binding {
        HookBinding::Handler(key) => {
            let handler = hooks
                .get(key)
                .ok_or_else(|| anyhow::anyhow!("hook handler {key} is not registered"))?;
            handler(request)
        }
        HookBinding::Action(name) => {
            let action = actions
                .resolve(name)
                .ok_or_else(|| anyhow::anyhow!("executable action {name} is not registered"))?;
            run_action_hook(action.as_ref(), hook, request)
        }
    }
}
