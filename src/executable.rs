//! The capability set an EXECUTE request's action must provide
use crate::hooks::Hook;
use crate::request::Request;

/// An action run when an EXECUTE request is approved.
///
/// Only [`Executable::execute`] is required. Hook methods default to no-ops and
/// are bound to a request at creation time unless the maker supplies its own.
pub trait Executable: Send + Sync {
    /// Stable key the action is registered under. Fulfillment resolves the action by it.
    fn name(&self) -> &str;

    fn execute(&self, request: &Request) -> anyhow::Result<()>;

    /// Payload fields that identify duplicate requests. Empty compares the full payload.
    fn unique_by(&self) -> Vec<String> {
        Vec::new()
    }

    fn before_approval(&self, _request: &Request) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_approval(&self, _request: &Request) -> anyhow::Result<()> {
        Ok(())
    }

    fn before_rejection(&self, _request: &Request) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_rejection(&self, _request: &Request) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_failure(&self, _request: &Request) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Dispatch a hook to the matching method of an action.
pub(crate) fn run_action_hook(
    action: &dyn Executable,
    hook: Hook,
    request: &Request,
) -> anyhow::Result<()> {
    match hook {
        Hook::PreApproval => action.before_approval(request),
        Hook::PostApproval => action.after_approval(request),
        Hook::PreRejection => action.before_rejection(request),
        Hook::PostRejection => action.after_rejection(request),
        Hook::OnFailure => action.on_failure(request),
        Hook::PostInitiate => Ok(()),
    }
}
