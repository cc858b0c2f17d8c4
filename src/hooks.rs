//! Lifecycle hook names and the bindings stored on a request
use crate::error::ValidationError;
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hook {
    /// Fired only through the initiation notification, never by the manager.
    #[n(0)]
    PostInitiate,
    #[n(1)]
    PreApproval,
    #[n(2)]
    PostApproval,
    #[n(3)]
    PreRejection,
    #[n(4)]
    PostRejection,
    #[n(5)]
    OnFailure,
}

impl Hook {
    /// Hooks an executable action can provide.
    pub fn executable_hooks() -> [Hook; 5] {
        [
            Hook::PreApproval,
            Hook::PostApproval,
            Hook::PreRejection,
            Hook::PostRejection,
            Hook::OnFailure,
        ]
    }
    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::PostInitiate => "post_initiate",
            Hook::PreApproval => "pre_approval",
            Hook::PostApproval => "post_approval",
            Hook::PreRejection => "pre_rejection",
            Hook::PostRejection => "post_rejection",
            Hook::OnFailure => "on_failure",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hook {
    type Err = ValidationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "post_initiate" => Ok(Hook::PostInitiate),
            "pre_approval" => Ok(Hook::PreApproval),
            "post_approval" => Ok(Hook::PostApproval),
            "pre_rejection" => Ok(Hook::PreRejection),
            "post_rejection" => Ok(Hook::PostRejection),
            "on_failure" => Ok(Hook::OnFailure),
            other => Err(ValidationError::UnknownHook(other.to_string())),
        }
    }
}

/// What a stored hook points at. Only names are persisted, never code.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum HookBinding {
    /// A handler registered in the hook registry under this key.
    #[n(0)]
    Handler(#[n(0)] String),
    /// The matching hook method of the named executable action.
    #[n(1)]
    Action(#[n(0)] String),
}
