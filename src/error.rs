use crate::types::{RequestStatus, RequestType};

/// Problems with the shape of a request, caught before anything is stored.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Cannot modify request type, a request type has already been provided")]
    TypeAlreadySet,
    #[error("A request type must be provided before saving")]
    MissingType,
    #[error("The maker of the request must be provided before saving")]
    MissingMaker,
    #[error("Unrecognized target kind: {0}")]
    UnknownTargetKind(String),
    #[error("Unrecognized executable action: {0}")]
    UnknownAction(String),
    #[error("Invalid hook passed: {0}")]
    UnknownHook(String),
    #[error("No hook handler registered under: {0}")]
    UnknownHookHandler(String),
    #[error("{0} requests require a payload")]
    PayloadRequired(RequestType),
    #[error("{0} requests require a subject with an id")]
    MissingSubject(RequestType),
}

#[derive(thiserror::Error, Debug)]
pub enum AuthorizationError {
    #[error("Cannot initiate request: actor kind {0} is not allowed to make requests")]
    MakerNotWhitelisted(String),
    #[error("Cannot approve/decline request: actor kind {0} is not allowed to check requests")]
    CheckerNotWhitelisted(String),
    #[error("Checkers must have a contact attached to their accounts")]
    MissingContact,
    #[error("Request checker cannot be the same as the maker")]
    CheckerIsMaker,
}

/// The request is not in a state that allows the operation.
#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("No live request found with code {0}")]
    NotFound(String),
    #[error("Cannot act on a non-pending or partially approved request. Current status: {0}")]
    NotActionable(RequestStatus),
    #[error("Expired request")]
    Expired,
    #[error("This approver ({0}) has already approved the request")]
    AlreadyApproved(String),
    #[error("Request {0} was changed by another checker, reload it and try again")]
    Changed(String),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),
    #[error("failed to encode request: {0}")]
    Encode(String),
    #[error("failed to decode stored record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("request {0} was modified concurrently")]
    Conflict(String),
    #[error("a request with code {0} already exists")]
    CodeTaken(String),
}

#[derive(thiserror::Error, Debug)]
pub enum RequestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("A pending request already exists to {0} the provided resource")]
    Duplicate(RequestType),
    #[error("Error initiating request: {0}")]
    NotInitiated(#[source] StoreError),
    #[error("Failed to process request: {reason}")]
    Processing {
        reason: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RequestError {
    pub(crate) fn processing(source: anyhow::Error) -> Self {
        RequestError::Processing {
            reason: source.to_string(),
            source,
        }
    }
}
