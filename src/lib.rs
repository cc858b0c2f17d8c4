pub mod builder;
pub mod config;
pub mod duplicate;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod executable;
pub mod fulfillment;
pub mod hooks;
pub mod manager;
pub mod payload;
pub mod registry;
pub mod request;
pub mod store;
pub mod target;
pub mod types;
pub mod utils;

pub use builder::{Draft, ExecuteAction, RequestBuilder};
pub use config::Config;
pub use error::{AuthorizationError, RequestError, StateError, StoreError, ValidationError};
pub use events::{Event, EventKind};
pub use executable::Executable;
pub use hooks::{Hook, HookBinding};
pub use manager::MakerChecker;
pub use payload::{Payload, Value};
pub use request::{Approval, Request};
pub use target::{SledTargetStore, TargetStore};
pub use types::{Actor, ActorRef, Clock, RequestStatus, RequestType, SubjectRef, TimeStamp};
