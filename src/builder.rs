//! Fluent construction of new requests
use crate::duplicate::assert_request_is_unique;
use crate::error::{AuthorizationError, RequestError, StoreError, ValidationError};
use crate::events::Event;
use crate::executable::Executable;
use crate::hooks::{Hook, HookBinding};
use crate::manager::MakerChecker;
use crate::payload::Payload;
use crate::request::{Metadata, Request};
use crate::types::{Actor, ActorRef, RequestType, SubjectRef};
use crate::utils::new_request_code;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The request being assembled. Becomes a [`Request`] on save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    request_type: Option<RequestType>,
    pub description: Option<String>,
    pub payload: Option<Payload>,
    pub executable: Option<String>,
    pub subject: Option<SubjectRef>,
    pub maker: Option<ActorRef>,
    pub required_approvals: BTreeMap<String, u32>,
    pub remarks: Option<String>,
}

impl Draft {
    pub fn request_type(&self) -> Option<RequestType> {
        self.request_type
    }
}

type InlineAction<'f> = Box<dyn FnOnce(&Draft, &Payload) -> anyhow::Result<Arc<dyn Executable>> + 'f>;

/// How an EXECUTE request names the action it will run.
pub enum ExecuteAction<'f> {
    /// An action already in the action registry.
    Named(String),
    /// Picks the action from the draft and payload. The returned action must be registered.
    Inline(InlineAction<'f>),
}

impl<'f> ExecuteAction<'f> {
    pub fn named(name: impl Into<String>) -> Self {
        ExecuteAction::Named(name.into())
    }
    pub fn inline<F>(callback: F) -> Self
    where
        F: FnOnce(&Draft, &Payload) -> anyhow::Result<Arc<dyn Executable>> + 'f,
    {
        ExecuteAction::Inline(Box::new(callback))
    }
}

pub struct RequestBuilder<'a> {
    engine: &'a MakerChecker,
    draft: Draft,
    hooks: BTreeMap<Hook, HookBinding>,
    unique_by: Vec<String>,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(engine: &'a MakerChecker) -> Self {
        Self {
            engine,
            draft: Draft::default(),
            hooks: BTreeMap::new(),
            unique_by: vec![],
        }
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.draft.description = Some(description.into());
        self
    }

    /// Record who is making the request. The actor kind must be allowed to make requests.
    pub fn made_by(&mut self, maker: &Actor) -> Result<&mut Self, RequestError> {
        if !self.engine.config.can_make(&maker.kind) {
            return Err(AuthorizationError::MakerNotWhitelisted(maker.kind.clone()).into());
        }

        self.draft.maker = Some(maker.reference());
        Ok(self)
    }

    fn assert_type_is_not_set(&self) -> Result<(), ValidationError> {
        if self.draft.request_type.is_some() {
            return Err(ValidationError::TypeAlreadySet);
        }
        Ok(())
    }

    fn assert_kind_is_known(&self, kind: &str) -> Result<(), ValidationError> {
        if !self.engine.targets.contains(kind) {
            return Err(ValidationError::UnknownTargetKind(kind.to_string()));
        }
        Ok(())
    }

    pub fn to_create(&mut self, kind: &str, payload: Payload) -> Result<&mut Self, RequestError> {
        self.assert_type_is_not_set()?;
        self.assert_kind_is_known(kind)?;
        self.draft.request_type = Some(RequestType::Create);

        self.draft.subject = Some(SubjectRef::kind_only(kind));
        self.draft.payload = Some(payload);
        Ok(self)
    }

    pub fn to_update(
        &mut self,
        subject: &SubjectRef,
        changes: Payload,
    ) -> Result<&mut Self, RequestError> {
        self.assert_type_is_not_set()?;
        if subject.id.is_none() {
            return Err(ValidationError::MissingSubject(RequestType::Update).into());
        }
        self.assert_kind_is_known(&subject.kind)?;
        self.draft.request_type = Some(RequestType::Update);

        self.draft.subject = Some(subject.clone());
        self.draft.payload = Some(changes);
        Ok(self)
    }

    pub fn to_delete(&mut self, subject: &SubjectRef) -> Result<&mut Self, RequestError> {
        self.assert_type_is_not_set()?;
        if subject.id.is_none() {
            return Err(ValidationError::MissingSubject(RequestType::Delete).into());
        }
        self.assert_kind_is_known(&subject.kind)?;
        self.draft.request_type = Some(RequestType::Delete);

        self.draft.subject = Some(subject.clone());
        Ok(self)
    }

    /// Request that an action be run once approved.
    ///
    /// Uniqueness keys and hooks come from the action unless they were set before this call.
    pub fn to_execute(
        &mut self,
        action: ExecuteAction<'_>,
        payload: Payload,
        required_approvals: BTreeMap<String, u32>,
    ) -> Result<&mut Self, RequestError> {
        self.assert_type_is_not_set()?;

        let executable = match action {
            ExecuteAction::Named(name) => self
                .engine
                .actions
                .resolve(&name)
                .ok_or(ValidationError::UnknownAction(name))?,
            ExecuteAction::Inline(callback) => {
                let executable = callback(&self.draft, &payload).map_err(RequestError::processing)?;
                if !self.engine.actions.contains(executable.name()) {
                    return Err(ValidationError::UnknownAction(executable.name().to_string()).into());
                }
                executable
            }
        };

        self.draft.request_type = Some(RequestType::Execute);
        self.draft.executable = Some(executable.name().to_string());
        self.draft.payload = Some(payload);
        self.draft.required_approvals = required_approvals;

        if self.unique_by.is_empty() {
            self.unique_by = executable.unique_by();
        }
        for hook in Hook::executable_hooks() {
            self.hooks
                .entry(hook)
                .or_insert_with(|| HookBinding::Action(executable.name().to_string()));
        }

        Ok(self)
    }

    /// Payload fields compared when looking for duplicate pending requests.
    pub fn unique_by<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Bind a registered hook handler to the hook called `name`.
    pub fn hook(&mut self, name: &str, handler: &str) -> Result<&mut Self, RequestError> {
        let hook: Hook = name.parse()?;
        self.set_hook(hook, handler)
    }

    fn set_hook(&mut self, hook: Hook, handler: &str) -> Result<&mut Self, RequestError> {
        if !Hook::executable_hooks().contains(&hook) {
            return Err(ValidationError::UnknownHook(hook.to_string()).into());
        }
        if !self.engine.hooks.contains(handler) {
            return Err(ValidationError::UnknownHookHandler(handler.to_string()).into());
        }

        self.hooks
            .insert(hook, HookBinding::Handler(handler.to_string()));
        Ok(self)
    }

    pub fn before_approval(&mut self, handler: &str) -> Result<&mut Self, RequestError> {
        self.set_hook(Hook::PreApproval, handler)
    }

    pub fn after_approval(&mut self, handler: &str) -> Result<&mut Self, RequestError> {
        self.set_hook(Hook::PostApproval, handler)
    }

    pub fn before_rejection(&mut self, handler: &str) -> Result<&mut Self, RequestError> {
        self.set_hook(Hook::PreRejection, handler)
    }

    pub fn after_rejection(&mut self, handler: &str) -> Result<&mut Self, RequestError> {
        self.set_hook(Hook::PostRejection, handler)
    }

    pub fn on_failure(&mut self, handler: &str) -> Result<&mut Self, RequestError> {
        self.set_hook(Hook::OnFailure, handler)
    }

    /// Adjust the draft directly.
    pub fn tap<F: FnOnce(&mut Draft)>(&mut self, callback: F) -> &mut Self {
        callback(&mut self.draft);
        self
    }

    /// Validate and persist the draft as a new pending request.
    ///
    /// The builder is reset whatever the outcome, so it can start a fresh request.
    pub fn save(&mut self) -> Result<Request, RequestError> {
        let draft = std::mem::take(&mut self.draft);
        let hooks = std::mem::take(&mut self.hooks);
        let unique_by = std::mem::take(&mut self.unique_by);

        let request_type = draft.request_type.ok_or(ValidationError::MissingType)?;
        let maker = draft.maker.ok_or(ValidationError::MissingMaker)?;

        let engine = self.engine;
        let now = engine.now();
        let code = new_request_code()
            .map_err(|e| RequestError::NotInitiated(StoreError::Encode(e.to_string())))?;

        let mut request = Request::new(code, request_type, maker, now);
        request.id = engine
            .store
            .generate_id()
            .map_err(RequestError::NotInitiated)?;
        if let Some(description) = draft.description {
            request.description = description;
        }
        request.payload = draft.payload;
        request.executable = draft.executable;
        request.subject = draft.subject;
        request.required_approvals = draft.required_approvals;
        request.remarks = draft.remarks;
        request.metadata = Metadata { hooks, unique_by };

        {
            let _guard = engine.store.lock_inserts();

            if engine.config.ensure_requests_are_unique {
                assert_request_is_unique(&engine.store, &request)?;
            }

            engine
                .store
                .insert(&request)
                .map_err(RequestError::NotInitiated)?;
        }

        engine.bus.dispatch(Event::Initiated(request.clone()));

        Ok(request)
    }
}
