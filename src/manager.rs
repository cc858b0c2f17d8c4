//! The approval surface: approve, reject, and the expiration sweep
use crate::builder::RequestBuilder;
use crate::config::Config;
use crate::eligibility::assert_can_check;
use crate::error::{RequestError, StateError, StoreError};
use crate::events::{Event, EventBus, EventKind};
use crate::executable::Executable;
use crate::fulfillment::fulfill;
use crate::hooks::Hook;
use crate::registry::{ActionRegistry, HookRegistry, invoke_hook};
use crate::request::Request;
use crate::store::{RequestStore, Stored};
use crate::target::{TargetRegistry, TargetStore};
use crate::types::{Actor, Clock, RequestStatus, TimeStamp, system_clock};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub struct MakerChecker {
    pub(crate) config: Config,
    pub(crate) store: RequestStore,
    pub(crate) targets: TargetRegistry,
    pub(crate) actions: ActionRegistry,
    pub(crate) hooks: HookRegistry,
    pub(crate) bus: EventBus,
    clock: Clock,
    // one mutex per request code with an operation in flight
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MakerChecker {
    pub fn new(config: Config, db: &sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            config,
            store: RequestStore::open(db)?,
            targets: TargetRegistry::new(),
            actions: ActionRegistry::new(),
            hooks: HookRegistry::new(),
            bus: EventBus::new(),
            clock: system_clock(),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Open the database at `config.db_path`.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        let db = sled::open(&config.db_path)?;
        Ok(Self::new(config, &db)?)
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn register_target(&mut self, kind: impl Into<String>, store: Arc<dyn TargetStore>) -> &mut Self {
        self.targets.register(kind, store);
        self
    }

    pub fn register_action(&mut self, action: Arc<dyn Executable>) -> &mut Self {
        self.actions.register(action);
        self
    }

    pub fn register_hook<F>(&mut self, key: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&Request) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks.register(key, handler);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn now(&self) -> TimeStamp<Utc> {
        (self.clock)()
    }

    /// Begin a new request.
    pub fn request(&self) -> RequestBuilder<'_> {
        RequestBuilder::new(self)
    }

    pub fn after_initiating<F: Fn(&Event) + Send + Sync + 'static>(&self, listener: F) {
        self.bus.listen(EventKind::Initiated, listener);
    }

    pub fn after_approving<F: Fn(&Event) + Send + Sync + 'static>(&self, listener: F) {
        self.bus.listen(EventKind::Approved, listener);
    }

    pub fn after_rejecting<F: Fn(&Event) + Send + Sync + 'static>(&self, listener: F) {
        self.bus.listen(EventKind::Rejected, listener);
    }

    pub fn on_failure<F: Fn(&Event) + Send + Sync + 'static>(&self, listener: F) {
        self.bus.listen(EventKind::Failed, listener);
    }

    /// The live request with this code, if it has not been fulfilled.
    pub fn find(&self, code: &str) -> Result<Option<Request>, RequestError> {
        Ok(self.store.get(code)?)
    }

    pub fn requests_with_status(&self, status: RequestStatus) -> Result<Vec<Request>, RequestError> {
        Ok(self.store.with_status(status)?)
    }

    pub fn requests_made_by(&self, maker: &Actor) -> Result<Vec<Request>, RequestError> {
        Ok(self.store.made_by(&maker.reference())?)
    }

    fn lock_for(&self, code: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(code.to_string()).or_default().clone()
    }

    fn release(&self, code: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // the map and `lock` are the only holders left
        if Arc::strong_count(&lock) == 2 {
            locks.remove(code);
        }
    }

    fn serialized<T>(
        &self,
        code: &str,
        operation: impl FnOnce() -> Result<T, RequestError>,
    ) -> Result<T, RequestError> {
        let lock = self.lock_for(code);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            operation()
        };
        self.release(code, lock);
        result
    }

    fn load_live(&self, code: &str) -> Result<Stored, RequestError> {
        self.store
            .load(code)?
            .ok_or_else(|| StateError::NotFound(code.to_string()).into())
    }

    fn run_hook(&self, request: &Request, hook: Hook) -> anyhow::Result<()> {
        invoke_hook(&self.hooks, &self.actions, request, hook)
    }

    // post-transition hooks run after the outcome is stored and cannot change it
    fn run_finalizer(&self, request: &Request, hook: Hook) {
        if let Err(e) = self.run_hook(request, hook) {
            tracing::warn!(code = %request.code, %hook, error = %e, "hook failed after transition");
        }
    }

    // a conditional write lost to another writer; report what the row is now
    fn superseded(&self, code: &str, err: StoreError) -> RequestError {
        let StoreError::Conflict(_) = err else {
            return err.into();
        };

        tracing::debug!(%code, "request changed while it was being checked");
        match self.store.get(code) {
            Ok(None) => StateError::NotFound(code.to_string()).into(),
            Ok(Some(current)) if !current.status.is_actionable() => {
                StateError::NotActionable(current.status).into()
            }
            Ok(Some(_)) => StateError::Changed(code.to_string()).into(),
            Err(e) => e.into(),
        }
    }

    /// Approve `request` on behalf of `approver`.
    ///
    /// Once the approval threshold is met the request is fulfilled and removed
    /// from the store. Hooks run on the calling thread while the request is
    /// locked and must not approve or reject the same request.
    pub fn approve(
        &self,
        request: &Request,
        approver: &Actor,
        role: Option<&str>,
        remarks: Option<&str>,
    ) -> Result<Request, RequestError> {
        self.serialized(&request.code, || {
            let Stored { mut request, raw } = self.load_live(&request.code)?;
            let now = self.now();

            assert_can_check(&self.config, &request, approver, &now)?;

            if let Err(e) = request.add_approval(approver, role, now.clone()) {
                return Err(self.fail(request, &raw, e.into()));
            }
            request.remarks = remarks.map(str::to_string);
            request.updated_at = now.clone();

            if !request.has_met_threshold() {
                request.status = RequestStatus::PartiallyApproved;
                self.store
                    .write(&request, &raw)
                    .map_err(|e| self.superseded(&request.code, e))?;

                tracing::info!(
                    code = %request.code,
                    approvals = request.approvals.len(),
                    pending_roles = ?request.pending_roles(),
                    "request partially approved"
                );
                return Ok(request);
            }

            request.status = RequestStatus::Approved;
            request.checker = Some(approver.reference());
            request.checked_at = Some(now);
            let snapshot = self
                .store
                .write(&request, &raw)
                .map_err(|e| self.superseded(&request.code, e))?;

            if let Err(cause) = self.fulfill_approved(&request, &snapshot) {
                return Err(self.fail(request, &snapshot, cause));
            }

            self.run_finalizer(&request, Hook::PostApproval);
            Ok(request)
        })
    }

    fn fulfill_approved(&self, request: &Request, snapshot: &[u8]) -> anyhow::Result<()> {
        self.run_hook(request, Hook::PreApproval)?;
        fulfill(&self.targets, &self.actions, request)?;
        self.store.remove(request, snapshot)?;

        self.bus.dispatch(Event::Approved(request.clone()));
        Ok(())
    }

    /// Reject `request` on behalf of `rejector`.
    ///
    /// The after-rejection hook and the rejected notification only follow a
    /// rejection that went through; a failing before-rejection hook leaves the
    /// request FAILED and reports the failure instead.
    pub fn reject(
        &self,
        request: &Request,
        rejector: &Actor,
        remarks: Option<&str>,
    ) -> Result<Request, RequestError> {
        self.serialized(&request.code, || {
            let Stored { mut request, raw } = self.load_live(&request.code)?;
            let now = self.now();

            assert_can_check(&self.config, &request, rejector, &now)?;

            request.status = RequestStatus::Rejected;
            request.checker = Some(rejector.reference());
            request.checked_at = Some(now.clone());
            request.remarks = remarks.map(str::to_string);
            request.updated_at = now;
            let snapshot = self
                .store
                .write(&request, &raw)
                .map_err(|e| self.superseded(&request.code, e))?;

            if let Err(cause) = self.run_hook(&request, Hook::PreRejection) {
                return Err(self.fail(request, &snapshot, cause));
            }

            self.run_finalizer(&request, Hook::PostRejection);
            self.bus.dispatch(Event::Rejected(request.clone()));

            Ok(request)
        })
    }

    // record a mid-transition failure on the request and report it
    fn fail(&self, mut request: Request, snapshot: &[u8], cause: anyhow::Error) -> RequestError {
        let reason = format!("{cause:#}");
        request.status = RequestStatus::Failed;
        request.exception = Some(reason.clone());
        request.updated_at = self.now();

        // failure hooks and listeners only hear about failures that were recorded
        if let Err(e) = self.store.write(&request, snapshot) {
            tracing::error!(code = %request.code, error = %e, %reason, "could not record request failure");
            return self.superseded(&request.code, e);
        }

        self.run_finalizer(&request, Hook::OnFailure);
        self.bus.dispatch(Event::Failed {
            request,
            cause: reason,
        });

        RequestError::processing(cause)
    }

    /// Move overdue pending requests to EXPIRED.
    ///
    /// Returns `None` without touching anything when no expiration window is configured.
    pub fn expire_overdue_requests(&self) -> Result<Option<usize>, RequestError> {
        let Some(window) = self
            .config
            .request_expiration_in_minutes
            .filter(|minutes| *minutes > 0)
        else {
            return Ok(None);
        };

        let now = self.now();
        let expired = self.store.expire_overdue(&now.minus_minutes(window), &now)?;
        tracing::info!(expired, window, "expired overdue pending requests");

        Ok(Some(expired))
    }
}
