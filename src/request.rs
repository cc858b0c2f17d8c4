//! The persisted request and its approval ledger
use crate::error::StateError;
use crate::hooks::{Hook, HookBinding};
use crate::payload::Payload;
use crate::types::{Actor, ActorRef, DEFAULT_ROLE, RequestStatus, RequestType, SubjectRef, TimeStamp};
use chrono::Utc;
use std::collections::BTreeMap;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Approval {
    #[n(0)]
    pub checker: ActorRef,
    #[n(1)]
    pub role: String,
    #[n(2)]
    pub approved_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    #[n(0)]
    pub hooks: BTreeMap<Hook, HookBinding>,
    #[n(1)]
    pub unique_by: Vec<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Request {
    #[n(0)]
    pub id: u64,
    #[n(1)]
    pub code: String, // bech32m encoded uuid7, never reassigned
    #[n(2)]
    pub request_type: RequestType,
    #[n(3)]
    pub description: String,
    #[n(4)]
    pub payload: Option<Payload>,
    #[n(5)]
    pub executable: Option<String>, // action registry key, EXECUTE only
    #[n(6)]
    pub subject: Option<SubjectRef>,
    #[n(7)]
    pub maker: ActorRef,
    #[n(8)]
    pub checker: Option<ActorRef>,
    #[n(9)]
    pub status: RequestStatus,
    #[n(10)]
    pub required_approvals: BTreeMap<String, u32>, // role -> count, empty means one approval
    #[n(11)]
    pub approvals: Vec<Approval>,
    #[n(12)]
    pub metadata: Metadata,
    #[n(13)]
    pub remarks: Option<String>,
    #[n(14)]
    pub exception: Option<String>,
    #[n(15)]
    pub made_at: TimeStamp<Utc>,
    #[n(16)]
    pub checked_at: Option<TimeStamp<Utc>>,
    #[n(17)]
    pub created_at: TimeStamp<Utc>,
    #[n(18)]
    pub updated_at: TimeStamp<Utc>,
}

impl Request {
    /// A bare pending request. The builder fills in the rest before saving.
    pub fn new(
        code: String,
        request_type: RequestType,
        maker: ActorRef,
        now: TimeStamp<Utc>,
    ) -> Self {
        Self {
            id: 0,
            code,
            request_type,
            description: format!("New {} request", request_type.display()),
            payload: None,
            executable: None,
            subject: None,
            maker,
            checker: None,
            status: RequestStatus::Pending,
            required_approvals: BTreeMap::new(),
            approvals: vec![],
            metadata: Metadata::default(),
            remarks: None,
            exception: None,
            made_at: now.clone(),
            checked_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_of_status(&self, status: RequestStatus) -> bool {
        self.status == status
    }
    pub fn is_of_type(&self, request_type: RequestType) -> bool {
        self.request_type == request_type
    }
    pub fn is_pending(&self) -> bool {
        self.is_of_status(RequestStatus::Pending)
    }
    pub fn is_approved(&self) -> bool {
        self.is_of_status(RequestStatus::Approved)
    }
    pub fn is_rejected(&self) -> bool {
        self.is_of_status(RequestStatus::Rejected)
    }
    pub fn is_expired(&self) -> bool {
        self.is_of_status(RequestStatus::Expired)
    }
    pub fn is_failed(&self) -> bool {
        self.is_of_status(RequestStatus::Failed)
    }

    pub fn hook(&self, hook: Hook) -> Option<&HookBinding> {
        self.metadata.hooks.get(&hook)
    }

    /// Record `checker`'s approval. A checker can only approve once.
    pub fn add_approval(
        &mut self,
        checker: &Actor,
        role: Option<&str>,
        approved_at: TimeStamp<Utc>,
    ) -> Result<(), StateError> {
        if self.approvals.iter().any(|approval| checker.is(&approval.checker)) {
            return Err(StateError::AlreadyApproved(checker.reference().to_string()));
        }

        let role = role.filter(|role| !role.is_empty()).unwrap_or(DEFAULT_ROLE);

        self.approvals.push(Approval {
            checker: checker.reference(),
            role: role.to_string(),
            approved_at,
        });

        Ok(())
    }

    fn approvals_with_role(&self, role: &str) -> u32 {
        let count = self
            .approvals
            .iter()
            .filter(|approval| approval.role == role)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    pub fn has_met_threshold(&self) -> bool {
        if self.required_approvals.is_empty() {
            return !self.approvals.is_empty();
        }

        self.required_approvals
            .iter()
            .all(|(role, required)| self.approvals_with_role(role) >= *required)
    }

    /// Outstanding approvals per role, for progress reporting.
    pub fn pending_roles(&self) -> BTreeMap<String, u32> {
        self.required_approvals
            .iter()
            .filter_map(|(role, required)| {
                let actual = self.approvals_with_role(role);
                (actual < *required).then(|| (role.clone(), required - actual))
            })
            .collect()
    }
}
