//! Shared value types: timestamps, request kinds, statuses and actor references
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// Role recorded on an approval when the checker supplies none.
pub const DEFAULT_ROLE: &str = "default";

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// Whole minutes elapsed between `self` and `later`. Negative if `later` is earlier.
    pub fn minutes_until(&self, later: &TimeStamp<Utc>) -> i64 {
        (later.0 - self.0).num_minutes()
    }
    pub fn minus_minutes(&self, minutes: u64) -> Self {
        let minutes = i64::try_from(minutes).unwrap_or(i64::MAX);
        Self(self.0 - chrono::Duration::minutes(minutes))
    }
}

/// Source of "now" for the engine. Defaults to the system clock.
pub type Clock = std::sync::Arc<dyn Fn() -> TimeStamp<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    std::sync::Arc::new(TimeStamp::<Utc>::new)
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    #[n(0)]
    Create,
    #[n(1)]
    Update,
    #[n(2)]
    Delete,
    #[n(3)]
    Execute,
}

impl RequestType {
    pub fn display(&self) -> &'static str {
        match self {
            RequestType::Create => "Create",
            RequestType::Update => "Update",
            RequestType::Delete => "Delete",
            RequestType::Execute => "Execute",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    #[n(0)]
    Pending,
    /// Reserved for deferred fulfillment. The synchronous engine never assigns it.
    #[n(1)]
    Processing,
    #[n(2)]
    PartiallyApproved,
    #[n(3)]
    Approved,
    #[n(4)]
    Rejected,
    #[n(5)]
    Expired,
    #[n(6)]
    Failed,
}

impl RequestStatus {
    /// Statuses a request can never leave.
    pub fn finalized() -> [RequestStatus; 4] {
        [
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Expired,
            RequestStatus::Failed,
        ]
    }
    pub fn is_final(&self) -> bool {
        Self::finalized().contains(self)
    }
    /// A checker may only act on pending or partially approved requests.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            RequestStatus::Pending | RequestStatus::PartiallyApproved
        )
    }
    pub fn display(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Processing => "Processing",
            RequestStatus::PartiallyApproved => "Partially Approved",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::Expired => "Expired",
            RequestStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// Stored reference to a maker or checker: the actor kind plus its id.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorRef {
    #[n(0)]
    pub kind: String,
    #[n(1)]
    pub id: String,
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// An actor as supplied by the caller's directory.
///
/// `contact` is the identifying attribute (usually an email) checked against
/// the dual-role allowlist when an actor checks its own request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub kind: String,
    pub id: String,
    pub contact: Option<String>,
}

impl Actor {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            contact: None,
        }
    }
    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }
    pub fn reference(&self) -> ActorRef {
        ActorRef {
            kind: self.kind.clone(),
            id: self.id.clone(),
        }
    }
    pub fn is(&self, other: &ActorRef) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

/// Target of a request. `id` is `None` for creations, where the entity does not exist yet.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectRef {
    #[n(0)]
    pub kind: String,
    #[n(1)]
    pub id: Option<String>,
}

impl SubjectRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: Some(id.into()),
        }
    }
    pub fn kind_only(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
        }
    }
}
