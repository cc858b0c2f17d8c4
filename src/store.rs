//! Request persistence over sled
use crate::error::StoreError;
use crate::request::Request;
use crate::types::{ActorRef, RequestStatus, RequestType, TimeStamp};
use chrono::Utc;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{IVec, Tree};
use std::sync::{Mutex, MutexGuard};

const REQUESTS_TREE: &str = "requests";
const PENDING_SCOPE_TREE: &str = "pending_scope";

/// A request as read from the store, with the exact bytes it was read from.
///
/// The bytes are the expected value of the next conditional write.
#[derive(Debug, Clone)]
pub struct Stored {
    pub request: Request,
    pub raw: IVec,
}

// what two requests must share to be considered duplicates
#[derive(minicbor::Encode)]
struct Scope<'a> {
    #[n(0)]
    request_type: RequestType,
    #[n(1)]
    executable: Option<&'a str>,
    #[n(2)]
    subject_kind: Option<&'a str>,
    #[n(3)]
    subject_id: Option<&'a str>,
}

fn scope_digest(request: &Request) -> Result<String, StoreError> {
    let scope = Scope {
        request_type: request.request_type,
        executable: request.executable.as_deref(),
        subject_kind: request.subject.as_ref().map(|s| s.kind.as_str()),
        subject_id: request.subject.as_ref().and_then(|s| s.id.as_deref()),
    };
    let cbor = minicbor::to_vec(&scope).map_err(|e| StoreError::Encode(e.to_string()))?;
    Ok(sha256::digest(&cbor))
}

fn encode(request: &Request) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(request).map_err(|e| StoreError::Encode(e.to_string()))
}

pub struct RequestStore {
    db: sled::Db,
    requests: Tree,
    pending: Tree,
    // serializes duplicate check + insert
    insert_lock: Mutex<()>,
}

impl RequestStore {
    pub fn open(db: &sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            db: db.clone(),
            requests: db.open_tree(REQUESTS_TREE)?,
            pending: db.open_tree(PENDING_SCOPE_TREE)?,
            insert_lock: Mutex::new(()),
        })
    }

    pub fn generate_id(&self) -> Result<u64, StoreError> {
        Ok(self.db.generate_id()?)
    }

    pub(crate) fn lock_inserts(&self) -> MutexGuard<'_, ()> {
        self.insert_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn load(&self, code: &str) -> Result<Option<Stored>, StoreError> {
        match self.requests.get(code.as_bytes())? {
            Some(raw) => {
                let request = minicbor::decode(&raw)?;
                Ok(Some(Stored { request, raw }))
            }
            None => Ok(None),
        }
    }

    pub fn get(&self, code: &str) -> Result<Option<Request>, StoreError> {
        Ok(self.load(code)?.map(|stored| stored.request))
    }

    /// Store a new request. Fails if its code is already taken.
    pub fn insert(&self, request: &Request) -> Result<IVec, StoreError> {
        let bytes = encode(request)?;
        match self.transact(request, None, Some(&bytes)) {
            Err(StoreError::Conflict(code)) => Err(StoreError::CodeTaken(code)),
            other => other.map(|_| IVec::from(bytes)),
        }
    }

    /// Replace the stored row, provided it still equals `expected`. Returns the new row bytes.
    pub fn write(&self, request: &Request, expected: &[u8]) -> Result<IVec, StoreError> {
        let bytes = encode(request)?;
        self.transact(request, Some(expected), Some(&bytes))?;
        Ok(IVec::from(bytes))
    }

    /// Remove the row, provided it still equals `expected`.
    pub fn remove(&self, request: &Request, expected: &[u8]) -> Result<(), StoreError> {
        self.transact(request, Some(expected), None)
    }

    // conditional write of the request row and its pending-scope index entry
    fn transact(
        &self,
        request: &Request,
        expected: Option<&[u8]>,
        replacement: Option<&[u8]>,
    ) -> Result<(), StoreError> {
        let key = request.code.as_bytes();
        let index_key = format!("{}/{}", scope_digest(request)?, request.code);
        let indexed = replacement.is_some() && request.is_pending();

        let result = (&self.requests, &self.pending).transaction(|(requests, pending)| {
            let current = requests.get(key)?;
            if current.as_deref() != expected {
                return Err(ConflictableTransactionError::Abort(()));
            }

            match replacement {
                Some(bytes) => {
                    requests.insert(key, bytes)?;
                }
                None => {
                    requests.remove(key)?;
                }
            }

            if indexed {
                pending.insert(index_key.as_bytes(), Vec::<u8>::new())?;
            } else {
                pending.remove(index_key.as_bytes())?;
            }

            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(())) => Err(StoreError::Conflict(request.code.clone())),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    /// Pending requests sharing type, executable and subject with `request`.
    pub fn pending_in_scope(&self, request: &Request) -> Result<Vec<Request>, StoreError> {
        let prefix = format!("{}/", scope_digest(request)?);
        let mut found = vec![];

        for entry in self.pending.scan_prefix(prefix.as_bytes()) {
            let (key, _) = entry?;
            let code = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            if let Some(existing) = self.get(&code)? {
                if existing.is_pending() {
                    found.push(existing);
                }
            }
        }

        Ok(found)
    }

    pub fn all(&self) -> Result<Vec<Request>, StoreError> {
        self.requests
            .iter()
            .values()
            .map(|raw| Ok(minicbor::decode(&raw?)?))
            .collect()
    }

    pub fn with_status(&self, status: RequestStatus) -> Result<Vec<Request>, StoreError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|request| request.is_of_status(status))
            .collect())
    }

    pub fn made_by(&self, maker: &ActorRef) -> Result<Vec<Request>, StoreError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|request| &request.maker == maker)
            .collect())
    }

    /// Move every pending request created at or before `cutoff` to EXPIRED.
    ///
    /// Rows changed concurrently are skipped; they are no longer plain pending rows.
    pub fn expire_overdue(
        &self,
        cutoff: &TimeStamp<Utc>,
        now: &TimeStamp<Utc>,
    ) -> Result<usize, StoreError> {
        let mut expired = 0;

        for entry in self.requests.iter() {
            let (_, raw) = entry?;
            let mut request: Request = minicbor::decode(&raw)?;
            if !request.is_pending() || request.created_at.to_datetime_utc() > cutoff.to_datetime_utc() {
                continue;
            }

            request.status = RequestStatus::Expired;
            request.updated_at = now.clone();

            match self.write(&request, &raw) {
                Ok(_) => expired += 1,
                Err(StoreError::Conflict(code)) => {
                    tracing::debug!(%code, "request changed during expiration sweep, skipped");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(expired)
    }
}
