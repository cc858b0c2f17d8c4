//! Guard against two equivalent requests waiting for approval at once
use crate::error::RequestError;
use crate::payload::Payload;
use crate::request::Request;
use crate::store::RequestStore;

/// The part of `payload` compared against other pending requests.
///
/// Narrowed to `unique_by` when any of those fields are present, the whole payload otherwise.
pub fn fields_to_check(payload: &Payload, unique_by: &[String]) -> Payload {
    let narrowed = payload.only(unique_by);
    if narrowed.is_empty() {
        payload.clone()
    } else {
        narrowed
    }
}

/// Fail with [`RequestError::Duplicate`] if a pending request already covers `request`.
pub fn assert_request_is_unique(store: &RequestStore, request: &Request) -> Result<(), RequestError> {
    let Some(payload) = &request.payload else {
        return Ok(());
    };

    let fields = fields_to_check(payload, &request.metadata.unique_by);

    let duplicate = store
        .pending_in_scope(request)?
        .into_iter()
        .filter(|existing| existing.code != request.code)
        .find(|existing| {
            existing
                .payload
                .as_ref()
                .is_some_and(|existing_payload| existing_payload.contains(&fields))
        });

    match duplicate {
        Some(existing) => {
            tracing::info!(
                code = %request.code,
                existing = %existing.code,
                request_type = %request.request_type,
                "duplicate pending request refused"
            );
            Err(RequestError::Duplicate(request.request_type))
        }
        None => Ok(()),
    }
}
