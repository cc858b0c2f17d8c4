//! Apply an approved request to its target
use crate::error::ValidationError;
use crate::registry::ActionRegistry;
use crate::request::Request;
use crate::target::TargetRegistry;
use crate::types::{RequestType, SubjectRef};
use anyhow::Context;

fn subject_id(request: &Request) -> anyhow::Result<(&SubjectRef, &str)> {
    let subject = request
        .subject
        .as_ref()
        .ok_or(ValidationError::MissingSubject(request.request_type))?;
    let id = subject
        .id
        .as_deref()
        .ok_or(ValidationError::MissingSubject(request.request_type))?;
    Ok((subject, id))
}

/// Perform the mutation an approved request describes.
///
/// Removing the request row afterwards is the caller's job, so a failure here
/// leaves the row in place to be marked as failed.
pub fn fulfill(
    targets: &TargetRegistry,
    actions: &ActionRegistry,
    request: &Request,
) -> anyhow::Result<()> {
    match request.request_type {
        RequestType::Create => {
            let payload = request
                .payload
                .as_ref()
                .ok_or(ValidationError::PayloadRequired(RequestType::Create))?;
            let kind = request
                .subject
                .as_ref()
                .map(|subject| subject.kind.as_str())
                .ok_or(ValidationError::MissingSubject(RequestType::Create))?;
            let store = targets
                .resolve(kind)
                .ok_or_else(|| ValidationError::UnknownTargetKind(kind.to_string()))?;

            let id = store
                .create_if_absent(payload)
                .with_context(|| format!("failed to create {kind}"))?;
            tracing::debug!(code = %request.code, %kind, %id, "created target");
        }
        RequestType::Update => {
            let payload = request
                .payload
                .as_ref()
                .ok_or(ValidationError::PayloadRequired(RequestType::Update))?;
            let (subject, id) = subject_id(request)?;
            let store = targets
                .resolve(&subject.kind)
                .ok_or_else(|| ValidationError::UnknownTargetKind(subject.kind.clone()))?;

            store
                .update(id, payload)
                .with_context(|| format!("failed to update {} {id}", subject.kind))?;
        }
        RequestType::Delete => {
            let (subject, id) = subject_id(request)?;
            let store = targets
                .resolve(&subject.kind)
                .ok_or_else(|| ValidationError::UnknownTargetKind(subject.kind.clone()))?;

            store
                .delete(id)
                .with_context(|| format!("failed to delete {} {id}", subject.kind))?;
        }
        RequestType::Execute => {
            let name = request
                .executable
                .as_deref()
                .ok_or_else(|| ValidationError::UnknownAction(String::new()))?;
            let action = actions
                .resolve(name)
                .ok_or_else(|| ValidationError::UnknownAction(name.to_string()))?;

            action
                .execute(request)
                .with_context(|| format!("action {name} failed"))?;
        }
    }

    Ok(())
}
