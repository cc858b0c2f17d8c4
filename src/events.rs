//! Lifecycle notifications fanned out to in-process listeners
use crate::request::Request;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
pub enum Event {
    Initiated(Request),
    Approved(Request),
    Rejected(Request),
    Failed { request: Request, cause: String },
}

impl Event {
    pub fn request(&self) -> &Request {
        match self {
            Event::Initiated(request)
            | Event::Approved(request)
            | Event::Rejected(request)
            | Event::Failed { request, .. } => request,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Initiated,
    Approved,
    Rejected,
    Failed,
}

impl From<&Event> for EventKind {
    fn from(event: &Event) -> Self {
        match event {
            Event::Initiated(_) => EventKind::Initiated,
            Event::Approved(_) => EventKind::Approved,
            Event::Rejected(_) => EventKind::Rejected,
            Event::Failed { .. } => EventKind::Failed,
        }
    }
}

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Fire-and-forget dispatch. Listeners cannot fail the transition that emitted the event.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<(EventKind, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((kind, Arc::new(listener)));
    }

    pub fn dispatch(&self, event: Event) {
        match &event {
            Event::Failed { request, cause } => {
                tracing::warn!(code = %request.code, status = %request.status, %cause, "request failed");
            }
            other => {
                let request = other.request();
                tracing::info!(
                    code = %request.code,
                    kind = ?EventKind::from(other),
                    request_type = %request.request_type,
                    status = %request.status,
                    "request event"
                );
            }
        }

        // clone out so listeners may register further listeners
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|(kind, _)| *kind == EventKind::from(&event))
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(&event);
        }
    }
}
