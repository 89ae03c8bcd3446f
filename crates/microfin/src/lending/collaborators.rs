//! Outbound collaborators: document storage and lifecycle notifications.
//!
//! Both are invoked only after the owning transition has committed. Their failures are logged
//! and never roll the transition back.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle to an uploaded document. The engine never interprets file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(pub String);

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document storage unavailable: {0}")]
    Unavailable(String),
}

pub trait DocumentStore: Send + Sync {
    fn store(&self, name: &str, bytes: &[u8]) -> Result<DocumentRef, DocumentError>;
    fn resolve(&self, reference: &DocumentRef) -> Result<Option<String>, DocumentError>;
}

/// Keeps uploads in memory and resolves them to `{base_url}/{ref}`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    base_url: String,
    documents: Arc<Mutex<HashMap<DocumentRef, usize>>>,
}

impl InMemoryDocumentStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            documents: Arc::default(),
        }
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn store(&self, name: &str, bytes: &[u8]) -> Result<DocumentRef, DocumentError> {
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
            .collect();
        let reference = DocumentRef(format!("{}-{}", Uuid::new_v4().simple(), sanitized));
        self.documents
            .lock()
            .map_err(|_| DocumentError::Unavailable("document index poisoned".to_string()))?
            .insert(reference.clone(), bytes.len());
        Ok(reference)
    }

    fn resolve(&self, reference: &DocumentRef) -> Result<Option<String>, DocumentError> {
        let documents = self
            .documents
            .lock()
            .map_err(|_| DocumentError::Unavailable("document index poisoned".to_string()))?;
        Ok(documents
            .contains_key(reference)
            .then(|| format!("{}/{}", self.base_url, reference.0)))
    }
}

/// Committed transitions worth telling the outside world about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    MembershipApproved,
    MembershipRejected,
    ApplicationApproved,
    ApplicationRejected,
    LoanCreated,
    LoanClosed,
}

impl LifecycleEvent {
    pub const fn label(self) -> &'static str {
        match self {
            LifecycleEvent::MembershipApproved => "membership_approved",
            LifecycleEvent::MembershipRejected => "membership_rejected",
            LifecycleEvent::ApplicationApproved => "application_approved",
            LifecycleEvent::ApplicationRejected => "application_rejected",
            LifecycleEvent::LoanCreated => "loan_created",
            LifecycleEvent::LoanClosed => "loan_closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub event: LifecycleEvent,
    /// Display identifier of the entity the event is about.
    pub subject: String,
    pub details: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(event: LifecycleEvent, subject: impl Into<String>) -> Self {
        Self {
            event,
            subject: subject.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Fire-and-forget dispatch (email, SMS, webhooks).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Dispatch after commit; a failing notifier is logged and otherwise ignored.
pub(crate) fn dispatch(notifier: &dyn Notifier, notification: Notification) {
    let event = notification.event.label();
    let subject = notification.subject.clone();
    if let Err(err) = notifier.notify(notification) {
        tracing::warn!(event, %subject, error = %err, "notification dispatch failed");
    }
}

/// Emits notifications as tracing events only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            event = notification.event.label(),
            subject = %notification.subject,
            details = ?notification.details,
            "lifecycle notification"
        );
        Ok(())
    }
}

/// Records notifications for inspection.
#[derive(Debug, Default, Clone)]
pub struct InMemoryNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Notifier for InMemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .map_err(|_| NotifyError::Transport("notification log poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Transport("smtp offline".to_string()))
        }
    }

    #[test]
    fn stored_documents_resolve_under_base_url() {
        let store = InMemoryDocumentStore::new("https://docs.example.test/");
        let reference = store.store("id proof.pdf", b"%PDF").expect("stored");
        let url = store
            .resolve(&reference)
            .expect("resolves")
            .expect("known document");
        assert!(url.starts_with("https://docs.example.test/"));
        assert!(url.ends_with("id-proof.pdf"));
        assert!(store
            .resolve(&DocumentRef("missing".to_string()))
            .expect("resolves")
            .is_none());
    }

    #[test]
    fn dispatch_swallows_transport_failures() {
        dispatch(
            &FailingNotifier,
            Notification::new(LifecycleEvent::LoanCreated, "LN-0000001"),
        );
    }

    #[test]
    fn in_memory_notifier_records_details() {
        let notifier = InMemoryNotifier::default();
        dispatch(
            &notifier,
            Notification::new(LifecycleEvent::ApplicationApproved, "APP-0000001")
                .with_detail("loan", "LN-0000001"),
        );
        let events = notifier.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details["loan"], "LN-0000001");
    }
}
