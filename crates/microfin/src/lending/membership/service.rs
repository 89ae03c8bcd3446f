use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::domain::{
    Address, Membership, MembershipDocuments, MembershipId, MembershipStatus,
    MembershipSubmission, PersonalInfo,
};
use super::repository::MembershipRepository;
use crate::identifier::IdentifierKind;
use crate::lending::collaborators::{
    dispatch, DocumentError, DocumentStore, LifecycleEvent, Notification, Notifier,
};
use crate::lending::error::{EngineError, RepositoryError};
use crate::lending::lifecycle::{InvalidTransition, Lifecycle};
use crate::lending::retry::ReadRetryPolicy;
use crate::sequence::SequenceStore;

/// Field edits permitted while a membership is still pending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipUpdate {
    #[serde(default)]
    pub personal_info: Option<PersonalInfo>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub documents: Option<MembershipDocuments>,
}

/// Onboarding and review of memberships.
pub struct MembershipService {
    sequences: Arc<dyn SequenceStore>,
    repository: Arc<dyn MembershipRepository>,
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    reads: ReadRetryPolicy,
}

impl MembershipService {
    pub fn new(
        sequences: Arc<dyn SequenceStore>,
        repository: Arc<dyn MembershipRepository>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        reads: ReadRetryPolicy,
    ) -> Self {
        Self {
            sequences,
            repository,
            documents,
            notifier,
            reads,
        }
    }

    /// Validate the form, issue the next `ZMID-` number, and store the membership as pending.
    pub fn submit(&self, submission: MembershipSubmission) -> Result<Membership, EngineError> {
        submission.validate()?;

        let kind = IdentifierKind::Membership;
        let value = self.sequences.next(kind.sequence_name())?;
        let display_id = kind.format(value)?;

        let membership = Membership {
            id: MembershipId::new(),
            display_id,
            personal_info: submission.personal_info,
            address: submission.address,
            documents: submission.documents,
            status: MembershipStatus::Pending,
            rejection_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };

        let stored = self.repository.insert(membership)?;
        tracing::info!(membership = %stored.display_id, "membership submitted");
        Ok(stored)
    }

    pub fn get(&self, id: &MembershipId) -> Result<Membership, EngineError> {
        self.reads
            .run(|| self.repository.fetch(id))?
            .ok_or_else(|| EngineError::not_found("membership", id.0.to_string()))
    }

    pub fn find_by_display_id(&self, display_id: &str) -> Result<Membership, EngineError> {
        IdentifierKind::Membership.parse(display_id)?;
        self.reads
            .run(|| self.repository.fetch_by_display_id(display_id))?
            .ok_or_else(|| EngineError::not_found("membership", display_id))
    }

    pub fn list(&self, status: Option<MembershipStatus>) -> Result<Vec<Membership>, EngineError> {
        Ok(self.reads.run(|| self.repository.list(status))?)
    }

    pub fn update_details(
        &self,
        id: &MembershipId,
        update: MembershipUpdate,
    ) -> Result<Membership, EngineError> {
        let mut membership = self.get(id)?;
        if membership.status != MembershipStatus::Pending {
            return Err(InvalidTransition {
                entity: MembershipStatus::ENTITY,
                from: membership.status.label(),
                to: "updated",
            }
            .into());
        }

        if let Some(personal_info) = update.personal_info {
            membership.personal_info = personal_info;
        }
        if let Some(address) = update.address {
            membership.address = address;
        }
        if let Some(documents) = update.documents {
            membership.documents = documents;
        }
        MembershipSubmission {
            personal_info: membership.personal_info.clone(),
            address: membership.address.clone(),
            documents: membership.documents.clone(),
        }
        .validate()?;

        self.commit(membership.clone(), MembershipStatus::Pending, "updated")?;
        Ok(membership)
    }

    pub fn approve(&self, id: &MembershipId, reviewed_by: &str) -> Result<Membership, EngineError> {
        self.review(id, MembershipStatus::Approved, reviewed_by, None)
    }

    pub fn reject(
        &self,
        id: &MembershipId,
        reviewed_by: &str,
        reason: Option<String>,
    ) -> Result<Membership, EngineError> {
        self.review(id, MembershipStatus::Rejected, reviewed_by, reason)
    }

    /// Resolve each KYC document reference to a retrievable URL, if storage still knows it.
    pub fn document_urls(
        &self,
        id: &MembershipId,
    ) -> Result<BTreeMap<&'static str, Option<String>>, EngineError> {
        let membership = self.get(id)?;
        membership
            .documents
            .iter()
            .map(|(field, reference)| {
                self.documents
                    .resolve(reference)
                    .map(|url| (field, url))
                    .map_err(|DocumentError::Unavailable(detail)| {
                        EngineError::StoreUnavailable(detail)
                    })
            })
            .collect()
    }

    fn review(
        &self,
        id: &MembershipId,
        target: MembershipStatus,
        reviewed_by: &str,
        reason: Option<String>,
    ) -> Result<Membership, EngineError> {
        let mut membership = self.get(id)?;
        let current = membership.status;
        membership.status = current.transition(target)?;
        membership.reviewed_by = Some(reviewed_by.to_string());
        membership.reviewed_at = Some(Utc::now());
        membership.rejection_reason = reason;

        self.commit(membership.clone(), current, target.label())?;
        tracing::info!(
            membership = %membership.display_id,
            status = target.label(),
            reviewed_by,
            "membership reviewed"
        );

        let event = match target {
            MembershipStatus::Approved => LifecycleEvent::MembershipApproved,
            _ => LifecycleEvent::MembershipRejected,
        };
        let mut notification = Notification::new(event, membership.display_id.clone());
        if let Some(reason) = membership.rejection_reason.as_deref() {
            notification = notification.with_detail("reason", reason);
        }
        dispatch(self.notifier.as_ref(), notification);

        Ok(membership)
    }

    fn commit(
        &self,
        membership: Membership,
        expected: MembershipStatus,
        attempted: &'static str,
    ) -> Result<(), EngineError> {
        let id = membership.id;
        match self.repository.update_if_status(membership, expected) {
            Ok(()) => Ok(()),
            Err(RepositoryError::StaleVersion) => {
                let latest = self.get(&id)?;
                Err(InvalidTransition {
                    entity: MembershipStatus::ENTITY,
                    from: latest.status.label(),
                    to: attempted,
                }
                .into())
            }
            Err(RepositoryError::NotFound) => {
                Err(EngineError::not_found("membership", id.0.to_string()))
            }
            Err(other) => Err(other.into()),
        }
    }
}
