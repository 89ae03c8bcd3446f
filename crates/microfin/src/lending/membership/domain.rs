use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lending::collaborators::DocumentRef;
use crate::lending::error::ValidationError;
use crate::lending::lifecycle::Lifecycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipId(pub Uuid);

impl MembershipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MembershipId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub full_name: String,
    #[serde(default)]
    pub guardian_name: Option<String>,
    pub date_of_birth: NaiveDate,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

/// The four KYC uploads every membership carries, as opaque storage handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipDocuments {
    pub photo: DocumentRef,
    pub identity_proof: DocumentRef,
    pub address_proof: DocumentRef,
    pub signature: DocumentRef,
}

impl MembershipDocuments {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &DocumentRef)> {
        [
            ("photo", &self.photo),
            ("identity_proof", &self.identity_proof),
            ("address_proof", &self.address_proof),
            ("signature", &self.signature),
        ]
        .into_iter()
    }
}

/// Inbound membership form, validated before it reaches the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSubmission {
    pub personal_info: PersonalInfo,
    pub address: Address,
    pub documents: MembershipDocuments,
}

impl MembershipSubmission {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("personal_info.full_name", &self.personal_info.full_name)?;
        validate_phone("personal_info.phone", &self.personal_info.phone)?;
        if let Some(email) = self.personal_info.email.as_deref() {
            if !email.contains('@') || email.trim() != email {
                return Err(ValidationError::new(
                    "personal_info.email",
                    "must be a plain email address",
                ));
            }
        }
        require_text("address.line1", &self.address.line1)?;
        require_text("address.city", &self.address.city)?;
        require_text("address.state", &self.address.state)?;
        require_text("address.postal_code", &self.address.postal_code)?;
        for (field, reference) in self.documents.iter() {
            if reference.0.trim().is_empty() {
                return Err(ValidationError::new(field, "document reference is required"));
            }
        }
        Ok(())
    }
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new(field, "must not be blank"))
    } else {
        Ok(())
    }
}

pub(crate) fn validate_phone(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let digits = value.strip_prefix('+').unwrap_or(value);
    if (10..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new(field, "must be 10-15 digits"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Approved,
    Rejected,
}

impl Lifecycle for MembershipStatus {
    const ENTITY: &'static str = "membership";
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (MembershipStatus::Pending, MembershipStatus::Approved),
        (MembershipStatus::Pending, MembershipStatus::Rejected),
    ];

    fn label(self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Approved => "approved",
            MembershipStatus::Rejected => "rejected",
        }
    }
}

/// Stored membership. `display_id` is assigned once at creation and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub display_id: String,
    pub personal_info: PersonalInfo,
    pub address: Address,
    pub documents: MembershipDocuments,
    pub status: MembershipStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
