use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lending::error::ValidationError;
use crate::lending::lifecycle::Lifecycle;
use crate::lending::loans::LoanId;
use crate::lending::membership::domain::{require_text, validate_phone};
use crate::lending::membership::MembershipId;
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanApplicationId(pub Uuid);

impl LoanApplicationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LoanApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nominee {
    pub name: String,
    pub relationship: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guarantor {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoApplicant {
    pub name: String,
    pub relationship: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Requested loan terms. The engine records them as given; it does not price interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub requested_amount: Money,
    pub tenure_days: u32,
    pub installment_amount: Money,
}

impl LoanTerms {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.requested_amount.is_positive() {
            return Err(ValidationError::new(
                "requested_amount",
                "must be greater than zero",
            ));
        }
        if self.tenure_days == 0 {
            return Err(ValidationError::new(
                "tenure_days",
                "must be at least one day",
            ));
        }
        if !self.installment_amount.is_positive() {
            return Err(ValidationError::new(
                "installment_amount",
                "must be greater than zero",
            ));
        }
        if self.installment_amount > self.requested_amount {
            return Err(ValidationError::new(
                "installment_amount",
                "must not exceed the requested amount",
            ));
        }
        Ok(())
    }
}

/// Inbound application form referencing a membership by its display id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanApplicationSubmission {
    pub membership: String,
    #[serde(flatten)]
    pub terms: LoanTerms,
    pub nominee: Nominee,
    pub guarantor: Guarantor,
    #[serde(default)]
    pub co_applicant: Option<CoApplicant>,
}

impl LoanApplicationSubmission {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("membership", &self.membership)?;
        self.terms.validate()?;
        require_text("nominee.name", &self.nominee.name)?;
        require_text("nominee.relationship", &self.nominee.relationship)?;
        if let Some(phone) = self.nominee.phone.as_deref() {
            validate_phone("nominee.phone", phone)?;
        }
        require_text("guarantor.name", &self.guarantor.name)?;
        validate_phone("guarantor.phone", &self.guarantor.phone)?;
        if let Some(co_applicant) = &self.co_applicant {
            require_text("co_applicant.name", &co_applicant.name)?;
            require_text("co_applicant.relationship", &co_applicant.relationship)?;
            if let Some(phone) = co_applicant.phone.as_deref() {
                validate_phone("co_applicant.phone", phone)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    UnderReview,
    Approved,
    Rejected,
}

impl Lifecycle for ApplicationStatus {
    const ENTITY: &'static str = "loan application";
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (ApplicationStatus::UnderReview, ApplicationStatus::Approved),
        (ApplicationStatus::UnderReview, ApplicationStatus::Rejected),
    ];

    fn label(self) -> &'static str {
        match self {
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

/// Stored loan application. `resulting_loan` is set exactly when the status is approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: LoanApplicationId,
    pub application_number: String,
    pub membership_id: MembershipId,
    pub membership_display_id: String,
    #[serde(flatten)]
    pub terms: LoanTerms,
    pub nominee: Nominee,
    pub guarantor: Guarantor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_applicant: Option<CoApplicant>,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_loan: Option<LoanId>,
    pub created_at: DateTime<Utc>,
}

/// Review decision recorded on an application in one conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub status: ApplicationStatus,
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
    pub rejection_reason: Option<String>,
    pub resulting_loan: Option<LoanId>,
}
