use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::lending::applications::{
    ApplicationRepository, ApplicationStatus, Guarantor, LoanApplication, LoanApplicationId,
    LoanApplicationSubmission, LoanTerms, Nominee, ReviewOutcome,
};
use crate::lending::collaborators::{DocumentRef, InMemoryDocumentStore, InMemoryNotifier};
use crate::lending::error::RepositoryError;
use crate::lending::ledger::{PaymentMethod, Repayment, RepaymentRequest};
use crate::lending::loans::{Loan, LoanId, LoanRepository, LoanStatus, PostingCommit};
use crate::lending::membership::{
    Address, Membership, MembershipDocuments, MembershipId, MembershipSubmission, PersonalInfo,
};
use crate::lending::memory::{
    InMemoryApplicationRepository, InMemoryLoanRepository, InMemoryMembershipRepository,
};
use crate::lending::{DeskStores, LendingDesk};
use crate::money::Money;
use crate::sequence::{InMemorySequenceStore, SequenceError, SequenceStore};

pub(super) fn engine_config() -> EngineConfig {
    EngineConfig {
        read_retry_backoff: Duration::ZERO,
        document_base_url: "https://docs.microfin.test".to_string(),
        ..EngineConfig::default()
    }
}

pub(super) fn money(value: Decimal) -> Money {
    Money::from_decimal(value)
}

pub(super) struct Harness {
    pub(super) desk: Arc<LendingDesk>,
    pub(super) sequences: Arc<InMemorySequenceStore>,
    pub(super) loans: Arc<dyn LoanRepository>,
    pub(super) applications: Arc<dyn ApplicationRepository>,
    pub(super) documents: InMemoryDocumentStore,
    pub(super) notifier: InMemoryNotifier,
}

pub(super) fn harness() -> Harness {
    harness_with(engine_config(), |_| {})
}

/// Build a desk over in-memory stores; `customize` may swap in failure-injecting wrappers.
pub(super) fn harness_with(
    config: EngineConfig,
    customize: impl FnOnce(&mut DeskStores),
) -> Harness {
    let sequences = Arc::new(InMemorySequenceStore::new());
    let documents = InMemoryDocumentStore::new(config.document_base_url.clone());
    let notifier = InMemoryNotifier::default();

    let mut stores = DeskStores {
        sequences: sequences.clone(),
        memberships: Arc::new(InMemoryMembershipRepository::default()),
        applications: Arc::new(InMemoryApplicationRepository::default()),
        loans: Arc::new(InMemoryLoanRepository::default()),
        documents: Arc::new(documents.clone()),
        notifier: Arc::new(notifier.clone()),
    };
    customize(&mut stores);

    Harness {
        loans: stores.loans.clone(),
        applications: stores.applications.clone(),
        desk: Arc::new(LendingDesk::new(&config, stores)),
        sequences,
        documents,
        notifier,
    }
}

pub(super) fn membership_submission(full_name: &str) -> MembershipSubmission {
    MembershipSubmission {
        personal_info: PersonalInfo {
            full_name: full_name.to_string(),
            guardian_name: Some("R. Devi".to_string()),
            date_of_birth: NaiveDate::from_ymd_opt(1988, 4, 12).expect("valid date"),
            phone: "+919812345678".to_string(),
            email: None,
            occupation: Some("Tailor".to_string()),
        },
        address: Address {
            line1: "14 Market Road".to_string(),
            line2: None,
            city: "Madurai".to_string(),
            state: "Tamil Nadu".to_string(),
            postal_code: "625001".to_string(),
        },
        documents: MembershipDocuments {
            photo: DocumentRef("photo-ref".to_string()),
            identity_proof: DocumentRef("identity-ref".to_string()),
            address_proof: DocumentRef("address-ref".to_string()),
            signature: DocumentRef("signature-ref".to_string()),
        },
    }
}

pub(super) fn approved_member(harness: &Harness) -> Membership {
    let memberships = harness.desk.memberships();
    let member = memberships
        .submit(membership_submission("Lakshmi Narayanan"))
        .expect("membership submitted");
    memberships
        .approve(&member.id, "branch-manager")
        .expect("membership approved")
}

pub(super) fn application_submission(member: &str, amount: Decimal) -> LoanApplicationSubmission {
    LoanApplicationSubmission {
        membership: member.to_string(),
        terms: LoanTerms {
            requested_amount: money(amount),
            tenure_days: 100,
            installment_amount: money(amount / Decimal::from(20)),
        },
        nominee: Nominee {
            name: "Meena".to_string(),
            relationship: "Daughter".to_string(),
            phone: None,
        },
        guarantor: Guarantor {
            name: "Kumar".to_string(),
            phone: "9876543210".to_string(),
            address: None,
        },
        co_applicant: None,
    }
}

pub(super) fn submitted_application(harness: &Harness, amount: Decimal) -> LoanApplication {
    let member = approved_member(harness);
    harness
        .desk
        .applications()
        .submit(application_submission(&member.display_id, amount))
        .expect("application submitted")
}

pub(super) fn approved_loan(harness: &Harness, amount: Decimal) -> Loan {
    let application = submitted_application(harness, amount);
    harness
        .desk
        .applications()
        .approve(&application.id, "credit-officer")
        .expect("application approved")
        .loan
}

pub(super) fn repayment(amount: Decimal) -> RepaymentRequest {
    RepaymentRequest {
        amount: money(amount),
        payment_method: PaymentMethod::Cash,
        is_late_fee: false,
        recorded_by: "field-agent".to_string(),
        remarks: None,
        payment_date: None,
    }
}

pub(super) fn late_fee(amount: Decimal) -> RepaymentRequest {
    RepaymentRequest {
        is_late_fee: true,
        ..repayment(amount)
    }
}

pub(super) fn dated(
    mut request: RepaymentRequest,
    method: PaymentMethod,
    at: DateTime<Utc>,
) -> RepaymentRequest {
    request.payment_method = method;
    request.payment_date = Some(at);
    request
}

pub(super) fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serializable body")))
        .expect("valid request")
}

pub(super) fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

pub(super) async fn read_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Sequence backend that is always down.
pub(super) struct UnavailableSequences;

impl SequenceStore for UnavailableSequences {
    fn next(&self, _name: &str) -> Result<u64, SequenceError> {
        Err(SequenceError::Unavailable(
            "counter host 10.0.0.7 refused connection".to_string(),
        ))
    }

    fn current(&self, _name: &str) -> Result<u64, SequenceError> {
        self.next("")
    }

    fn reset_to(&self, _name: &str, _value: u64) -> Result<(), SequenceError> {
        self.next("").map(|_| ())
    }
}

/// How a wrapped `record_review` misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReviewFault {
    /// The write never reaches the store.
    Dropped,
    /// The write commits but its acknowledgement is lost.
    LostAcknowledgement,
    /// The write never lands and the store stays unreadable until [`FaultyReviews::restore`].
    Outage,
}

pub(super) struct FaultyReviews {
    pub(super) inner: InMemoryApplicationRepository,
    pub(super) fault: ReviewFault,
    down: AtomicBool,
}

impl FaultyReviews {
    pub(super) fn new(fault: ReviewFault) -> Self {
        Self {
            inner: InMemoryApplicationRepository::default(),
            fault,
            down: AtomicBool::new(false),
        }
    }

    pub(super) fn restore(&self) {
        self.down.store(false, Ordering::SeqCst);
    }

    fn readable(&self) -> Result<(), RepositoryError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("primary unreachable".to_string()));
        }
        Ok(())
    }
}

impl ApplicationRepository for FaultyReviews {
    fn insert(&self, application: LoanApplication) -> Result<LoanApplication, RepositoryError> {
        self.inner.insert(application)
    }

    fn record_review(
        &self,
        id: &LoanApplicationId,
        outcome: ReviewOutcome,
    ) -> Result<LoanApplication, RepositoryError> {
        match self.fault {
            ReviewFault::Dropped => {}
            ReviewFault::LostAcknowledgement => {
                self.inner.record_review(id, outcome)?;
            }
            ReviewFault::Outage => self.down.store(true, Ordering::SeqCst),
        }
        Err(RepositoryError::Unavailable("write timed out".to_string()))
    }

    fn update_terms(
        &self,
        id: &LoanApplicationId,
        terms: LoanTerms,
    ) -> Result<LoanApplication, RepositoryError> {
        self.inner.update_terms(id, terms)
    }

    fn fetch(&self, id: &LoanApplicationId) -> Result<Option<LoanApplication>, RepositoryError> {
        self.readable()?;
        self.inner.fetch(id)
    }

    fn fetch_by_number(&self, number: &str) -> Result<Option<LoanApplication>, RepositoryError> {
        self.readable()?;
        self.inner.fetch_by_number(number)
    }

    fn by_status(
        &self,
        status: ApplicationStatus,
        limit: usize,
    ) -> Result<Vec<LoanApplication>, RepositoryError> {
        self.readable()?;
        self.inner.by_status(status, limit)
    }
}

/// Loan repository wrapper injecting read outages and write conflicts.
#[derive(Default)]
pub(super) struct TroubledLoans {
    pub(super) inner: InMemoryLoanRepository,
    /// Number of upcoming `fetch` calls that report the store unavailable.
    pub(super) failing_fetches: AtomicU32,
    /// Number of upcoming `commit_posting` calls that report a stale version.
    pub(super) stale_commits: AtomicU32,
    pub(super) commit_attempts: AtomicU32,
}

impl TroubledLoans {
    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl LoanRepository for TroubledLoans {
    fn insert(&self, loan: Loan) -> Result<Loan, RepositoryError> {
        self.inner.insert(loan)
    }

    fn fetch(&self, id: &LoanId) -> Result<Option<Loan>, RepositoryError> {
        if Self::take(&self.failing_fetches) {
            return Err(RepositoryError::Unavailable("replica lagging".to_string()));
        }
        self.inner.fetch(id)
    }

    fn fetch_by_account_number(&self, number: &str) -> Result<Option<Loan>, RepositoryError> {
        self.inner.fetch_by_account_number(number)
    }

    fn for_membership(&self, membership: &MembershipId) -> Result<Vec<Loan>, RepositoryError> {
        self.inner.for_membership(membership)
    }

    fn for_application(
        &self,
        application: &LoanApplicationId,
    ) -> Result<Vec<Loan>, RepositoryError> {
        self.inner.for_application(application)
    }

    fn all(&self) -> Result<Vec<Loan>, RepositoryError> {
        self.inner.all()
    }

    fn update_status(
        &self,
        id: &LoanId,
        expected_version: u64,
        status: LoanStatus,
    ) -> Result<Loan, RepositoryError> {
        self.inner.update_status(id, expected_version, status)
    }

    fn commit_posting(&self, commit: PostingCommit) -> Result<Loan, RepositoryError> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.stale_commits) {
            return Err(RepositoryError::StaleVersion);
        }
        self.inner.commit_posting(commit)
    }

    fn discard(&self, id: &LoanId) -> Result<(), RepositoryError> {
        self.inner.discard(id)
    }

    fn postings(
        &self,
        id: &LoanId,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Repayment>, RepositoryError> {
        self.inner.postings(id, after, limit)
    }

    fn postings_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Repayment>, RepositoryError> {
        self.inner.postings_between(from, to)
    }
}
