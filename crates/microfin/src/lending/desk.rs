use std::sync::Arc;

use super::applications::{ApplicationRepository, LoanApplicationService, OrphanReport};
use super::collaborators::{DocumentStore, InMemoryDocumentStore, LogNotifier, Notifier};
use super::error::EngineError;
use super::ledger::RepaymentLedger;
use super::loans::{LoanRepository, LoanService};
use super::membership::{MembershipRepository, MembershipService};
use super::memory::{
    InMemoryApplicationRepository, InMemoryLoanRepository, InMemoryMembershipRepository,
};
use super::report::ReportAggregator;
use super::retry::ReadRetryPolicy;
use crate::config::EngineConfig;
use crate::sequence::{FileSequenceStore, InMemorySequenceStore, SequenceError, SequenceStore};

/// Backends the engine runs against.
#[derive(Clone)]
pub struct DeskStores {
    pub sequences: Arc<dyn SequenceStore>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub applications: Arc<dyn ApplicationRepository>,
    pub loans: Arc<dyn LoanRepository>,
    pub documents: Arc<dyn DocumentStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl DeskStores {
    /// Process-local repositories. Counters go to `sequence_file` when configured so that they
    /// survive restarts and the maintenance CLI can inspect them.
    pub fn in_memory(config: &EngineConfig) -> Result<Self, SequenceError> {
        let sequences: Arc<dyn SequenceStore> = match &config.sequence_file {
            Some(path) => Arc::new(FileSequenceStore::open(path)?),
            None => Arc::new(InMemorySequenceStore::new()),
        };

        Ok(Self {
            sequences,
            memberships: Arc::new(InMemoryMembershipRepository::default()),
            applications: Arc::new(InMemoryApplicationRepository::default()),
            loans: Arc::new(InMemoryLoanRepository::default()),
            documents: Arc::new(InMemoryDocumentStore::new(
                config.document_base_url.clone(),
            )),
            notifier: Arc::new(LogNotifier),
        })
    }
}

/// Every lending service wired over one set of stores.
pub struct LendingDesk {
    memberships: MembershipService,
    applications: LoanApplicationService,
    loans: Arc<LoanService>,
    ledger: RepaymentLedger,
    reports: ReportAggregator,
    documents: Arc<dyn DocumentStore>,
    orphan_grace: chrono::Duration,
}

impl LendingDesk {
    pub fn new(config: &EngineConfig, stores: DeskStores) -> Self {
        let reads = ReadRetryPolicy {
            attempts: config.read_retry_attempts,
            backoff: config.read_retry_backoff,
        };

        let loans = Arc::new(LoanService::new(
            stores.sequences.clone(),
            stores.loans.clone(),
            stores.notifier.clone(),
            reads,
            config.loan_auto_approve,
            config.ledger_max_retries,
        ));

        Self {
            memberships: MembershipService::new(
                stores.sequences.clone(),
                stores.memberships.clone(),
                stores.documents.clone(),
                stores.notifier.clone(),
                reads,
            ),
            applications: LoanApplicationService::new(
                stores.sequences,
                stores.applications,
                stores.memberships,
                loans.clone(),
                stores.notifier.clone(),
                reads,
            ),
            ledger: RepaymentLedger::new(
                stores.loans.clone(),
                stores.notifier,
                reads,
                config.ledger_max_retries,
            ),
            reports: ReportAggregator::new(stores.loans, config.reporting_offset, reads),
            documents: stores.documents,
            orphan_grace: chrono::Duration::from_std(config.orphan_grace)
                .unwrap_or_else(|_| chrono::Duration::weeks(5200)),
            loans,
        }
    }

    pub fn in_memory(config: &EngineConfig) -> Result<Self, SequenceError> {
        Ok(Self::new(config, DeskStores::in_memory(config)?))
    }

    pub fn memberships(&self) -> &MembershipService {
        &self.memberships
    }

    pub fn applications(&self) -> &LoanApplicationService {
        &self.applications
    }

    pub fn loans(&self) -> &LoanService {
        &self.loans
    }

    pub fn ledger(&self) -> &RepaymentLedger {
        &self.ledger
    }

    pub fn reports(&self) -> &ReportAggregator {
        &self.reports
    }

    pub fn documents(&self) -> &dyn DocumentStore {
        self.documents.as_ref()
    }

    /// Run the orphan sweep with the configured grace period.
    pub fn reconcile_orphans(&self) -> Result<OrphanReport, EngineError> {
        self.applications.reconcile_orphans(self.orphan_grace)
    }
}
