//! Process-local repositories for development, demos, and tests.
//!
//! Each repository guards its tables with one mutex, so every conditional write below is a
//! single indivisible operation, the same guarantee a durable backend provides with
//! conditional updates.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::applications::{
    ApplicationRepository, ApplicationStatus, LoanApplication, LoanApplicationId, LoanTerms,
    ReviewOutcome,
};
use super::error::RepositoryError;
use super::ledger::Repayment;
use super::loans::{Loan, LoanId, LoanRepository, LoanStatus, PostingCommit};
use super::membership::{Membership, MembershipId, MembershipRepository, MembershipStatus};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Debug)]
struct Table<K, V> {
    rows: HashMap<K, V>,
    order: Vec<K>,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<K: Copy + Eq + std::hash::Hash, V> Table<K, V> {
    fn insert_new(&mut self, key: K, value: V) -> Result<(), RepositoryError> {
        if self.rows.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }
        self.rows.insert(key, value);
        self.order.push(key);
        Ok(())
    }

    fn ordered(&self) -> impl Iterator<Item = &V> {
        self.order.iter().filter_map(|key| self.rows.get(key))
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.rows.remove(key)?;
        self.order.retain(|candidate| candidate != key);
        Some(removed)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMembershipRepository {
    table: Mutex<Table<MembershipId, Membership>>,
}

impl MembershipRepository for InMemoryMembershipRepository {
    fn insert(&self, membership: Membership) -> Result<Membership, RepositoryError> {
        let mut table = lock(&self.table)?;
        if table
            .rows
            .values()
            .any(|existing| existing.display_id == membership.display_id)
        {
            return Err(RepositoryError::Conflict);
        }
        table.insert_new(membership.id, membership.clone())?;
        Ok(membership)
    }

    fn update_if_status(
        &self,
        membership: Membership,
        expected: MembershipStatus,
    ) -> Result<(), RepositoryError> {
        let mut table = lock(&self.table)?;
        let stored = table
            .rows
            .get_mut(&membership.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.status != expected {
            return Err(RepositoryError::StaleVersion);
        }
        if stored.display_id != membership.display_id {
            return Err(RepositoryError::Conflict);
        }
        *stored = membership;
        Ok(())
    }

    fn fetch(&self, id: &MembershipId) -> Result<Option<Membership>, RepositoryError> {
        Ok(lock(&self.table)?.rows.get(id).cloned())
    }

    fn fetch_by_display_id(
        &self,
        display_id: &str,
    ) -> Result<Option<Membership>, RepositoryError> {
        Ok(lock(&self.table)?
            .rows
            .values()
            .find(|membership| membership.display_id == display_id)
            .cloned())
    }

    fn list(&self, status: Option<MembershipStatus>) -> Result<Vec<Membership>, RepositoryError> {
        Ok(lock(&self.table)?
            .ordered()
            .filter(|membership| status.map_or(true, |wanted| membership.status == wanted))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryApplicationRepository {
    table: Mutex<Table<LoanApplicationId, LoanApplication>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, application: LoanApplication) -> Result<LoanApplication, RepositoryError> {
        let mut table = lock(&self.table)?;
        if table
            .rows
            .values()
            .any(|existing| existing.application_number == application.application_number)
        {
            return Err(RepositoryError::Conflict);
        }
        table.insert_new(application.id, application.clone())?;
        Ok(application)
    }

    fn record_review(
        &self,
        id: &LoanApplicationId,
        outcome: ReviewOutcome,
    ) -> Result<LoanApplication, RepositoryError> {
        let mut table = lock(&self.table)?;
        let stored = table.rows.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if stored.status != ApplicationStatus::UnderReview {
            return Err(RepositoryError::StaleVersion);
        }
        stored.status = outcome.status;
        stored.reviewed_by = Some(outcome.reviewed_by);
        stored.reviewed_at = Some(outcome.reviewed_at);
        stored.rejection_reason = outcome.rejection_reason;
        stored.resulting_loan = outcome.resulting_loan;
        Ok(stored.clone())
    }

    fn update_terms(
        &self,
        id: &LoanApplicationId,
        terms: LoanTerms,
    ) -> Result<LoanApplication, RepositoryError> {
        let mut table = lock(&self.table)?;
        let stored = table.rows.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if stored.status != ApplicationStatus::UnderReview {
            return Err(RepositoryError::StaleVersion);
        }
        stored.terms = terms;
        Ok(stored.clone())
    }

    fn fetch(&self, id: &LoanApplicationId) -> Result<Option<LoanApplication>, RepositoryError> {
        Ok(lock(&self.table)?.rows.get(id).cloned())
    }

    fn fetch_by_number(&self, number: &str) -> Result<Option<LoanApplication>, RepositoryError> {
        Ok(lock(&self.table)?
            .rows
            .values()
            .find(|application| application.application_number == number)
            .cloned())
    }

    fn by_status(
        &self,
        status: ApplicationStatus,
        limit: usize,
    ) -> Result<Vec<LoanApplication>, RepositoryError> {
        Ok(lock(&self.table)?
            .ordered()
            .filter(|application| application.status == status)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct LoanTables {
    loans: Table<LoanId, Loan>,
    postings: HashMap<LoanId, Vec<Repayment>>,
}

#[derive(Debug, Default)]
pub struct InMemoryLoanRepository {
    tables: Mutex<LoanTables>,
}

impl InMemoryLoanRepository {
    fn checked_loan<'a>(
        tables: &'a mut LoanTables,
        id: &LoanId,
        expected_version: u64,
    ) -> Result<&'a mut Loan, RepositoryError> {
        let loan = tables.loans.rows.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if loan.version != expected_version {
            return Err(RepositoryError::StaleVersion);
        }
        Ok(loan)
    }
}

impl LoanRepository for InMemoryLoanRepository {
    fn insert(&self, loan: Loan) -> Result<Loan, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        if tables
            .loans
            .rows
            .values()
            .any(|existing| existing.loan_account_number == loan.loan_account_number)
        {
            return Err(RepositoryError::Conflict);
        }
        tables.loans.insert_new(loan.id, loan.clone())?;
        tables.postings.insert(loan.id, Vec::new());
        Ok(loan)
    }

    fn fetch(&self, id: &LoanId) -> Result<Option<Loan>, RepositoryError> {
        Ok(lock(&self.tables)?.loans.rows.get(id).cloned())
    }

    fn fetch_by_account_number(&self, number: &str) -> Result<Option<Loan>, RepositoryError> {
        Ok(lock(&self.tables)?
            .loans
            .rows
            .values()
            .find(|loan| loan.loan_account_number == number)
            .cloned())
    }

    fn for_membership(&self, membership: &MembershipId) -> Result<Vec<Loan>, RepositoryError> {
        Ok(lock(&self.tables)?
            .loans
            .ordered()
            .filter(|loan| loan.membership_id == *membership)
            .cloned()
            .collect())
    }

    fn for_application(
        &self,
        application: &LoanApplicationId,
    ) -> Result<Vec<Loan>, RepositoryError> {
        Ok(lock(&self.tables)?
            .loans
            .ordered()
            .filter(|loan| loan.originating_application == *application)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<Loan>, RepositoryError> {
        Ok(lock(&self.tables)?.loans.ordered().cloned().collect())
    }

    fn update_status(
        &self,
        id: &LoanId,
        expected_version: u64,
        status: LoanStatus,
    ) -> Result<Loan, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let loan = Self::checked_loan(&mut tables, id, expected_version)?;
        loan.status = status;
        loan.version += 1;
        Ok(loan.clone())
    }

    fn commit_posting(&self, commit: PostingCommit) -> Result<Loan, RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let loan = Self::checked_loan(&mut tables, &commit.loan_id, commit.expected_version)?;
        if commit.repayment.sequence != loan.posting_count + 1 {
            return Err(RepositoryError::StaleVersion);
        }
        loan.remaining_amount = commit.remaining_amount;
        loan.status = commit.status;
        loan.closed_at = commit.closed_at;
        loan.posting_count += 1;
        loan.version += 1;
        let updated = loan.clone();

        tables
            .postings
            .entry(commit.loan_id)
            .or_default()
            .push(commit.repayment);
        Ok(updated)
    }

    fn discard(&self, id: &LoanId) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables)?;
        let has_postings = tables
            .postings
            .get(id)
            .is_some_and(|postings| !postings.is_empty());
        if has_postings {
            return Err(RepositoryError::Conflict);
        }
        tables.loans.remove(id).ok_or(RepositoryError::NotFound)?;
        tables.postings.remove(id);
        Ok(())
    }

    fn postings(
        &self,
        id: &LoanId,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Repayment>, RepositoryError> {
        let tables = lock(&self.tables)?;
        let postings = tables.postings.get(id).ok_or(RepositoryError::NotFound)?;
        let after = after.unwrap_or(0);
        Ok(postings
            .iter()
            .filter(|posting| posting.sequence > after)
            .take(limit)
            .cloned()
            .collect())
    }

    fn postings_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Repayment>, RepositoryError> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .loans
            .order
            .iter()
            .filter_map(|id| tables.postings.get(id))
            .flatten()
            .filter(|posting| posting.payment_date >= from && posting.payment_date < to)
            .cloned()
            .collect())
    }
}
