use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::applications::{
    ApprovedApplication, LoanApplication, LoanApplicationSubmission, OrphanReport,
};
use super::collaborators::{DocumentError, DocumentRef};
use super::desk::LendingDesk;
use super::error::{EngineError, ValidationError};
use super::ledger::{Repayment, RepaymentPage, RepaymentRequest};
use super::loans::{Loan, LoanSummary};
use super::membership::{Membership, MembershipSubmission};
use super::report::views::DailyCollectionSummary;

type Desk = State<Arc<LendingDesk>>;
type Reply<T> = Result<Json<T>, EngineError>;
type Created<T> = Result<(StatusCode, Json<T>), EngineError>;

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub reviewed_by: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ReviewRequest {
    fn reviewer(&self) -> Result<String, EngineError> {
        let reviewer = self.reviewed_by.trim();
        if reviewer.is_empty() {
            return Err(ValidationError::new("reviewed_by", "must not be blank").into());
        }
        Ok(reviewer.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    pub reference: DocumentRef,
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub after: Option<u64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub date: Option<String>,
}

/// HTTP endpoints over the lending desk. Handlers only translate; every rule lives in the
/// services.
pub fn lending_router(desk: Arc<LendingDesk>) -> Router {
    Router::new()
        .route("/api/v1/memberships", post(submit_membership))
        .route("/api/v1/memberships/:display_id", get(membership))
        .route(
            "/api/v1/memberships/:display_id/documents",
            get(membership_documents),
        )
        .route(
            "/api/v1/memberships/:display_id/approve",
            post(approve_membership),
        )
        .route(
            "/api/v1/memberships/:display_id/reject",
            post(reject_membership),
        )
        .route("/api/v1/loan-applications", post(submit_application))
        .route("/api/v1/loan-applications/:number", get(application))
        .route(
            "/api/v1/loan-applications/:number/approve",
            post(approve_application),
        )
        .route(
            "/api/v1/loan-applications/:number/reject",
            post(reject_application),
        )
        .route("/api/v1/loans/:account_number", get(loan))
        .route("/api/v1/loans/:account_number/activate", post(activate_loan))
        .route("/api/v1/loans/:account_number/summary", get(loan_summary))
        .route(
            "/api/v1/loans/:account_number/repayments",
            post(post_repayment).get(list_repayments),
        )
        .route("/api/v1/reports/daily-collections", get(daily_collections))
        .route("/api/v1/documents/:name", post(upload_document))
        .route(
            "/api/v1/maintenance/reconcile-orphans",
            post(reconcile_orphans),
        )
        .with_state(desk)
}

/// Services block on store I/O and read backoff, so they run on the blocking pool rather than
/// on an async worker.
async fn on_desk<T, F>(desk: Arc<LendingDesk>, work: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce(&LendingDesk) -> Result<T, EngineError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&desk))
        .await
        .map_err(|err| EngineError::StoreUnavailable(format!("desk worker failed: {err}")))?
}

pub(crate) async fn submit_membership(
    State(desk): Desk,
    Json(submission): Json<MembershipSubmission>,
) -> Created<Membership> {
    let membership = on_desk(desk, move |desk| desk.memberships().submit(submission)).await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

async fn membership(State(desk): Desk, Path(display_id): Path<String>) -> Reply<Membership> {
    let membership = on_desk(desk, move |desk| {
        desk.memberships().find_by_display_id(&display_id)
    })
    .await?;
    Ok(Json(membership))
}

async fn membership_documents(
    State(desk): Desk,
    Path(display_id): Path<String>,
) -> Reply<BTreeMap<&'static str, Option<String>>> {
    let urls = on_desk(desk, move |desk| {
        let membership = desk.memberships().find_by_display_id(&display_id)?;
        desk.memberships().document_urls(&membership.id)
    })
    .await?;
    Ok(Json(urls))
}

async fn approve_membership(
    State(desk): Desk,
    Path(display_id): Path<String>,
    Json(review): Json<ReviewRequest>,
) -> Reply<Membership> {
    let reviewer = review.reviewer()?;
    let membership = on_desk(desk, move |desk| {
        let membership = desk.memberships().find_by_display_id(&display_id)?;
        desk.memberships().approve(&membership.id, &reviewer)
    })
    .await?;
    Ok(Json(membership))
}

async fn reject_membership(
    State(desk): Desk,
    Path(display_id): Path<String>,
    Json(review): Json<ReviewRequest>,
) -> Reply<Membership> {
    let reviewer = review.reviewer()?;
    let membership = on_desk(desk, move |desk| {
        let membership = desk.memberships().find_by_display_id(&display_id)?;
        desk.memberships()
            .reject(&membership.id, &reviewer, review.reason)
    })
    .await?;
    Ok(Json(membership))
}

pub(crate) async fn submit_application(
    State(desk): Desk,
    Json(submission): Json<LoanApplicationSubmission>,
) -> Created<LoanApplication> {
    let application = on_desk(desk, move |desk| desk.applications().submit(submission)).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn application(State(desk): Desk, Path(number): Path<String>) -> Reply<LoanApplication> {
    let application =
        on_desk(desk, move |desk| desk.applications().find_by_number(&number)).await?;
    Ok(Json(application))
}

async fn approve_application(
    State(desk): Desk,
    Path(number): Path<String>,
    Json(review): Json<ReviewRequest>,
) -> Reply<ApprovedApplication> {
    let reviewer = review.reviewer()?;
    let approved = on_desk(desk, move |desk| {
        let application = desk.applications().find_by_number(&number)?;
        desk.applications().approve(&application.id, &reviewer)
    })
    .await?;
    Ok(Json(approved))
}

async fn reject_application(
    State(desk): Desk,
    Path(number): Path<String>,
    Json(review): Json<ReviewRequest>,
) -> Reply<LoanApplication> {
    let reviewer = review.reviewer()?;
    let rejected = on_desk(desk, move |desk| {
        let application = desk.applications().find_by_number(&number)?;
        desk.applications()
            .reject(&application.id, &reviewer, review.reason)
    })
    .await?;
    Ok(Json(rejected))
}

async fn loan(State(desk): Desk, Path(account_number): Path<String>) -> Reply<Loan> {
    let loan = on_desk(desk, move |desk| {
        desk.loans().find_by_account_number(&account_number)
    })
    .await?;
    Ok(Json(loan))
}

async fn activate_loan(State(desk): Desk, Path(account_number): Path<String>) -> Reply<Loan> {
    let loan = on_desk(desk, move |desk| {
        let loan = desk.loans().find_by_account_number(&account_number)?;
        desk.loans().activate(&loan.id)
    })
    .await?;
    Ok(Json(loan))
}

async fn loan_summary(
    State(desk): Desk,
    Path(account_number): Path<String>,
) -> Reply<LoanSummary> {
    let summary = on_desk(desk, move |desk| {
        let loan = desk.loans().find_by_account_number(&account_number)?;
        desk.loans().summary(&loan.id)
    })
    .await?;
    Ok(Json(summary))
}

pub(crate) async fn post_repayment(
    State(desk): Desk,
    Path(account_number): Path<String>,
    Json(request): Json<RepaymentRequest>,
) -> Created<Repayment> {
    let repayment = on_desk(desk, move |desk| {
        let loan = desk.loans().find_by_account_number(&account_number)?;
        desk.ledger().post_repayment(&loan.id, request)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(repayment)))
}

async fn list_repayments(
    State(desk): Desk,
    Path(account_number): Path<String>,
    Query(page): Query<PageQuery>,
) -> Reply<RepaymentPage> {
    let page = on_desk(desk, move |desk| {
        let loan = desk.loans().find_by_account_number(&account_number)?;
        desk.ledger()
            .list_repayments(&loan.id, page.after, page.limit)
    })
    .await?;
    Ok(Json(page))
}

async fn daily_collections(
    State(desk): Desk,
    Query(query): Query<ReportQuery>,
) -> Reply<DailyCollectionSummary> {
    let raw = query
        .date
        .ok_or_else(|| ValidationError::new("date", "required, formatted YYYY-MM-DD"))?;
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::new("date", format!("'{raw}' is not YYYY-MM-DD")))?;
    let collections = on_desk(desk, move |desk| desk.reports().daily_collections(date)).await?;
    Ok(Json(collections.summary()))
}

async fn upload_document(
    State(desk): Desk,
    Path(name): Path<String>,
    body: Bytes,
) -> Created<StoredDocument> {
    if body.is_empty() {
        return Err(ValidationError::new("document", "must not be empty").into());
    }
    let stored = on_desk(desk, move |desk| {
        let unavailable =
            |DocumentError::Unavailable(detail)| EngineError::StoreUnavailable(detail);
        let documents = desk.documents();
        let reference = documents.store(&name, &body).map_err(unavailable)?;
        let url = documents.resolve(&reference).map_err(unavailable)?;
        Ok(StoredDocument { reference, url })
    })
    .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn reconcile_orphans(State(desk): Desk) -> Reply<OrphanReport> {
    let report = on_desk(desk, |desk| desk.reconcile_orphans()).await?;
    Ok(Json(report))
}
