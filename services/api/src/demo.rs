use chrono::{NaiveDate, Utc};
use clap::Args;
use microfin::config::EngineConfig;
use microfin::error::AppError;
use microfin::lending::applications::{Guarantor, LoanApplicationSubmission, LoanTerms, Nominee};
use microfin::lending::membership::{Address, MembershipDocuments, PersonalInfo};
use microfin::lending::{
    DocumentRef, EngineError, LendingDesk, Lifecycle, MembershipSubmission, PaymentMethod,
    RepaymentRequest,
};
use microfin::money::Money;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Principal of the demo loan, in whole currency units
    #[arg(long, default_value_t = 10_000)]
    pub(crate) principal: i64,
    /// Installment collected on each visit
    #[arg(long, default_value_t = 500)]
    pub(crate) installment: i64,
    /// Loan tenure in days
    #[arg(long, default_value_t = 30)]
    pub(crate) tenure_days: u32,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            principal: 10_000,
            installment: 500,
            tenure_days: 30,
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    if args.principal <= 0 || args.installment <= 0 {
        return Err(AppError::Refused(
            "principal and installment must be positive".to_string(),
        ));
    }

    let desk = LendingDesk::in_memory(&EngineConfig::default())?;
    println!("Microfinance lending demo");

    let member = desk.memberships().submit(demo_member())?;
    println!(
        "- Membership {} submitted for {} ({})",
        member.display_id,
        member.personal_info.full_name,
        member.status.label()
    );
    let member = desk.memberships().approve(&member.id, "branch-manager")?;
    println!("  Reviewed by branch-manager -> {}", member.status.label());

    let application = desk.applications().submit(LoanApplicationSubmission {
        membership: member.display_id.clone(),
        terms: LoanTerms {
            requested_amount: Money::from_major(args.principal),
            tenure_days: args.tenure_days,
            installment_amount: Money::from_major(args.installment),
        },
        nominee: Nominee {
            name: "Selvi Raman".to_string(),
            relationship: "Spouse".to_string(),
            phone: None,
        },
        guarantor: Guarantor {
            name: "Murugan K".to_string(),
            phone: "9000067890".to_string(),
            address: Some("5 Bazaar Road, Salem".to_string()),
        },
        co_applicant: None,
    })?;
    println!(
        "- Application {} for {} over {} days ({} per installment)",
        application.application_number,
        application.terms.requested_amount,
        application.terms.tenure_days,
        application.terms.installment_amount
    );

    let approved = desk
        .applications()
        .approve(&application.id, "credit-officer")?;
    let loan = approved.loan;
    println!(
        "  Approved -> loan {} opened with {} outstanding ({})",
        loan.loan_account_number,
        loan.remaining_amount,
        loan.status.label()
    );

    println!("\nCollections");
    let mut visits = 0u32;
    loop {
        let current = desk.loans().get(&loan.id)?;
        if current.remaining_amount.is_zero() {
            break;
        }
        let amount = current
            .remaining_amount
            .min(Money::from_major(args.installment));
        let posting = desk.ledger().post_repayment(
            &loan.id,
            RepaymentRequest {
                amount,
                payment_method: PaymentMethod::Cash,
                is_late_fee: false,
                recorded_by: "field-agent".to_string(),
                remarks: None,
                payment_date: None,
            },
        )?;
        visits += 1;
        if visits <= 2 || amount < Money::from_major(args.installment) {
            let after = desk.loans().get(&loan.id)?;
            println!(
                "  #{} {} collected -> {} remaining ({})",
                posting.sequence,
                posting.amount,
                after.remaining_amount,
                after.status.label()
            );
        }
    }

    let summary = desk.loans().summary(&loan.id)?;
    println!(
        "- {} postings, {} repaid, loan {} is {}",
        summary.postings,
        summary.total_repaid,
        summary.loan_account_number,
        summary.status.label()
    );

    match desk.ledger().post_repayment(
        &loan.id,
        RepaymentRequest {
            amount: Money::from_major(1),
            payment_method: PaymentMethod::Upi,
            is_late_fee: false,
            recorded_by: "field-agent".to_string(),
            remarks: None,
            payment_date: None,
        },
    ) {
        Err(err @ EngineError::InvalidLoanState { .. }) => {
            println!("  Further posting refused: {}", err);
        }
        Err(err) => return Err(err.into()),
        Ok(posting) => println!("  Unexpected posting #{} accepted", posting.sequence),
    }

    let today = Utc::now().date_naive();
    let report = desk.reports().daily_collections(today)?.summary();
    println!(
        "\nDaily collections {} (UTC{}): {} collected, {} late fees, {} total",
        report.date,
        report.utc_offset,
        report.total_collection,
        report.total_late_fee,
        report.grand_total
    );
    for method in &report.by_method {
        println!(
            "  - {}: {} postings, {}",
            method.method_label, method.postings, method.total
        );
    }

    Ok(())
}

fn demo_member() -> MembershipSubmission {
    MembershipSubmission {
        personal_info: PersonalInfo {
            full_name: "Kavitha Raman".to_string(),
            guardian_name: None,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 15).unwrap_or(NaiveDate::MIN),
            phone: "9000012345".to_string(),
            email: None,
            occupation: Some("Flower vendor".to_string()),
        },
        address: Address {
            line1: "3 Temple Street".to_string(),
            line2: None,
            city: "Salem".to_string(),
            state: "Tamil Nadu".to_string(),
            postal_code: "636001".to_string(),
        },
        documents: MembershipDocuments {
            photo: DocumentRef("demo-photo".to_string()),
            identity_proof: DocumentRef("demo-identity".to_string()),
            address_proof: DocumentRef("demo-address".to_string()),
            signature: DocumentRef("demo-signature".to_string()),
        },
    }
}
