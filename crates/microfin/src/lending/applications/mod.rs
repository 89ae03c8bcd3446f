pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{
    ApplicationStatus, CoApplicant, Guarantor, LoanApplication, LoanApplicationId,
    LoanApplicationSubmission, LoanTerms, Nominee, ReviewOutcome,
};
pub use repository::ApplicationRepository;
pub use service::{ApprovedApplication, LoanApplicationService, OrphanReport};
