pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{Loan, LoanId, LoanStatus, LoanSummary};
pub use repository::{LoanRepository, PostingCommit};
pub use service::LoanService;
