pub mod domain;
pub mod service;

pub use domain::{PaymentMethod, Repayment, RepaymentId, RepaymentPage, RepaymentRequest};
pub use service::RepaymentLedger;
