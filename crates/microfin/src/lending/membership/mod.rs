pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{
    Address, Membership, MembershipDocuments, MembershipId, MembershipStatus,
    MembershipSubmission, PersonalInfo,
};
pub use repository::MembershipRepository;
pub use service::{MembershipService, MembershipUpdate};
