use super::domain::{Membership, MembershipId, MembershipStatus};
use crate::lending::error::RepositoryError;

/// Storage abstraction for memberships.
pub trait MembershipRepository: Send + Sync {
    fn insert(&self, membership: Membership) -> Result<Membership, RepositoryError>;

    /// Replace the stored record only if its status still equals `expected`.
    ///
    /// Returns [`RepositoryError::StaleVersion`] when another writer changed the status first.
    fn update_if_status(
        &self,
        membership: Membership,
        expected: MembershipStatus,
    ) -> Result<(), RepositoryError>;

    fn fetch(&self, id: &MembershipId) -> Result<Option<Membership>, RepositoryError>;
    fn fetch_by_display_id(&self, display_id: &str)
        -> Result<Option<Membership>, RepositoryError>;

    /// Memberships ordered by creation, optionally filtered by status.
    fn list(&self, status: Option<MembershipStatus>) -> Result<Vec<Membership>, RepositoryError>;
}
