//! Role checks for the admin surface.

use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;
use crate::domain::aggregates::Profile;
use crate::storage::{ProfileRepository, StorageError};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Admin access required")]
    Forbidden,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Clone)]
pub struct AccessControl { profiles: Arc<dyn ProfileRepository> }

impl AccessControl {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self { Self { profiles } }

    /// Being signed in is not enough: the profile must carry the admin role.
    pub async fn require_admin(&self, user_id: Uuid) -> Result<Profile, AccessError> {
        match self.profiles.find(user_id).await? {
            Some(profile) if profile.is_admin() => Ok(profile),
            _ => {
                warn!(%user_id, "admin access denied");
                Err(AccessError::Forbidden)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Role;
    use crate::storage::memory::MemoryProfiles;

    #[tokio::test]
    async fn test_only_admin_role_passes() {
        let admin = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let access = AccessControl::new(Arc::new(MemoryProfiles::new([
            Profile::customer(admin, "admin@example.com").with_role(Role::Admin),
            Profile::customer(customer, "c@example.com"),
        ])));
        assert!(access.require_admin(admin).await.is_ok());
        assert!(matches!(access.require_admin(customer).await, Err(AccessError::Forbidden)));
        assert!(matches!(access.require_admin(Uuid::new_v4()).await, Err(AccessError::Forbidden)));
    }
}
