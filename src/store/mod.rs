//! Credential store abstraction
//!
//! The platform database holds one administrator credential record (used to
//! open the cloud provider session) and at most one deployer credential
//! record (consumed by deployments). The [`CredentialStore`] trait abstracts
//! the handful of queries the engine needs so the pipeline can be tested
//! with injected fakes.

mod mongo;

pub use mongo::MongoCredentialStore;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Administrator credential record (role `cup-admin`).
///
/// Read-only input: the engine only uses it to configure the provider
/// session and to carry the preferred region into the deployer record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdministratorProfile {
    /// Role tag, always `cup-admin`
    pub role: String,
    /// Administrator access key id
    pub access_key_id: String,
    /// Administrator secret access key
    pub secret_access_key: String,
    /// Region the platform operates in
    pub preferred_region: String,
}

/// Deployer credential record (username `clio-up`, role `cup-deployer`).
///
/// Ephemeral per reconciliation run: destroyed and recreated whenever the
/// cloud-side access key is rotated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeployerProfile {
    /// Deployer username, always `clio-up`
    pub username: String,
    /// Platform tag, always `aws`
    pub platform: String,
    /// Role tag, always `cup-deployer`
    pub role: String,
    /// Access key id currently live on the cloud identity
    pub access_key_id: String,
    /// Secret for the access key, captured at creation time
    pub secret_access_key: String,
    /// Region the deployer operates in
    pub preferred_region: String,
}

impl DeployerProfile {
    /// Build a fresh deployer record for a newly minted access key
    pub fn new(access_key_id: &str, secret_access_key: &str, preferred_region: &str) -> Self {
        Self {
            username: crate::DEPLOYER_USER_NAME.to_string(),
            platform: crate::DEPLOYER_PLATFORM.to_string(),
            role: crate::DEPLOYER_ROLE.to_string(),
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            preferred_region: preferred_region.to_string(),
        }
    }
}

/// Queries the reconciliation engine issues against the credential store.
///
/// Mutating operations (`delete_all_deployer_profiles`,
/// `insert_deployer_profile`) are only ever called in converge mode.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find the administrator credential record, if one exists
    async fn find_administrator(&self) -> Result<Option<AdministratorProfile>>;

    /// Count deployer credential records
    async fn count_deployer_profiles(&self) -> Result<u64>;

    /// Find the deployer credential record, if one exists
    async fn find_deployer_profile(&self) -> Result<Option<DeployerProfile>>;

    /// Delete every deployer credential record, returning the deleted count
    async fn delete_all_deployer_profiles(&self) -> Result<u64>;

    /// Insert a deployer credential record
    async fn insert_deployer_profile(&self, profile: &DeployerProfile) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_deployer_profile_carries_fixed_identity_fields() {
        let profile = DeployerProfile::new("AKIAEXAMPLE", "secret", "eu-west-1");
        assert_eq!(profile.username, "clio-up");
        assert_eq!(profile.platform, "aws");
        assert_eq!(profile.role, "cup-deployer");
        assert_eq!(profile.access_key_id, "AKIAEXAMPLE");
        assert_eq!(profile.preferred_region, "eu-west-1");
    }
}
