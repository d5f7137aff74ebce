//! Cloud identity provider abstraction
//!
//! The engine talks to the cloud identity API through the
//! [`IdentityProvider`] trait: user lookup/creation, access key lifecycle,
//! and policy attachment. A [`SessionFactory`] opens a provider session from
//! resolved administrator credentials, so the pipeline never touches ambient
//! credential state and can be tested with injected fakes.

mod aws;

pub use aws::{AwsIdentityProvider, AwsSessionFactory};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::store::AdministratorProfile;
use crate::Result;

/// The cloud-side deployer principal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudIdentity {
    /// Principal name
    pub name: String,
    /// Provider resource identifier
    pub arn: String,
}

/// Metadata for an access key as returned by listings.
///
/// Listings never expose the secret - it is observable only at creation
/// time, which is why converge mode rotates keys instead of reusing them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessKeyMetadata {
    /// Access key id
    pub id: String,
}

/// A freshly created access key, including its one-time-visible secret
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessKey {
    /// Access key id
    pub id: String,
    /// Secret access key, retrievable only now
    pub secret: String,
}

/// Operations the reconciliation engine issues against the identity API.
///
/// Mutating operations (`create_user`, `delete_access_key`,
/// `create_access_key`, `attach_policy`) are only ever called in converge
/// mode.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up the named principal, returning `None` when it does not exist
    async fn get_user(&self, name: &str) -> Result<Option<CloudIdentity>>;

    /// Create the named principal
    async fn create_user(&self, name: &str) -> Result<CloudIdentity>;

    /// List access key metadata for the named principal
    async fn list_access_keys(&self, name: &str) -> Result<Vec<AccessKeyMetadata>>;

    /// Delete one access key from the named principal
    async fn delete_access_key(&self, name: &str, key_id: &str) -> Result<()>;

    /// Mint a new access key for the named principal
    async fn create_access_key(&self, name: &str) -> Result<AccessKey>;

    /// List policy ARNs currently attached to the named principal
    async fn list_attached_policies(&self, name: &str) -> Result<Vec<String>>;

    /// Attach a policy to the named principal
    async fn attach_policy(&self, name: &str, policy_arn: &str) -> Result<()>;
}

/// Opens an [`IdentityProvider`] session from administrator credentials.
///
/// Factory indirection keeps session configuration out of the engine: stage
/// one resolves the administrator record and hands it here, and everything
/// downstream sees only the trait object.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Configure a provider session with the administrator's keys and region
    async fn configure(&self, admin: &AdministratorProfile) -> Result<Box<dyn IdentityProvider>>;
}
