//! AWS IAM identity provider
//!
//! Uses the official aws-sdk-iam crate with the administrator's explicit
//! credentials. Only the calls the reconciliation engine needs are wrapped;
//! everything else stays behind the SDK.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    AccessKey, AccessKeyMetadata, CloudIdentity, IdentityProvider, SessionFactory,
};
use crate::store::AdministratorProfile;
use crate::{Error, Result};

/// Identity provider backed by AWS IAM
#[derive(Clone, Debug)]
pub struct AwsIdentityProvider {
    client: aws_sdk_iam::Client,
}

impl AwsIdentityProvider {
    /// Configure a session with the administrator's keys and region
    pub async fn configure(admin: &AdministratorProfile) -> Self {
        let creds = aws_sdk_iam::config::Credentials::new(
            admin.access_key_id.clone(),
            admin.secret_access_key.clone(),
            None, // session token
            None, // expiry
            "cup-identity-admin",
        );

        let sdk_config = aws_config::from_env()
            .region(aws_config::Region::new(admin.preferred_region.clone()))
            .credentials_provider(creds)
            .load()
            .await;

        debug!(region = %admin.preferred_region, "AWS IAM session configured");

        Self {
            client: aws_sdk_iam::Client::new(&sdk_config),
        }
    }
}

#[async_trait]
impl IdentityProvider for AwsIdentityProvider {
    async fn get_user(&self, name: &str) -> Result<Option<CloudIdentity>> {
        match self.client.get_user().user_name(name).send().await {
            Ok(out) => {
                let user = out
                    .user()
                    .ok_or_else(|| Error::provider("IAM GetUser returned no user"))?;
                Ok(Some(CloudIdentity {
                    name: user.user_name().to_string(),
                    arn: user.arn().to_string(),
                }))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_entity_exception() {
                    Ok(None)
                } else {
                    Err(Error::provider(format!("IAM GetUser failed: {service_err}")))
                }
            }
        }
    }

    async fn create_user(&self, name: &str) -> Result<CloudIdentity> {
        let out = self
            .client
            .create_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| Error::provider(format!("IAM CreateUser failed: {e}")))?;
        let user = out
            .user()
            .ok_or_else(|| Error::provider("IAM CreateUser returned no user"))?;
        info!(user = %name, "Created deployer identity");
        Ok(CloudIdentity {
            name: user.user_name().to_string(),
            arn: user.arn().to_string(),
        })
    }

    async fn list_access_keys(&self, name: &str) -> Result<Vec<AccessKeyMetadata>> {
        let out = self
            .client
            .list_access_keys()
            .user_name(name)
            .send()
            .await
            .map_err(|e| Error::provider(format!("IAM ListAccessKeys failed: {e}")))?;

        out.access_key_metadata()
            .iter()
            .map(|meta| {
                meta.access_key_id()
                    .map(|id| AccessKeyMetadata { id: id.to_string() })
                    .ok_or_else(|| Error::provider("IAM ListAccessKeys entry missing key id"))
            })
            .collect()
    }

    async fn delete_access_key(&self, name: &str, key_id: &str) -> Result<()> {
        self.client
            .delete_access_key()
            .user_name(name)
            .access_key_id(key_id)
            .send()
            .await
            .map_err(|e| Error::provider(format!("IAM DeleteAccessKey failed: {e}")))?;
        info!(user = %name, key_id = %key_id, "Deleted access key");
        Ok(())
    }

    async fn create_access_key(&self, name: &str) -> Result<AccessKey> {
        let out = self
            .client
            .create_access_key()
            .user_name(name)
            .send()
            .await
            .map_err(|e| Error::provider(format!("IAM CreateAccessKey failed: {e}")))?;
        let key = out
            .access_key()
            .ok_or_else(|| Error::provider("IAM CreateAccessKey returned no key"))?;
        info!(user = %name, key_id = %key.access_key_id(), "Created access key");
        Ok(AccessKey {
            id: key.access_key_id().to_string(),
            secret: key.secret_access_key().to_string(),
        })
    }

    async fn list_attached_policies(&self, name: &str) -> Result<Vec<String>> {
        let out = self
            .client
            .list_attached_user_policies()
            .user_name(name)
            .send()
            .await
            .map_err(|e| Error::provider(format!("IAM ListAttachedUserPolicies failed: {e}")))?;

        Ok(out
            .attached_policies()
            .iter()
            .filter_map(|policy| policy.policy_arn().map(str::to_string))
            .collect())
    }

    async fn attach_policy(&self, name: &str, policy_arn: &str) -> Result<()> {
        self.client
            .attach_user_policy()
            .user_name(name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| Error::provider(format!("IAM AttachUserPolicy failed: {e}")))?;
        info!(user = %name, policy = %policy_arn, "Attached policy");
        Ok(())
    }
}

/// Session factory producing [`AwsIdentityProvider`] sessions
#[derive(Clone, Copy, Debug, Default)]
pub struct AwsSessionFactory;

impl AwsSessionFactory {
    /// Create a new factory
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionFactory for AwsSessionFactory {
    async fn configure(&self, admin: &AdministratorProfile) -> Result<Box<dyn IdentityProvider>> {
        Ok(Box::new(AwsIdentityProvider::configure(admin).await))
    }
}
