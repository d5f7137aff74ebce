//! MongoDB credential store backend

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection, Database};
use tracing::debug;

use super::{AdministratorProfile, CredentialStore, DeployerProfile};
use crate::{Error, Result, ADMIN_ROLE, DEPLOYER_ROLE, DEPLOYER_USER_NAME};

/// Collection holding both administrator and deployer credential records
const PROFILES_COLLECTION: &str = "profiles";

/// Credential store backed by a MongoDB collection
#[derive(Clone, Debug)]
pub struct MongoCredentialStore {
    db: Database,
}

impl MongoCredentialStore {
    /// Connect to the database at the given URI.
    ///
    /// Connection-string validation and transport setup are the driver's
    /// concern; any failure here is fatal.
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| Error::store(format!("failed to connect to {database}: {e}")))?;
        debug!(database = %database, "Connected to credential store");
        Ok(Self {
            db: client.database(database),
        })
    }

    /// Create a store on an already-open database handle
    pub fn with_database(db: Database) -> Self {
        Self { db }
    }

    fn admins(&self) -> Collection<AdministratorProfile> {
        self.db.collection(PROFILES_COLLECTION)
    }

    fn deployers(&self) -> Collection<DeployerProfile> {
        self.db.collection(PROFILES_COLLECTION)
    }

    fn deployer_filter() -> Document {
        doc! { "username": DEPLOYER_USER_NAME, "role": DEPLOYER_ROLE }
    }
}

#[async_trait]
impl CredentialStore for MongoCredentialStore {
    async fn find_administrator(&self) -> Result<Option<AdministratorProfile>> {
        self.admins()
            .find_one(doc! { "role": ADMIN_ROLE })
            .await
            .map_err(|e| Error::store(format!("administrator lookup failed: {e}")))
    }

    async fn count_deployer_profiles(&self) -> Result<u64> {
        self.deployers()
            .count_documents(Self::deployer_filter())
            .await
            .map_err(|e| Error::store(format!("deployer profile count failed: {e}")))
    }

    async fn find_deployer_profile(&self) -> Result<Option<DeployerProfile>> {
        self.deployers()
            .find_one(Self::deployer_filter())
            .await
            .map_err(|e| Error::store(format!("deployer profile lookup failed: {e}")))
    }

    async fn delete_all_deployer_profiles(&self) -> Result<u64> {
        let result = self
            .deployers()
            .delete_many(Self::deployer_filter())
            .await
            .map_err(|e| Error::store(format!("deployer profile delete failed: {e}")))?;
        debug!(deleted = result.deleted_count, "Deleted deployer profiles");
        Ok(result.deleted_count)
    }

    async fn insert_deployer_profile(&self, profile: &DeployerProfile) -> Result<()> {
        self.deployers()
            .insert_one(profile)
            .await
            .map_err(|e| Error::store(format!("deployer profile insert failed: {e}")))?;
        debug!(access_key_id = %profile.access_key_id, "Inserted deployer profile");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployer_filter_matches_on_username_and_role() {
        let filter = MongoCredentialStore::deployer_filter();
        assert_eq!(filter.get_str("username").unwrap(), "clio-up");
        assert_eq!(filter.get_str("role").unwrap(), "cup-deployer");
    }
}
