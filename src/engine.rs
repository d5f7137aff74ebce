//! Reconciliation engine
//!
//! The engine runs five ordered stages, each at most once per run:
//!
//! 1. Resolve administrator credentials from the store and open the
//!    provider session. No administrator record means the platform is not
//!    initialized yet - a valid state, not an error.
//! 2. Ensure the deployer identity exists. Converge mode additionally purges
//!    every existing access key: secrets are unrecoverable after creation,
//!    so any existing key is stale by definition.
//! 3. Ensure the required policies are attached, in declared order. Converge
//!    mode attaches a missing policy and re-lists until the attachment is
//!    visible before advancing to the next entry.
//! 4. Resolve the access key: verify mode expects exactly one, converge
//!    mode mints a fresh one and captures the secret.
//! 5. Reconcile the deployer credential record against the live key.
//!
//! At every decision point the engine consults [`crate::drift`] and either
//! halts with the drift verdict (verify mode) or performs the corrective
//! action the verdict calls for (converge mode). Unexpected failures
//! propagate as [`Error`] and terminate the run.
//!
//! All state the pipeline needs travels through this struct and the stage
//! arguments; there is no ambient session or global configuration.

use std::fmt;

use tracing::{debug, info};

use crate::drift::{self, DriftReason, Verdict};
use crate::provider::{IdentityProvider, SessionFactory};
use crate::retry::{self, RetryConfig};
use crate::store::{AdministratorProfile, CredentialStore, DeployerProfile};
use crate::{Error, Result, DEPLOYER_USER_NAME, REQUIRED_POLICY_ARNS};

/// Execution mode for a reconciliation run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Read-only drift detection; never mutates provider or store state
    Verify,
    /// Mutating reconciliation; repairs every divergence it finds
    Converge,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verify => write!(f, "verify"),
            Self::Converge => write!(f, "converge"),
        }
    }
}

/// Terminal outcome of a reconciliation run.
///
/// Every variant maps to a zero exit: drift in verify mode is an expected,
/// reportable condition, and an uninitialized platform is a valid state.
/// Converge mode only ever terminates [`Outcome::InSync`],
/// [`Outcome::Uninitialized`], or with an [`Error`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Cloud identity and credential record agree
    InSync,
    /// A divergence was found (verify mode only)
    Drift(DriftReason),
    /// No administrator profile exists; nothing to reconcile
    Uninitialized,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InSync => write!(f, "deployer identity in sync"),
            Self::Drift(reason) => write!(f, "drift detected: {reason}"),
            Self::Uninitialized => {
                write!(f, "no administrator profile found, nothing to initialize yet")
            }
        }
    }
}

/// The access key resolved by stage four.
///
/// The secret is only present in converge mode, where the key was just
/// minted; verify mode only ever sees listing metadata.
struct ResolvedKey {
    id: String,
    secret: Option<String>,
}

enum KeyResolution {
    Resolved(ResolvedKey),
    Drifted(DriftReason),
}

/// The reconciliation engine.
///
/// Generic over the credential store and the provider session factory so
/// the whole pipeline can run against injected fakes in tests.
pub struct Engine<S, F> {
    mode: Mode,
    store: S,
    factory: F,
    retry: RetryConfig,
}

impl<S, F> Engine<S, F>
where
    S: CredentialStore,
    F: SessionFactory,
{
    /// Create an engine with the default confirmation-loop configuration
    pub fn new(mode: Mode, store: S, factory: F) -> Self {
        Self {
            mode,
            store,
            factory,
            retry: RetryConfig::default(),
        }
    }

    /// Override the confirmation-loop configuration
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run the pipeline to its terminal outcome.
    ///
    /// Returns `Err` only for unexpected failures (provider/API error,
    /// unreachable store, exhausted confirmation loop).
    pub async fn run(&self) -> Result<Outcome> {
        info!(mode = %self.mode, user = DEPLOYER_USER_NAME, "Starting reconciliation");

        // Stage 1: resolve administrator credentials
        let Some(admin) = self.store.find_administrator().await? else {
            info!("No administrator profile found, nothing to reconcile");
            return Ok(Outcome::Uninitialized);
        };
        let provider = self.factory.configure(&admin).await?;
        let provider: &dyn IdentityProvider = provider.as_ref();

        // Stage 2: ensure the identity exists
        if let Some(reason) = self.ensure_identity(provider).await? {
            return Ok(Outcome::Drift(reason));
        }

        // Stage 3: ensure required policies are attached, in order
        if let Some(reason) = self.ensure_policies(provider).await? {
            return Ok(Outcome::Drift(reason));
        }

        // Stage 4: resolve the access key
        let key = match self.resolve_access_key(provider).await? {
            KeyResolution::Resolved(key) => key,
            KeyResolution::Drifted(reason) => return Ok(Outcome::Drift(reason)),
        };

        // Stage 5: reconcile the deployer credential record
        let outcome = self.reconcile_profile(&key, &admin).await?;
        info!(mode = %self.mode, %outcome, "Reconciliation finished");
        Ok(outcome)
    }

    async fn ensure_identity(&self, provider: &dyn IdentityProvider) -> Result<Option<DriftReason>> {
        let identity = provider.get_user(DEPLOYER_USER_NAME).await?;
        match drift::identity_present(identity.as_ref()) {
            Verdict::InSync => {
                debug!(user = DEPLOYER_USER_NAME, "Deployer identity exists");
                if self.mode == Mode::Converge {
                    self.purge_access_keys(provider).await?;
                }
                Ok(None)
            }
            Verdict::Drift(reason) => match self.mode {
                Mode::Verify => Ok(Some(reason)),
                Mode::Converge => {
                    provider.create_user(DEPLOYER_USER_NAME).await?;
                    Ok(None)
                }
            },
        }
    }

    /// Delete every access key on the identity, one listing at a time.
    ///
    /// Secrets are unrecoverable after creation, so existing keys can never
    /// be reused and are purged before a replacement is minted. Deletion
    /// visibility may lag, hence the re-list loop.
    async fn purge_access_keys(&self, provider: &dyn IdentityProvider) -> Result<()> {
        retry::confirm_with_backoff(&self.retry, "purge stale access keys", move || async move {
            let keys = provider.list_access_keys(DEPLOYER_USER_NAME).await?;
            match keys.first() {
                None => Ok(Some(())),
                Some(stale) => {
                    debug!(key_id = %stale.id, "Deleting stale access key");
                    provider
                        .delete_access_key(DEPLOYER_USER_NAME, &stale.id)
                        .await?;
                    Ok(None)
                }
            }
        })
        .await
    }

    async fn ensure_policies(&self, provider: &dyn IdentityProvider) -> Result<Option<DriftReason>> {
        for &arn in REQUIRED_POLICY_ARNS {
            let attached = provider.list_attached_policies(DEPLOYER_USER_NAME).await?;
            match drift::policy_attached(&attached, arn) {
                Verdict::InSync => {
                    debug!(policy = %arn, "Required policy attached");
                }
                Verdict::Drift(reason) => match self.mode {
                    Mode::Verify => return Ok(Some(reason)),
                    Mode::Converge => {
                        provider.attach_policy(DEPLOYER_USER_NAME, arn).await?;
                        // Attachment visibility may lag; re-check this entry
                        // until a listing confirms it before advancing.
                        retry::confirm_with_backoff(
                            &self.retry,
                            "confirm policy attachment",
                            move || async move {
                                let attached =
                                    provider.list_attached_policies(DEPLOYER_USER_NAME).await?;
                                match drift::policy_attached(&attached, arn) {
                                    Verdict::InSync => Ok(Some(())),
                                    Verdict::Drift(_) => Ok(None),
                                }
                            },
                        )
                        .await?;
                        info!(policy = %arn, "Policy attachment confirmed");
                    }
                },
            }
        }
        Ok(None)
    }

    async fn resolve_access_key(&self, provider: &dyn IdentityProvider) -> Result<KeyResolution> {
        match self.mode {
            Mode::Verify => {
                let keys = provider.list_access_keys(DEPLOYER_USER_NAME).await?;
                if let Verdict::Drift(reason) = drift::key_inventory(&keys) {
                    return Ok(KeyResolution::Drifted(reason));
                }
                let live = keys
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::provider("key listing changed during verification"))?;
                Ok(KeyResolution::Resolved(ResolvedKey {
                    id: live.id,
                    secret: None,
                }))
            }
            Mode::Converge => {
                let key = provider.create_access_key(DEPLOYER_USER_NAME).await?;
                Ok(KeyResolution::Resolved(ResolvedKey {
                    id: key.id,
                    secret: Some(key.secret),
                }))
            }
        }
    }

    async fn reconcile_profile(
        &self,
        key: &ResolvedKey,
        admin: &AdministratorProfile,
    ) -> Result<Outcome> {
        let store = &self.store;

        let count = match self.mode {
            Mode::Verify => store.count_deployer_profiles().await?,
            // Duplicates are eliminated incrementally, mirroring the key
            // purge: delete, then re-count until at most one remains.
            Mode::Converge => {
                retry::confirm_with_backoff(
                    &self.retry,
                    "purge duplicate deployer profiles",
                    move || async move {
                        let count = store.count_deployer_profiles().await?;
                        if count > 1 {
                            debug!(count, "Deleting duplicate deployer profiles");
                            store.delete_all_deployer_profiles().await?;
                            Ok(None)
                        } else {
                            Ok(Some(count))
                        }
                    },
                )
                .await?
            }
        };

        match drift::profile_count(count) {
            Verdict::InSync => {
                let profile = store.find_deployer_profile().await?.ok_or_else(|| {
                    Error::store("deployer profile disappeared between count and lookup")
                })?;
                match drift::profile_matches(&profile, &key.id) {
                    Verdict::InSync => Ok(Outcome::InSync),
                    Verdict::Drift(reason) => match self.mode {
                        Mode::Verify => Ok(Outcome::Drift(reason)),
                        Mode::Converge => {
                            info!(
                                stale = %profile.access_key_id,
                                live = %key.id,
                                "Replacing stale deployer profile"
                            );
                            store.delete_all_deployer_profiles().await?;
                            self.insert_profile(key, admin).await?;
                            Ok(Outcome::InSync)
                        }
                    },
                }
            }
            Verdict::Drift(DriftReason::MissingProfile) => match self.mode {
                Mode::Verify => Ok(Outcome::Drift(DriftReason::MissingProfile)),
                Mode::Converge => {
                    self.insert_profile(key, admin).await?;
                    Ok(Outcome::InSync)
                }
            },
            // Duplicate count: converge already purged down to <= 1 above,
            // so this verdict only surfaces in verify mode.
            Verdict::Drift(reason) => Ok(Outcome::Drift(reason)),
        }
    }

    async fn insert_profile(&self, key: &ResolvedKey, admin: &AdministratorProfile) -> Result<()> {
        let secret = key
            .secret
            .as_deref()
            .ok_or_else(|| Error::provider("access key secret unavailable for record insert"))?;
        let profile = DeployerProfile::new(&key.id, secret, &admin.preferred_region);
        self.store.insert_deployer_profile(&profile).await?;
        info!(access_key_id = %key.id, "Inserted deployer profile");
        Ok(())
    }
}
