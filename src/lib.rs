//! cup-identity - deployer identity provisioning for the cup platform
//!
//! cup-identity keeps the cloud-side deployer identity (an IAM user, its
//! access key, and its attached policies) consistent with the credential
//! record persisted in the platform database. Deployments authenticate with
//! that record, so a stale or missing entry on either side blocks pushes.
//!
//! # Modes
//!
//! - **verify** - read-only drift detection. Used as a pre-flight gate: any
//!   mismatch is reported and the process exits cleanly without touching
//!   cloud or database state.
//! - **converge** - mutating reconciliation. Creates the identity when
//!   absent, rotates its access key, attaches the required policies, and
//!   regenerates the persisted credential record.
//!
//! # Modules
//!
//! - [`engine`] - the five-stage reconciliation pipeline
//! - [`drift`] - pure drift-decision logic (observed facts -> verdict)
//! - [`provider`] - cloud identity API abstraction and the AWS IAM backend
//! - [`store`] - credential store abstraction and the MongoDB backend
//! - [`retry`] - bounded confirmation polling with backoff and jitter
//! - [`error`] - error types

#![deny(missing_docs)]

pub mod drift;
pub mod engine;
pub mod error;
pub mod provider;
pub mod retry;
pub mod store;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Identity Constants
// =============================================================================
// The deployer identity is a fixed singleton. Centralizing the names here
// keeps the engine, the store filters, and the test fixtures in agreement.

/// Name of the cloud-side deployer principal
pub const DEPLOYER_USER_NAME: &str = "clio-up";

/// Role tag on the administrator credential record
pub const ADMIN_ROLE: &str = "cup-admin";

/// Role tag on the deployer credential record
pub const DEPLOYER_ROLE: &str = "cup-deployer";

/// Platform tag stored on the deployer credential record
pub const DEPLOYER_PLATFORM: &str = "aws";

/// Policies that must be attached to the deployer identity.
///
/// Evaluated and enforced one at a time, in this order. The deployer pushes
/// Lambda workloads fronted by API Gateway, so both managed policies are
/// required before a deployment can succeed.
pub const REQUIRED_POLICY_ARNS: &[&str] = &[
    "arn:aws:iam::aws:policy/AWSLambda_FullAccess",
    "arn:aws:iam::aws:policy/AmazonAPIGatewayAdministrator",
];
