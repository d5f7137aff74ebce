//! Drift decision logic
//!
//! Pure functions from observed facts to a [`Verdict`]. The policy never
//! mutates anything; only the engine acts on its verdicts. In verify mode a
//! [`Verdict::Drift`] halts the run as a reportable (non-error) outcome; in
//! converge mode the same verdict is the trigger for corrective action.
//!
//! Unexpected failures (unreachable provider, malformed database response)
//! are not verdicts - they surface as [`crate::Error`] from the collaborator
//! that observed them.

use std::fmt;

use crate::provider::{AccessKeyMetadata, CloudIdentity};
use crate::store::DeployerProfile;

/// Why the cloud identity and the credential record are out of agreement
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriftReason {
    /// The deployer principal does not exist on the cloud side
    IdentityMissing,
    /// A required policy is not attached to the identity
    PolicyMissing(String),
    /// The identity does not hold exactly one access key
    KeyCountMismatch(usize),
    /// More than one deployer credential record exists
    DuplicateProfiles(u64),
    /// The credential record references a key that is not live on the identity
    StaleRecord,
    /// No deployer credential record exists
    MissingProfile,
}

impl fmt::Display for DriftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdentityMissing => write!(f, "identity missing"),
            Self::PolicyMissing(arn) => write!(f, "policy missing: {arn}"),
            Self::KeyCountMismatch(n) => write!(f, "key count mismatch: found {n}, expected 1"),
            Self::DuplicateProfiles(n) => write!(f, "duplicate profiles: found {n}"),
            Self::StaleRecord => write!(f, "stale credential record"),
            Self::MissingProfile => write!(f, "no credential record"),
        }
    }
}

/// Outcome of a single drift check
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Observed state matches the expectation
    InSync,
    /// Observed state diverges; the reason says how
    Drift(DriftReason),
}

/// Check that the deployer principal exists on the cloud side
pub fn identity_present(identity: Option<&CloudIdentity>) -> Verdict {
    match identity {
        Some(_) => Verdict::InSync,
        None => Verdict::Drift(DriftReason::IdentityMissing),
    }
}

/// Check that a required policy appears in the attached-policy listing
pub fn policy_attached(attached: &[String], required_arn: &str) -> Verdict {
    if attached.iter().any(|arn| arn == required_arn) {
        Verdict::InSync
    } else {
        Verdict::Drift(DriftReason::PolicyMissing(required_arn.to_string()))
    }
}

/// Check that the identity holds exactly one access key
pub fn key_inventory(keys: &[AccessKeyMetadata]) -> Verdict {
    if keys.len() == 1 {
        Verdict::InSync
    } else {
        Verdict::Drift(DriftReason::KeyCountMismatch(keys.len()))
    }
}

/// Check the deployer record count against the exactly-one invariant.
///
/// A count of 1 is in sync only as far as cardinality goes - the record
/// itself is then checked with [`profile_matches`].
pub fn profile_count(count: u64) -> Verdict {
    match count {
        1 => Verdict::InSync,
        0 => Verdict::Drift(DriftReason::MissingProfile),
        n => Verdict::Drift(DriftReason::DuplicateProfiles(n)),
    }
}

/// Check that the persisted record references the live access key
pub fn profile_matches(profile: &DeployerProfile, live_key_id: &str) -> Verdict {
    if profile.access_key_id == live_key_id {
        Verdict::InSync
    } else {
        Verdict::Drift(DriftReason::StaleRecord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> AccessKeyMetadata {
        AccessKeyMetadata { id: id.to_string() }
    }

    fn profile(key_id: &str) -> DeployerProfile {
        DeployerProfile::new(key_id, "secret", "us-east-1")
    }

    mod identity {
        use super::*;

        #[test]
        fn present_identity_is_in_sync() {
            let identity = CloudIdentity {
                name: "clio-up".to_string(),
                arn: "arn:aws:iam::123456789012:user/clio-up".to_string(),
            };
            assert_eq!(identity_present(Some(&identity)), Verdict::InSync);
        }

        #[test]
        fn absent_identity_is_drift() {
            assert_eq!(
                identity_present(None),
                Verdict::Drift(DriftReason::IdentityMissing)
            );
        }
    }

    mod policies {
        use super::*;

        #[test]
        fn attached_policy_is_in_sync() {
            let attached = vec![
                "arn:aws:iam::aws:policy/AWSLambda_FullAccess".to_string(),
                "arn:aws:iam::aws:policy/AmazonAPIGatewayAdministrator".to_string(),
            ];
            assert_eq!(
                policy_attached(&attached, "arn:aws:iam::aws:policy/AWSLambda_FullAccess"),
                Verdict::InSync
            );
        }

        #[test]
        fn missing_policy_names_the_arn() {
            let verdict = policy_attached(&[], "arn:aws:iam::aws:policy/AWSLambda_FullAccess");
            match verdict {
                Verdict::Drift(DriftReason::PolicyMissing(arn)) => {
                    assert!(arn.contains("AWSLambda_FullAccess"));
                }
                other => panic!("expected PolicyMissing, got {:?}", other),
            }
        }
    }

    mod keys {
        use super::*;

        #[test]
        fn exactly_one_key_is_in_sync() {
            assert_eq!(key_inventory(&[key("AKIA1")]), Verdict::InSync);
        }

        #[test]
        fn zero_keys_is_drift() {
            assert_eq!(
                key_inventory(&[]),
                Verdict::Drift(DriftReason::KeyCountMismatch(0))
            );
        }

        #[test]
        fn multiple_keys_is_drift() {
            assert_eq!(
                key_inventory(&[key("AKIA1"), key("AKIA2")]),
                Verdict::Drift(DriftReason::KeyCountMismatch(2))
            );
        }
    }

    mod profiles {
        use super::*;

        #[test]
        fn counts_map_to_cardinality_verdicts() {
            assert_eq!(
                profile_count(0),
                Verdict::Drift(DriftReason::MissingProfile)
            );
            assert_eq!(profile_count(1), Verdict::InSync);
            assert_eq!(
                profile_count(3),
                Verdict::Drift(DriftReason::DuplicateProfiles(3))
            );
        }

        #[test]
        fn matching_record_is_in_sync() {
            assert_eq!(profile_matches(&profile("AKIA1"), "AKIA1"), Verdict::InSync);
        }

        #[test]
        fn mismatched_record_is_stale() {
            assert_eq!(
                profile_matches(&profile("AKIA1"), "AKIA2"),
                Verdict::Drift(DriftReason::StaleRecord)
            );
        }
    }

    #[test]
    fn reasons_render_operator_readable_messages() {
        assert_eq!(DriftReason::IdentityMissing.to_string(), "identity missing");
        assert_eq!(
            DriftReason::PolicyMissing("arn:x".to_string()).to_string(),
            "policy missing: arn:x"
        );
        assert_eq!(
            DriftReason::KeyCountMismatch(2).to_string(),
            "key count mismatch: found 2, expected 1"
        );
        assert_eq!(
            DriftReason::DuplicateProfiles(4).to_string(),
            "duplicate profiles: found 4"
        );
        assert_eq!(
            DriftReason::StaleRecord.to_string(),
            "stale credential record"
        );
        assert_eq!(DriftReason::MissingProfile.to_string(), "no credential record");
    }
}
