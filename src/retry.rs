//! Bounded confirmation polling with exponential backoff and jitter.
//!
//! Provider-side changes (policy attachment, key deletion) are not always
//! visible in the immediately following read, so the engine re-checks until
//! the expected condition holds. Every such loop runs through
//! [`confirm_with_backoff`], which caps the number of attempts and surfaces
//! [`Error::RetryExhausted`] when a misbehaving provider never converges.
//!
//! # Example
//!
//! ```ignore
//! use cup_identity::retry::{confirm_with_backoff, RetryConfig};
//!
//! let attached = confirm_with_backoff(
//!     &RetryConfig::default(),
//!     "confirm policy attachment",
//!     || async { Ok(provider.list_attached_policies(user).await?.contains(arn).then_some(())) },
//! ).await?;
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::Error;

/// Configuration for confirmation loops.
///
/// Used for all re-check-until-confirmed loops (key purge, policy attachment,
/// duplicate-record purge). Unlike transient-failure retries, these loops
/// never retry on `Err` - an API failure is fatal immediately.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts before giving up
    pub max_attempts: u32,
    /// Initial delay between re-checks
    pub initial_delay: Duration,
    /// Maximum delay between re-checks
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with a maximum number of attempts
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }
}

/// Poll an async operation until it reports the expected condition.
///
/// The operation returns `Ok(Some(value))` once the condition holds,
/// `Ok(None)` when it does not hold yet, and `Err` on any unexpected
/// failure. `Err` is propagated immediately without further attempts.
///
/// # Arguments
/// * `config` - Confirmation loop configuration
/// * `operation_name` - Name for logging and the exhaustion error
/// * `operation` - The async check (and corrective action) to poll
///
/// # Returns
/// The confirmed value, or [`Error::RetryExhausted`] after `max_attempts`.
pub async fn confirm_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Option<T>, Error>>,
{
    let mut delay = config.initial_delay;

    for attempt in 1..=config.max_attempts {
        if let Some(value) = operation().await? {
            return Ok(value);
        }

        if attempt == config.max_attempts {
            break;
        }

        // Add jitter: 0.5x to 1.5x of the delay
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

        debug!(
            operation = %operation_name,
            attempt = attempt,
            delay_ms = jittered_delay.as_millis(),
            "Condition not confirmed yet, re-checking"
        );

        tokio::time::sleep(jittered_delay).await;

        // Exponential backoff, capped at max_delay
        delay = Duration::from_secs_f64(
            (delay.as_secs_f64() * config.backoff_multiplier)
                .min(config.max_delay.as_secs_f64()),
        );
    }

    Err(Error::RetryExhausted {
        operation: operation_name.to_string(),
        attempts: config.max_attempts,
    })
}
