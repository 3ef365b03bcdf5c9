// SPDX-License-Identifier: MIT
//! Credential rotation for a single provider's invocation.
//!
//! [`execute_with_rotation`] runs one attempt per eligible credential until
//! an attempt succeeds, a non-rate-limit error appears, or the pool is
//! exhausted. Rate-limit-class failures quarantine the credential and move
//! on; any other failure is assumed deterministic for this request and is
//! propagated immediately — retrying it on a sibling key would only burn
//! quota.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Credential, CredentialPool};
use crate::error::{ErrorClass, InvokeError, PoolError, RotationError};

/// Try an invocation across a provider's credentials.
///
/// Runs at most `pool.len()` attempts. Each iteration picks the next
/// eligible credential (counting the pick in its usage stats), runs
/// `attempt`, and on failure consults `classify`:
/// - [`ErrorClass::RateLimit`] — quarantine the credential, continue with
///   the next one.
/// - [`ErrorClass::Permanent`] — stop and propagate.
///
/// An exhausted quarantine set fails fast with
/// [`RotationError::AllQuarantined`] before any network attempt; a full
/// sequence of rate-limited attempts ends in
/// [`RotationError::AllExhausted`] wrapping the last failure.
pub async fn execute_with_rotation<F, Fut, T, C>(
    pool: &CredentialPool,
    classify: C,
    mut attempt: F,
) -> Result<T, RotationError>
where
    F: FnMut(Arc<Credential>) -> Fut,
    Fut: Future<Output = Result<T, InvokeError>>,
    C: Fn(&InvokeError) -> ErrorClass,
{
    if pool.is_empty() {
        return Err(RotationError::NoCredentials {
            provider: pool.provider().to_string(),
        });
    }

    let budget = pool.len();
    let mut last_rate_limit: Option<InvokeError> = None;
    let mut rotations = 0usize;

    for _ in 0..budget {
        let cred = match pool.next_credential() {
            Ok(c) => c,
            Err(PoolError::AllQuarantined { provider, .. }) => {
                return Err(RotationError::AllQuarantined { provider });
            }
            Err(PoolError::Empty(provider)) => {
                return Err(RotationError::NoCredentials { provider });
            }
        };
        cred.record_use();

        match attempt(Arc::clone(&cred)).await {
            Ok(value) => {
                if rotations > 0 {
                    debug!(
                        provider = %pool.provider(),
                        credential = %cred.name(),
                        rotations,
                        "invocation succeeded after credential rotation"
                    );
                }
                return Ok(value);
            }
            Err(err) => match classify(&err) {
                ErrorClass::RateLimit => {
                    warn!(
                        provider = %pool.provider(),
                        credential = %cred.name(),
                        err = %err,
                        "rate limited — rotating to next credential"
                    );
                    pool.mark_failed(cred.name(), &err.to_string());
                    rotations += 1;
                    last_rate_limit = Some(err);
                }
                ErrorClass::Permanent => {
                    return Err(RotationError::Invoke(err));
                }
            },
        }
    }

    // Safety: the loop only completes when every iteration was rate-limited,
    // and each of those sets last_rate_limit.
    let last = last_rate_limit.expect("rotation loop ended without a recorded failure");
    Err(RotationError::AllExhausted {
        provider: pool.provider().to_string(),
        tried: budget,
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialPool;
    use crate::providers::classify::default_error_class;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn pool_of(names: &[&str]) -> CredentialPool {
        let creds = names
            .iter()
            .map(|n| Credential::new(*n, format!("secret-{n}"), "testprov"))
            .collect();
        CredentialPool::new("testprov", creds)
    }

    fn rate_limited() -> InvokeError {
        InvokeError::Http {
            status: 429,
            body: "Too Many Requests".into(),
        }
    }

    #[tokio::test]
    async fn first_credential_success_needs_no_rotation() {
        let pool = pool_of(&["k1", "k2"]);
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();

        let result = execute_with_rotation(&pool, default_error_class, |cred| {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::Relaxed);
                Ok::<_, InvokeError>(cred.name().to_string())
            }
        })
        .await;

        assert_eq!(result.unwrap(), "k1");
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
        assert_eq!(pool.stats().quarantined, 0);
    }

    #[tokio::test]
    async fn rate_limit_rotates_to_next_credential() {
        let pool = pool_of(&["k1", "k2"]);
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();

        let result = execute_with_rotation(&pool, default_error_class, |cred| {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::Relaxed);
                if cred.name() == "k1" {
                    Err(rate_limited())
                } else {
                    Ok(cred.name().to_string())
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "k2");
        assert_eq!(attempts.load(Ordering::Relaxed), 2);

        let stats = pool.stats();
        assert_eq!(stats.quarantined, 1, "k1 should be cooling down");
        let k1 = stats.per_credential.iter().find(|c| c.name == "k1").unwrap();
        assert!(!k1.available);
        assert_eq!(k1.failures, 1);
    }

    #[tokio::test]
    async fn permanent_error_stops_rotation_immediately() {
        let pool = pool_of(&["k1", "k2"]);
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();

        let result: Result<(), _> = execute_with_rotation(&pool, default_error_class, |_| {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::Relaxed);
                Err(InvokeError::Malformed("no candidates in response".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(RotationError::Invoke(_))));
        assert_eq!(attempts.load(Ordering::Relaxed), 1, "no second credential tried");
        assert_eq!(pool.stats().quarantined, 0, "permanent errors never quarantine");
    }

    #[tokio::test]
    async fn all_rate_limited_exhausts_the_pool() {
        let pool = pool_of(&["k1", "k2", "k3"]);
        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();

        let result: Result<(), _> = execute_with_rotation(&pool, default_error_class, |_| {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::Relaxed);
                Err(rate_limited())
            }
        })
        .await;

        match result {
            Err(RotationError::AllExhausted { tried, .. }) => assert_eq!(tried, 3),
            other => panic!("expected AllExhausted, got {other:?}"),
        }
        assert_eq!(attempts.load(Ordering::Relaxed), 3);

        let stats = pool.stats();
        assert_eq!(stats.quarantined, 3);
        // Selection is counted even when the attempt fails.
        for cred in &stats.per_credential {
            assert_eq!(cred.total_requests, 1);
            assert_eq!(cred.failures, 1);
        }
    }

    #[tokio::test]
    async fn fully_quarantined_pool_fails_before_any_attempt() {
        let pool = pool_of(&["k1", "k2"]);
        pool.mark_failed("k1", "http 429");
        pool.mark_failed("k2", "http 429");

        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();

        let result: Result<(), _> = execute_with_rotation(&pool, default_error_class, |_| {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        })
        .await;

        assert!(matches!(result, Err(RotationError::AllQuarantined { .. })));
        assert_eq!(attempts.load(Ordering::Relaxed), 0, "no network attempt expected");
    }

    #[tokio::test]
    async fn mid_rotation_quarantine_exhaustion_reports_quarantined() {
        // k1 is already cooling down; k2 and k3 rate-limit during this
        // sequence. The third pick finds nothing eligible.
        let pool = pool_of(&["k1", "k2", "k3"]);
        pool.mark_failed("k1", "http 429");

        let attempts = Arc::new(AtomicU32::new(0));
        let a = attempts.clone();

        let result: Result<(), _> = execute_with_rotation(&pool, default_error_class, |_| {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::Relaxed);
                Err(rate_limited())
            }
        })
        .await;

        assert!(matches!(result, Err(RotationError::AllQuarantined { .. })));
        assert_eq!(attempts.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn empty_pool_reports_no_credentials() {
        let pool = pool_of(&[]);
        let result: Result<(), _> = execute_with_rotation(&pool, default_error_class, |_| async {
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(RotationError::NoCredentials { .. })));
    }
}
