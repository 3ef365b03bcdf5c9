//! Integration tests for credential pools and the rotation executor.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use atelierd::credentials::{execute_with_rotation, Credential, CredentialPool, PoolRegistry};
use atelierd::error::{InvokeError, RotationError};
use atelierd::providers::classify::default_error_class;

fn pool_of(provider: &str, names: &[&str]) -> CredentialPool {
    let creds = names
        .iter()
        .map(|n| Credential::new(*n, format!("secret-{n}"), provider))
        .collect();
    CredentialPool::new(provider, creds)
}

fn rate_limited() -> InvokeError {
    InvokeError::Http {
        status: 429,
        body: "Too Many Requests".into(),
    }
}

// ── Quarantine lifecycle ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_quarantine_expires_after_the_cooldown_window() {
    let pool = pool_of("google", &["k1", "k2"]);
    pool.mark_failed("k1", "http 429: quota exceeded");

    // Just inside the window the key must still be skipped.
    tokio::time::advance(Duration::from_secs(59)).await;
    assert_eq!(pool.next_credential().unwrap().name(), "k2");
    assert_eq!(pool.stats().quarantined, 1);

    // Past the window it rejoins rotation.
    tokio::time::advance(Duration::from_secs(2)).await;
    let stats = pool.stats();
    assert_eq!(stats.quarantined, 0, "cooldown elapsed, nothing quarantined");
    let names: Vec<String> = (0..2)
        .map(|_| pool.next_credential().unwrap().name().to_string())
        .collect();
    assert!(names.contains(&"k1".to_string()), "k1 back in rotation: {names:?}");
}

#[tokio::test(start_paused = true)]
async fn test_custom_cooldown_is_honored() {
    let pool = CredentialPool::with_cooldown(
        "segmind",
        vec![Credential::new("SEGMIND_API_KEY_1", "s", "segmind")],
        Duration::from_secs(5),
    );
    pool.mark_failed("SEGMIND_API_KEY_1", "http 429");
    assert!(pool.next_credential().is_err(), "sole key is cooling down");

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(pool.next_credential().unwrap().name(), "SEGMIND_API_KEY_1");
}

#[tokio::test(start_paused = true)]
async fn test_rotation_recovers_midstream_after_cooldown() {
    let pool = pool_of("openrouter", &["k1", "k2"]);
    let attempts = Arc::new(AtomicU32::new(0));

    // First pass: every key rate-limits and ends up quarantined.
    let a = attempts.clone();
    let result: Result<(), _> = execute_with_rotation(&pool, default_error_class, |_| {
        let a = a.clone();
        async move {
            a.fetch_add(1, Ordering::SeqCst);
            Err(rate_limited())
        }
    })
    .await;
    assert!(matches!(result, Err(RotationError::AllExhausted { tried: 2, .. })));
    assert_eq!(pool.stats().quarantined, 2);

    // A retry inside the window cannot even start.
    let result: Result<(), _> = execute_with_rotation(&pool, default_error_class, |_| async {
        panic!("no attempt should run while everything is quarantined")
    })
    .await;
    assert!(matches!(result, Err(RotationError::AllQuarantined { .. })));

    // After the cooldown the pool serves again, continuing from the cursor.
    tokio::time::advance(Duration::from_secs(61)).await;
    let a = attempts.clone();
    let served = execute_with_rotation(&pool, default_error_class, |cred| {
        let a = a.clone();
        async move {
            a.fetch_add(1, Ordering::SeqCst);
            Ok::<_, InvokeError>(cred.name().to_string())
        }
    })
    .await
    .expect("pool recovered");
    assert_eq!(served, "k1", "cursor wrapped back to the first key");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

// ── Usage accounting across cycles ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_usage_counters_survive_quarantine_cycles() {
    let pool = pool_of("nvidia", &["k1"]);

    let _ = execute_with_rotation(&pool, default_error_class, |_| async {
        Err::<(), _>(rate_limited())
    })
    .await;

    tokio::time::advance(Duration::from_secs(61)).await;

    execute_with_rotation(&pool, default_error_class, |_| async {
        Ok::<_, InvokeError>(())
    })
    .await
    .expect("recovered after cooldown");

    let stats = pool.stats();
    let k1 = &stats.per_credential[0];
    assert_eq!(k1.total_requests, 2, "both picks counted");
    assert_eq!(k1.failures, 1, "only the rate-limited attempt counted as failure");
    assert!(k1.available);
    assert!(k1.last_used.is_some());
}

// ── Registry behavior ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_registry_pools_are_isolated_per_provider() {
    let registry = PoolRegistry::new();
    registry.insert(pool_of("google", &["GOOGLE_API_KEY_1", "GOOGLE_API_KEY_2"]));
    registry.insert(pool_of("fal", &["FAL_API_KEY_1"]));

    registry.pool("google").mark_failed("GOOGLE_API_KEY_1", "http 429");

    let google = registry.pool("google").stats();
    let fal = registry.pool("fal").stats();
    assert_eq!(google.quarantined, 1);
    assert_eq!(fal.quarantined, 0, "quarantine never leaks across providers");

    assert_eq!(registry.known_providers(), vec!["fal", "google"]);
}

#[tokio::test]
async fn test_custom_registry_cooldown_applies_to_inserted_pools() {
    // Pools created by the registry carry its cooldown; explicitly inserted
    // pools keep their own. Both views coexist.
    let registry = PoolRegistry::with_cooldown(Duration::from_secs(1));
    let lazy = registry.pool("has-no-keys-anywhere");
    assert!(lazy.is_empty(), "no env keys means an empty pool, not an error");

    registry.insert(pool_of("together", &["TOGETHER_API_KEY_1"]));
    assert!(registry.has_credentials("together"));
}
