//! Criterion benchmarks for hot paths in the orchestrator.
//!
//! Run with:
//!   cargo bench
//!
//! Covers:
//!   - Credential selection (round-robin + quarantine filtering)
//!   - Registry view derivation (capability filter + priority sort)
//!   - Error classification (status code + phrase heuristic)

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use atelierd::credentials::{Credential, CredentialPool, PoolRegistry};
use atelierd::error::InvokeError;
use atelierd::providers::classify::default_error_class;
use atelierd::providers::{available_descriptors, catalog, Capability};

fn pool_of(provider: &str, count: usize) -> CredentialPool {
    let creds = (1..=count)
        .map(|i| {
            Credential::new(
                format!("{}_API_KEY_{i}", provider.to_uppercase()),
                format!("secret-{i}"),
                provider,
            )
        })
        .collect();
    CredentialPool::new(provider, creds)
}

// ─── Credential selection ────────────────────────────────────────────────────

fn bench_credential_selection(c: &mut Criterion) {
    let clean = pool_of("google", 8);
    c.bench_function("next_credential_8_keys", |b| {
        b.iter(|| {
            let cred = clean.next_credential().unwrap();
            black_box(cred.name().len());
        });
    });

    // Half the pool cooling down: selection walks the quarantine map too.
    let half_out = pool_of("openrouter", 8);
    for i in [1, 3, 5, 7] {
        half_out.mark_failed(&format!("OPENROUTER_API_KEY_{i}"), "http 429");
    }
    c.bench_function("next_credential_half_quarantined", |b| {
        b.iter(|| {
            let cred = half_out.next_credential().unwrap();
            black_box(cred.name().len());
        });
    });

    let stats_pool = pool_of("fal", 8);
    c.bench_function("pool_stats_snapshot", |b| {
        b.iter(|| {
            let stats = stats_pool.stats();
            black_box(stats.available);
        });
    });
}

// ─── Registry view ───────────────────────────────────────────────────────────

fn bench_registry_query(c: &mut Criterion) {
    // The real catalog with a realistic key spread: a few providers
    // configured, the rest dark.
    let descriptors = catalog::all();
    let pools = PoolRegistry::new();
    for provider in ["google", "openrouter", "together", "deepinfra"] {
        pools.insert(pool_of(provider, 3));
    }

    c.bench_function("available_descriptors_image", |b| {
        b.iter(|| {
            let view = available_descriptors(
                black_box(&descriptors),
                Capability::ImageGeneration,
                &pools,
            );
            black_box(view.len());
        });
    });

    c.bench_function("available_descriptors_vision", |b| {
        b.iter(|| {
            let view = available_descriptors(
                black_box(&descriptors),
                Capability::VisionAnalysis,
                &pools,
            );
            black_box(view.len());
        });
    });
}

// ─── Error classification ────────────────────────────────────────────────────

fn bench_classification(c: &mut Criterion) {
    let by_status = InvokeError::Http {
        status: 429,
        body: "Too Many Requests".into(),
    };
    let by_phrase = InvokeError::Http {
        status: 503,
        body: "upstream quota exceeded for project, retry later".into(),
    };
    let permanent = InvokeError::Http {
        status: 401,
        body: "invalid api key".into(),
    };

    c.bench_function("classify_status_match", |b| {
        b.iter(|| black_box(default_error_class(black_box(&by_status))));
    });
    c.bench_function("classify_phrase_match", |b| {
        b.iter(|| black_box(default_error_class(black_box(&by_phrase))));
    });
    c.bench_function("classify_permanent", |b| {
        b.iter(|| black_box(default_error_class(black_box(&permanent))));
    });
}

// ─── Entry point ─────────────────────────────────────────────────────────────

criterion_group!(
    benches,
    bench_credential_selection,
    bench_registry_query,
    bench_classification
);
criterion_main!(benches);
