// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use atelierd::config::OrchestratorConfig;
use atelierd::credentials::registry;
use atelierd::error::OrchestrateError;
use atelierd::fallback::FallbackEngine;
use atelierd::providers::{
    adapters, catalog, Capability, InvokeOutput, ProviderRequest, RequestOptions,
};

#[derive(Parser)]
#[command(
    name = "atelierd",
    about = "Resilient multi-provider AI orchestrator for fashion content",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the TOML config file (default: ./atelierd.toml)
    #[arg(long, env = "ATELIERD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ATELIERD_LOG", global = true)]
    log_level: Option<String>,

    /// Log output format: "pretty" (default) or "json"
    #[arg(long, env = "ATELIERD_LOG_FORMAT", global = true)]
    log_format: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "ATELIERD_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Show credential pool status per provider.
    ///
    /// Pools load from numbered environment variables
    /// (GOOGLE_API_KEY_1, GOOGLE_API_KEY_2, ...) with a bare
    /// {PROVIDER}_API_KEY accepted as a single-key pool. Every provider
    /// the catalog knows is listed, configured or not.
    ///
    /// Examples:
    ///   atelierd keys
    ///   atelierd keys --provider google
    ///   atelierd keys --json
    Keys {
        /// Only show this provider's pool.
        #[arg(long)]
        provider: Option<String>,
        /// Emit machine-readable JSON instead of the listing.
        #[arg(long)]
        json: bool,
    },
    /// List registered providers in fallback order.
    ///
    /// Shows each descriptor's priority, capability, credential pool, and
    /// whether it is currently available (at least one key loaded, or
    /// keyless).
    ///
    /// Examples:
    ///   atelierd providers
    ///   atelierd providers --capability image-generation
    ///   atelierd providers --json
    Providers {
        /// Restrict the listing to one capability.
        #[arg(long)]
        capability: Option<Capability>,
        #[arg(long)]
        json: bool,
    },
    /// Run one orchestrated request through the fallback chain.
    ///
    /// Walks providers in priority order with per-provider key rotation
    /// and reports which descriptor served the request. Exits non-zero
    /// when every provider fails.
    ///
    /// Examples:
    ///   atelierd probe --capability image --prompt "editorial trench coat look"
    ///   atelierd probe --capability vision --prompt "Rate this outfit" --image look.jpg
    Probe {
        /// Request family: vision-analysis or image-generation.
        #[arg(long)]
        capability: Capability,
        /// Prompt text sent to the provider.
        #[arg(long)]
        prompt: String,
        /// Local image file for vision analysis (repeatable).
        #[arg(long)]
        image: Vec<PathBuf>,
        /// Generated image width in pixels.
        #[arg(long)]
        width: Option<u32>,
        /// Generated image height in pixels.
        #[arg(long)]
        height: Option<u32>,
        /// Model override for adapters whose wire accepts one.
        #[arg(long)]
        model: Option<String>,
        /// Seed for providers that take one.
        #[arg(long)]
        seed: Option<u64>,
        /// Emit the result as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = OrchestratorConfig::new(args.config, args.log_level, args.log_format, args.log_file);

    // Init once — must happen before any tracing calls.
    let _file_guard = setup_logging(&config.log, config.log_file.as_deref(), &config.log_format);

    adapters::init_http_client(config.http_timeout, config.http_connect_timeout);

    let engine = FallbackEngine::new(registry::init_global(config.cooldown));

    match args.command {
        Command::Keys { provider, json } => run_keys(&engine, provider.as_deref(), json)?,
        Command::Providers { capability, json } => run_providers(&engine, capability, json)?,
        Command::Probe {
            capability,
            prompt,
            image,
            width,
            height,
            model,
            seed,
            json,
        } => {
            let options = RequestOptions {
                width,
                height,
                seed,
                model,
                output_dir: config.output_dir.clone(),
            };
            run_probe(&engine, capability, prompt, image, options, json).await?;
        }
    }

    Ok(())
}

// ── Subcommands ──────────────────────────────────────────────────────────────

fn run_keys(engine: &FallbackEngine, only: Option<&str>, json: bool) -> Result<()> {
    // Touch every pool up front so unconfigured providers appear in the
    // summary as empty rather than missing.
    match only {
        Some(name) => {
            let _ = engine.pools().pool(name);
        }
        None => {
            let mut providers: Vec<&str> = catalog::all().iter().map(|d| d.provider).collect();
            providers.sort_unstable();
            providers.dedup();
            for provider in providers {
                let _ = engine.pools().pool(provider);
            }
        }
    }

    let mut summary = engine.service_summary();
    if let Some(name) = only {
        summary.providers.retain(|p| p.provider == name);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "{} credential(s) across {} provider(s), {} quarantined",
        summary.total_credentials(),
        summary.providers.len(),
        summary.total_quarantined()
    );
    for pool in &summary.providers {
        let marker = if pool.available > 0 { "ok" } else { "--" };
        println!(
            "  {marker} {:<14} {} key(s), {} available",
            pool.provider, pool.total, pool.available
        );
        for cred in &pool.per_credential {
            let state = if cred.available { "" } else { " [quarantined]" };
            println!(
                "       {:<24} {} request(s), {} failure(s){state}",
                cred.name, cred.total_requests, cred.failures
            );
        }
    }
    Ok(())
}

fn run_providers(engine: &FallbackEngine, capability: Option<Capability>, json: bool) -> Result<()> {
    let capabilities = match capability {
        Some(c) => vec![c],
        None => vec![Capability::VisionAnalysis, Capability::ImageGeneration],
    };

    if json {
        let rows: Vec<_> = capabilities
            .iter()
            .flat_map(|c| engine.descriptor_info(*c))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for cap in capabilities {
        let rows = engine.descriptor_info(cap);
        let available = rows.iter().filter(|r| r.available).count();
        println!("{cap}: {available}/{} available", rows.len());
        for row in rows {
            let marker = if row.available { "ok" } else { "--" };
            let tail = if row.requires_credential { "" } else { " (keyless)" };
            println!(
                "  {marker} [{:>2}] {:<28} pool={}{tail}",
                row.priority, row.id, row.provider
            );
        }
    }
    Ok(())
}

async fn run_probe(
    engine: &FallbackEngine,
    capability: Capability,
    prompt: String,
    images: Vec<PathBuf>,
    options: RequestOptions,
    json: bool,
) -> Result<()> {
    let request = match capability {
        Capability::VisionAnalysis => {
            if images.is_empty() {
                anyhow::bail!("vision-analysis needs at least one --image");
            }
            ProviderRequest::vision(prompt, images)
        }
        Capability::ImageGeneration => ProviderRequest::image(prompt),
    }
    .with_options(options);

    let success = match engine.run(capability, &request).await {
        Ok(success) => success,
        Err(err) => {
            if let OrchestrateError::AggregateFailure { failures, .. } = &err {
                for failure in failures {
                    eprintln!("  {} ({}): {}", failure.descriptor, failure.kind, failure.message);
                }
            }
            return Err(err).context("every provider in the chain failed");
        }
    };

    if json {
        let report = serde_json::json!({
            "descriptor": success.descriptor_id,
            "credential": &success.credential,
            "duration_ms": success.duration_ms,
            "output": &success.output,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("served by {} in {}ms", success.descriptor_id, success.duration_ms);
    if let Some(credential) = &success.credential {
        println!("credential: {credential}");
    }
    match &success.output {
        InvokeOutput::Analysis(value) => println!("{}", serde_json::to_string_pretty(value)?),
        InvokeOutput::Image(artifact) => {
            if let Some(url) = &artifact.url {
                println!("url: {url}");
            }
            if let Some(path) = &artifact.path {
                println!("saved: {}", path.display());
            }
        }
    }
    Ok(())
}

// ── Logging ──────────────────────────────────────────────────────────────────

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stderr and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stderr-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("atelierd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e}, falling back to stderr",
                dir.display()
            );
            init_stderr_only(log_level, use_json);
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else {
        init_stderr_only(log_level, use_json);
        None
    }
}

fn init_stderr_only(log_level: &str, use_json: bool) {
    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
