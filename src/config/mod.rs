// SPDX-License-Identifier: MIT

//! Runtime configuration and credential discovery.
//!
//! Settings layer in the usual priority order (CLI / env var, then the
//! TOML file, then built-in defaults). Credentials are never written to
//! the config file; they come exclusively from the process environment
//! as numbered `{PROVIDER}_API_KEY_N` variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::error;

use crate::credentials::{Credential, DEFAULT_COOLDOWN};
use crate::providers::adapters::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "atelierd.toml";

const DEFAULT_LOG: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "pretty";

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `atelierd.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Log level filter string, e.g. "debug", "info,atelierd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Append logs to a daily-rolled file under this path instead of stderr.
    log_file: Option<PathBuf>,
    /// Credential rotation settings (`[rotation]`).
    rotation: Option<RotationToml>,
    /// Outbound HTTP settings (`[http]`).
    http: Option<HttpToml>,
    /// Generated image settings (`[images]`).
    images: Option<ImagesToml>,
}

#[derive(Deserialize, Default)]
struct RotationToml {
    /// Quarantine window after a rate-limited credential, in seconds (default: 60).
    cooldown_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
struct HttpToml {
    /// Per-request timeout in seconds (default: 60).
    timeout_secs: Option<u64>,
    /// Connection establishment timeout in seconds (default: 10).
    connect_timeout_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
struct ImagesToml {
    /// Directory where generated images are persisted (default: system temp dir).
    output_dir: Option<PathBuf>,
}

fn load_toml(path: &Path) -> Option<TomlConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config file, using defaults");
            None
        }
    }
}

// ─── OrchestratorConfig ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Log level filter string (`ATELIERD_LOG` env var, default: "info").
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Daily-rolled log file path. None = stderr.
    pub log_file: Option<PathBuf>,
    /// Quarantine window applied to a credential after a rate-limit failure.
    pub cooldown: Duration,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// HTTP connection establishment timeout.
    pub http_connect_timeout: Duration,
    /// Directory for generated images (`ATELIERD_OUTPUT_DIR` env var).
    /// None = system temp dir.
    pub output_dir: Option<PathBuf>,
}

impl OrchestratorConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file (`--config` path, or `atelierd.toml` in the working directory)
    ///   3. Built-in defaults
    pub fn new(
        config_path: Option<PathBuf>,
        log: Option<String>,
        log_format: Option<String>,
        log_file: Option<PathBuf>,
    ) -> Self {
        let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&path).unwrap_or_default();

        let log = log.or(toml.log).unwrap_or_else(|| DEFAULT_LOG.to_string());
        let log_format = log_format
            .or(toml.log_format)
            .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string());
        let log_file = log_file.or(toml.log_file);

        let rotation = toml.rotation.unwrap_or_default();
        let cooldown = std::env::var("ATELIERD_COOLDOWN_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(rotation.cooldown_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_COOLDOWN);

        let http = toml.http.unwrap_or_default();
        let http_timeout = http
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        let http_connect_timeout = http
            .connect_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        let images = toml.images.unwrap_or_default();
        let output_dir = std::env::var("ATELIERD_OUTPUT_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or(images.output_dir);

        Self {
            log,
            log_format,
            log_file,
            cooldown,
            http_timeout,
            http_connect_timeout,
            output_dir,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new(None, None, None, None)
    }
}

// ─── Credential discovery ─────────────────────────────────────────────────────

/// Environment variable prefix for a provider's key set, e.g. `google` →
/// `GOOGLE` (`GOOGLE_API_KEY_1`, `GOOGLE_API_KEY_2`, ...).
fn env_prefix(provider: &str) -> String {
    provider.to_uppercase().replace(['-', '.'], "_")
}

/// Load the credential set for `provider` from the process environment.
///
/// Numbered keys `{PREFIX}_API_KEY_1..N` load in order until the first
/// unset or blank slot. When no numbered key exists, a bare
/// `{PREFIX}_API_KEY` is accepted as a single-key pool. An empty result
/// is not an error; the provider's pool simply reports no availability.
pub fn credentials_from_env(provider: &str) -> Vec<Credential> {
    credentials_from_lookup(provider, |name| std::env::var(name).ok())
}

fn credentials_from_lookup(
    provider: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<Credential> {
    let prefix = env_prefix(provider);
    let mut creds = Vec::new();

    for index in 1.. {
        let name = format!("{prefix}_API_KEY_{index}");
        match lookup(&name) {
            Some(secret) if !secret.trim().is_empty() => {
                creds.push(Credential::new(name, secret, provider));
            }
            _ => break,
        }
    }

    if creds.is_empty() {
        let name = format!("{prefix}_API_KEY");
        if let Some(secret) = lookup(&name) {
            if !secret.trim().is_empty() {
                creds.push(Credential::new(name, secret, provider));
            }
        }
    }

    creds
}
