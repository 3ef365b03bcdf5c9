// SPDX-License-Identifier: MIT
//! Shared plumbing for the wire adapters.
//!
//! Every adapter goes through the same HTTP client, the same artifact
//! persistence and the same base64/fence helpers, so the provider modules
//! only contain request shaping and response parsing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use once_cell::sync::OnceCell;
use rand_core::{OsRng, RngCore};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::credentials::Credential;
use crate::error::InvokeError;
use crate::providers::invoke::RequestOptions;

pub mod chat_vision;
pub mod gemini;
pub mod image_gen;
pub mod pollinations;

// ─── HTTP client ──────────────────────────────────────────────────────────────

/// Default per-request timeout. Image backends can take the better part of
/// a minute under load.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

static HTTP_CLIENT: OnceCell<Client> = OnceCell::new();

/// Install the process-wide HTTP client with tuned timeouts. Later calls
/// are no-ops; if never called, the first adapter use builds one with the
/// defaults.
pub fn init_http_client(timeout: Duration, connect_timeout: Duration) {
    let _ = HTTP_CLIENT.set(build_client(timeout, connect_timeout));
}

pub(crate) fn http_client() -> &'static Client {
    HTTP_CLIENT.get_or_init(|| build_client(DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT))
}

fn build_client(timeout: Duration, connect_timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!("failed to build tuned HTTP client, using defaults: {e:#}");
            Client::new()
        })
}

// ─── Credentials ──────────────────────────────────────────────────────────────

/// Unwrap the credential a keyed adapter was handed. `None` here means a
/// descriptor was misregistered as keyless.
pub(crate) fn require_secret<'a>(
    credential: Option<&'a Credential>,
    adapter: &str,
) -> Result<&'a str, InvokeError> {
    credential
        .map(|c| c.secret())
        .ok_or_else(|| InvokeError::Local(format!("{adapter}: invoked without a credential")))
}

// ─── Response handling ────────────────────────────────────────────────────────

/// Resolve a response into its JSON body. Non-2xx statuses become
/// [`InvokeError::Http`] with the body text preserved, since that text is
/// what rate-limit classification looks at.
pub(crate) async fn json_body(resp: reqwest::Response) -> Result<serde_json::Value, InvokeError> {
    let status = resp.status();
    let text = resp.text().await.map_err(InvokeError::from)?;
    if !status.is_success() {
        return Err(InvokeError::Http {
            status: status.as_u16(),
            body: truncate(&text, 600),
        });
    }
    serde_json::from_str(&text).map_err(|e| {
        InvokeError::Malformed(format!("invalid json ({e}): {}", truncate(&text, 200)))
    })
}

/// Resolve a response into raw bytes, for the endpoints that answer with
/// the image itself.
pub(crate) async fn byte_body(resp: reqwest::Response) -> Result<Vec<u8>, InvokeError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(InvokeError::Http {
            status: status.as_u16(),
            body: truncate(&text, 600),
        });
    }
    Ok(resp.bytes().await.map_err(InvokeError::from)?.to_vec())
}

/// Cap provider error bodies; some return whole HTML pages.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

// ─── Images ───────────────────────────────────────────────────────────────────

/// Read a local image and base64-encode it for inline transport.
pub(crate) async fn encode_image(path: &Path) -> Result<String, InvokeError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| InvokeError::Local(format!("read {}: {e}", path.display())))?;
    Ok(BASE64.encode(bytes))
}

/// Decode base64 image data, tolerating an optional `data:` URL prefix.
pub(crate) fn decode_image(data: &str) -> Result<Vec<u8>, InvokeError> {
    let raw = match data.split_once("base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    BASE64
        .decode(raw.trim())
        .map_err(|e| InvokeError::Malformed(format!("invalid base64 image data: {e}")))
}

/// Persist image bytes as `{slug}-{timestamp_millis}.png` under the
/// requested output directory (OS temp dir when unset).
pub(crate) async fn persist_png(
    slug: &str,
    bytes: &[u8],
    options: &RequestOptions,
) -> Result<PathBuf, InvokeError> {
    let dir = options.output_dir.clone().unwrap_or_else(std::env::temp_dir);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| InvokeError::Local(format!("create {}: {e}", dir.display())))?;
    let path = dir.join(format!("{slug}-{}.png", Utc::now().timestamp_millis()));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| InvokeError::Local(format!("write {}: {e}", path.display())))?;
    Ok(path)
}

/// Requested dimensions with the catalog-wide 1024×1024 default.
pub(crate) fn dims(options: &RequestOptions) -> (u32, u32) {
    (
        options.width.unwrap_or(1024),
        options.height.unwrap_or(1024),
    )
}

// ─── Text ─────────────────────────────────────────────────────────────────────

/// Strip the Markdown code fences models wrap JSON in despite instructions.
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let opened = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    opened.strip_suffix("```").unwrap_or(opened).trim()
}

/// Parse a model's JSON answer, stripping fences first.
pub(crate) fn parse_json_answer(raw: &str) -> Result<serde_json::Value, InvokeError> {
    serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| InvokeError::Malformed(format!("model returned non-JSON answer: {e}")))
}

// ─── Seeds ────────────────────────────────────────────────────────────────────

/// Random image seed in `[0, 1_000_000)`.
///
/// Uses [`OsRng`] to fill a `u32`, then reduces it into range with rejection
/// sampling to avoid modulo bias.
pub(crate) fn random_seed() -> u64 {
    // Rejection-sampling loop: discard values that would introduce modulo bias.
    // On average fewer than 2 iterations are needed.
    let range: u32 = 1_000_000;
    let threshold = u32::MAX - (u32::MAX % range);
    loop {
        let n = OsRng.next_u32();
        if n < threshold {
            return (n % range) as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_stripping_handles_the_common_shapes() {
        assert_eq!(strip_code_fences(r#"{"a":1}"#), r#"{"a":1}"#);
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), r#"{"a":1}"#);
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), r#"{"a":1}"#);
        assert_eq!(strip_code_fences("  {\"a\":1}  "), r#"{"a":1}"#);
    }

    #[test]
    fn parse_json_answer_rejects_prose() {
        assert!(parse_json_answer("```json\n{\"ok\":true}\n```").is_ok());
        assert!(parse_json_answer("Sorry, I cannot help with that.").is_err());
    }

    #[test]
    fn decode_image_tolerates_data_url_prefix() {
        let plain = BASE64.encode(b"png-bytes");
        assert_eq!(decode_image(&plain).expect("plain"), b"png-bytes");

        let prefixed = format!("data:image/png;base64,{plain}");
        assert_eq!(decode_image(&prefixed).expect("prefixed"), b"png-bytes");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let t = truncate("héllo wörld", 2); // byte 2 splits 'é'
        assert!(t.starts_with('h'));
        assert!(t.ends_with('…'));
    }

    #[tokio::test]
    async fn persist_png_names_artifacts_by_slug() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = RequestOptions {
            output_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let path = persist_png("unit", b"\x89PNG", &options).await.expect("persist");
        assert!(path.exists());
        let name = path.file_name().and_then(|n| n.to_str()).expect("file name");
        assert!(name.starts_with("unit-"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn random_seed_stays_in_range() {
        for _ in 0..32 {
            assert!(random_seed() < 1_000_000);
        }
    }

    #[test]
    fn random_seed_varies_across_residue_classes() {
        // A degenerate generator can stay in range while pinning every
        // draw to one residue class. Uniform draws land 64 samples in a
        // single class mod 25 with probability 25^-63.
        let classes: std::collections::HashSet<u64> =
            (0..64).map(|_| random_seed() % 25).collect();
        assert!(classes.len() > 1, "seeds collapsed into one residue class");
    }
}
