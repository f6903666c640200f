//! Orchestrator configuration: TOML file plus environment overrides.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Default forensic capture script. Rendered with `{instance_id}`,
/// `{region}` and `{bucket}` before dispatch: capture, upload, cleanup.
pub const DEFAULT_FORENSICS_SCRIPT: &str = r#"#!/bin/bash
set -euo pipefail
ts=$(date +%s)
out=/tmp/forensics-{instance_id}-$ts
mkdir -p "$out"
ps auxww > "$out/processes.txt"
ss -pantu > "$out/sockets.txt"
last -n 100 > "$out/logins.txt"
cp /var/log/auth.log "$out/auth.log" 2>/dev/null || true
tar -czf "$out.tar.gz" -C "$out" .
aws s3 cp "$out.tar.gz" "s3://{bucket}/{instance_id}/$ts.tar.gz" --region {region}
rm -rf "$out" "$out.tar.gz"
"#;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub signing_secret: String,
    pub approval_base_url: String,
    pub token_ttl_hours: i64,
    pub poll_interval_secs: u64,
    pub max_wait_secs: u64,
    pub lock_prefix: String,
    pub quarantine_param_key: String,
    pub evidence_bucket: String,
    pub default_region: String,
    pub forensics_script: String,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    approval: ApprovalSection,
    #[serde(default)]
    remote: RemoteSection,
    #[serde(default)]
    containment: ContainmentSection,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_db_path")]
    db_path: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApprovalSection {
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_token_ttl_hours")]
    token_ttl_hours: i64,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteSection {
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,
    #[serde(default = "default_max_wait_secs")]
    max_wait_secs: u64,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContainmentSection {
    #[serde(default = "default_lock_prefix")]
    lock_prefix: String,
    #[serde(default = "default_quarantine_param_key")]
    quarantine_param_key: String,
    #[serde(default = "default_evidence_bucket")]
    evidence_bucket: String,
    #[serde(default = "default_region")]
    default_region: String,
    #[serde(default)]
    forensics_script: Option<String>,
}

impl Default for ContainmentSection {
    fn default() -> Self {
        Self {
            lock_prefix: default_lock_prefix(),
            quarantine_param_key: default_quarantine_param_key(),
            evidence_bucket: default_evidence_bucket(),
            default_region: default_region(),
            forensics_script: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "lockdown.db".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_poll_interval_secs() -> u64 {
    7
}

fn default_max_wait_secs() -> u64 {
    600
}

fn default_lock_prefix() -> String {
    "/security/lock/".to_string()
}

fn default_quarantine_param_key() -> String {
    "/security/quarantine-sg-id".to_string()
}

fn default_evidence_bucket() -> String {
    "forensic-evidence".to_string()
}

fn default_region() -> String {
    "ap-southeast-1".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_file_config(FileConfig::default())
    }
}

impl OrchestratorConfig {
    /// Load from `LOCKDOWN_CONFIG` (or `./lockdown.toml` when present), then
    /// apply environment overrides. Missing file means defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var("LOCKDOWN_CONFIG").unwrap_or_else(|_| "lockdown.toml".to_string());
        let file = if Path::new(&path).exists() {
            let raw = fs::read_to_string(&path)?;
            toml::from_str(&raw)?
        } else {
            FileConfig::default()
        };

        let mut config = Self::from_file_config(file);
        config.apply_env();
        Ok(config)
    }

    fn from_file_config(file: FileConfig) -> Self {
        Self {
            host: file.server.host,
            port: file.server.port,
            db_path: file.server.db_path,
            signing_secret: default_secret(),
            approval_base_url: file.approval.base_url,
            token_ttl_hours: file.approval.token_ttl_hours,
            poll_interval_secs: file.remote.poll_interval_secs,
            max_wait_secs: file.remote.max_wait_secs,
            lock_prefix: file.containment.lock_prefix,
            quarantine_param_key: file.containment.quarantine_param_key,
            evidence_bucket: file.containment.evidence_bucket,
            default_region: file.containment.default_region,
            forensics_script: file
                .containment
                .forensics_script
                .unwrap_or_else(|| DEFAULT_FORENSICS_SCRIPT.to_string()),
        }
    }

    fn apply_env(&mut self) {
        if let Ok(secret) = env::var("LOCKDOWN_SIGNING_SECRET") {
            if !secret.trim().is_empty() {
                self.signing_secret = secret;
            }
        }
        if let Ok(host) = env::var("LOCKDOWN_HTTP_HOST") {
            if !host.trim().is_empty() {
                self.host = host;
            }
        }
        if let Ok(base_url) = env::var("LOCKDOWN_APPROVAL_BASE_URL") {
            if !base_url.trim().is_empty() {
                self.approval_base_url = base_url;
            }
        }
    }
}

fn default_secret() -> String {
    "secret-key-change-me".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_field() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.poll_interval_secs, 7);
        assert_eq!(config.max_wait_secs, 600);
        assert_eq!(config.token_ttl_hours, 24);
        assert_eq!(config.lock_prefix, "/security/lock/");
        assert_eq!(config.quarantine_param_key, "/security/quarantine-sg-id");
        assert!(config.forensics_script.contains("{instance_id}"));
    }

    #[test]
    fn file_sections_override_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            [server]
            port = 9090

            [approval]
            base_url = "https://approvals.internal"
            token_ttl_hours = 4

            [remote]
            poll_interval_secs = 2

            [containment]
            evidence_bucket = "ir-evidence"
            "#,
        )
        .unwrap();
        let config = OrchestratorConfig::from_file_config(file);
        assert_eq!(config.port, 9090);
        assert_eq!(config.approval_base_url, "https://approvals.internal");
        assert_eq!(config.token_ttl_hours, 4);
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.max_wait_secs, 600);
        assert_eq!(config.evidence_bucket, "ir-evidence");
        assert_eq!(config.host, "127.0.0.1");
    }
}
