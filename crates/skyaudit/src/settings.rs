// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk settings file: identity provider, federation, chat sink and the
//! startup task list.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::task::TaskSpec;

/// Placeholder shown in place of secrets on read.
pub const REDACTED: &str = "********";

/// Complete settings file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub identity: IdentitySettings,
    #[serde(default)]
    pub federation: FederationSettings,
    #[serde(default)]
    pub slack: SlackSettings,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

/// OpenID Connect relying-party settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentitySettings {
    pub provider_url: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub redirect_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// ID-token claim naming the cloud account a login belongs to.
    #[serde(default = "default_account_claim")]
    pub account_claim: String,
}

impl fmt::Debug for IdentitySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentitySettings")
            .field("provider_url", &self.provider_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("account_claim", &self.account_claim)
            .finish()
    }
}

/// Web-identity federation into target accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationSettings {
    #[serde(default = "default_role_name")]
    pub role_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_session_duration")]
    pub session_duration_secs: u32,
    /// Override for the cloud API endpoint (local emulators).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
}

impl Default for FederationSettings {
    fn default() -> Self {
        Self {
            role_name: default_role_name(),
            region: default_region(),
            session_duration_secs: default_session_duration(),
            endpoint_url: None,
        }
    }
}

impl FederationSettings {
    pub fn role_arn(&self, account: &str) -> String {
        format!("arn:aws:iam::{account}:role/{}", self.role_name)
    }
}

/// Slack notification sink. Without a token, reports are only logged.
#[derive(Clone, Serialize, Deserialize)]
pub struct SlackSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_slack_api_url")]
    pub api_url: String,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self { token: None, api_url: default_slack_api_url() }
    }
}

impl fmt::Debug for SlackSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackSettings")
            .field("token", &self.token.as_deref().map(redact))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Body accepted by the settings update endpoint.
///
/// Task definitions are not part of it. A secret that is empty or still
/// carries the redaction placeholder keeps its current value.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsUpdate {
    pub identity: IdentitySettings,
    #[serde(default)]
    pub federation: Option<FederationSettings>,
    #[serde(default)]
    pub slack: Option<SlackSettings>,
}

impl Settings {
    /// Copy with every secret replaced by [`REDACTED`].
    pub fn redacted(&self) -> Settings {
        let mut out = self.clone();
        if !out.identity.client_secret.is_empty() {
            out.identity.client_secret = REDACTED.to_owned();
        }
        if out.slack.token.is_some() {
            out.slack.token = Some(REDACTED.to_owned());
        }
        out
    }

    /// Apply an update, carrying over secrets the caller did not resend.
    pub fn apply(&self, update: SettingsUpdate) -> Settings {
        let mut identity = update.identity;
        if is_placeholder(&identity.client_secret) {
            identity.client_secret = self.identity.client_secret.clone();
        }

        let mut slack = update.slack.unwrap_or_else(|| self.slack.clone());
        if slack.token.as_deref().is_some_and(is_placeholder) {
            slack.token = self.slack.token.clone();
        }

        Settings {
            identity,
            federation: update.federation.unwrap_or_else(|| self.federation.clone()),
            slack,
            tasks: self.tasks.clone(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let id = &self.identity;
        if id.provider_url.trim().is_empty() {
            anyhow::bail!("identity.provider_url is required");
        }
        if id.client_id.trim().is_empty() {
            anyhow::bail!("identity.client_id is required");
        }
        if id.redirect_url.trim().is_empty() {
            anyhow::bail!("identity.redirect_url is required");
        }
        if self.federation.role_name.trim().is_empty() {
            anyhow::bail!("federation.role_name is required");
        }
        if !(900..=43_200).contains(&self.federation.session_duration_secs) {
            anyhow::bail!("federation.session_duration_secs must be between 900 and 43200");
        }
        Ok(())
    }
}

/// Load settings from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<Settings> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&contents)
        .with_context(|| format!("parsing settings file {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

/// Save settings atomically (unique tmp file + rename).
///
/// The tmp name carries PID and a counter so concurrent saves never share a
/// partially written file.
pub fn save(path: &Path, settings: &Settings) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_string_pretty(settings)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        ".{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("replacing {}", path.display()));
    }
    Ok(())
}

fn is_placeholder(secret: &str) -> bool {
    secret.is_empty() || secret == REDACTED
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_owned(), "profile".to_owned(), "email".to_owned()]
}

fn default_account_claim() -> String {
    "account_id".to_owned()
}

fn default_role_name() -> String {
    "ReadOnlyRole".to_owned()
}

fn default_region() -> String {
    "us-east-1".to_owned()
}

fn default_session_duration() -> u32 {
    900
}

fn default_slack_api_url() -> String {
    "https://slack.com/api".to_owned()
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
