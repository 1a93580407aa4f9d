// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat sinks for run reports.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use zeroize::Zeroizing;

use crate::settings::SlackSettings;

pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Delivers a message to a channel. Callers log failures; nothing retries.
pub trait Notifier: Send + Sync {
    fn post<'a>(&'a self, channel: &'a str, text: &'a str) -> NotifyFuture<'a>;
}

/// Sink for the configured Slack settings: the Web API when a token is set,
/// otherwise the log.
pub fn from_settings(http: &reqwest::Client, settings: &SlackSettings) -> Arc<dyn Notifier> {
    match settings.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => Arc::new(SlackNotifier::new(http.clone(), &settings.api_url, token)),
        None => Arc::new(LogNotifier),
    }
}

/// Posts through Slack `chat.postMessage`.
pub struct SlackNotifier {
    http: reqwest::Client,
    api_url: String,
    token: Zeroizing<String>,
}

#[derive(Debug, Deserialize)]
struct SlackReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(http: reqwest::Client, api_url: &str, token: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_owned(),
            token: Zeroizing::new(token.to_owned()),
        }
    }

    async fn send(&self, channel: &str, text: &str) -> anyhow::Result<()> {
        let url = format!("{}/chat.postMessage", self.api_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.token.as_str())
            .json(&serde_json::json!({ "channel": channel, "text": text }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("chat.postMessage failed ({status})");
        }
        // Slack reports API errors in the body with a 200.
        let reply: SlackReply = resp.json().await?;
        if !reply.ok {
            anyhow::bail!("chat.postMessage rejected: {}", reply.error.as_deref().unwrap_or("unknown"));
        }
        Ok(())
    }
}

impl Notifier for SlackNotifier {
    fn post<'a>(&'a self, channel: &'a str, text: &'a str) -> NotifyFuture<'a> {
        Box::pin(self.send(channel, text))
    }
}

/// Writes reports to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn post<'a>(&'a self, channel: &'a str, text: &'a str) -> NotifyFuture<'a> {
        Box::pin(async move {
            tracing::info!(channel, report = text, "report (no chat sink configured)");
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
