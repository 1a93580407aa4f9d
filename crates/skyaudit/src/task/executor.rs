// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs one task across its accounts and turns the outcome into a report.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::credential::broker::CredentialBroker;
use crate::notify::Notifier;
use crate::task::Task;

/// One account whose credential or audit call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("account {account}: {reason}")]
pub struct PartialAccountFailure {
    pub account: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountFindings {
    pub account: String,
    pub findings: Vec<String>,
}

/// Outcome of one run, split into accounts that succeeded and failed.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub task_id: String,
    pub task_name: String,
    pub channel: String,
    pub started_at: DateTime<Local>,
    pub succeeded: Vec<AccountFindings>,
    pub failed: Vec<PartialAccountFailure>,
    pub text: String,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct JobExecutor {
    broker: Arc<CredentialBroker>,
    notifier: RwLock<Arc<dyn Notifier>>,
}

impl JobExecutor {
    pub fn new(broker: Arc<CredentialBroker>, notifier: Arc<dyn Notifier>) -> Self {
        Self { broker, notifier: RwLock::new(notifier) }
    }

    pub async fn set_notifier(&self, notifier: Arc<dyn Notifier>) {
        *self.notifier.write().await = notifier;
    }

    /// Audit every account of `task` concurrently. Per-account failures are
    /// recorded in the report; they never abort the other accounts.
    pub async fn run(&self, task: &Task) -> RunReport {
        let started_at = Local::now();
        let outcomes =
            futures_util::future::join_all(task.accounts.iter().map(|account| self.audit_account(task, account)))
                .await;

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(found) => succeeded.push(found),
                Err(failure) => failed.push(failure),
            }
        }

        let text = render(task, &succeeded, &failed);
        RunReport {
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            channel: task.channel.clone(),
            started_at,
            succeeded,
            failed,
            text,
        }
    }

    /// [`run`](Self::run), then post the report to the task's channel.
    pub async fn run_and_notify(&self, task: &Task) -> RunReport {
        let report = self.run(task).await;
        tracing::info!(
            task_id = %task.id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "task run finished"
        );

        let notifier = Arc::clone(&*self.notifier.read().await);
        if let Err(e) = notifier.post(&task.channel, &report.text).await {
            tracing::warn!(task_id = %task.id, channel = %task.channel, err = %e, "report delivery failed");
        }
        report
    }

    async fn audit_account(&self, task: &Task, account: &str) -> Result<AccountFindings, PartialAccountFailure> {
        let fail = |reason: String| {
            tracing::warn!(task_id = %task.id, account, err = %reason, "account audit failed");
            PartialAccountFailure { account: account.to_owned(), reason }
        };

        let credential = self.broker.mint_delegated_credential(account).await.map_err(|e| fail(e.to_string()))?;
        let findings = task.operation().audit(&credential).await.map_err(|e| fail(format!("{e:#}")))?;
        Ok(AccountFindings { account: account.to_owned(), findings })
    }
}

fn render(task: &Task, succeeded: &[AccountFindings], failed: &[PartialAccountFailure]) -> String {
    let op = task.operation();
    let mut text = format!("*{}*\n{}\n", task.name, op.headline());

    for found in succeeded {
        if found.findings.is_empty() {
            let _ = writeln!(text, "Account {}: nothing found", found.account);
            continue;
        }
        let _ = writeln!(text, "Account {}:", found.account);
        for item in &found.findings {
            let _ = writeln!(text, "- {item}");
        }
    }

    if !failed.is_empty() {
        text.push_str("\nFailed accounts:\n");
        for failure in failed {
            let _ = writeln!(text, "- {}: {}", failure.account, failure.reason);
        }
    }

    if let Some(footer) = op.footer() {
        if succeeded.iter().any(|f| !f.findings.is_empty()) {
            let _ = write!(text, "\n{footer}\n");
        }
    }
    text.trim_end().to_owned()
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
