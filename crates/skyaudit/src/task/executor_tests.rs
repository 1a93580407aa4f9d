// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::audit::{AuditFuture, AuditOperation};
use crate::credential::{epoch_secs, DelegatedCredential, TokenSet};
use crate::notify::NotifyFuture;
use crate::task::recurrence::Recurrence;
use crate::task::TaskSpec;
use crate::test_support::{self, MemoryNotifier, RecordingExchange, ScriptedProvider};

use super::*;

/// Reports one finding per account, except accounts ending in `9` which fail.
struct PerAccount {
    footer: Option<&'static str>,
}

impl AuditOperation for PerAccount {
    fn headline(&self) -> &'static str {
        "Things found:"
    }

    fn footer(&self) -> Option<&'static str> {
        self.footer
    }

    fn audit<'a>(&'a self, credential: &'a DelegatedCredential) -> AuditFuture<'a> {
        Box::pin(async move {
            let account = &credential.account_id;
            if account.ends_with('9') {
                anyhow::bail!("throttled");
            }
            if account.starts_with('0') {
                return Ok(vec![]);
            }
            Ok(vec![format!("thing-{account}")])
        })
    }
}

struct Harness {
    executor: JobExecutor,
    broker: Arc<CredentialBroker>,
    exchange: Arc<RecordingExchange>,
    notifier: Arc<MemoryNotifier>,
}

fn harness() -> anyhow::Result<Harness> {
    let provider = Arc::new(ScriptedProvider::default());
    let exchange = Arc::new(RecordingExchange::default());
    let broker = test_support::broker(&provider, &exchange)?;
    let notifier = Arc::new(MemoryNotifier::default());
    let executor = JobExecutor::new(Arc::clone(&broker), Arc::clone(&notifier) as Arc<dyn Notifier>);
    Ok(Harness { executor, broker, exchange, notifier })
}

async fn login(broker: &CredentialBroker, account: &str) -> anyhow::Result<()> {
    let tokens = TokenSet {
        access_token: format!("at-{account}"),
        refresh_token: Some("rt".to_owned()),
        id_token: Some(format!("id-{account}")),
        token_type: Some("Bearer".to_owned()),
        expires_at: epoch_secs() + 3600,
    };
    broker.store(account, &tokens).await?;
    Ok(())
}

fn task(accounts: &[&str], footer: Option<&'static str>) -> anyhow::Result<Task> {
    let spec = TaskSpec {
        name: "nightly".to_owned(),
        accounts: accounts.iter().map(|a| (*a).to_owned()).collect(),
        service: "test".to_owned(),
        command: "things".to_owned(),
        schedule: "@daily".to_owned(),
        channel: "#ops".to_owned(),
    };
    Ok(Task::new("task-1".to_owned(), spec, Recurrence::parse("@daily")?, Arc::new(PerAccount { footer })))
}

#[tokio::test]
async fn all_accounts_succeed() -> anyhow::Result<()> {
    let h = harness()?;
    login(&h.broker, "111111111111").await?;
    login(&h.broker, "222222222222").await?;

    let report = h.executor.run(&task(&["111111111111", "222222222222"], None)?).await;
    assert!(report.is_clean());
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.succeeded[0].findings, ["thing-111111111111"]);
    assert_eq!(
        report.text,
        "*nightly*\nThings found:\nAccount 111111111111:\n- thing-111111111111\nAccount 222222222222:\n- thing-222222222222"
    );
    assert_eq!(h.exchange.seen.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn missing_login_is_partial_failure() -> anyhow::Result<()> {
    let h = harness()?;
    login(&h.broker, "111111111111").await?;

    let report = h.executor.run(&task(&["111111111111", "222222222222"], None)?).await;
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].account, "222222222222");
    assert!(report.failed[0].reason.contains("log in first"));
    assert!(report.text.contains("Failed accounts:\n- 222222222222: no token cached"));
    Ok(())
}

#[tokio::test]
async fn audit_and_exchange_failures_are_isolated() -> anyhow::Result<()> {
    let h = harness()?;
    for account in ["111111111111", "222222222229", "333333333333"] {
        login(&h.broker, account).await?;
    }
    h.exchange.fail_for("333333333333");

    let report = h.executor.run(&task(&["111111111111", "222222222229", "333333333333"], None)?).await;
    assert_eq!(report.succeeded.len(), 1);
    let failed: Vec<_> = report.failed.iter().map(|f| f.account.as_str()).collect();
    assert_eq!(failed, ["222222222229", "333333333333"]);
    assert!(report.failed[0].reason.contains("throttled"));
    assert!(report.failed[1].reason.contains("AccessDenied"));
    Ok(())
}

#[tokio::test]
async fn footer_only_with_findings() -> anyhow::Result<()> {
    let h = harness()?;
    login(&h.broker, "011111111111").await?;
    login(&h.broker, "111111111111").await?;

    let quiet = h.executor.run(&task(&["011111111111"], Some("Clean these up."))?).await;
    assert!(quiet.text.ends_with("Account 011111111111: nothing found"), "{}", quiet.text);

    let noisy = h.executor.run(&task(&["111111111111"], Some("Clean these up."))?).await;
    assert!(noisy.text.ends_with("\n\nClean these up."), "{}", noisy.text);
    Ok(())
}

#[tokio::test]
async fn report_is_posted_to_channel() -> anyhow::Result<()> {
    let h = harness()?;
    login(&h.broker, "111111111111").await?;

    let report = h.executor.run_and_notify(&task(&["111111111111"], None)?).await;
    let posts = h.notifier.posts.lock().unwrap().clone();
    assert_eq!(posts, [("#ops".to_owned(), report.text)]);
    Ok(())
}

#[tokio::test]
async fn notifier_failure_still_returns_report() -> anyhow::Result<()> {
    struct Broken;
    impl Notifier for Broken {
        fn post<'a>(&'a self, _channel: &'a str, _text: &'a str) -> NotifyFuture<'a> {
            Box::pin(async { Err::<(), _>(anyhow::anyhow!("slack down")) })
        }
    }

    let h = harness()?;
    login(&h.broker, "111111111111").await?;
    h.executor.set_notifier(Arc::new(Broken)).await;

    let report = h.executor.run_and_notify(&task(&["111111111111"], None)?).await;
    assert!(report.is_clean());
    assert!(h.notifier.posts.lock().unwrap().is_empty());
    Ok(())
}
