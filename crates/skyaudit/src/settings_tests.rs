// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const MINIMAL: &str = r##"{
  "identity": {
    "provider_url": "https://idp.example.com",
    "client_id": "skyaudit",
    "client_secret": "s3cret",
    "redirect_url": "http://localhost:9090/auth/callback"
  },
  "tasks": [
    {
      "name": "empty buckets",
      "accounts": ["111111111111"],
      "service": "storage",
      "command": "check_unused",
      "schedule": "0 9 * * *",
      "channel": "#ops"
    }
  ]
}"##;

fn minimal() -> anyhow::Result<Settings> {
    Ok(serde_json::from_str(MINIMAL)?)
}

#[test]
fn defaults_fill_missing_sections() -> anyhow::Result<()> {
    let s = minimal()?;
    assert_eq!(s.identity.scopes, vec!["openid", "profile", "email"]);
    assert_eq!(s.identity.account_claim, "account_id");
    assert_eq!(s.federation.role_name, "ReadOnlyRole");
    assert_eq!(s.federation.region, "us-east-1");
    assert_eq!(s.federation.session_duration_secs, 900);
    assert_eq!(s.slack.api_url, "https://slack.com/api");
    assert!(s.slack.token.is_none());
    assert_eq!(s.tasks.len(), 1);
    assert_eq!(s.tasks[0].channel, "#ops");
    s.validate()?;
    Ok(())
}

#[test]
fn role_arn_targets_account() -> anyhow::Result<()> {
    let s = minimal()?;
    assert_eq!(
        s.federation.role_arn("222222222222"),
        "arn:aws:iam::222222222222:role/ReadOnlyRole"
    );
    Ok(())
}

#[test]
fn redacted_hides_secrets() -> anyhow::Result<()> {
    let mut s = minimal()?;
    s.slack.token = Some("xoxb-token".to_owned());
    let r = s.redacted();
    assert_eq!(r.identity.client_secret, REDACTED);
    assert_eq!(r.slack.token.as_deref(), Some(REDACTED));
    let json = serde_json::to_string(&r)?;
    assert!(!json.contains("s3cret"));
    assert!(!json.contains("xoxb-token"));
    Ok(())
}

#[test]
fn debug_output_hides_secrets() -> anyhow::Result<()> {
    let mut s = minimal()?;
    s.slack.token = Some("xoxb-token".to_owned());
    let dbg = format!("{s:?}");
    assert!(!dbg.contains("s3cret"));
    assert!(!dbg.contains("xoxb-token"));
    Ok(())
}

#[test]
fn apply_keeps_unsent_secrets_and_tasks() -> anyhow::Result<()> {
    let mut current = minimal()?;
    current.slack.token = Some("xoxb-token".to_owned());

    let update: SettingsUpdate = serde_json::from_value(serde_json::json!({
        "identity": {
            "provider_url": "https://idp2.example.com",
            "client_id": "skyaudit2",
            "client_secret": REDACTED,
            "redirect_url": "http://localhost:9090/auth/callback"
        },
        "slack": { "token": "", "api_url": "http://127.0.0.1:1/api" }
    }))?;
    let next = current.apply(update);

    assert_eq!(next.identity.provider_url, "https://idp2.example.com");
    assert_eq!(next.identity.client_secret, "s3cret");
    assert_eq!(next.slack.token.as_deref(), Some("xoxb-token"));
    assert_eq!(next.slack.api_url, "http://127.0.0.1:1/api");
    assert_eq!(next.federation.role_name, "ReadOnlyRole");
    assert_eq!(next.tasks, current.tasks);
    Ok(())
}

#[yare::parameterized(
    no_provider = { "provider_url", "" },
    no_client   = { "client_id", " " },
    no_redirect = { "redirect_url", "" },
)]
fn validate_rejects_blank_identity_fields(field: &str, value: &str) {
    let mut s = minimal().unwrap();
    match field {
        "provider_url" => s.identity.provider_url = value.to_owned(),
        "client_id" => s.identity.client_id = value.to_owned(),
        _ => s.identity.redirect_url = value.to_owned(),
    }
    let err = s.validate().unwrap_err();
    assert!(err.to_string().contains(field), "{err}");
}

#[test]
fn validate_rejects_out_of_range_session() -> anyhow::Result<()> {
    let mut s = minimal()?;
    s.federation.session_duration_secs = 60;
    assert!(s.validate().is_err());
    Ok(())
}

#[test]
fn save_then_load_round_trips() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("skyaudit.json");
    let mut s = minimal()?;
    s.federation.region = "eu-west-1".to_owned();

    save(&path, &s)?;
    let loaded = load(&path)?;
    assert_eq!(loaded.federation.region, "eu-west-1");
    assert_eq!(loaded.identity.client_secret, "s3cret");
    assert_eq!(loaded.tasks, s.tasks);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[test]
fn load_reports_missing_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let err = load(&dir.path().join("absent.json")).unwrap_err();
    assert!(format!("{err:#}").contains("reading settings file"));
    Ok(())
}
