// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Web-identity federation: trade an identity token for temporary,
//! account-scoped cloud credentials.

use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use aws_sdk_sts::config::{BehaviorVersion, Region};
use aws_sdk_sts::error::DisplayErrorContext;

use crate::credential::{epoch_secs, DelegatedCredential};
use crate::settings::FederationSettings;

pub type ExchangeFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<DelegatedCredential>> + Send + 'a>>;

/// Exchanges a web-identity token for a delegated credential in one account.
pub trait CredentialExchange: Send + Sync {
    fn exchange<'a>(&'a self, account: &'a str, web_identity_token: &'a str) -> ExchangeFuture<'a>;
}

/// STS `AssumeRoleWithWebIdentity` into `arn:aws:iam::{account}:role/{role_name}`.
///
/// The call is unsigned, so the client carries no credentials of its own.
pub struct StsExchange {
    client: aws_sdk_sts::Client,
    settings: FederationSettings,
}

impl StsExchange {
    pub fn new(settings: &FederationSettings) -> Self {
        let mut builder = aws_sdk_sts::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(ref endpoint) = settings.endpoint_url {
            if !endpoint.is_empty() {
                builder = builder.endpoint_url(endpoint);
            }
        }
        Self { client: aws_sdk_sts::Client::from_conf(builder.build()), settings: settings.clone() }
    }

    async fn assume(&self, account: &str, token: &str) -> anyhow::Result<DelegatedCredential> {
        let role_arn = self.settings.role_arn(account);
        let duration = i32::try_from(self.settings.session_duration_secs).unwrap_or(i32::MAX);

        let out = self
            .client
            .assume_role_with_web_identity()
            .role_arn(&role_arn)
            .role_session_name(session_name())
            .web_identity_token(token)
            .duration_seconds(duration)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("assume {role_arn}: {}", DisplayErrorContext(&e)))?;

        let creds = out
            .credentials()
            .ok_or_else(|| anyhow::anyhow!("assume {role_arn}: response carried no credentials"))?;

        tracing::debug!(account, role = %role_arn, "minted delegated credential");
        Ok(DelegatedCredential {
            account_id: account.to_owned(),
            access_key_id: creds.access_key_id().to_owned(),
            secret_access_key: creds.secret_access_key().to_owned(),
            session_token: creds.session_token().to_owned(),
            expiration: SystemTime::try_from(*creds.expiration()).ok(),
        })
    }
}

impl CredentialExchange for StsExchange {
    fn exchange<'a>(&'a self, account: &'a str, web_identity_token: &'a str) -> ExchangeFuture<'a> {
        Box::pin(self.assume(account, web_identity_token))
    }
}

fn session_name() -> String {
    format!("skyaudit-{}", epoch_secs())
}
