// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only audit operations and the `(service, command)` registry that
//! resolves them.

pub mod iam;
pub mod storage;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use aws_credential_types::Credentials;

use crate::credential::DelegatedCredential;
use crate::settings::FederationSettings;

pub type AuditFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + 'a>>;

/// One read-only check run against a single account.
pub trait AuditOperation: Send + Sync {
    /// First line of the report.
    fn headline(&self) -> &'static str;

    /// Closing line of the report, if any.
    fn footer(&self) -> Option<&'static str> {
        None
    }

    /// Findings for the account the credential is scoped to.
    fn audit<'a>(&'a self, credential: &'a DelegatedCredential) -> AuditFuture<'a>;
}

/// Where the cloud API clients connect.
#[derive(Debug, Clone)]
pub struct ApiTarget {
    pub region: String,
    pub endpoint_url: Option<String>,
}

impl ApiTarget {
    pub fn from_settings(settings: &FederationSettings) -> Self {
        Self { region: settings.region.clone(), endpoint_url: settings.endpoint_url.clone() }
    }

    pub(crate) fn endpoint(&self) -> Option<&str> {
        self.endpoint_url.as_deref().filter(|e| !e.is_empty())
    }
}

/// Static credentials provider for a delegated credential.
pub(crate) fn credentials_for(credential: &DelegatedCredential) -> Credentials {
    Credentials::new(
        &credential.access_key_id,
        &credential.secret_access_key,
        Some(credential.session_token.clone()),
        credential.expiration,
        "skyaudit-delegated",
    )
}

/// Maps `(service, command)` pairs to operations. Keys are case-insensitive.
#[derive(Default, Clone)]
pub struct OperationRegistry {
    ops: BTreeMap<(String, String), Arc<dyn AuditOperation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in identity and storage checks.
    pub fn builtin(target: &ApiTarget) -> Self {
        let mut reg = Self::new();

        let users: Arc<dyn AuditOperation> = Arc::new(iam::IamUsers::new(target.clone()));
        for service in ["iam", "identity"] {
            for command in ["list_iam_users", "list_users"] {
                reg.register(service, command, Arc::clone(&users));
            }
        }

        let buckets: Arc<dyn AuditOperation> = Arc::new(storage::EmptyBuckets::new(target.clone()));
        for service in ["s3", "storage"] {
            for command in ["check_unused_buckets", "check_unused"] {
                reg.register(service, command, Arc::clone(&buckets));
            }
        }
        reg
    }

    pub fn register(&mut self, service: &str, command: &str, op: Arc<dyn AuditOperation>) {
        self.ops.insert(key(service, command), op);
    }

    pub fn resolve(&self, service: &str, command: &str) -> Option<Arc<dyn AuditOperation>> {
        self.ops.get(&key(service, command)).cloned()
    }

    /// Registered pairs as `service/command`, sorted.
    pub fn names(&self) -> Vec<String> {
        self.ops.keys().map(|(s, c)| format!("{s}/{c}")).collect()
    }
}

fn key(service: &str, command: &str) -> (String, String) {
    (service.trim().to_ascii_lowercase(), command.trim().to_ascii_lowercase())
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
