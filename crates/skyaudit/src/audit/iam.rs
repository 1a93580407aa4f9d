// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Long-lived IAM users that should be migrated to federated roles.

use aws_sdk_iam::config::{BehaviorVersion, Region};
use aws_sdk_iam::error::DisplayErrorContext;

use crate::audit::{credentials_for, ApiTarget, AuditFuture, AuditOperation};
use crate::credential::DelegatedCredential;

pub struct IamUsers {
    target: ApiTarget,
}

impl IamUsers {
    pub fn new(target: ApiTarget) -> Self {
        Self { target }
    }

    fn client(&self, credential: &DelegatedCredential) -> aws_sdk_iam::Client {
        let mut builder = aws_sdk_iam::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.target.region.clone()))
            .credentials_provider(credentials_for(credential));
        if let Some(endpoint) = self.target.endpoint() {
            builder = builder.endpoint_url(endpoint);
        }
        aws_sdk_iam::Client::from_conf(builder.build())
    }

    async fn list_users(&self, credential: &DelegatedCredential) -> anyhow::Result<Vec<String>> {
        let client = self.client(credential);
        let mut users = Vec::new();
        let mut pages = client.list_users().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| anyhow::anyhow!("list users: {}", DisplayErrorContext(&e)))?;
            users.extend(page.users().iter().map(|u| u.user_name().to_owned()));
        }
        users.sort();
        Ok(users)
    }
}

impl AuditOperation for IamUsers {
    fn headline(&self) -> &'static str {
        "IAM users that still exist in accounts:"
    }

    fn footer(&self) -> Option<&'static str> {
        Some(
            "Please delete these IAM users as the organization is moving to OIDC roles for AWS authentication.",
        )
    }

    fn audit<'a>(&'a self, credential: &'a DelegatedCredential) -> AuditFuture<'a> {
        Box::pin(self.list_users(credential))
    }
}
