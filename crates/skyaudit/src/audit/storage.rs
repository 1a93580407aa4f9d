// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage buckets that hold no objects.

use std::collections::HashMap;

use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;

use crate::audit::{credentials_for, ApiTarget, AuditFuture, AuditOperation};
use crate::credential::DelegatedCredential;

pub struct EmptyBuckets {
    target: ApiTarget,
}

impl EmptyBuckets {
    pub fn new(target: ApiTarget) -> Self {
        Self { target }
    }

    fn client(&self, credential: &DelegatedCredential, region: &str) -> aws_sdk_s3::Client {
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .credentials_provider(credentials_for(credential));
        if let Some(endpoint) = self.target.endpoint() {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        aws_sdk_s3::Client::from_conf(builder.build())
    }

    async fn find_empty(&self, credential: &DelegatedCredential) -> anyhow::Result<Vec<String>> {
        let home = self.client(credential, &self.target.region);
        let listed = home
            .list_buckets()
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("list buckets: {}", DisplayErrorContext(&e)))?;

        // Bucket reads must go to the bucket's own region.
        let mut regional: HashMap<String, aws_sdk_s3::Client> = HashMap::new();
        let mut empty = Vec::new();
        for bucket in listed.buckets() {
            let Some(name) = bucket.name() else { continue };
            let region = bucket.bucket_region().unwrap_or(self.target.region.as_str());
            let client: &aws_sdk_s3::Client = if region == self.target.region {
                &home
            } else {
                regional
                    .entry(region.to_owned())
                    .or_insert_with(|| self.client(credential, region))
            };

            match client.list_objects_v2().bucket(name).max_keys(1).send().await {
                Ok(out) if out.key_count().unwrap_or(0) == 0 && out.contents().is_empty() => {
                    empty.push(name.to_owned());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        account = %credential.account_id,
                        bucket = name,
                        err = %DisplayErrorContext(&e),
                        "could not inspect bucket"
                    );
                    empty.push(format!("{name} (could not inspect)"));
                }
            }
        }
        empty.sort();
        Ok(empty)
    }
}

impl AuditOperation for EmptyBuckets {
    fn headline(&self) -> &'static str {
        "Unused S3 buckets (holding no objects):"
    }

    fn audit<'a>(&'a self, credential: &'a DelegatedCredential) -> AuditFuture<'a> {
        Box::pin(self.find_empty(credential))
    }
}
