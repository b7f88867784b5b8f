// src/store/s3.rs

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, Client};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Location, ObjectStore};

/// Connection settings for S3 and S3-compatible endpoints.
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    /// Custom endpoint (MinIO, LocalStack, …). `None` uses AWS defaults.
    pub endpoint: Option<String>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    pub force_path_style: bool,
}

/// S3 backend. Region and credentials come from the standard AWS
/// environment/profile chain.
#[derive(Clone)]
pub struct S3Store {
    client: Arc<Client>,
}

fn bucket_and_key(location: &Location) -> Result<(&str, &str)> {
    match location {
        Location::S3 { bucket, key } => Ok((bucket.as_str(), key.as_str())),
        other => bail!("{} is not an S3 location", other),
    }
}

impl S3Store {
    pub async fn connect(settings: &S3Settings) -> Self {
        info!(endpoint = ?settings.endpoint, path_style = settings.force_path_style, "initializing S3 client");

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.force_path_style)
            .build();

        Self {
            client: Arc::new(Client::from_conf(s3_config)),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, location: &Location) -> Result<Bytes> {
        let (bucket, key) = bucket_and_key(location)?;
        let out = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("fetching {}", location))?;
        let body = out
            .body
            .collect()
            .await
            .with_context(|| format!("reading body of {}", location))?
            .into_bytes();
        info!(object = %location, bytes = body.len(), "downloaded");
        Ok(body)
    }

    async fn put(&self, location: &Location, body: Bytes, content_type: &str) -> Result<()> {
        let (bucket, key) = bucket_and_key(location)?;
        let len = body.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("uploading {} to bucket {}", key, bucket))?;
        info!(object = %location, bytes = len, "uploaded");
        Ok(())
    }

    async fn clear_prefix(&self, location: &Location) -> Result<usize> {
        let (bucket, prefix) = bucket_and_key(location)?;
        if prefix.is_empty() {
            bail!("refusing to clear the whole bucket {}", bucket);
        }

        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.with_context(|| format!("listing {}", location))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );
        }

        for key in &keys {
            self.client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .with_context(|| format!("deleting s3://{}/{}", bucket, key))?;
            debug!(bucket, key = %key, "deleted");
        }

        Ok(keys.len())
    }
}
