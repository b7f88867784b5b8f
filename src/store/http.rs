// src/store/http.rs

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::info;

use super::{Location, ObjectStore};

/// Read-only store for datasets published over HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpStore {
    client: Client,
}

impl HttpStore {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn get(&self, location: &Location) -> Result<Bytes> {
        let Location::Http(url) = location else {
            bail!("{} is not an HTTP location", location);
        };
        let resp = self
            .client
            .get(url.as_str())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()
            .with_context(|| format!("GET {}", url))?;
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("reading body from {}", url))?;
        info!(url = %url, bytes = body.len(), "downloaded");
        Ok(body)
    }

    async fn put(&self, location: &Location, _body: Bytes, _content_type: &str) -> Result<()> {
        bail!("cannot write to {}: HTTP locations are read-only", location)
    }

    async fn clear_prefix(&self, location: &Location) -> Result<usize> {
        bail!("cannot clear {}: HTTP locations are read-only", location)
    }
}
