// src/store/mod.rs
//! Object storage used by the pipeline: S3, local filesystem, and read-only
//! HTTP, all addressed through [`Location`].

pub mod http;
pub mod local;
pub mod location;
pub mod s3;

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

pub use http::HttpStore;
pub use local::LocalStore;
pub use location::Location;
pub use s3::{S3Settings, S3Store};

/// Whole-object storage operations needed by the jobs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the full object at `location`.
    async fn get(&self, location: &Location) -> Result<Bytes>;

    /// Create or replace the object at `location`.
    async fn put(&self, location: &Location, body: Bytes, content_type: &str) -> Result<()>;

    /// Remove every object under the prefix `location`, returning how many
    /// were removed. A missing prefix is not an error.
    async fn clear_prefix(&self, location: &Location) -> Result<usize>;
}

/// Routes each call to the backend that owns the location's scheme.
pub struct Storage {
    local: LocalStore,
    http: HttpStore,
    s3: Option<S3Store>,
}

impl Storage {
    /// Build the router. The S3 client is only constructed when `needs_s3`
    /// is set, so purely local runs never touch AWS credentials.
    pub async fn connect(needs_s3: bool, s3_settings: &S3Settings) -> Result<Self> {
        let s3 = if needs_s3 {
            Some(S3Store::connect(s3_settings).await)
        } else {
            None
        };
        info!(s3 = s3.is_some(), "storage ready");
        Ok(Self {
            local: LocalStore,
            http: HttpStore::new(),
            s3,
        })
    }

    /// A router with no S3 backend.
    pub fn local_only() -> Self {
        Self {
            local: LocalStore,
            http: HttpStore::new(),
            s3: None,
        }
    }

    fn backend(&self, location: &Location) -> Result<&dyn ObjectStore> {
        match location {
            Location::Local(_) => Ok(&self.local),
            Location::Http(_) => Ok(&self.http),
            Location::S3 { .. } => match &self.s3 {
                Some(s3) => Ok(s3),
                None => bail!("no S3 client configured for {}", location),
            },
        }
    }
}

#[async_trait]
impl ObjectStore for Storage {
    async fn get(&self, location: &Location) -> Result<Bytes> {
        self.backend(location)?.get(location).await
    }

    async fn put(&self, location: &Location, body: Bytes, content_type: &str) -> Result<()> {
        self.backend(location)?.put(location, body, content_type).await
    }

    async fn clear_prefix(&self, location: &Location) -> Result<usize> {
        self.backend(location)?.clear_prefix(location).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn s3_locations_fail_without_a_client() -> Result<()> {
        let storage = Storage::local_only();
        let loc = Location::parse("s3://bucket/key.csv")?;
        let err = storage.get(&loc).await.unwrap_err();
        assert!(err.to_string().contains("no S3 client"));
        Ok(())
    }

    #[tokio::test]
    async fn http_locations_are_read_only() -> Result<()> {
        let storage = Storage::local_only();
        let loc = Location::parse("https://example.com/out/")?;
        assert!(storage
            .put(&loc, Bytes::from_static(b"x"), "text/csv")
            .await
            .is_err());
        assert!(storage.clear_prefix(&loc).await.is_err());
        Ok(())
    }
}
