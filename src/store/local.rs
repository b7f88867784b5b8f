// src/store/local.rs

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{Location, ObjectStore};

/// Filesystem-backed store. Prefixes are directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStore;

fn local_path(location: &Location) -> Result<&Path> {
    match location {
        Location::Local(path) => Ok(path.as_path()),
        other => bail!("{} is not a local path", other),
    }
}

/// Sibling temp file used for write-then-rename.
fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "object".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn get(&self, location: &Location) -> Result<Bytes> {
        let path = local_path(location)?;
        let data = fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Bytes::from(data))
    }

    async fn put(&self, location: &Location, body: Bytes, _content_type: &str) -> Result<()> {
        let path = local_path(location)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }

        // write atomically: to tmp file, then rename over the destination
        let tmp = tmp_path_for(path);
        fs::write(&tmp, &body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;

        debug!(path = %path.display(), bytes = body.len(), "wrote local object");
        Ok(())
    }

    async fn clear_prefix(&self, location: &Location) -> Result<usize> {
        let path = local_path(location)?;
        let meta = match fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("inspecting {}", path.display())))
            }
        };

        if !meta.is_dir() {
            fs::remove_file(path)
                .await
                .with_context(|| format!("removing {}", path.display()))?;
            return Ok(1);
        }

        // count files before removal
        let mut removed = 0;
        let mut stack = vec![path.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let mut rd = fs::read_dir(&dir)
                .await
                .with_context(|| format!("listing {}", dir.display()))?;
            while let Some(entry) = rd.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    stack.push(entry.path());
                } else {
                    removed += 1;
                }
            }
        }
        fs::remove_dir_all(path)
            .await
            .with_context(|| format!("removing directory {}", path.display()))?;

        debug!(path = %path.display(), removed, "cleared local prefix");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_then_get_creates_parents() -> Result<()> {
        let dir = tempdir()?;
        let loc = Location::Local(dir.path().join("a/b/part-00000.csv"));
        LocalStore
            .put(&loc, Bytes::from_static(b"region,count\n"), "text/csv")
            .await?;
        let back = LocalStore.get(&loc).await?;
        assert_eq!(&back[..], b"region,count\n");
        assert!(!dir.path().join("a/b/.part-00000.csv.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn put_replaces_existing_content() -> Result<()> {
        let dir = tempdir()?;
        let loc = Location::Local(dir.path().join("m.json"));
        LocalStore
            .put(&loc, Bytes::from_static(b"first, and longer"), "application/json")
            .await?;
        LocalStore
            .put(&loc, Bytes::from_static(b"second"), "application/json")
            .await?;
        assert_eq!(&LocalStore.get(&loc).await?[..], b"second");
        Ok(())
    }

    #[tokio::test]
    async fn clear_prefix_removes_everything_below() -> Result<()> {
        let dir = tempdir()?;
        let prefix = Location::Local(dir.path().join("out/"));
        for name in ["part-00000.csv", "part-00001.csv", "nested/x.csv"] {
            LocalStore
                .put(&prefix.child(name)?, Bytes::from_static(b"x"), "text/csv")
                .await?;
        }
        assert_eq!(LocalStore.clear_prefix(&prefix).await?, 3);
        assert!(!dir.path().join("out").exists());
        assert_eq!(LocalStore.clear_prefix(&prefix).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn get_missing_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let loc = Location::Local(dir.path().join("nope.csv"));
        let err = LocalStore.get(&loc).await.unwrap_err();
        assert!(format!("{:#}", err).contains("nope.csv"));
        Ok(())
    }
}
