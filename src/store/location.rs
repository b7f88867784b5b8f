// src/store/location.rs

use anyhow::{anyhow, bail, Context, Result};
use std::{fmt, path::PathBuf};
use url::Url;

/// Where a dataset, result fragment or manifest lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// `s3://bucket/key`
    S3 { bucket: String, key: String },
    /// `http(s)://…`, read-only.
    Http(Url),
    /// `file:///abs/path` or a bare filesystem path.
    Local(PathBuf),
}

impl Location {
    /// Parse a URI or bare path. Trailing slashes are preserved so that
    /// prefixes keep rendering as prefixes.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("empty location");
        }

        if let Some(rest) = raw.strip_prefix("s3://") {
            let (bucket, key) = match rest.split_once('/') {
                Some((b, k)) => (b, k),
                None => (rest, ""),
            };
            if bucket.is_empty() {
                bail!("s3 location `{}` has no bucket", raw);
            }
            return Ok(Location::S3 {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        if raw.starts_with("http://") || raw.starts_with("https://") {
            let url = Url::parse(raw).with_context(|| format!("parsing URL {}", raw))?;
            return Ok(Location::Http(url));
        }

        if raw.starts_with("file://") {
            let url = Url::parse(raw).with_context(|| format!("parsing file URL {}", raw))?;
            let mut path = url
                .to_file_path()
                .map_err(|_| anyhow!("file URL `{}` is not an absolute local path", raw))?;
            if raw.ends_with('/') {
                path.push("");
            }
            return Ok(Location::Local(path));
        }

        if let Some((scheme, _)) = raw.split_once("://") {
            bail!("unsupported location scheme `{}` in {}", scheme, raw);
        }

        Ok(Location::Local(PathBuf::from(raw)))
    }

    /// Resolve `name` beneath this location, treating it as a directory/prefix.
    pub fn child(&self, name: &str) -> Result<Location> {
        Ok(match self {
            Location::S3 { bucket, key } => {
                let key = if key.is_empty() || key.ends_with('/') {
                    format!("{}{}", key, name)
                } else {
                    format!("{}/{}", key, name)
                };
                Location::S3 {
                    bucket: bucket.clone(),
                    key,
                }
            }
            Location::Http(url) => {
                let mut base = url.clone();
                if !base.path().ends_with('/') {
                    let path = format!("{}/", base.path());
                    base.set_path(&path);
                }
                Location::Http(
                    base.join(name)
                        .with_context(|| format!("joining {} onto {}", name, url))?,
                )
            }
            Location::Local(path) => Location::Local(path.join(name)),
        })
    }

    /// Lower-case extension of the final path segment, if any.
    pub fn extension(&self) -> Option<String> {
        let last = match self {
            Location::S3 { key, .. } => key.rsplit('/').next().unwrap_or_default().to_string(),
            Location::Http(url) => url
                .path_segments()
                .and_then(|mut s| s.next_back())
                .unwrap_or_default()
                .to_string(),
            Location::Local(path) => path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_default(),
        };
        last.rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    /// Absolute URI form, as written into manifests. Local paths become
    /// `file://` URLs; a trailing slash keeps a prefix rendering as a directory.
    pub fn to_uri(&self) -> Result<String> {
        let Location::Local(path) = self else {
            return Ok(self.to_string());
        };
        let absolute = if path.is_absolute() {
            path.clone()
        } else {
            std::env::current_dir()
                .context("resolving working directory")?
                .join(path)
        };
        let url = if path.to_string_lossy().ends_with('/') {
            Url::from_directory_path(&absolute)
        } else {
            Url::from_file_path(&absolute)
        }
        .map_err(|_| anyhow!("{} cannot be written as a file URL", absolute.display()))?;
        Ok(url.to_string())
    }

    pub fn is_s3(&self) -> bool {
        matches!(self, Location::S3 { .. })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            Location::Http(url) => write!(f, "{}", url),
            Location::Local(path) => write!(f, "{}", path.display()),
        }
    }
}
