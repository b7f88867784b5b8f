// src/manifest.rs
//! Descriptors that tell a visualization tool where a result lives and how
//! to parse it.

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::info;

use crate::{
    process::output::{DELIMITER, QUOTE},
    store::{Location, ObjectStore},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub file_locations: Vec<FileLocation>,
    pub global_upload_settings: UploadSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    #[serde(rename = "URIs")]
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSettings {
    pub format: String,
    pub delimiter: String,
    pub text_qualifier: String,
    pub contains_header: bool,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            format: "CSV".to_string(),
            delimiter: char::from(DELIMITER).to_string(),
            text_qualifier: char::from(QUOTE).to_string(),
            contains_header: true,
        }
    }
}

impl Manifest {
    /// Manifest pointing at a single output location.
    pub fn for_output(output: &Location) -> Result<Self> {
        Ok(Self {
            file_locations: vec![FileLocation {
                uris: vec![output.to_uri()?],
            }],
            global_upload_settings: UploadSettings::default(),
        })
    }

    /// Pretty JSON with four-space indentation and a trailing newline.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut ser).context("serializing manifest")?;
        buf.push(b'\n');
        Ok(buf)
    }
}

/// Build the manifest for `output` and store it at `destination`.
/// Returns the destination on success.
pub async fn publish(
    store: &dyn ObjectStore,
    output: &Location,
    destination: &Location,
) -> Result<Location> {
    let body = Manifest::for_output(output)?.to_json()?;
    store
        .put(destination, Bytes::from(body), "application/json")
        .await
        .with_context(|| format!("uploading manifest to {}", destination))?;
    info!(manifest = %destination, output = %output, "manifest uploaded");
    Ok(destination.clone())
}
