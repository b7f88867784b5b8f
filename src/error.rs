// src/error.rs

use thiserror::Error;

/// Why a single job failed. Each variant carries the full error chain.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("aggregation failed: {reason:#}")]
    Compute { reason: anyhow::Error },

    #[error("writing output to {location} failed: {reason:#}")]
    Write {
        location: String,
        reason: anyhow::Error,
    },

    #[error("uploading manifest to {location} failed: {reason:#}")]
    Manifest {
        location: String,
        reason: anyhow::Error,
    },

    #[error("job task did not complete: {0}")]
    Aborted(String),
}

impl JobError {
    /// Short label for the failing stage, used in logs and the run summary.
    pub fn stage(&self) -> &'static str {
        match self {
            JobError::Compute { .. } => "compute",
            JobError::Write { .. } => "write",
            JobError::Manifest { .. } => "manifest",
            JobError::Aborted(_) => "aborted",
        }
    }
}
