// src/pipeline.rs

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::{sync::Semaphore, time::Instant};
use tracing::{error, info, instrument};

use crate::{
    config::Config,
    error::JobError,
    jobs::JobSpec,
    manifest,
    process::{filter::drop_incomplete, loader::load_dataset, output::write_result},
    store::{Location, ObjectStore, Storage},
};

/// Process-scoped context shared by every job in a run.
pub struct Session {
    storage: Arc<Storage>,
    opened_at: DateTime<Utc>,
}

impl Session {
    pub async fn open(config: &Config) -> Result<Self> {
        let storage = Storage::connect(config.needs_s3(), &config.s3)
            .await
            .context("connecting to storage")?;
        Ok(Self::with_storage(storage))
    }

    pub fn with_storage(storage: Storage) -> Self {
        let opened_at = Utc::now();
        info!(%opened_at, "session opened");
        Self {
            storage: Arc::new(storage),
            opened_at,
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn close(self) {
        let open_for = Utc::now() - self.opened_at;
        info!(seconds = open_for.num_milliseconds() as f64 / 1000.0, "session closed");
    }
}

/// Where a successful job put its result and manifest.
#[derive(Debug, Clone)]
pub struct JobSuccess {
    pub groups: usize,
    pub output: Location,
    pub fragment: Location,
    pub manifest: Location,
}

#[derive(Debug)]
pub struct JobReport {
    pub job: &'static str,
    pub outcome: Result<JobSuccess, JobError>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub input_rows: usize,
    pub filtered_rows: usize,
    pub reports: Vec<JobReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &JobError)> {
        self.reports
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.job, e)))
    }
}

/// Load, filter, then run every configured job.
///
/// Input problems abort the run with an error. Job failures are recorded in
/// the summary and never stop the other jobs.
pub async fn run(session: &Session, config: &Config) -> Result<RunSummary> {
    let started_at = Utc::now();
    let storage = session.storage().clone();

    let raw = storage
        .get(&config.input)
        .await
        .with_context(|| format!("reading input dataset from {}", config.input))?;
    let format = config.input_format;
    let dataset = tokio::task::spawn_blocking(move || load_dataset(raw, format))
        .await
        .context("loader task panicked")?
        .with_context(|| format!("loading {}", config.input))?;
    let input_rows = dataset.num_rows();

    let base = Arc::new(drop_incomplete(&dataset)?);
    let filtered_rows = base.num_rows();
    drop(dataset);

    let sem = Arc::new(Semaphore::new(config.concurrency));
    let mut handles = Vec::with_capacity(config.jobs.len());
    for &job in &config.jobs {
        let storage = storage.clone();
        let base = base.clone();
        let sem = sem.clone();
        let output_base = config.output_base.clone();
        let manifest_base = config.manifest_base.clone();

        handles.push(tokio::spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| JobError::Aborted(e.to_string()))?;
            run_job(storage.as_ref(), job, base, &output_base, &manifest_base).await
        }));
    }

    let results = futures::future::join_all(handles).await;
    let reports = config
        .jobs
        .iter()
        .zip(results)
        .map(|(job, joined)| JobReport {
            job: job.name(),
            outcome: joined.unwrap_or_else(|e| Err(JobError::Aborted(e.to_string()))),
        })
        .collect::<Vec<_>>();

    for report in &reports {
        match &report.outcome {
            Ok(ok) => info!(job = report.job, groups = ok.groups, manifest = %ok.manifest, "job succeeded"),
            Err(e) => error!(job = report.job, stage = e.stage(), error = %e, "job failed"),
        }
    }

    Ok(RunSummary {
        input_rows,
        filtered_rows,
        reports,
        started_at,
        finished_at: Utc::now(),
    })
}

/// Aggregate, write, then publish the manifest. The manifest is only
/// produced once the write has succeeded.
#[instrument(level = "info", skip_all, fields(job = job.name()))]
pub async fn run_job(
    store: &dyn ObjectStore,
    job: &'static JobSpec,
    base: Arc<RecordBatch>,
    output_base: &Location,
    manifest_base: &Location,
) -> Result<JobSuccess, JobError> {
    let start = Instant::now();
    info!("starting");

    let result = tokio::task::spawn_blocking(move || job.compute(&base))
        .await
        .map_err(|e| JobError::Aborted(e.to_string()))?
        .map_err(|reason| JobError::Compute { reason })?;
    let groups = result.num_rows();
    info!(groups, "aggregated");

    let output = job
        .output_location(output_base)
        .map_err(|reason| JobError::Write {
            location: output_base.to_string(),
            reason,
        })?;
    let fragment = write_result(store, &output, &result)
        .await
        .map_err(|reason| JobError::Write {
            location: output.to_string(),
            reason,
        })?;

    let destination = job
        .manifest_location(manifest_base)
        .map_err(|reason| JobError::Manifest {
            location: manifest_base.to_string(),
            reason,
        })?;
    let manifest = manifest::publish(store, &output, &destination)
        .await
        .map_err(|reason| JobError::Manifest {
            location: destination.to_string(),
            reason,
        })?;

    info!(elapsed = ?start.elapsed(), "finished");
    Ok(JobSuccess {
        groups,
        output,
        fragment,
        manifest,
    })
}
