// src/process/loader.rs

use anyhow::{Context, Result};
use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    datatypes::SchemaRef,
    record_batch::RecordBatch,
};
use bytes::Bytes;
use clap::ValueEnum;
use once_cell::sync::Lazy;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use regex::Regex;
use std::{io::Cursor, sync::Arc};
use tracing::info;

use crate::{schema, store::Location};

const BATCH_SIZE: usize = 8192;

/// Only empty CSV fields are nulls; whitespace is kept as a value.
static NULL_FIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^$").expect("null regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Csv,
    Parquet,
}

impl InputFormat {
    /// `.parquet`/`.pq` means Parquet, anything else is read as CSV.
    pub fn detect(location: &Location) -> Self {
        match location.extension().as_deref() {
            Some("parquet") | Some("pq") => InputFormat::Parquet,
            _ => InputFormat::Csv,
        }
    }
}

/// Decode the raw input into one record batch and check its schema.
#[tracing::instrument(level = "info", skip(data), fields(bytes = data.len()))]
pub fn load_dataset(data: Bytes, format: InputFormat) -> Result<RecordBatch> {
    let batch = match format {
        InputFormat::Csv => read_csv(&data)?,
        InputFormat::Parquet => read_parquet(data)?,
    };
    schema::validate(&batch.schema())?;
    info!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "loaded dataset"
    );
    Ok(batch)
}

/// Header row required; every row is scanned to infer column types.
fn read_csv(data: &[u8]) -> Result<RecordBatch> {
    let format = Format::default()
        .with_header(true)
        .with_null_regex((*NULL_FIELD).clone());
    let (inferred, records) = format
        .infer_schema(Cursor::new(data), None)
        .context("inferring CSV schema")?;
    let schema: SchemaRef = Arc::new(inferred);
    tracing::debug!(records, "inferred CSV schema");

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_null_regex((*NULL_FIELD).clone())
        .with_batch_size(BATCH_SIZE)
        .build(Cursor::new(data))
        .context("creating CSV reader")?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context("reading CSV records")?;
    concat_batches(&schema, &batches).context("combining CSV batches")
}

fn read_parquet(data: Bytes) -> Result<RecordBatch> {
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(data).context("opening parquet input")?;
    let schema = builder.schema().clone();
    let reader = builder
        .with_batch_size(BATCH_SIZE)
        .build()
        .context("creating parquet reader")?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context("reading parquet row groups")?;
    concat_batches(&schema, &batches).context("combining parquet batches")
}
