// src/process/filter.rs

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::BooleanArray,
    compute::{and, filter_record_batch, is_not_null},
    record_batch::RecordBatch,
};
use tracing::info;

use crate::schema::REQUIRED_COLUMNS;

/// Keep only records where every required column is non-null.
pub fn drop_incomplete(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut keep: Option<BooleanArray> = None;
    for name in REQUIRED_COLUMNS {
        let column = batch
            .column_by_name(name)
            .ok_or_else(|| anyhow!("required column `{}` not found", name))?;
        let present = is_not_null(column.as_ref())?;
        keep = Some(match keep {
            None => present,
            Some(acc) => and(&acc, &present)?,
        });
    }

    let filtered = match keep {
        Some(mask) => filter_record_batch(batch, &mask).context("filtering incomplete records")?,
        None => batch.clone(),
    };
    info!(
        kept = filtered.num_rows(),
        dropped = batch.num_rows() - filtered.num_rows(),
        "dropped incomplete records"
    );
    Ok(filtered)
}
