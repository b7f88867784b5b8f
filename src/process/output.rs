// src/process/output.rs

use anyhow::{Context, Result};
use arrow::{csv::WriterBuilder, record_batch::RecordBatch};
use bytes::Bytes;
use tracing::{debug, info};

use crate::store::{Location, ObjectStore};

pub const DELIMITER: u8 = b',';
pub const QUOTE: u8 = b'"';

/// Name of the single fragment written under each output prefix.
pub const FRAGMENT_NAME: &str = "part-00000.csv";

/// Encode a result as comma-delimited text with a header row.
pub fn encode_csv(batch: &RecordBatch) -> Result<Bytes> {
    let mut buf = Vec::new();
    {
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .with_delimiter(DELIMITER)
            .with_quote(QUOTE)
            .build(&mut buf);
        writer.write(batch).context("encoding CSV")?;
    }
    Ok(Bytes::from(buf))
}

/// Replace everything under `prefix` with the encoded result.
/// Returns the location of the fragment written.
pub async fn write_result(
    store: &dyn ObjectStore,
    prefix: &Location,
    batch: &RecordBatch,
) -> Result<Location> {
    let body = encode_csv(batch)?;

    let removed = store
        .clear_prefix(prefix)
        .await
        .with_context(|| format!("clearing previous output under {}", prefix))?;
    if removed > 0 {
        debug!(prefix = %prefix, removed, "replaced previous output");
    }

    let fragment = prefix.child(FRAGMENT_NAME)?;
    store
        .put(&fragment, body, "text/csv")
        .await
        .with_context(|| format!("writing {}", fragment))?;

    info!(location = %fragment, rows = batch.num_rows(), "wrote result");
    Ok(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use arrow::{
        array::{Float64Array, Int64Array, StringArray},
        datatypes::{DataType, Field, Schema},
    };
    use std::sync::Arc;
    use tempfile::tempdir;

    fn result() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("region", DataType::Utf8, true),
            Field::new("count", DataType::Int64, false),
            Field::new("stddev_charge", DataType::Float64, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["north, upper", "west"])),
                Arc::new(Int64Array::from(vec![3, 1])),
                Arc::new(Float64Array::from(vec![Some(1.5), None])),
            ],
        )
        .expect("valid test batch")
    }

    #[test]
    fn header_row_quotes_and_nulls() -> Result<()> {
        let text = String::from_utf8(encode_csv(&result())?.to_vec())?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "region,count,stddev_charge");
        assert_eq!(lines[1], "\"north, upper\",3,1.5");
        assert_eq!(lines[2], "west,1,");
        assert_eq!(lines.len(), 3);
        Ok(())
    }

    #[test]
    fn empty_result_still_has_a_header() -> Result<()> {
        let text = String::from_utf8(encode_csv(&result().slice(0, 0))?.to_vec())?;
        assert_eq!(text.trim_end(), "region,count,stddev_charge");
        Ok(())
    }

    #[tokio::test]
    async fn write_replaces_stale_fragments() -> Result<()> {
        let dir = tempdir()?;
        let prefix = Location::Local(dir.path().join("region_stats/"));
        let stale = prefix.child("part-00007-old.csv")?;
        LocalStore
            .put(&stale, Bytes::from_static(b"old"), "text/csv")
            .await?;

        let fragment = write_result(&LocalStore, &prefix, &result()).await?;
        assert_eq!(fragment, prefix.child(FRAGMENT_NAME)?);
        assert!(!dir.path().join("region_stats/part-00007-old.csv").exists());

        let written = LocalStore.get(&fragment).await?;
        assert!(written.starts_with(b"region,count,stddev_charge\n"));
        Ok(())
    }
}
