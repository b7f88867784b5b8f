// src/schema/mod.rs
//! The columns every insurance record must carry and a check of a loaded
//! schema against them.

use anyhow::{bail, Result};
use arrow::datatypes::{DataType, Schema};
use tracing::{debug, warn};

pub const AGE: &str = "age";
pub const SEX: &str = "sex";
pub const BMI: &str = "bmi";
pub const SMOKER: &str = "smoker";
pub const REGION: &str = "region";
pub const CHARGES: &str = "charges";

/// Columns that must be non-null for a record to reach aggregation.
pub const REQUIRED_COLUMNS: [&str; 6] = [REGION, SMOKER, CHARGES, SEX, BMI, AGE];

/// Columns the jobs read as numbers.
pub const NUMERIC_COLUMNS: [&str; 3] = [AGE, BMI, CHARGES];

pub fn is_numeric(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
            | DataType::Decimal256(_, _)
    )
}

/// Fail if any required column is missing (names are case-sensitive).
///
/// A numeric column that was inferred as something else only warns: the
/// jobs reading it will fail on their own while the rest still run.
pub fn validate(schema: &Schema) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| schema.field_with_name(name).is_err())
        .collect();
    if !missing.is_empty() {
        bail!(
            "input is missing required column(s) {:?}; found {:?}",
            missing,
            schema
                .fields()
                .iter()
                .map(|f| f.name().as_str())
                .collect::<Vec<_>>()
        );
    }

    for name in NUMERIC_COLUMNS {
        let field = schema.field_with_name(name)?;
        if !is_numeric(field.data_type()) {
            warn!(
                column = name,
                inferred = ?field.data_type(),
                "column was not inferred as numeric; jobs aggregating it will fail"
            );
        }
    }

    for field in schema.fields() {
        debug!(column = %field.name(), dtype = ?field.data_type(), "input column");
    }
    Ok(())
}
