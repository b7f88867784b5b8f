// src/process/classify.rs

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, StringArray},
    compute::{cast_with_options, CastOptions},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{fmt, sync::Arc};

use crate::schema::{AGE, BMI};

/// BMI bucket. Lower bound inclusive, upper bound exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BmiCategory {
    Underweight,
    NormalWeight,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn of(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::NormalWeight
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::NormalWeight => "Normal weight",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obese => "Obese",
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Age bucket. Lower bound inclusive, upper bound exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgeRange {
    Below20,
    Twenties,
    Thirties,
    Forties,
    FiftyAndAbove,
}

impl AgeRange {
    pub fn of(age: f64) -> Self {
        if age < 20.0 {
            AgeRange::Below20
        } else if age < 30.0 {
            AgeRange::Twenties
        } else if age < 40.0 {
            AgeRange::Thirties
        } else if age < 50.0 {
            AgeRange::Forties
        } else {
            AgeRange::FiftyAndAbove
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeRange::Below20 => "Below 20",
            AgeRange::Twenties => "20-29",
            AgeRange::Thirties => "30-39",
            AgeRange::Forties => "40-49",
            AgeRange::FiftyAndAbove => "50 and above",
        }
    }
}

impl fmt::Display for AgeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorical column computed from a numeric source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derived {
    BmiCategory,
    AgeRange,
}

impl Derived {
    /// Name of the column this derivation adds.
    pub fn column(&self) -> &'static str {
        match self {
            Derived::BmiCategory => "bmi_category",
            Derived::AgeRange => "age_range",
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Derived::BmiCategory => BMI,
            Derived::AgeRange => AGE,
        }
    }

    fn label(&self, value: f64) -> &'static str {
        match self {
            Derived::BmiCategory => BmiCategory::of(value).as_str(),
            Derived::AgeRange => AgeRange::of(value).as_str(),
        }
    }

    /// Classify every row; null sources stay null.
    pub fn compute(&self, batch: &RecordBatch) -> Result<StringArray> {
        let values = float_column(batch, self.source())?;
        Ok(values
            .iter()
            .map(|v| v.map(|x| self.label(x)))
            .collect::<StringArray>())
    }
}

/// Read `name` as f64, failing on any value that is not a number.
pub fn float_column(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("column `{}` not found", name))?;
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    let cast = cast_with_options(column.as_ref(), &DataType::Float64, &options)
        .with_context(|| format!("column `{}` is not numeric", name))?;
    cast.as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| anyhow!("column `{}` did not cast to Float64", name))
}

/// Return `batch` with the derived columns appended (replacing any column of
/// the same name).
pub fn with_derived(batch: &RecordBatch, derived: &[Derived]) -> Result<RecordBatch> {
    if derived.is_empty() {
        return Ok(batch.clone());
    }

    let mut fields: Vec<Field> = Vec::with_capacity(batch.num_columns() + derived.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns() + derived.len());
    for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
        if derived.iter().any(|d| d.column() == field.name()) {
            continue;
        }
        fields.push(field.as_ref().clone());
        columns.push(column.clone());
    }
    for d in derived {
        fields.push(Field::new(d.column(), DataType::Utf8, true));
        columns.push(Arc::new(d.compute(batch)?));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("appending derived columns")
}
