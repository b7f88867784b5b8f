// src/process/aggregate.rs

use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array, Int64Array, StringArray},
    compute::cast,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{collections::BTreeMap, sync::Arc};

use super::classify::float_column;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Avg,
    Max,
    Min,
    /// Sample standard deviation; null below two values.
    StdDev,
    /// Every row in the group.
    CountRows,
    /// Non-null values of the measured column.
    Count,
}

/// One output column: a statistic over an input column, named `alias`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measure {
    pub statistic: Statistic,
    pub column: Option<&'static str>,
    pub alias: &'static str,
}

impl Measure {
    pub const fn avg(column: &'static str, alias: &'static str) -> Self {
        Self::of(Statistic::Avg, column, alias)
    }

    pub const fn max(column: &'static str, alias: &'static str) -> Self {
        Self::of(Statistic::Max, column, alias)
    }

    pub const fn min(column: &'static str, alias: &'static str) -> Self {
        Self::of(Statistic::Min, column, alias)
    }

    pub const fn stddev(column: &'static str, alias: &'static str) -> Self {
        Self::of(Statistic::StdDev, column, alias)
    }

    pub const fn count(column: &'static str, alias: &'static str) -> Self {
        Self::of(Statistic::Count, column, alias)
    }

    pub const fn count_rows(alias: &'static str) -> Self {
        Self {
            statistic: Statistic::CountRows,
            column: None,
            alias,
        }
    }

    const fn of(statistic: Statistic, column: &'static str, alias: &'static str) -> Self {
        Self {
            statistic,
            column: Some(column),
            alias,
        }
    }

    fn is_count(&self) -> bool {
        matches!(self.statistic, Statistic::Count | Statistic::CountRows)
    }
}

/// Running state for one measure within one group.
#[derive(Debug, Clone, Default)]
struct Accumulator {
    rows: i64,
    n: i64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
    // Welford
    mean: f64,
    m2: f64,
}

impl Accumulator {
    fn update(&mut self, value: Option<f64>) {
        self.rows += 1;
        let Some(x) = value else {
            return;
        };
        self.n += 1;
        self.sum += x;
        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Feed row `row` of `values` into the state `statistic` reads from.
    fn observe(&mut self, statistic: Statistic, values: Option<&Float64Array>, row: usize) {
        match (statistic, values) {
            (Statistic::CountRows, _) | (_, None) => self.rows += 1,
            (_, Some(v)) => self.update((!v.is_null(row)).then(|| v.value(row))),
        }
    }

    fn float(&self, statistic: Statistic) -> Option<f64> {
        match statistic {
            Statistic::Avg if self.n > 0 => Some(self.sum / self.n as f64),
            Statistic::Max => self.max,
            Statistic::Min => self.min,
            Statistic::StdDev if self.n > 1 => Some((self.m2 / (self.n - 1) as f64).sqrt()),
            _ => None,
        }
    }

    fn count(&self, statistic: Statistic) -> i64 {
        match statistic {
            Statistic::CountRows => self.rows,
            _ => self.n,
        }
    }
}

/// Read a key column as text so any inferred type can be grouped on.
fn key_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("group key column `{}` not found", name))?;
    let text = cast(column.as_ref(), &DataType::Utf8)
        .with_context(|| format!("reading group key `{}` as text", name))?;
    text.as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| anyhow!("group key `{}` did not cast to Utf8", name))
}

/// Group `batch` by `keys` and compute `measures` per group.
///
/// The result has one row per distinct key combination present, in
/// ascending key order, with the key columns first (as text) followed by one
/// column per measure.
pub fn group_by(batch: &RecordBatch, keys: &[&str], measures: &[Measure]) -> Result<RecordBatch> {
    if keys.is_empty() {
        bail!("group_by needs at least one key column");
    }

    let key_arrays = keys
        .iter()
        .map(|k| key_column(batch, k))
        .collect::<Result<Vec<_>>>()?;
    let value_arrays = measures
        .iter()
        .map(|m| m.column.map(|c| float_column(batch, c)).transpose())
        .collect::<Result<Vec<Option<Float64Array>>>>()?;

    let mut groups: BTreeMap<Vec<Option<String>>, Vec<Accumulator>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let key: Vec<Option<String>> = key_arrays
            .iter()
            .map(|a| (!a.is_null(row)).then(|| a.value(row).to_string()))
            .collect();
        let accs = groups
            .entry(key)
            .or_insert_with(|| vec![Accumulator::default(); measures.len()]);
        for ((acc, measure), values) in accs.iter_mut().zip(measures).zip(&value_arrays) {
            acc.observe(measure.statistic, values.as_ref(), row);
        }
    }

    let mut fields = Vec::with_capacity(keys.len() + measures.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(keys.len() + measures.len());

    for (i, name) in keys.iter().enumerate() {
        fields.push(Field::new(*name, DataType::Utf8, true));
        columns.push(Arc::new(
            groups
                .keys()
                .map(|k| k[i].as_deref())
                .collect::<StringArray>(),
        ));
    }

    for (j, measure) in measures.iter().enumerate() {
        if measure.is_count() {
            fields.push(Field::new(measure.alias, DataType::Int64, false));
            columns.push(Arc::new(
                groups
                    .values()
                    .map(|accs| accs[j].count(measure.statistic))
                    .collect::<Int64Array>(),
            ));
        } else {
            fields.push(Field::new(measure.alias, DataType::Float64, true));
            columns.push(Arc::new(
                groups
                    .values()
                    .map(|accs| accs[j].float(measure.statistic))
                    .collect::<Float64Array>(),
            ));
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building aggregation result")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("region", DataType::Utf8, true),
            Field::new("smoker", DataType::Utf8, true),
            Field::new("charges", DataType::Float64, true),
            Field::new("age", DataType::Int64, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["west", "west", "east", "east", "north"])),
                Arc::new(StringArray::from(vec!["no", "yes", "no", "no", "yes"])),
                Arc::new(Float64Array::from(vec![
                    Some(1200.0),
                    Some(20000.0),
                    Some(2.0),
                    Some(4.0),
                    None,
                ])),
                Arc::new(Int64Array::from(vec![17, 45, 30, 31, 60])),
            ],
        )
        .expect("valid test batch")
    }

    fn strings(batch: &RecordBatch, name: &str) -> Vec<String> {
        let col = batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .expect("string column");
        col.iter().map(|v| v.unwrap_or("<null>").to_string()).collect()
    }

    fn floats(batch: &RecordBatch, name: &str) -> Vec<Option<f64>> {
        let col = batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
            .expect("float column");
        col.iter().collect()
    }

    fn counts(batch: &RecordBatch, name: &str) -> Vec<i64> {
        let col = batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
            .expect("count column");
        col.values().to_vec()
    }

    #[test]
    fn avg_max_min_per_group() -> Result<()> {
        let out = group_by(
            &dataset(),
            &["region"],
            &[
                Measure::avg("charges", "average_charge"),
                Measure::max("charges", "max_charge"),
                Measure::min("charges", "min_charge"),
            ],
        )?;
        assert_eq!(strings(&out, "region"), vec!["east", "north", "west"]);
        assert_eq!(
            floats(&out, "average_charge"),
            vec![Some(3.0), None, Some(10600.0)]
        );
        assert_eq!(
            floats(&out, "max_charge"),
            vec![Some(4.0), None, Some(20000.0)]
        );
        assert_eq!(
            floats(&out, "min_charge"),
            vec![Some(2.0), None, Some(1200.0)]
        );
        Ok(())
    }

    #[test]
    fn row_counts_and_value_counts_differ_on_nulls() -> Result<()> {
        let out = group_by(
            &dataset(),
            &["region"],
            &[
                Measure::count_rows("count"),
                Measure::count("charges", "charges_count"),
            ],
        )?;
        assert_eq!(counts(&out, "count"), vec![2, 1, 2]);
        assert_eq!(counts(&out, "charges_count"), vec![2, 0, 2]);
        Ok(())
    }

    #[test]
    fn row_count_only_touches_the_row_tally() {
        let mut acc = Accumulator::default();
        let values = Float64Array::from(vec![Some(5.0), None]);
        acc.observe(Statistic::CountRows, Some(&values), 0);
        acc.observe(Statistic::CountRows, None, 1);
        assert_eq!(acc.rows, 2);
        assert_eq!(acc.n, 0);
        assert_eq!(acc.sum, 0.0);
        assert_eq!(acc.min, None);
        assert_eq!(acc.max, None);
        assert_eq!(acc.m2, 0.0);

        let mut acc = Accumulator::default();
        acc.observe(Statistic::Count, Some(&values), 0);
        acc.observe(Statistic::Count, Some(&values), 1);
        assert_eq!(acc.count(Statistic::Count), 1);
        assert_eq!(acc.count(Statistic::CountRows), 2);
    }

    #[test]
    fn two_keys_only_emit_present_combinations() -> Result<()> {
        let out = group_by(
            &dataset(),
            &["region", "smoker"],
            &[Measure::count_rows("count")],
        )?;
        assert_eq!(out.num_rows(), 4);
        assert_eq!(strings(&out, "region"), vec!["east", "north", "west", "west"]);
        assert_eq!(strings(&out, "smoker"), vec!["no", "yes", "no", "yes"]);
        assert_eq!(counts(&out, "count"), vec![2, 1, 1, 1]);
        Ok(())
    }

    #[test]
    fn sample_stddev_is_null_below_two_values() -> Result<()> {
        let out = group_by(
            &dataset(),
            &["region"],
            &[Measure::stddev("charges", "stddev_charge")],
        )?;
        let sd = floats(&out, "stddev_charge");
        // east: 2.0 and 4.0 -> sqrt(2)
        assert!((sd[0].expect("east has two values") - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(sd[1], None);
        let west = sd[2].expect("west has two values");
        assert!((west - 13293.607486307).abs() < 1e-6, "got {}", west);

        let single = dataset().slice(0, 1);
        let out = group_by(
            &single,
            &["region"],
            &[Measure::stddev("charges", "stddev_charge")],
        )?;
        assert_eq!(floats(&out, "stddev_charge"), vec![None]);
        Ok(())
    }

    #[test]
    fn numeric_keys_are_grouped_as_text() -> Result<()> {
        let out = group_by(&dataset(), &["age"], &[Measure::count_rows("count")])?;
        assert_eq!(strings(&out, "age"), vec!["17", "30", "31", "45", "60"]);
        Ok(())
    }

    #[test]
    fn empty_input_gives_empty_result_with_schema() -> Result<()> {
        let empty = dataset().slice(0, 0);
        let out = group_by(&empty, &["region"], &[Measure::avg("charges", "average_charge")])?;
        assert_eq!(out.num_rows(), 0);
        assert_eq!(out.schema().field(1).name(), "average_charge");
        Ok(())
    }

    #[test]
    fn unknown_columns_fail() {
        assert!(group_by(&dataset(), &["sex"], &[Measure::count_rows("count")]).is_err());
        assert!(group_by(&dataset(), &["region"], &[Measure::avg("bmi", "average_bmi")]).is_err());
        assert!(group_by(&dataset(), &[], &[Measure::count_rows("count")]).is_err());
    }
}
