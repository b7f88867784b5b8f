// src/jobs.rs
//! The ten published analyses.

use anyhow::{Context, Result};
use arrow::record_batch::RecordBatch;

use crate::{
    process::{
        aggregate::{group_by, Measure},
        classify::{with_derived, Derived},
    },
    schema::{BMI, CHARGES, REGION, SEX, SMOKER},
    store::Location,
};

/// One row of the job table: what to derive, how to group, what to compute,
/// and where the result and its manifest go.
#[derive(Debug, Clone, Copy)]
pub struct JobSpec {
    /// Folder under the output base; also the name used to select the job.
    pub output_folder: &'static str,
    /// Manifest file is `<dataset>_manifest.json` under the manifest base.
    pub dataset: &'static str,
    pub derive: &'static [Derived],
    pub group_by: &'static [&'static str],
    pub measures: &'static [Measure],
}

const CHARGE_SPREAD: [Measure; 3] = [
    Measure::avg(CHARGES, "average_charge"),
    Measure::max(CHARGES, "max_charge"),
    Measure::min(CHARGES, "min_charge"),
];

const AVERAGE_CHARGE: [Measure; 1] = [Measure::avg(CHARGES, "average_charge")];

const ROW_COUNT: [Measure; 1] = [Measure::count_rows("count")];

pub static JOBS: [JobSpec; 10] = [
    JobSpec {
        output_folder: "region_stats",
        dataset: "region_stats",
        derive: &[],
        group_by: &[REGION],
        measures: &CHARGE_SPREAD,
    },
    JobSpec {
        output_folder: "bmi_stddev_analysis",
        dataset: "bmi_stddev",
        derive: &[Derived::BmiCategory],
        group_by: &["bmi_category"],
        measures: &[Measure::stddev(CHARGES, "stddev_charge")],
    },
    JobSpec {
        output_folder: "age_range_analysis",
        dataset: "age_range",
        derive: &[Derived::AgeRange],
        group_by: &["age_range"],
        measures: &AVERAGE_CHARGE,
    },
    JobSpec {
        output_folder: "smoker_region_analysis",
        dataset: "smoker_region",
        derive: &[],
        group_by: &[REGION, SMOKER],
        measures: &ROW_COUNT,
    },
    JobSpec {
        output_folder: "gender_smoker_analysis",
        dataset: "gender_smoker",
        derive: &[],
        group_by: &[SEX, SMOKER],
        measures: &AVERAGE_CHARGE,
    },
    JobSpec {
        output_folder: "charges_distribution",
        dataset: "charges_distribution",
        derive: &[],
        group_by: &[REGION],
        measures: &[Measure::count(CHARGES, "charges_count")],
    },
    JobSpec {
        output_folder: "gender_distribution",
        dataset: "gender_distribution",
        derive: &[],
        group_by: &[REGION, SEX],
        measures: &ROW_COUNT,
    },
    JobSpec {
        output_folder: "smoker_charges",
        dataset: "smoker_charges",
        derive: &[],
        group_by: &[SMOKER],
        measures: &CHARGE_SPREAD,
    },
    JobSpec {
        output_folder: "bmi_gender",
        dataset: "bmi_gender",
        derive: &[],
        group_by: &[SEX],
        measures: &[
            Measure::avg(BMI, "average_bmi"),
            Measure::max(BMI, "max_bmi"),
            Measure::min(BMI, "min_bmi"),
        ],
    },
    JobSpec {
        output_folder: "age_gender_charges",
        dataset: "age_gender_charges",
        derive: &[Derived::AgeRange],
        group_by: &["age_range", SEX],
        measures: &AVERAGE_CHARGE,
    },
];

impl JobSpec {
    pub fn name(&self) -> &'static str {
        self.output_folder
    }

    /// Derive this job's categorical columns from the shared base dataset
    /// and aggregate.
    pub fn compute(&self, base: &RecordBatch) -> Result<RecordBatch> {
        let working = with_derived(base, self.derive)
            .with_context(|| format!("deriving columns for {}", self.name()))?;
        group_by(&working, self.group_by, self.measures)
            .with_context(|| format!("aggregating {}", self.name()))
    }

    /// `<output_base>/<folder>/`
    pub fn output_location(&self, output_base: &Location) -> Result<Location> {
        output_base.child(&format!("{}/", self.output_folder))
    }

    /// `<manifest_base>/<dataset>_manifest.json`
    pub fn manifest_location(&self, manifest_base: &Location) -> Result<Location> {
        manifest_base.child(&format!("{}_manifest.json", self.dataset))
    }
}

pub fn find(name: &str) -> Option<&'static JobSpec> {
    JOBS.iter().find(|j| j.name() == name)
}
