// src/config.rs

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::{
    jobs::{self, JobSpec, JOBS},
    process::loader::InputFormat,
    store::{Location, S3Settings},
};

pub const DEFAULT_INPUT: &str = "s3://clouddump/Input_data/Charges.csv";
pub const DEFAULT_OUTPUT_BASE: &str = "s3://clouddump/Output_data/";
pub const DEFAULT_MANIFEST_BASE: &str = "s3://clouddump/Manifest_data/";

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Aggregate medical insurance charges and publish CSV results with visualization manifests"
)]
pub struct Args {
    /// Input dataset (s3://, http(s)://, file:// or a local path)
    #[arg(long, env = "MEDCHARGES_INPUT", default_value = DEFAULT_INPUT)]
    pub input: String,

    /// Force the input format instead of detecting it from the extension
    #[arg(long, value_enum)]
    pub input_format: Option<InputFormat>,

    /// Prefix under which each job writes its own folder
    #[arg(long, env = "MEDCHARGES_OUTPUT_BASE", default_value = DEFAULT_OUTPUT_BASE)]
    pub output_base: String,

    /// Prefix under which manifests are written
    #[arg(long, env = "MEDCHARGES_MANIFEST_BASE", default_value = DEFAULT_MANIFEST_BASE)]
    pub manifest_base: String,

    /// Maximum number of jobs running at once
    #[arg(long, env = "MEDCHARGES_CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,

    /// Run only the named job (repeatable); see --list-jobs
    #[arg(long = "job", value_name = "NAME")]
    pub jobs: Vec<String>,

    /// Custom S3 endpoint, e.g. for MinIO or LocalStack
    #[arg(long, env = "MEDCHARGES_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Use path-style S3 addressing
    #[arg(long)]
    pub s3_path_style: bool,

    /// Print the job table and exit
    #[arg(long)]
    pub list_jobs: bool,
}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub input: Location,
    pub input_format: InputFormat,
    pub output_base: Location,
    pub manifest_base: Location,
    pub concurrency: usize,
    pub jobs: Vec<&'static JobSpec>,
    pub s3: S3Settings,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        let input = Location::parse(&args.input).context("invalid --input")?;
        let output_base = Location::parse(&args.output_base).context("invalid --output-base")?;
        let manifest_base =
            Location::parse(&args.manifest_base).context("invalid --manifest-base")?;

        if matches!(output_base, Location::Http(_)) || matches!(manifest_base, Location::Http(_)) {
            bail!("output and manifest locations cannot be HTTP URLs");
        }
        if output_base == manifest_base {
            bail!(
                "--output-base and --manifest-base must differ (both are {})",
                output_base
            );
        }
        if args.concurrency == 0 {
            bail!("--concurrency must be at least 1");
        }

        let jobs = if args.jobs.is_empty() {
            JOBS.iter().collect()
        } else {
            let mut selected = Vec::with_capacity(args.jobs.len());
            for name in &args.jobs {
                let job = jobs::find(name).with_context(|| {
                    format!(
                        "unknown job `{}`; expected one of {:?}",
                        name,
                        JOBS.iter().map(|j| j.name()).collect::<Vec<_>>()
                    )
                })?;
                if !selected.iter().any(|s: &&JobSpec| s.name() == job.name()) {
                    selected.push(job);
                }
            }
            selected
        };

        check_destinations(&input, &manifest_base, &output_base, &jobs)?;

        let input_format = args
            .input_format
            .unwrap_or_else(|| InputFormat::detect(&input));

        Ok(Self {
            input,
            input_format,
            output_base,
            manifest_base,
            concurrency: args.concurrency,
            jobs,
            s3: S3Settings {
                endpoint: args.s3_endpoint.clone(),
                force_path_style: args.s3_path_style,
            },
        })
    }

    /// Whether any configured location lives in S3.
    pub fn needs_s3(&self) -> bool {
        self.input.is_s3() || self.output_base.is_s3() || self.manifest_base.is_s3()
    }
}

/// Each job clears its output prefix before writing, so nothing else the run
/// reads or writes may live under one.
fn check_destinations(
    input: &Location,
    manifest_base: &Location,
    output_base: &Location,
    jobs: &[&'static JobSpec],
) -> Result<()> {
    let input = input.to_string();
    let manifest_prefix = manifest_base.to_string();
    for job in jobs {
        let output = job.output_location(output_base)?.to_string();
        if input.starts_with(&output) {
            bail!("--input {} lies inside the output of job {} ({})", input, job.name(), output);
        }
        if manifest_prefix.starts_with(&output) {
            bail!(
                "--manifest-base {} lies inside the output of job {} ({})",
                manifest_prefix,
                job.name(),
                output
            );
        }
        for other in jobs {
            let manifest = other.manifest_location(manifest_base)?.to_string();
            if manifest.starts_with(&output) {
                bail!(
                    "manifest of job {} ({}) lies inside the output of job {}",
                    other.name(),
                    manifest,
                    job.name()
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Config> {
        let mut argv = vec!["medcharges"];
        argv.extend_from_slice(extra);
        let args = Args::try_parse_from(argv)?;
        Config::from_args(&args)
    }

    #[test]
    fn defaults_point_at_the_published_bucket() -> Result<()> {
        let cfg = parse(&[])?;
        assert_eq!(cfg.input.to_string(), DEFAULT_INPUT);
        assert_eq!(cfg.output_base.to_string(), DEFAULT_OUTPUT_BASE);
        assert_eq!(cfg.manifest_base.to_string(), DEFAULT_MANIFEST_BASE);
        assert_eq!(cfg.input_format, InputFormat::Csv);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.jobs.len(), 10);
        assert!(cfg.needs_s3());
        Ok(())
    }

    #[test]
    fn local_run_does_not_need_s3() -> Result<()> {
        let cfg = parse(&[
            "--input",
            "data/charges.parquet",
            "--output-base",
            "out/",
            "--manifest-base",
            "manifests/",
        ])?;
        assert!(!cfg.needs_s3());
        assert_eq!(cfg.input_format, InputFormat::Parquet);
        Ok(())
    }

    #[test]
    fn job_selection_keeps_order_and_dedups() -> Result<()> {
        let cfg = parse(&[
            "--job",
            "bmi_gender",
            "--job",
            "region_stats",
            "--job",
            "bmi_gender",
        ])?;
        let names: Vec<_> = cfg.jobs.iter().map(|j| j.name()).collect();
        assert_eq!(names, vec!["bmi_gender", "region_stats"]);
        Ok(())
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(parse(&["--job", "nope"]).is_err());
        assert!(parse(&["--concurrency", "0"]).is_err());
        assert!(parse(&["--output-base", "https://example.com/out/"]).is_err());
        assert!(parse(&["--output-base", "s3://a/x/", "--manifest-base", "s3://a/x/"]).is_err());
    }

    #[test]
    fn rejects_destinations_inside_a_job_output() {
        let nested_manifests = parse(&[
            "--input",
            "in/Charges.csv",
            "--output-base",
            "out/",
            "--manifest-base",
            "out/region_stats/m/",
            "--job",
            "bmi_gender",
            "--job",
            "region_stats",
        ]);
        let err = nested_manifests.expect_err("manifests under region_stats output");
        assert!(err.to_string().contains("region_stats"), "{}", err);

        assert!(parse(&[
            "--input",
            "out/smoker_charges/Charges.csv",
            "--output-base",
            "out/",
            "--manifest-base",
            "manifests/",
        ])
        .is_err());

        assert!(parse(&[
            "--output-base",
            "s3://b/data/",
            "--manifest-base",
            "s3://b/data/age_range_analysis/",
        ])
        .is_err());
    }

    #[test]
    fn sibling_destinations_are_accepted() -> Result<()> {
        let cfg = parse(&[
            "--input",
            "s3://b/in/Charges.csv",
            "--output-base",
            "s3://b/out/",
            "--manifest-base",
            "s3://b/out_manifests/",
        ])?;
        assert_eq!(cfg.jobs.len(), 10);
        Ok(())
    }
}
