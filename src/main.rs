use anyhow::{bail, Result};
use clap::Parser;
use medcharges::{
    config::{Args, Config},
    jobs::JOBS,
    pipeline::{self, Session},
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) configuration ────────────────────────────────────────────
    let args = Args::parse();
    if args.list_jobs {
        for job in JOBS.iter() {
            println!(
                "{:<24} group by {:<24} -> {}",
                job.name(),
                job.group_by.join(", "),
                job.measures
                    .iter()
                    .map(|m| m.alias)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        return Ok(());
    }
    let config = Config::from_args(&args)?;
    info!(
        input = %config.input,
        output_base = %config.output_base,
        manifest_base = %config.manifest_base,
        jobs = config.jobs.len(),
        concurrency = config.concurrency,
        "startup"
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    let session = Session::open(&config).await?;
    let outcome = pipeline::run(&session, &config).await;
    session.close();
    let summary = outcome?;

    // ─── 4) report ───────────────────────────────────────────────────
    let elapsed = summary.finished_at - summary.started_at;
    info!(
        input_rows = summary.input_rows,
        filtered_rows = summary.filtered_rows,
        succeeded = summary.succeeded(),
        total = summary.reports.len(),
        seconds = elapsed.num_milliseconds() as f64 / 1000.0,
        "run finished"
    );

    let failed: Vec<&str> = summary.failures().map(|(job, _)| job).collect();
    if !failed.is_empty() {
        for (job, err) in summary.failures() {
            error!(job, stage = err.stage(), "{}", err);
        }
        bail!(
            "{} of {} jobs failed: {}",
            failed.len(),
            summary.reports.len(),
            failed.join(", ")
        );
    }

    info!("all done");
    Ok(())
}
