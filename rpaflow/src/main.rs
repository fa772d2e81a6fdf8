use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rpaflow::calendar::{BusinessDayResolver, HolidaySet};
use rpaflow::config::{JobConfig, MailCredentials};
use rpaflow::input::{InputLocator, LocalStager, StdFileSystem};
use rpaflow::job::JobRunner;
use rpaflow::logging::{DbLogSink, StatusLogger};
use rpaflow::notify::{LoggingNotifier, NotificationComposer};
use rpaflow::tracking::{share, ExecutionTracker, SqliteStatusStore};
use rpaflow::utils::{generate_run_id, Clock, OverrideToday, SystemClock};

/// Stages the previous business day's input files and tracks the run.
#[derive(Parser)]
#[command(name = "rpaflow", version, about)]
struct Cli {
    /// Path to the job configuration
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Run as if today were this date (YYYY-MM-DD)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Emit console logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn clock(today: Option<NaiveDate>) -> Arc<dyn Clock> {
    match today {
        Some(date) => Arc::new(OverrideToday::new(SystemClock, date)),
        None => Arc::new(SystemClock),
    }
}

fn run(cli: Cli) -> Result<bool> {
    let config = JobConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let credentials = MailCredentials::from_env()?;
    info!(
        run_id = %generate_run_id(),
        process = %config.process.process_name,
        robot = %config.robot.id_robot,
        mail_relay = ?credentials.relay,
        "Configuration loaded"
    );
    if !credentials.is_complete() {
        warn!("Mail credentials incomplete; notifications are logged only");
    }

    let clock = clock(cli.today);
    let store = share(SqliteStatusStore::new(&config.store.path));

    let logger = StatusLogger::create(
        &config.folders.logs,
        config.project_name(),
        Arc::new(DbLogSink::new(store.clone())),
        clock.clone(),
    )
    .with_context(|| format!("creating status log in {}", config.folders.logs.display()))?;
    let logger = Arc::new(logger);

    let holidays = HolidaySet::load_or_empty(&config.holidays.source());
    let resolver = BusinessDayResolver::new(config.weekend_rule()?, holidays);

    let fs = Arc::new(StdFileSystem);
    let locator = InputLocator::new(&config.folders.network, fs.clone())
        .with_duplicate_policy(config.duplicate_policy);
    let stager = LocalStager::new(&config.folders.local_staging, fs);

    let tracker = ExecutionTracker::new(store, clock.clone(), &config.robot.id_robot)
        .with_policy(config.transition_policy);

    let composer = NotificationComposer::new(
        &config.process.process_name,
        config.display_name(),
        &config.email.sender,
        &config.email.recipients.addresses(),
    )
    .with_cc(config.email.cc.addresses());

    let runner = JobRunner::new(
        &config.process.process_name,
        tracker,
        logger.clone(),
        resolver,
        locator,
        stager,
        clock,
    )
    .with_notifications(Arc::new(LoggingNotifier), composer);

    let report = runner.run().context("store unavailable")?;
    logger.finish();

    info!(
        execution_id = report.execution_id,
        status = %report.status,
        staged = report.staged.len(),
        failed_items = report.failed_items(),
        "Run finished"
    );
    Ok(report.is_success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("Run aborted: {e:#}");
            ExitCode::FAILURE
        }
    }
}
