use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thirtyfour::{ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use visa_rescheduler::config::Config;
use visa_rescheduler::poller::AvailabilityClient;
use visa_rescheduler::scheduler::{RescheduleService, RunOptions, RunOutcome};
use visa_rescheduler::session::browser::WebDriverBrowser;
use visa_rescheduler::session::SessionManager;

#[derive(Parser)]
#[command(
    name = "visa-rescheduler",
    about = "Watches the appointment portal for an earlier slot and rebooks it"
)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long)]
    config: PathBuf,

    /// Seconds to wait between two rounds
    #[arg(long, default_value_t = 60)]
    interval: u64,

    /// Maximum rounds to run before giving up
    #[arg(long = "max_times", default_value_t = 60)]
    max_times: u32,

    /// WebDriver endpoint the browser is attached through
    #[arg(long, default_value = "http://localhost:4444")]
    webdriver_url: String,

    /// Show the browser window instead of running headless
    #[arg(long)]
    headed: bool,

    /// Log file path; defaults to ./logs/<timestamp>.log
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<WorkerGuard> {
    let path = match log_file {
        Some(path) => path.clone(),
        None => {
            std::fs::create_dir_all("logs")?;
            let ts = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
            PathBuf::from(format!("logs/{ts}.log"))
        }
    };
    let file = std::fs::File::create(&path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    // Flushes the file sink when dropped at process exit.
    let _guard = init_logging(cli.log_file.as_ref())?;

    let cfg = Config::from_file(&cli.config)?;

    let mut caps = DesiredCapabilities::chrome();
    if !cli.headed {
        caps.add_arg("--headless")?;
    }
    caps.add_arg("--no-sandbox")?;
    caps.add_arg("--disable-dev-shm-usage")?;
    let driver = WebDriver::new(&cli.webdriver_url, caps).await?;
    let browser = WebDriverBrowser::new(driver);

    let session = SessionManager::new(browser, &cfg);
    let client = AvailabilityClient::new(&cfg);
    let opts = RunOptions {
        interval: Duration::from_secs(cli.interval),
        max_rounds: cli.max_times,
        ..RunOptions::default()
    };
    let mut service = RescheduleService::new(session, client, cfg.working_hours, opts);

    let outcome = service.run().await;
    if let Err(e) = service.into_session().into_browser().close().await {
        warn!(error = %e, "failed to shut the browser down cleanly");
    }

    match outcome? {
        RunOutcome::Rescheduled {
            facility,
            date,
            time,
        } => {
            info!(facility = %facility, date = %date, time = %time, "appointment rebooked");
        }
        RunOutcome::RetriesExhausted => {
            info!("no earlier appointment found within the retry budget");
        }
        RunOutcome::OutsideWorkingHours => {
            info!("stopped outside the configured working hours");
        }
    }

    Ok(())
}
