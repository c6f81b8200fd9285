mod analytics;
mod config;
mod dashboard;
mod data;
mod render;

use chrono::{Local, NaiveDate};
use clap::Parser;
use config::{
    default_start, DashboardConfig, SourceConfig, DEFAULT_MA_WINDOWS, MA_OPTIONS, TICKER_UNIVERSE,
};
use data::DataIngestion;
use dotenv::dotenv;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line choices for one render of the dashboard.
#[derive(Parser, Debug)]
#[command(name = "finance-dashboard")]
#[command(about = "Price history, correlations, returns and risk metrics for a set of assets")]
#[command(version)]
struct Cli {
    /// Assets to analyse, comma separated (see --list)
    #[arg(short, long, value_delimiter = ',')]
    tickers: Vec<String>,

    /// Start date (YYYY-MM-DD), defaults to 2021-01-01
    #[arg(short, long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD, exclusive), defaults to today
    #[arg(short, long)]
    end: Option<NaiveDate>,

    /// Moving-average overlays in days, comma separated
    #[arg(long = "ma", value_delimiter = ',', default_values_t = DEFAULT_MA_WINDOWS)]
    ma_windows: Vec<usize>,

    /// Draw no moving-average overlays on the returns chart
    #[arg(long, conflicts_with = "ma_windows")]
    no_ma: bool,

    /// Directory the HTML dashboard is written to
    #[arg(short, long, default_value = "dashboard")]
    output: PathBuf,

    /// Only print to the terminal, do not write the HTML dashboard
    #[arg(long)]
    no_page: bool,

    /// List the assets and moving-average windows on offer
    #[arg(long)]
    list: bool,
}

impl Cli {
    /// Combines the flags with provider settings from the environment.
    ///
    /// # Errors
    /// Returns an error if a selection is invalid or the environment is malformed
    fn into_config(self) -> anyhow::Result<DashboardConfig> {
        let windows = if self.no_ma {
            Vec::new()
        } else {
            self.ma_windows
        };

        DashboardConfig::new(
            &self.tickers,
            self.start.unwrap_or_else(default_start),
            self.end.unwrap_or_else(|| Local::now().date_naive()),
            &windows,
            (!self.no_page).then_some(self.output),
            SourceConfig::from_env()?,
        )
    }
}

/// Prints the assets and overlay windows a user can pick from.
fn print_options() {
    println!("Assets:");
    for ticker in TICKER_UNIVERSE {
        println!("  {ticker}");
    }
    println!(
        "Moving averages (days): {}",
        MA_OPTIONS.map(|w| w.to_string()).join(", ")
    );
}

/// Application entry point.
///
/// 1. Initialize logging and load `.env`
/// 2. Validate the user's selections
/// 3. Download prices and derive every table (skipped when nothing is selected)
/// 4. Print the dashboard and write the HTML page
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the dashboard itself can be piped.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenv().ok();

    let cli = Cli::parse();
    if cli.list {
        print_options();
        return Ok(());
    }

    let config = cli.into_config()?;
    info!(
        tickers = ?config.tickers,
        start = %config.start,
        end = %config.end,
        windows = ?config.ma_windows,
        "rendering dashboard"
    );

    let ingestion = DataIngestion::new(&config.source)?;
    let view = dashboard::build_view(&ingestion, &config).await?;
    let page = dashboard::render(&config, view.as_ref());

    print!("{}", page.render_text());

    if let Some(dir) = &config.output_dir {
        let path = page.write_html(dir)?;
        info!(path = %path.display(), "dashboard page written");
    }

    Ok(())
}
