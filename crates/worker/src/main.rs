use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use valu_core::config::Settings;
use valu_core::frame::{codec, Category, FrameStore};
use valu_core::ingest::{HttpJsonPriceProvider, PriceProvider};
use valu_core::pipeline::{self, PickScope, StageReport};
use valu_core::time::kr_market;

#[derive(Debug, Parser)]
#[command(name = "valu_worker")]
struct Args {
    /// Root folder of the columnar data. Defaults to VALU_DATA_DIR, then ./src_data.
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Worker threads for per-ticker stages. Defaults to VALU_WORKERS, then one per core.
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calculate per-ticker indicators from prices and statements.
    Indicators {
        /// Comma-separated tickers. Defaults to the ticker list.
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,
    },
    /// Fill cross-sectional relative strength ranks into the indicator files.
    Rank,
    /// Apply the strategy rules and scores to the ranked indicators.
    Screen,
    /// Collect picks into todays_picks.
    Picks(PickArgs),
    /// indicators, rank, screen and picks in sequence.
    Run(PickArgs),
    /// Append new daily bars from the price provider.
    RefreshPrices {
        #[arg(long, default_value = "2015-01-01")]
        start: NaiveDate,
        /// Defaults to the latest KRX business date.
        #[arg(long)]
        end: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,
    },
    /// Fill the `date` table with calendar rows.
    PrepareDates {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Upload todays_picks into account_processed_data.
    UploadPicks {
        /// Only this date (YYYY-MM-DD). Defaults to the whole history file.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Read and count, but do not write to the database.
        #[arg(long)]
        dry_run: bool,
    },
    /// Upload prices into account_raw_data.
    UploadPrices {
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,
    },
}

#[derive(Debug, clap::Args)]
struct PickArgs {
    /// Market as-of date (YYYY-MM-DD). Defaults to the latest KRX business date in KST.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Use the latest screened date instead of the market calendar.
    #[arg(long, conflicts_with = "as_of_date")]
    latest: bool,

    /// Collect every screened date instead of one.
    #[arg(long, conflicts_with_all = ["as_of_date", "latest"])]
    all_dates: bool,

    /// Do everything except writing todays_picks.
    #[arg(long)]
    dry_run: bool,
}

impl PickArgs {
    fn scope(&self) -> anyhow::Result<PickScope> {
        if self.all_dates {
            return Ok(PickScope::AllDates);
        }
        if self.latest {
            return Ok(PickScope::Day(None));
        }
        let date = kr_market::resolve_as_of_date(self.as_of_date.as_deref(), chrono::Utc::now())?;
        Ok(PickScope::Day(Some(date)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    if let Err(err) = run(args, &settings).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "worker failed");
        return Err(err);
    }
    Ok(())
}

async fn run(args: Args, settings: &Settings) -> anyhow::Result<()> {
    let store = FrameStore::new(settings.data_dir(args.data_dir.as_deref()));
    let workers = args.workers.or(settings.workers);
    anyhow::ensure!(workers != Some(0), "--workers must be >= 1");

    match args.command {
        Command::Indicators { tickers } => {
            let pool = pipeline::thread_pool(workers)?;
            let tickers = tickers_or_list(&store, tickers)?;
            log_report("indicators", &pipeline::run_indicators(&pool, &store, &tickers));
        }
        Command::Rank => {
            let pool = pipeline::thread_pool(workers)?;
            log_report("rank", &pipeline::run_rank(&pool, &store)?);
        }
        Command::Screen => {
            let pool = pipeline::thread_pool(workers)?;
            log_report("screen", &pipeline::run_screen(&pool, &store)?);
        }
        Command::Picks(pick) => {
            let pool = pipeline::thread_pool(workers)?;
            run_picks(&pool, &store, &pick)?;
        }
        Command::Run(pick) => {
            let scope = pick.scope()?;
            let pool = pipeline::thread_pool(workers)?;
            let tickers = store.load_ticker_list()?;
            log_report("indicators", &pipeline::run_indicators(&pool, &store, &tickers));
            log_report("rank", &pipeline::run_rank(&pool, &store)?);
            log_report("screen", &pipeline::run_screen(&pool, &store)?);
            let out = pipeline::run_picks(&pool, &store, scope, pick.dry_run)?;
            log_picks(&out);
        }
        Command::RefreshPrices { start, end, tickers } => {
            let end = kr_market::resolve_as_of_date(end.as_deref(), chrono::Utc::now())?;
            anyhow::ensure!(start <= end, "start {start} is after end {end}");
            let provider = HttpJsonPriceProvider::from_settings(settings)?;
            let tickers = tickers_or_list(&store, tickers)?;
            refresh_prices(&store, &provider, &tickers, start, end).await;
        }
        Command::PrepareDates { start, end } => {
            let pool = connect(settings).await?;
            valu_core::storage::dates::prepare_date_table(&pool, start, end).await?;
        }
        Command::UploadPicks { date, dry_run } => {
            let mut picks = pipeline::read_todays_picks(&store)?;
            if let Some(date) = date {
                picks.retain(|p| p.date == date);
            }
            if dry_run {
                tracing::info!(rows = picks.len(), dry_run = true, "todays picks not uploaded");
                return Ok(());
            }
            let pool = connect(settings).await?;
            valu_core::storage::processed::upload_todays_picks(&pool, &picks).await?;
        }
        Command::UploadPrices { tickers } => {
            let pool = connect(settings).await?;
            let tickers = tickers_or_list(&store, tickers)?;
            upload_prices(&pool, &store, &tickers).await;
        }
    }
    Ok(())
}

fn run_picks(pool: &rayon::ThreadPool, store: &FrameStore, pick: &PickArgs) -> anyhow::Result<()> {
    let out = pipeline::run_picks(pool, store, pick.scope()?, pick.dry_run)?;
    log_picks(&out);
    Ok(())
}

fn tickers_or_list(store: &FrameStore, tickers: Vec<String>) -> anyhow::Result<Vec<String>> {
    if tickers.is_empty() {
        return store.load_ticker_list();
    }
    Ok(tickers
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;
    let pool = valu_core::storage::connect(db_url).await?;
    valu_core::storage::migrate(&pool).await?;
    Ok(pool)
}

async fn refresh_prices(
    store: &FrameStore,
    provider: &dyn PriceProvider,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) {
    let mut ok = 0usize;
    for ticker in tickers {
        match valu_core::ingest::refresh_ticker(store, provider, ticker, start, end).await {
            Ok(_) => ok += 1,
            Err(err) => tracing::warn!(%ticker, error = %format!("{err:#}"), "price refresh failed"),
        }
    }
    tracing::info!(total = tickers.len(), succeeded = ok, %start, %end, "price refresh finished");
}

async fn upload_prices(pool: &sqlx::PgPool, store: &FrameStore, tickers: &[String]) {
    let mut ok = 0usize;
    for ticker in tickers {
        match upload_ticker_prices(pool, store, ticker).await {
            Ok(rows) => {
                ok += 1;
                tracing::debug!(%ticker, rows, "prices uploaded");
            }
            Err(err) => tracing::warn!(%ticker, error = %format!("{err:#}"), "price upload failed"),
        }
    }
    tracing::info!(total = tickers.len(), succeeded = ok, "price upload finished");
}

async fn upload_ticker_prices(pool: &sqlx::PgPool, store: &FrameStore, ticker: &str) -> anyhow::Result<u64> {
    let df = store.read(Category::StockData, ticker)?;
    let history = codec::history_from_frame(&df).with_context(|| format!("decode prices for {ticker}"))?;
    valu_core::storage::raw::upload_price_history(pool, ticker, &history).await
}

fn log_report(stage: &str, report: &StageReport) {
    if report.failures.is_empty() {
        tracing::info!(stage, total = report.total, "all tickers succeeded");
    } else {
        let sample: Vec<&str> = report.failures.iter().take(10).map(|f| f.ticker.as_str()).collect();
        tracing::warn!(
            stage,
            total = report.total,
            failed = report.failures.len(),
            ?sample,
            "some tickers failed"
        );
    }
}

fn log_picks(out: &pipeline::PicksOutcome) {
    let date = out.date.map(|d| d.to_string()).unwrap_or_else(|| "all".to_string());
    tracing::info!(
        date = %date,
        new_picks = out.new_picks.len(),
        history = out.history_len,
        "picks collected"
    );
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_and_subcommand() {
        let args = Args::try_parse_from([
            "valu_worker",
            "--data-dir",
            "/tmp/d",
            "picks",
            "--as-of-date",
            "2025-06-04",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.data_dir.as_deref(), Some("/tmp/d"));
        let Command::Picks(p) = args.command else {
            panic!("expected picks");
        };
        assert_eq!(
            p.scope().unwrap(),
            PickScope::Day(NaiveDate::from_ymd_opt(2025, 6, 4))
        );
        assert!(p.dry_run);
    }

    #[test]
    fn all_dates_conflicts_with_explicit_date() {
        let res = Args::try_parse_from([
            "valu_worker",
            "picks",
            "--all-dates",
            "--as-of-date",
            "2025-06-04",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn ticker_flag_splits_on_commas() {
        let args = Args::try_parse_from(["valu_worker", "indicators", "--tickers", "A.KS,B.KQ"]).unwrap();
        let Command::Indicators { tickers } = args.command else {
            panic!("expected indicators");
        };
        assert_eq!(tickers, vec!["A.KS", "B.KQ"]);
    }
}
