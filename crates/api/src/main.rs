use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use valu_core::domain::{strategy::Strategy, ticker};
use valu_core::storage::queries::{self, PickedTicker, SeriesPoint};
use valu_core::time::kr_market;

const SERIES_WINDOW_MONTHS: u32 = 36;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = valu_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match valu_core::storage::connect(db_url).await {
            Ok(pool) => match valu_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let app = router(AppState { pool });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/pick/:date", get(get_giant_picks))
        .route("/ticker/:ticker", get(get_ticker_series))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    pool: Option<PgPool>,
}

#[derive(Debug, Deserialize)]
struct PickQuery {
    giant: String,
}

#[derive(Debug, Serialize)]
struct ApiPicks {
    date: NaiveDate,
    giant: &'static str,
    tickers: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Debug, Serialize)]
struct ApiTickerSeries {
    ticker: String,
    from: NaiveDate,
    to: NaiveDate,
    data: BTreeMap<NaiveDate, SeriesPoint>,
}

fn parse_date(s: &str) -> Result<NaiveDate, StatusCode> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)
}

fn internal(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %format!("{e:#}"), "query failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_giant_picks(
    State(state): State<AppState>,
    Path(date): Path<String>,
    Query(query): Query<PickQuery>,
) -> Result<Json<ApiPicks>, StatusCode> {
    let date = parse_date(&date)?;
    let strategy = Strategy::parse(&query.giant).ok_or(StatusCode::BAD_REQUEST)?;
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let picked: Vec<PickedTicker> = queries::giant_picks(pool, date, strategy)
        .await
        .map_err(internal)?;

    Ok(Json(ApiPicks {
        date,
        giant: strategy.pick_column(),
        tickers: picked.into_iter().map(|p| (p.ticker, p.values)).collect(),
    }))
}

async fn get_ticker_series(
    State(state): State<AppState>,
    Path(ticker_arg): Path<String>,
) -> Result<Json<ApiTickerSeries>, StatusCode> {
    let code = ticker::validate(ticker_arg.trim())
        .map(ticker::db_code)
        .map_err(|_| StatusCode::BAD_REQUEST)?
        .to_string();
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let to = kr_market::resolve_as_of_date(None, chrono::Utc::now()).map_err(internal)?;
    let from = to
        .checked_sub_months(Months::new(SERIES_WINDOW_MONTHS))
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let data = queries::ticker_series(pool, &code, from, to)
        .await
        .map_err(internal)?;

    Ok(Json(ApiTickerSeries::new(code, from, to, data)))
}

impl ApiTickerSeries {
    /// An unknown ticker or an empty window is an empty `data` map, not an error.
    fn new(
        ticker: String,
        from: NaiveDate,
        to: NaiveDate,
        data: BTreeMap<NaiveDate, SeriesPoint>,
    ) -> Self {
        Self {
            ticker,
            from,
            to,
            data,
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &valu_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
