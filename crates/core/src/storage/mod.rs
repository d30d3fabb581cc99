//! Postgres persistence in the entity-attribute-value layout: `date` and `account_list`
//! dimensions, with `account_raw_data` / `account_processed_data` holding one value per
//! (ticker, date, account).

pub mod accounts;
pub mod dates;
pub mod lock;
pub mod processed;
pub mod queries;
pub mod raw;

use anyhow::Context;

pub async fn connect(database_url: &str) -> anyhow::Result<sqlx::PgPool> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
