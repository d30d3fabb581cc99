use anyhow::Context;
use std::collections::HashMap;
use uuid::Uuid;

/// Raw market accounts written by the price uploader and joined by the read API.
pub const RAW_ACCOUNTS: [&str; 6] = ["open", "high", "low", "close", "volume", "percent_change"];

pub async fn account_ids(pool: &sqlx::PgPool, names: &[&str]) -> anyhow::Result<HashMap<String, Uuid>> {
    let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    let rows: Vec<(String, Uuid)> =
        sqlx::query_as("SELECT acc_name, acc_id FROM account_list WHERE acc_name = ANY($1)")
            .persistent(false)
            .bind(&names)
            .fetch_all(pool)
            .await
            .context("select account ids failed")?;

    let map: HashMap<String, Uuid> = rows.into_iter().collect();
    for name in &names {
        if !map.contains_key(name) {
            tracing::error!(acc_name = %name, "account missing from account_list");
        }
    }
    Ok(map)
}
