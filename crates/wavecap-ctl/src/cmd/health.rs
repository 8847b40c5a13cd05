//! Overall daemon status (liveness only — the daemon holds no global
//! counters worth polling beyond per-session status).

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

pub async fn cmd_health(port: u16) -> Result<()> {
    let url = format!("{}/health", base_url(port));
    let resp: HealthResponse = get_json(&url).await?;
    println!("wavecapd: {}", resp.status);
    Ok(())
}
