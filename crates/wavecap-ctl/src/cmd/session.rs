//! Session inspection, cancellation, and manual assemble trigger — a thin
//! client over the same verbs the protocol handlers expose to uploaders.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, delete_json, post_json};

#[derive(Debug, Deserialize)]
struct StatusResponse {
    total_chunks: u32,
    persisted_count: u32,
    missing_indices: Vec<u32>,
    assembly_state: String,
    artifact_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CancelResponse {
    cancelled: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionSignalResponse {
    assembly_state: String,
}

pub async fn cmd_session_inspect(port: u16, id: &str) -> Result<()> {
    let url = format!("{}/sessions/{}", base_url(port), id);
    let resp: StatusResponse = super::http::get_json(&url).await?;
    println!("session:          {id}");
    println!("total_chunks:     {}", resp.total_chunks);
    println!("persisted_count:  {}", resp.persisted_count);
    println!("missing_indices:  {:?}", resp.missing_indices);
    println!("assembly_state:   {}", resp.assembly_state);
    if let Some(path) = resp.artifact_path {
        println!("artifact_path:    {path}");
    }
    Ok(())
}

pub async fn cmd_session_cancel(port: u16, id: &str) -> Result<()> {
    let url = format!("{}/sessions/{}", base_url(port), id);
    let resp: CancelResponse = delete_json(&url).await?;
    if resp.cancelled {
        println!("session {id} cancelled");
    } else {
        println!("session {id} was not cancelled");
    }
    Ok(())
}

pub async fn cmd_session_assemble(port: u16, id: &str) -> Result<()> {
    let url = format!("{}/sessions/{}/assemble", base_url(port), id);
    let resp: CompletionSignalResponse = post_json(&url).await?;
    println!("session {id} assembly_state: {}", resp.assembly_state);
    Ok(())
}
