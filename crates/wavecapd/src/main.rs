//! wavecapd — chunked upload daemon.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use wavecap_core::config::WavecapConfig;
use wavecap_services::{hydrate::hydrate_from_disk, Assembler, ChunkStore, CompletionCoordinator, SessionRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = WavecapConfig::load().context("failed to load configuration")?;
    tracing::info!(
        storage_root = %config.storage.storage_root.display(),
        bind_addr = %config.server.bind_addr,
        port = config.server.port,
        "wavecapd starting"
    );

    tokio::fs::create_dir_all(&config.storage.storage_root)
        .await
        .with_context(|| format!("failed to create storage root {}", config.storage.storage_root.display()))?;

    let store = ChunkStore::new(
        config.storage.storage_root.clone(),
        config.storage.session_identifier_alphabet.clone(),
    );
    let registry = SessionRegistry::new();

    let rehydrated = hydrate_from_disk(&store).await;
    let rehydrated_count = rehydrated.len();
    registry.hydrate(rehydrated);
    if rehydrated_count > 0 {
        tracing::info!(sessions = rehydrated_count, "rehydrated sessions from disk");
    }

    let assembler = Arc::new(Assembler::new(
        store.clone(),
        registry.clone(),
        config.completion.assembly_buffer_bytes,
    ));
    let completion = Arc::new(CompletionCoordinator::new(
        registry.clone(),
        assembler.clone(),
        config.completion.completion_retry_initial_secs,
        config.completion.completion_retry_max_secs,
        config.sweeper.session_ttl_active_secs,
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let sweeper_handle = tokio::spawn(wavecap_services::sweeper::run(
        registry.clone(),
        store.clone(),
        config.sweeper.session_ttl_active_secs,
        config.sweeper.session_ttl_completed_secs,
        config.sweeper.sweeper_interval_secs,
        shutdown_tx.subscribe(),
    ));

    let state = wavecap_api::ApiState {
        registry,
        store,
        assembler,
        completion,
        config: Arc::new(config.clone()),
    };

    let server_shutdown = shutdown_tx.subscribe();
    let serve_handle = tokio::spawn(wavecap_api::serve(
        state,
        config.server.bind_addr.clone(),
        config.server.port,
        config.storage.max_chunk_bytes,
        server_shutdown,
    ));

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received, draining background tasks");
    let _ = shutdown_tx.send(());

    let _ = sweeper_handle.await;
    if let Ok(Err(err)) = serve_handle.await {
        tracing::error!(error = %err, "API server exited with an error");
    }

    Ok(())
}
