use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use dwelltrack_server::state::AppState;

/// `dwelltrack health` — liveness check for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$DWELLTRACK_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("DWELLTRACK_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }
    // Structured JSON logging. Level controlled via RUST_LOG env var.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dwelltrack_server=info".parse()?)
                .add_directive("dwelltrack_core=info".parse()?),
        )
        .json()
        .init();

    let cfg = dwelltrack_server::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Ensure data directory exists before opening DuckDB.
    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/dwelltrack.db", cfg.data_dir);

    // Open DuckDB — creates page_view and button tables if missing.
    let db = dwelltrack_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    info!(
        min_dwell_secs = cfg.min_dwell_secs,
        anonymous_policy = ?cfg.anonymous_policy,
        store_timeout_ms = cfg.store_timeout_ms,
        "Visit tracking configured"
    );

    let state = Arc::new(AppState::new(db, cfg.clone()));

    // Spawn background record-flush task.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.run_record_flush_loop().await;
        });
    }

    // Spawn background idle-session sweeper.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            state.run_session_sweep_loop().await;
        });
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = dwelltrack_server::app::build_app(Arc::clone(&state));

    info!(port = cfg.port, "dwelltrack listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    // Records still queued at shutdown get one last, bounded flush.
    match tokio::time::timeout(std::time::Duration::from_secs(5), state.flush_records()).await {
        Ok(report) => info!(written = report.written, failed = report.failed, "Final flush done"),
        Err(_) => tracing::warn!("Final flush timed out, queued records lost"),
    }

    let sessions = state.sessions.len().await;
    info!(sessions, "Shut down");
    Ok(())
}
