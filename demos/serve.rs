use std::env;

use axum::extract::{Query, State};
use axum::{routing::get, Router};
use serde::Deserialize;

use axum_download::{Download, DownloadConfig, DownloadError, RequestConditions};

/// Serves `GET /file?path=...` on port 3000.
///
/// `DOWNLOAD_CONFIG` may hold a JSON [`DownloadConfig`], for example
/// `{"chunk_size": 4096, "throttle_delay_ms": 50}`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = match env::var("DOWNLOAD_CONFIG") {
        Ok(json) => serde_json::from_str(&json)?,
        Err(_) => DownloadConfig::default(),
    };

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!(addr = %listener.local_addr()?, ?config, "serving downloads");
    axum::serve(listener, router(config)).await?;
    Ok(())
}

fn router(config: DownloadConfig) -> Router {
    Router::new()
        .route("/", get(|| async { "GET /file?path=<file>" }))
        .route("/file", get(get_file))
        .with_state(config)
}

#[derive(Debug, Deserialize)]
struct FileRequest {
    path: String,
}

async fn get_file(
    State(config): State<DownloadConfig>,
    conditions: RequestConditions,
    Query(q): Query<FileRequest>,
) -> Result<Download, DownloadError> {
    Ok(Download::file(&q.path).await?.config(config).conditions(conditions))
}
