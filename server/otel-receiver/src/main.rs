//! Binary entrypoint for the OTLP incident receiver.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use otel_incident_engine::{Config, Pipeline};
use otel_receiver::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  let port: u16 = std::env::var("PORT")
    .unwrap_or_else(|_| "4318".into())
    .parse()?;

  let config = Config::from_env()?;
  tracing::info!(
    latency_threshold_ms = config.latency_threshold_ms,
    dedupe_window_ms = config.dedupe_window_ms,
    forward = config.forward_url.is_some(),
    "incident engine configured"
  );
  let state = Arc::new(AppState {
    pipeline: Pipeline::from_config(config)?,
  });

  let app = otel_receiver::router(state);

  let addr = SocketAddr::from(([127, 0, 0, 1], port));
  tracing::info!("otel-receiver listening on http://{}", addr);

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
