use axum::{routing::get, Router};
use std::env;
use tokio::net::TcpListener;
use tower_http::{trace::TraceLayer, cors::{Any, CorsLayer}};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use axum::extract::DefaultBodyLimit;

use mindforge::{config::Config, gateway, upstream::GeminiClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "mindforge=info,tower_http=info".into())
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env()?;
    if cfg.api_key.is_none() {
        // keep serving; each request reports the configuration error
        tracing::warn!("API_KEY is not set, generation requests will fail");
    }

    let upstream = GeminiClient::new(reqwest::Client::new(), cfg.upstream_base_url.clone());
    let state = gateway::GatewayState {
        api_key: cfg.api_key.clone(),
        default_model: cfg.default_model.clone(),
        model: upstream,
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(gateway::router(&cfg.gateway_path, state))
        .layer(DefaultBodyLimit::max(cfg.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(path = %cfg.gateway_path, "listening on http://0.0.0.0:{}", cfg.port);

    axum::serve(listener, app).await?;
    Ok(())
}
