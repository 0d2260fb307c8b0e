pub mod api;
pub mod app_state;
pub mod asset;
pub mod config;
pub mod error;
pub mod ledger;
pub mod token;

use axum::Router;
use axum::body::Body;
use axum::extract::Extension;
use axum::http::Request;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

//
// Re-export
//
pub use api::{RedeemRequest, RedeemResponse, download, health, log_request_errors, redeem};
pub use app_state::AppState;
pub use asset::{AssetDir, sanitize_asset_name};
pub use config::Config;
pub use error::ApiError;
pub use ledger::{CodeLedger, JsonFileStorage, LedgerError, LedgerStorage, RedemptionCode};
pub use token::{IssuedToken, TokenError, TokenStore};

/// Build the HTTP application around an already initialized state
pub fn router(state: AppState) -> Router {
    // CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // spans carry the path only, never the query with its token
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        tracing::info_span!("request", method = %req.method(), path = %req.uri().path())
    });

    Router::new()
        .route("/", get(api::index))
        .route("/health", get(health))
        .route("/redeem", post(redeem))
        .route("/download", get(download))
        .layer(axum::middleware::from_fn(log_request_errors))
        .layer(trace)
        .layer(cors)
        .layer(Extension(state))
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = AppState::new(&config).await?;
    let app = router(state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        %addr,
        asset_dir = %config.asset_dir,
        ttl_secs = config.token_ttl_secs,
        "Server listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
