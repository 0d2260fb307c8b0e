pub mod middleware;
pub mod routes;

// Re-export public types and functions
pub use middleware::log_request_errors;
pub use routes::{
    DownloadParams, HealthResponse, RedeemRequest, RedeemResponse, download, health, index,
    redeem,
};
