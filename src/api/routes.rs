use crate::AppState;
use crate::asset::sanitize_asset_name;
use crate::error::{ApiError, ApiResult};
use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Query};
use axum::http::{HeaderValue, Response, StatusCode, header};
use axum::response::{IntoResponse, Json};
use mime_guess::from_path;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RedeemRequest {
    #[serde(default)]
    pub code: Option<String>,
    /// Asset file name, `img` accepted for older clients
    #[serde(default, alias = "img")]
    pub asset: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub ok: bool,
    pub token: String,
    pub msg: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadParams {
    /// ?token=...
    pub token: Option<String>,
    /// &asset=1.jpg (or &img=1.jpg)
    #[serde(alias = "img")]
    pub asset: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub msg: &'static str,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn asset_name(raw: &str) -> ApiResult<String> {
    sanitize_asset_name(raw).ok_or_else(|| ApiError::BadRequest("Invalid asset name".into()))
}

/// "1 hour", "5 minutes", "90 seconds"
fn describe_ttl(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    let (n, unit) = if secs >= 3600 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };

    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// `attachment` disposition with an ASCII fallback name and an RFC 5987
/// encoded `filename*` for everything else.
fn content_disposition(name: &str) -> HeaderValue {
    let fallback = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();

    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }

    let value = format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}");
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

pub async fn index() -> &'static str {
    "Asset redeem service is running. Use /health /redeem /download"
}

pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            msg: "server is running",
        }),
    )
}

/// Exchange a redemption code for a single-use download token
pub async fn redeem(
    Extension(state): Extension<AppState>,
    payload: Result<Json<RedeemRequest>, JsonRejection>,
) -> ApiResult<Json<RedeemResponse>> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let (Some(code), Some(raw_asset)) = (non_empty(request.code), non_empty(request.asset))
    else {
        return Err(ApiError::BadRequest(
            "Missing redemption code or asset".into(),
        ));
    };
    let asset = asset_name(&raw_asset)?;

    // checked before the ledger so a typo in the asset never burns a code
    if !state.assets.exists(&asset).await {
        warn!(%asset, "Redeem for missing asset");
        return Err(ApiError::AssetNotFound);
    }

    state
        .ledger
        .redeem(&code, &asset)
        .await
        .inspect_err(|error| {
            if error.is_rejection() {
                info!(%asset, %error, "Redemption refused");
            }
        })?;

    let issued = state
        .tokens
        .issue(&asset, state.token_ttl)
        .inspect_err(|error| error!(%asset, %error, "Failed to issue download token"))?;
    let ttl = describe_ttl(issued.expires_in);
    info!(%asset, %ttl, "Redemption succeeded");

    Ok(Json(RedeemResponse {
        ok: true,
        token: issued.token,
        msg: format!("Redeemed. The download is valid for {ttl} and can be used once."),
        expires_in: issued.expires_in.as_secs(),
    }))
}

/// Stream an asset once for a valid token
pub async fn download(
    Extension(state): Extension<AppState>,
    params: Result<Query<DownloadParams>, QueryRejection>,
) -> ApiResult<Response<Body>> {
    let Query(params) = params.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let (Some(token), Some(raw_asset)) = (non_empty(params.token), non_empty(params.asset)) else {
        return Err(ApiError::BadRequest("Missing token or asset".into()));
    };
    let asset = asset_name(&raw_asset)?;

    // open first: a missing file must not cost the client its token
    let opened = state.assets.open(&asset).await.map_err(|error| {
        if error.kind() == ErrorKind::NotFound {
            ApiError::AssetNotFound
        } else {
            error!(%asset, ?error, "Failed to open asset");
            ApiError::Internal(error.to_string())
        }
    })?;

    let mime = from_path(&asset).first_or_octet_stream().to_string();
    let content_type = HeaderValue::from_str(&mime)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = content_disposition(&asset);

    state
        .tokens
        .consume(&token, &asset)
        .inspect_err(|error| info!(%asset, %error, "Download refused"))?;

    info!(%asset, bytes = opened.len, "Serving asset download");

    let mut res = Response::new(Body::from_stream(ReaderStream::new(opened.file)));
    let headers = res.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(opened.len));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(res)
}
