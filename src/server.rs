//! HTTP JSON access layer over a shared proxy pool.

use crate::api::{
    validate_key, ErrorResponse, HealthResponse, ListResponse, MessageResponse, NextResponse,
    ProxyKey, ProxyRecord, ReportRequest,
};
use crate::error::{InvalidProxy, NoProxyAvailable};
use crate::pool::{AddOutcome, PoolStats, ProxyPool};
use crate::proxy::Proxy;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid JSON: {}", .0.body_text())]
    Json(#[from] JsonRejection),
    #[error("Invalid proxy host or port: {0}")]
    InvalidProxy(#[from] InvalidProxy),
    #[error("Proxy {host}:{port} not found")]
    NotFound {
        host: String,
        port: u16,
        stats: PoolStats,
    },
    #[error("No proxies available")]
    Unavailable(PoolStats),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.to_string();
        let (status, body) = match self {
            ApiError::Json(_) | ApiError::InvalidProxy(_) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error,
                    message: None,
                    stats: None,
                },
            ),
            ApiError::NotFound { stats, .. } => (
                StatusCode::NOT_FOUND,
                ErrorResponse {
                    error,
                    message: None,
                    stats: Some(stats),
                },
            ),
            ApiError::Unavailable(stats) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse {
                    error,
                    message: Some("Please add active proxies to the rotator".to_string()),
                    stats: Some(stats),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router with all routes over `pool`.
pub fn router(pool: Arc<ProxyPool>) -> Router {
    Router::new()
        .route("/health", get(health).options(preflight))
        .route("/api/proxy/stats", get(stats).options(preflight))
        .route("/api/proxy/add", post(add_proxy).options(preflight))
        .route("/api/proxy/remove", post(remove_proxy).options(preflight))
        .route("/api/proxy/report", post(report_proxy).options(preflight))
        .route("/api/proxy/list", get(list_proxies).options(preflight))
        .route("/api/proxy/next", get(next_proxy).options(preflight))
        .layer(CorsLayer::permissive())
        .with_state(pool)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, pool: Arc<ProxyPool>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(pool))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Answers `OPTIONS` on every route, with or without CORS request headers.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn stats(State(pool): State<Arc<ProxyPool>>) -> Json<PoolStats> {
    Json(pool.get_stats())
}

async fn add_proxy(
    State(pool): State<Arc<ProxyPool>>,
    payload: Result<Json<ProxyRecord>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(record) = payload?;
    let proxy = Proxy::try_from(record)?;

    let message = match pool.add_proxy(proxy) {
        AddOutcome::Added => "Proxy added successfully",
        AddOutcome::Updated => "Proxy updated successfully",
    };
    Ok(Json(MessageResponse {
        message: message.to_string(),
        stats: pool.get_stats(),
    }))
}

async fn remove_proxy(
    State(pool): State<Arc<ProxyPool>>,
    payload: Result<Json<ProxyKey>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(key) = payload?;
    let port = validate_key(&key.host, key.port)?;

    if !pool.remove_proxy(&key.host, port) {
        return Err(ApiError::NotFound {
            host: key.host,
            port,
            stats: pool.get_stats(),
        });
    }
    Ok(Json(MessageResponse {
        message: "Proxy removed successfully".to_string(),
        stats: pool.get_stats(),
    }))
}

async fn report_proxy(
    State(pool): State<Arc<ProxyPool>>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(report) = payload?;
    let port = validate_key(&report.host, report.port)?;

    let (found, message) = if report.success {
        info!("Proxy check succeeded for {}:{}", report.host, port);
        (
            pool.report_proxy_success(&report.host, port),
            "Proxy check success recorded",
        )
    } else {
        warn!(
            "Proxy check failed for {}:{}: {}",
            report.host,
            port,
            report.error.as_deref().unwrap_or("no error given")
        );
        (
            pool.report_proxy_failure(&report.host, port),
            "Proxy check failure recorded",
        )
    };

    if !found {
        return Err(ApiError::NotFound {
            host: report.host,
            port,
            stats: pool.get_stats(),
        });
    }
    Ok(Json(MessageResponse {
        message: message.to_string(),
        stats: pool.get_stats(),
    }))
}

async fn list_proxies(State(pool): State<Arc<ProxyPool>>) -> Json<ListResponse> {
    let proxies = pool.list_proxies().iter().map(ProxyRecord::from).collect();
    Json(ListResponse {
        proxies,
        stats: pool.get_stats(),
    })
}

async fn next_proxy(State(pool): State<Arc<ProxyPool>>) -> Result<Json<NextResponse>, ApiError> {
    match pool.get_proxy() {
        Ok(proxy) => Ok(Json(NextResponse {
            proxy: ProxyRecord::from(&proxy),
            stats: pool.get_stats(),
        })),
        Err(NoProxyAvailable) => {
            let stats = pool.get_stats();
            warn!(
                "No proxies available - Total: {}, Active: {}, Inactive: {}",
                stats.total, stats.active, stats.inactive
            );
            Err(ApiError::Unavailable(stats))
        }
    }
}
