//! Client for the rotator HTTP API.

use crate::api::{
    ErrorResponse, ListResponse, MessageResponse, NextResponse, ProxyKey, ProxyRecord,
    ReportRequest,
};
use crate::pool::PoolStats;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Errors returned by [`RotatorClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The pool had no proxy to hand out.
    #[error("no active proxies available ({} total, {} inactive)", .0.total, .0.inactive)]
    Unavailable(PoolStats),
    #[error("server returned {status}: {message}")]
    Api { status: StatusCode, message: String },
}

/// Thin wrapper over the `/api/proxy` endpoints.
#[derive(Debug, Clone)]
pub struct RotatorClient {
    client: Client,
    base: Url,
}

impl RotatorClient {
    /// Create a client for the server at `base_url`, e.g. `http://localhost:8081`.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_client(Client::new(), base_url)
    }

    /// Like [`RotatorClient::new`], reusing an existing `reqwest` client.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    /// Add a proxy, or refresh it if the key already exists.
    pub async fn add(&self, record: &ProxyRecord) -> Result<MessageResponse, ClientError> {
        self.post("api/proxy/add", record).await
    }

    /// Remove the proxy at `host:port`.
    pub async fn remove(&self, host: &str, port: u16) -> Result<MessageResponse, ClientError> {
        let key = ProxyKey {
            host: host.to_string(),
            port: i64::from(port),
        };
        self.post("api/proxy/remove", &key).await
    }

    /// Report the outcome of a request made through `host:port`.
    pub async fn report(
        &self,
        host: &str,
        port: u16,
        success: bool,
        error: Option<String>,
    ) -> Result<MessageResponse, ClientError> {
        let report = ReportRequest {
            host: host.to_string(),
            port: i64::from(port),
            success,
            error,
        };
        self.post("api/proxy/report", &report).await
    }

    /// List every proxy in the pool.
    pub async fn list(&self) -> Result<ListResponse, ClientError> {
        self.get("api/proxy/list").await
    }

    /// Fetch the next proxy. An exhausted pool maps to [`ClientError::Unavailable`].
    pub async fn next(&self) -> Result<NextResponse, ClientError> {
        self.get("api/proxy/next").await
    }

    /// Fetch pool counts.
    pub async fn stats(&self) -> Result<PoolStats, ClientError> {
        self.get("api/proxy/stats").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.client.get(self.base.join(path)?).send().await?;
        decode(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.base.join(path)?)
            .json(body)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await?;
    let body = serde_json::from_str::<ErrorResponse>(&text).ok();
    match body {
        Some(ErrorResponse {
            stats: Some(stats),
            ..
        }) if status == StatusCode::SERVICE_UNAVAILABLE => Err(ClientError::Unavailable(stats)),
        Some(body) => Err(ClientError::Api {
            status,
            message: body.error,
        }),
        None => Err(ClientError::Api {
            status,
            message: text,
        }),
    }
}
