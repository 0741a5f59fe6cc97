//! InfluxDB query adapter over the 0.8 HTTP API.
//!
//! The probe only needs "run this query, give me the first scalar", so the
//! adapter exposes exactly that through the [`QuerySource`] trait. The 0.8
//! API answers `GET /db/{database}/series` with a JSON array of series,
//! each carrying rows of `[time, value, ...]` points.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors from the data-source boundary.
///
/// Everything here downgrades to an UNKNOWN check result; nothing is
/// allowed to surface as a silent OK or a crash.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not reach the server.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server answered with an error status.
    #[error("server error: {0}")]
    Remote(String),

    /// Credentials were rejected.
    #[error("authentication failed")]
    Auth,

    /// The query matched no series at all.
    #[error("empty response (query: {query})")]
    EmptyResult { query: String },

    /// The response body was not the expected series JSON.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Version tag the adapter has no query path for.
    #[error("unsupported InfluxDB version '{0}' (only 0.8 is supported)")]
    UnsupportedVersion(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::Connection(err.to_string())
        } else {
            ClientError::Remote(err.to_string())
        }
    }
}

/// Server versions with an implemented query path.
///
/// Picked once at startup from the `--version` tag; anything other than
/// 0.8 fails before a single query is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerVersion {
    V0_8,
}

impl ServerVersion {
    pub fn parse(tag: &str) -> Result<Self, ClientError> {
        match tag.trim() {
            "0.8" => Ok(ServerVersion::V0_8),
            other => Err(ClientError::UnsupportedVersion(other.to_string())),
        }
    }
}

/// A source of scalar query results.
///
/// Probes talk to the store through this seam so tests can substitute a
/// stub for the real HTTP client.
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// Run a query and return the value cell of the first point of the
    /// first series, or `None` when the series exists but holds no points.
    async fn fetch_scalar(&self, query: &str) -> Result<Option<f64>, ClientError>;
}

/// HTTP client for the InfluxDB 0.8 query endpoint.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    client: Client,
    base_url: String,
    user: String,
    password: String,
    database: String,
}

impl InfluxClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> InfluxClientBuilder {
        InfluxClientBuilder::default()
    }
}

#[async_trait]
impl QuerySource for InfluxClient {
    async fn fetch_scalar(&self, query: &str) -> Result<Option<f64>, ClientError> {
        let url = format!("{}/db/{}/series", self.base_url, self.database);
        debug!(%url, %query, "issuing query");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("u", self.user.as_str()),
                ("p", self.password.as_str()),
                ("q", query),
                ("time_precision", "s"),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Auth);
        }

        if !response.status().is_success() {
            return Err(ClientError::Remote(format!(
                "API returned status {}",
                response.status()
            )));
        }

        let series: Vec<Series> = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        scalar_from_series(series, query)
    }
}

/// Extract the first scalar from a 0.8 series response.
///
/// Zero series is an error (the query matched nothing); a series with no
/// points yields `None` so the context can report "no data".
fn scalar_from_series(series: Vec<Series>, query: &str) -> Result<Option<f64>, ClientError> {
    let first = series.first().ok_or_else(|| ClientError::EmptyResult {
        query: query.to_string(),
    })?;

    debug!(series = %first.name, points = first.points.len(), "query result");

    let Some(point) = first.points.first() else {
        return Ok(None);
    };

    // Row layout is [time, value, ...]; the aggregate queries we build
    // always put the result in the second cell.
    let value = point
        .get(1)
        .and_then(|cell| cell.as_f64())
        .ok_or_else(|| ClientError::Decode(format!("non-numeric value cell in series '{}'", first.name)))?;

    Ok(Some(value))
}

/// Builder for [`InfluxClient`].
#[derive(Debug, Default)]
pub struct InfluxClientBuilder {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    version: Option<String>,
    timeout: Option<Duration>,
}

impl InfluxClientBuilder {
    /// Set the server hostname or IP.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the HTTP port (default: 8086).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the username and password for authentication.
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set the database to query.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the server version tag (default: "0.8").
    pub fn version(mut self, tag: impl Into<String>) -> Self {
        self.version = Some(tag.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client, failing fast on an unsupported version tag.
    pub fn build(self) -> Result<InfluxClient, ClientError> {
        let tag = self.version.unwrap_or_else(|| "0.8".to_string());
        ServerVersion::parse(&tag)?;

        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let host = self.host.unwrap_or_else(|| "localhost".to_string());
        let port = self.port.unwrap_or(8086);

        Ok(InfluxClient {
            client,
            base_url: format!("http://{}:{}", host, port),
            user: self.user.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
            database: self.database.unwrap_or_default(),
        })
    }
}

/// One series from the 0.8 query response.
#[derive(Debug, Deserialize)]
struct Series {
    name: String,
    #[serde(default)]
    #[allow(dead_code)]
    columns: Vec<String>,
    #[serde(default)]
    points: Vec<Vec<serde_json::Value>>,
}
