//! Migration backend HTTP client with rate limiting.
//!
//! Wraps the backend's REST API and implements both ports: [`FleetSource`]
//! for reads and [`CheckExecutor`] for triggering checks. The backend runs
//! checks in the background and answers the trigger immediately, so
//! `execute` polls the server until its status moves on before it resolves.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Alert, ApiConfig, ChartSlice, CheckConfig, CheckKind, CheckStatus, DashboardCounts, Server,
    ServerId, StatusSnapshot, TrendPoint,
};
use crate::domain::ports::{CheckAck, CheckExecutor, FleetSource};

use super::models::{
    AlertDto, ChartSliceDto, CheckStartedDto, DashboardSummaryDto, ServerDto, TimelineDayDto,
};

/// Settings for [`MigrationApiClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Backend root, without the `/api` suffix
    pub base_url: String,
    pub timeout: Duration,
    pub requests_per_second: NonZeroU32,
    /// Interval between completion polls after a check was triggered
    pub completion_poll: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from_config(&ApiConfig::default(), &CheckConfig::default())
    }
}

impl HttpClientConfig {
    pub fn from_config(api: &ApiConfig, checks: &CheckConfig) -> Self {
        Self {
            base_url: api.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(api.timeout_secs),
            requests_per_second: NonZeroU32::new(api.requests_per_second).unwrap_or(NonZeroU32::MIN),
            completion_poll: Duration::from_millis(checks.completion_poll_ms),
        }
    }
}

/// HTTP client for the migration backend.
///
/// All methods return [`DomainResult`]. Connection problems, timeouts and
/// 5xx/429 responses map to retryable errors; malformed bodies map to
/// [`DomainError::SerializationError`].
#[derive(Clone)]
pub struct MigrationApiClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    completion_poll: Duration,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl MigrationApiClient {
    pub fn new(config: HttpClientConfig) -> DomainResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            timeout: config.timeout,
            completion_poll: config.completion_poll,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(
                config.requests_per_second,
            ))),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request_error(&self, err: reqwest::Error) -> DomainError {
        if err.is_timeout() {
            DomainError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
        } else {
            DomainError::from(err)
        }
    }

    /// Send a request. `Ok(None)` means the backend answered 404.
    async fn send(&self, method: Method, path: &str) -> DomainResult<Option<Response>> {
        self.rate_limiter.until_ready().await;
        let resp = self
            .http
            .request(method, self.url(path))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = format!("{path} returned {status}: {body}");
            return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                DomainError::TransportFailure(message)
            } else {
                DomainError::ValidationRejected(message)
            });
        }
        Ok(Some(resp))
    }

    async fn decode<T: DeserializeOwned>(&self, resp: Response, path: &str) -> DomainResult<T> {
        let body = resp.bytes().await.map_err(|e| self.request_error(e))?;
        let parsed = serde_json::from_slice(&body)
            .inspect_err(|e| warn!(path, error = %e, "unparseable response body"))?;
        Ok(parsed)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> DomainResult<T> {
        match self.send(Method::GET, path).await? {
            Some(resp) => self.decode(resp, path).await,
            None => Err(DomainError::DataInconsistency(format!("{path} not found"))),
        }
    }

    /// GET an endpoint the backend may not offer.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> DomainResult<Option<T>> {
        match self.send(Method::GET, path).await? {
            Some(resp) => self.decode(resp, path).await.map(Some),
            None => {
                debug!(path, "optional endpoint not offered by backend");
                Ok(None)
            }
        }
    }

    /// Trigger a check. `Ok(None)` means the server is unknown to the backend.
    async fn trigger(&self, server_id: ServerId, kind: CheckKind) -> DomainResult<Option<CheckStartedDto>> {
        let path = format!("servers/{server_id}/run-{}", kind.as_str());
        match self.send(Method::POST, &path).await? {
            Some(resp) => self.decode(resp, &path).await.map(Some),
            None => Ok(None),
        }
    }

    /// Wait until the server's current status differs from `baseline` and
    /// the check of `kind` is no longer running.
    async fn await_completion(&self, server_id: ServerId, kind: CheckKind, baseline: Option<StatusSnapshot>) -> DomainResult<()> {
        let mut ticker = tokio::time::interval(self.completion_poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let server = match self.fetch_server(server_id).await {
                Ok(server) => server,
                Err(err) if err.is_retryable() => {
                    warn!(server_id = %server_id, error = %err, "completion poll failed, retrying");
                    continue;
                }
                Err(err) => return Err(err),
            };
            let current = server.history.current();
            let moved = current != baseline.as_ref();
            let running = current.is_some_and(|s| s.check_status(kind) == CheckStatus::Running);
            if moved && !running {
                debug!(server_id = %server_id, kind = %kind, "check completed on backend");
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl FleetSource for MigrationApiClient {
    async fn fetch_servers(&self) -> DomainResult<Vec<Server>> {
        let servers: Vec<ServerDto> = self.get_json("servers").await?;
        Ok(servers.into_iter().map(Server::from).collect())
    }

    async fn fetch_server(&self, id: ServerId) -> DomainResult<Server> {
        // The backend has no single-server read endpoint.
        self.fetch_servers()
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(DomainError::ServerNotFound(id))
    }

    async fn fetch_alerts(&self) -> DomainResult<Vec<Alert>> {
        let alerts: Vec<AlertDto> = self.get_json("alerts").await?;
        Ok(alerts.into_iter().filter_map(AlertDto::into_alert).collect())
    }

    async fn fetch_dashboard_counts(&self) -> DomainResult<Option<DashboardCounts>> {
        let summary: Option<DashboardSummaryDto> = self.get_optional("dashboard-summary").await?;
        Ok(summary.map(DashboardCounts::from))
    }

    async fn fetch_check_breakdown(&self) -> DomainResult<Option<Vec<ChartSlice>>> {
        let slices: Option<Vec<ChartSliceDto>> = self.get_optional("migration-chart").await?;
        Ok(slices.map(|s| s.into_iter().map(ChartSlice::from).collect()))
    }

    async fn fetch_timeline(&self) -> DomainResult<Option<Vec<TrendPoint>>> {
        let days: Option<Vec<TimelineDayDto>> = self.get_optional("timeline-chart").await?;
        let today = Utc::now().date_naive();
        Ok(days.map(|d| d.into_iter().filter_map(|day| day.into_point(today)).collect()))
    }
}

#[async_trait]
impl CheckExecutor for MigrationApiClient {
    async fn execute(&self, server_id: ServerId, kind: CheckKind) -> DomainResult<CheckAck> {
        let baseline = self.fetch_server(server_id).await?.history.current().cloned();

        let started = match self.trigger(server_id, kind).await {
            Ok(Some(started)) => started,
            Ok(None) => return Err(DomainError::ServerNotFound(server_id)),
            Err(DomainError::ValidationRejected(message)) => return Ok(CheckAck::rejected(message)),
            Err(err) => return Err(err),
        };
        debug!(server_id = %server_id, kind = %kind, status = ?started.status, "check triggered");

        self.await_completion(server_id, kind, baseline).await?;
        let message = if started.message.is_empty() {
            format!("{} completed", kind.label())
        } else {
            started.message
        };
        Ok(CheckAck::accepted(message))
    }
}
