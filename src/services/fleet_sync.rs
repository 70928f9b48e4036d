//! Fleet synchronization.
//!
//! Pulls servers and alerts from a [`FleetSource`] into the [`FleetSession`].
//! Transient transport failures are retried with exponential backoff; every
//! write is tagged with the epoch captured before the fetch started.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RefreshConfig, Server, ServerId};
use crate::domain::ports::FleetSource;
use crate::services::fleet_session::{ApplyOutcome, FleetSession, SessionEpoch};

/// Retry timing for re-fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_elapsed: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::from(&RefreshConfig::default())
    }
}

impl From<&RefreshConfig> for RetrySettings {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            max_elapsed: Duration::from_millis(config.max_elapsed_ms),
        }
    }
}

impl RetrySettings {
    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }
}

/// Result of a full fleet refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FleetRefresh {
    pub servers: usize,
    pub alerts: usize,
    pub outcome: ApplyOutcome,
}

/// A single server re-fetch and what happened when it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRefresh {
    pub server: Server,
    pub outcome: ApplyOutcome,
}

/// Keeps a [`FleetSession`] in step with a [`FleetSource`].
#[derive(Clone)]
pub struct FleetSync {
    source: Arc<dyn FleetSource>,
    session: Arc<FleetSession>,
    retry: RetrySettings,
}

impl FleetSync {
    pub fn new(source: Arc<dyn FleetSource>, session: Arc<FleetSession>, retry: RetrySettings) -> Self {
        Self {
            source,
            session,
            retry,
        }
    }

    pub fn session(&self) -> &Arc<FleetSession> {
        &self.session
    }

    pub fn source(&self) -> &Arc<dyn FleetSource> {
        &self.source
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> DomainResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let mut attempt = 0u32;
        backoff::future::retry(self.retry.policy(), || {
            attempt += 1;
            let fut = op();
            async move {
                fut.await.map_err(|err| {
                    if err.is_retryable() {
                        warn!(attempt, error = %err, "{what} failed, retrying");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await
    }

    /// Re-fetch the whole fleet.
    #[instrument(skip(self), fields(session_id = %self.session.id()))]
    pub async fn refresh_servers(&self) -> DomainResult<(usize, ApplyOutcome)> {
        let epoch = self.session.epoch();
        let servers = self
            .with_retry("server fetch", || self.source.fetch_servers())
            .await?;
        let count = servers.len();
        let outcome = self.session.replace_servers(epoch, servers);
        debug!(servers = count, ?outcome, "servers refreshed");
        Ok((count, outcome))
    }

    /// Re-fetch all alerts.
    #[instrument(skip(self), fields(session_id = %self.session.id()))]
    pub async fn refresh_alerts(&self) -> DomainResult<(usize, ApplyOutcome)> {
        let epoch = self.session.epoch();
        let alerts = self
            .with_retry("alert fetch", || self.source.fetch_alerts())
            .await?;
        let count = alerts.len();
        let outcome = self.session.replace_alerts(epoch, alerts);
        debug!(alerts = count, ?outcome, "alerts refreshed");
        Ok((count, outcome))
    }

    /// Re-fetch servers, then alerts.
    ///
    /// Servers go first so alert correlation sees the current fleet.
    pub async fn refresh_all(&self) -> DomainResult<FleetRefresh> {
        let (servers, server_outcome) = self.refresh_servers().await?;
        let (alerts, alert_outcome) = self.refresh_alerts().await?;
        let outcome = if server_outcome == ApplyOutcome::Detached || alert_outcome == ApplyOutcome::Detached {
            ApplyOutcome::Detached
        } else {
            ApplyOutcome::Applied
        };
        info!(servers, alerts, ?outcome, "fleet refreshed");
        Ok(FleetRefresh {
            servers,
            alerts,
            outcome,
        })
    }

    /// Re-fetch one server and apply it under `epoch`.
    #[instrument(skip(self, epoch), fields(server_id = %id))]
    pub async fn refresh_server(&self, epoch: SessionEpoch, id: ServerId) -> DomainResult<ServerRefresh> {
        let source = &self.source;
        let server = self
            .with_retry("server re-fetch", || source.fetch_server(id))
            .await?;
        if server.id != id {
            return Err(DomainError::DataInconsistency(format!(
                "asked for server {id}, backend returned server {}",
                server.id
            )));
        }
        let outcome = self.session.apply_server(epoch, server.clone());
        Ok(ServerRefresh { server, outcome })
    }

    /// Refresh the fleet every `interval` until `shutdown` flips to `true`
    /// or its sender is dropped.
    ///
    /// Failed rounds are reported to `on_round` and polling continues.
    pub async fn poll<F>(&self, interval: Duration, mut shutdown: watch::Receiver<bool>, mut on_round: F)
    where
        F: FnMut(&DomainResult<FleetRefresh>) + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(result) = self.refresh_until_shutdown(&mut shutdown).await else {
                        debug!("fleet polling stopped during refresh");
                        return;
                    };
                    if let Err(err) = &result {
                        warn!(error = %err, "fleet poll failed");
                    }
                    on_round(&result);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("fleet polling stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Run one full refresh, abandoning it if shutdown is requested first.
    /// Abandoning is safe: session writes are synchronous and epoch-guarded.
    async fn refresh_until_shutdown(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<DomainResult<FleetRefresh>> {
        let refresh = self.refresh_all();
        tokio::pin!(refresh);
        loop {
            tokio::select! {
                result = &mut refresh => return Some(result),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryFleetSource;
    use crate::domain::models::{Alert, AlertId, AlertSeverity};
    use chrono::Utc;

    fn fast_retry() -> RetrySettings {
        RetrySettings {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            max_elapsed: Duration::from_millis(200),
        }
    }

    fn fixture() -> (Arc<InMemoryFleetSource>, FleetSync) {
        let source = Arc::new(InMemoryFleetSource::new(
            vec![
                Server::new(ServerId(1), "PROD-DB-01", "10.0.1.20", "Production"),
                Server::new(ServerId(2), "UAT-WEB-03", "10.0.2.31", "UAT"),
            ],
            vec![Alert::new(AlertId(1), AlertSeverity::High, "Disk full", Utc::now()).for_server(ServerId(1))],
        ));
        let sync = FleetSync::new(source.clone(), FleetSession::shared(), fast_retry());
        (source, sync)
    }

    #[tokio::test]
    async fn test_refresh_all_populates_session() {
        let (_, sync) = fixture();
        let refresh = sync.refresh_all().await.unwrap();
        assert_eq!(refresh.servers, 2);
        assert_eq!(refresh.alerts, 1);
        assert_eq!(refresh.outcome, ApplyOutcome::Applied);
        assert_eq!(sync.session().servers().len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (source, sync) = fixture();
        source.fail_next(2, DomainError::TransportFailure("connection reset".into())).await;
        let refresh = sync.refresh_all().await.unwrap();
        assert_eq!(refresh.servers, 2);
    }

    #[tokio::test]
    async fn test_permanent_failures_are_not_retried() {
        let (source, sync) = fixture();
        source.fail_next(1, DomainError::SerializationError("bad payload".into())).await;
        assert!(matches!(
            sync.refresh_servers().await,
            Err(DomainError::SerializationError(_))
        ));
        // The next call succeeds because only one failure was scripted.
        assert!(sync.refresh_servers().await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_unknown_server() {
        let (_, sync) = fixture();
        let epoch = sync.session().epoch();
        assert!(matches!(
            sync.refresh_server(epoch, ServerId(9)).await,
            Err(DomainError::ServerNotFound(ServerId(9)))
        ));
    }

    #[tokio::test]
    async fn test_poll_stops_on_shutdown() {
        let (_, sync) = fixture();
        let (tx, rx) = watch::channel(false);
        let mut rounds = 0usize;
        let handle = {
            let sync = sync.clone();
            tokio::spawn(async move {
                sync.poll(Duration::from_millis(10), rx, |_| rounds += 1).await;
                rounds
            })
        };
        tokio::time::sleep(Duration::from_millis(35)).await;
        tx.send(true).unwrap();
        let rounds = handle.await.unwrap();
        assert!(rounds >= 1);
        assert_eq!(sync.session().servers().len(), 2);
    }

    #[tokio::test]
    async fn test_poll_shutdown_interrupts_retrying_refresh() {
        let source = Arc::new(InMemoryFleetSource::new(Vec::new(), Vec::new()));
        source
            .fail_next(100, DomainError::TransportFailure("connection refused".into()))
            .await;
        let slow_retry = RetrySettings {
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(1),
            max_elapsed: Duration::from_secs(30),
        };
        let sync = FleetSync::new(source, FleetSession::shared(), slow_retry);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut rounds = 0usize;
            sync.poll(Duration::from_millis(10), rx, |_| rounds += 1).await;
            rounds
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        let rounds = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("poll should stop without waiting for the retry budget")
            .unwrap();
        assert_eq!(rounds, 0);
    }
}
