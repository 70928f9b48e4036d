//! Session-scoped fleet store.
//!
//! Owns the server and alert collections for the lifetime of a session and
//! is shared by reference (`Arc<FleetSession>`) with every consumer. The
//! collections change only by re-fetch replacement or by the monotonic
//! alert resolve; snapshots are never edited in place.
//!
//! Every write carries the [`SessionEpoch`] it was issued under. Invalidating
//! the session (logout, reload) bumps the epoch, so late completions from
//! the previous epoch are dropped instead of repopulating a torn-down store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Alert, AlertId, FleetSummary, ReportingWindow, Server, ServerId};
use crate::services::alert_correlator::{self, ResolveOutcome};
use crate::services::fleet_aggregator;

/// Generation of a session. Writes tagged with a stale epoch are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SessionEpoch(u64);

/// Result of applying re-fetched data to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Replaced the cached entry
    Applied,
    /// The server was not known before and has been added
    Inserted,
    /// The cached entry is newer; the incoming data was ignored
    Stale,
    /// The session epoch that requested the data is no longer live
    Detached,
}

#[derive(Debug, Default)]
struct SessionState {
    servers: Vec<Server>,
    alerts: Vec<Alert>,
    /// Local resolutions, re-applied whenever alerts are replaced
    resolutions: HashMap<AlertId, Option<String>>,
    servers_refreshed_at: Option<DateTime<Utc>>,
    alerts_refreshed_at: Option<DateTime<Utc>>,
}

/// Process-wide store for one dashboard session.
#[derive(Debug)]
pub struct FleetSession {
    id: Uuid,
    epoch: AtomicU64,
    state: RwLock<SessionState>,
}

impl Default for FleetSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch: AtomicU64::new(0),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Create a session ready to be shared.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn epoch(&self) -> SessionEpoch {
        SessionEpoch(self.epoch.load(Ordering::Acquire))
    }

    pub fn is_live(&self, epoch: SessionEpoch) -> bool {
        self.epoch() == epoch
    }

    /// End the current epoch and drop all cached data.
    pub fn invalidate(&self) {
        let mut state = self.write();
        *state = SessionState::default();
        let next = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        info!(session_id = %self.id, epoch = next, "fleet session invalidated");
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn servers(&self) -> Vec<Server> {
        self.read().servers.clone()
    }

    pub fn server(&self, id: ServerId) -> Option<Server> {
        self.read().servers.iter().find(|s| s.id == id).cloned()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.read().alerts.clone()
    }

    /// Run `f` against the current collections without cloning them.
    pub fn with_fleet<R>(&self, f: impl FnOnce(&[Server], &[Alert]) -> R) -> R {
        let state = self.read();
        f(&state.servers, &state.alerts)
    }

    pub fn servers_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.read().servers_refreshed_at
    }

    pub fn alerts_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.read().alerts_refreshed_at
    }

    /// Replace the fleet with a full re-fetch.
    ///
    /// Re-fetches may land out of order, so a cached server whose history is
    /// fresher than the incoming one is kept.
    pub fn replace_servers(&self, epoch: SessionEpoch, incoming: Vec<Server>) -> ApplyOutcome {
        let mut state = self.write();
        if !self.is_live(epoch) {
            debug!(session_id = %self.id, "dropping fleet refresh from a previous epoch");
            return ApplyOutcome::Detached;
        }

        let mut kept_cached = 0usize;
        let merged: Vec<Server> = incoming
            .into_iter()
            .map(|server| match state.servers.iter().find(|s| s.id == server.id) {
                Some(cached) if cached.history.freshness() > server.history.freshness() => {
                    kept_cached += 1;
                    cached.clone()
                }
                _ => server,
            })
            .collect();

        debug!(
            session_id = %self.id,
            servers = merged.len(),
            kept_cached,
            "fleet replaced"
        );
        state.servers = merged;
        state.servers_refreshed_at = Some(Utc::now());
        ApplyOutcome::Applied
    }

    /// Apply a single re-fetched server.
    pub fn apply_server(&self, epoch: SessionEpoch, server: Server) -> ApplyOutcome {
        let mut state = self.write();
        if !self.is_live(epoch) {
            debug!(session_id = %self.id, server_id = %server.id, "dropping server refresh from a previous epoch");
            return ApplyOutcome::Detached;
        }

        match state.servers.iter_mut().find(|s| s.id == server.id) {
            Some(cached) if cached.history.freshness() > server.history.freshness() => {
                debug!(server_id = %server.id, "ignoring stale server refresh");
                ApplyOutcome::Stale
            }
            Some(cached) => {
                *cached = server;
                ApplyOutcome::Applied
            }
            None => {
                warn!(
                    server_id = %server.id,
                    server_name = %server.name,
                    "re-fetched server missing from the known fleet, adding it"
                );
                state.servers.push(server);
                ApplyOutcome::Inserted
            }
        }
    }

    /// Replace the alert collection, keeping local resolutions.
    pub fn replace_alerts(&self, epoch: SessionEpoch, mut incoming: Vec<Alert>) -> ApplyOutcome {
        let mut state = self.write();
        if !self.is_live(epoch) {
            return ApplyOutcome::Detached;
        }

        for alert in &mut incoming {
            if let Some(note) = state.resolutions.get(&alert.id) {
                alert.mark_resolved(note.clone());
            }
        }

        let known: std::collections::HashSet<ServerId> =
            state.servers.iter().map(|s| s.id).collect();
        let orphaned = incoming
            .iter()
            .filter(|a| a.server_id.is_some_and(|id| !known.is_empty() && !known.contains(&id)))
            .count();
        if orphaned > 0 {
            warn!(orphaned, "alerts reference servers missing from the fleet");
        }

        state.alerts = incoming;
        state.alerts_refreshed_at = Some(Utc::now());
        ApplyOutcome::Applied
    }

    /// Resolve an alert. Resolving twice is a no-op.
    pub fn resolve_alert(&self, id: AlertId, note: Option<String>) -> DomainResult<ResolveOutcome> {
        let mut state = self.write();
        let outcome = alert_correlator::resolve(&mut state.alerts, id, note.clone())?;
        if outcome == ResolveOutcome::Resolved {
            state.resolutions.insert(id, note);
            info!(alert_id = %id, "alert resolved");
        }
        Ok(outcome)
    }

    /// Summarize the current collections.
    pub fn summarize(&self, window: &ReportingWindow) -> FleetSummary {
        self.with_fleet(|servers, alerts| fleet_aggregator::summarize(servers, alerts, window))
    }
}
