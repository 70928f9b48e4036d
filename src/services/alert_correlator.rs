//! Alert correlation, filtering and resolution.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Alert, AlertId, AlertSeverity, Server, ServerId};

/// Severity criterion of an alert filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeverityFilter {
    #[default]
    All,
    Only(AlertSeverity),
}

/// Resolution criterion of an alert filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Resolved,
    Unresolved,
}

/// Criteria for [`filter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub search: String,
    pub severity: SeverityFilter,
    pub status: StatusFilter,
}

impl AlertFilter {
    /// Build a filter from the string parameters a view passes around.
    ///
    /// `"all"` (or an empty string) disables the severity/status criterion.
    pub fn from_params(search: &str, severity: &str, status: &str) -> DomainResult<Self> {
        let severity = match severity.trim().to_lowercase().as_str() {
            "" | "all" => SeverityFilter::All,
            other => SeverityFilter::Only(AlertSeverity::from_str(other).ok_or_else(|| {
                DomainError::ValidationRejected(format!("unknown severity filter: {other}"))
            })?),
        };
        let status = match status.trim().to_lowercase().as_str() {
            "" | "all" => StatusFilter::All,
            "resolved" => StatusFilter::Resolved,
            "unresolved" | "open" => StatusFilter::Unresolved,
            other => {
                return Err(DomainError::ValidationRejected(format!(
                    "unknown status filter: {other}"
                )))
            }
        };
        Ok(Self {
            search: search.trim().to_string(),
            severity,
            status,
        })
    }
}

/// The server an alert points at, as far as the session knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerRef {
    Known {
        id: ServerId,
        name: String,
        address: String,
    },
    /// The alert references a server the fleet does not contain
    Unknown { id: ServerId },
    /// The alert is not tied to a server
    Unassigned,
}

impl ServerRef {
    pub fn display_name(&self) -> String {
        match self {
            Self::Known { name, .. } => name.clone(),
            Self::Unknown { id } => format!("unknown server #{id}"),
            Self::Unassigned => "-".to_string(),
        }
    }
}

/// An alert joined with its server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelatedAlert {
    pub alert: Alert,
    pub server: ServerRef,
}

impl CorrelatedAlert {
    fn matches_search(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let contains = |haystack: &str| haystack.to_lowercase().contains(needle);

        self.alert.title.as_deref().is_some_and(contains)
            || contains(&self.alert.message)
            || match &self.server {
                ServerRef::Known { name, address, .. } => contains(name) || contains(address),
                _ => false,
            }
    }
}

/// Join each alert with its server.
pub fn correlate(alerts: &[Alert], servers: &[Server]) -> Vec<CorrelatedAlert> {
    let index: HashMap<ServerId, &Server> = servers.iter().map(|s| (s.id, s)).collect();
    alerts
        .iter()
        .map(|alert| {
            let server = match alert.server_id {
                Some(id) => match index.get(&id) {
                    Some(server) => ServerRef::Known {
                        id,
                        name: server.name.clone(),
                        address: server.ip_address.clone(),
                    },
                    None => ServerRef::Unknown { id },
                },
                None => ServerRef::Unassigned,
            };
            CorrelatedAlert {
                alert: alert.clone(),
                server,
            }
        })
        .collect()
}

/// Alerts matching `filter`, in input order.
///
/// Search is case-insensitive and matches the alert title or message, or
/// the correlated server's name or address.
pub fn filter(alerts: &[Alert], servers: &[Server], filter: &AlertFilter) -> Vec<CorrelatedAlert> {
    let needle = filter.search.to_lowercase();
    correlate(alerts, servers)
        .into_iter()
        .filter(|c| match filter.severity {
            SeverityFilter::All => true,
            SeverityFilter::Only(sev) => c.alert.severity == sev,
        })
        .filter(|c| match filter.status {
            StatusFilter::All => true,
            StatusFilter::Resolved => c.alert.resolved,
            StatusFilter::Unresolved => !c.alert.resolved,
        })
        .filter(|c| c.matches_search(&needle))
        .collect()
}

/// Order alerts for a priority view: highest severity first, newest first.
pub fn prioritize(alerts: &mut [CorrelatedAlert]) {
    alerts.sort_by(|a, b| {
        b.alert
            .severity
            .cmp(&a.alert.severity)
            .then_with(|| b.alert.created_at.cmp(&a.alert.created_at))
    });
}

/// Result of a resolve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    Resolved,
    AlreadyResolved,
}

/// Resolve an alert in place. Resolving an already resolved alert is a no-op.
pub fn resolve(alerts: &mut [Alert], id: AlertId, note: Option<String>) -> DomainResult<ResolveOutcome> {
    let alert = alerts
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or(DomainError::AlertNotFound(id))?;

    if alert.mark_resolved(note) {
        Ok(ResolveOutcome::Resolved)
    } else {
        Ok(ResolveOutcome::AlreadyResolved)
    }
}

/// Counts shown on the alert page badges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertBadges {
    pub unresolved: usize,
    pub high_priority: usize,
}

pub fn badge_counts<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> AlertBadges {
    alerts.into_iter().fold(AlertBadges::default(), |mut acc, alert| {
        if !alert.resolved {
            acc.unresolved += 1;
        }
        if alert.is_high_priority() {
            acc.high_priority += 1;
        }
        acc
    })
}
