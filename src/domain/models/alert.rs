//! Alert domain model.
//!
//! Alerts reference servers by id only. An alert may outlive the server it
//! points at; lookups that miss are shown as an unknown server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::server::ServerId;

/// Identifier of an alert in the system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub i64);

impl std::fmt::Display for AlertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity of an alert. Ordered so that `High` sorts above `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" | "critical" => Some(Self::High),
            _ => None,
        }
    }
}

/// An alert raised against a server or team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub severity: AlertSeverity,
    /// Weak reference to the affected server
    #[serde(default)]
    pub server_id: Option<ServerId>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolution_note: Option<String>,
}

impl Alert {
    pub fn new(
        id: AlertId,
        severity: AlertSeverity,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            severity,
            server_id: None,
            team: None,
            title: None,
            message: message.into(),
            created_at,
            resolved: false,
            resolution_note: None,
        }
    }

    pub fn for_server(mut self, server_id: ServerId) -> Self {
        self.server_id = Some(server_id);
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Mark the alert resolved. Returns `false` if it already was.
    ///
    /// A note given while the alert is already resolved is ignored.
    pub fn mark_resolved(&mut self, note: Option<String>) -> bool {
        if self.resolved {
            return false;
        }
        self.resolved = true;
        if note.is_some() {
            self.resolution_note = note;
        }
        true
    }

    /// Unresolved alerts of high severity.
    pub fn is_high_priority(&self) -> bool {
        !self.resolved && self.severity == AlertSeverity::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Alert {
        Alert::new(AlertId(1), AlertSeverity::High, "Database connection timeout", Utc::now())
            .for_server(ServerId(4))
            .with_team("DBA Team")
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::High > AlertSeverity::Medium);
        assert!(AlertSeverity::Medium > AlertSeverity::Low);
        assert_eq!(AlertSeverity::from_str("HIGH"), Some(AlertSeverity::High));
        assert_eq!(AlertSeverity::from_str("urgent"), None);
    }

    #[test]
    fn test_mark_resolved_is_monotonic() {
        let mut alert = sample();
        assert!(alert.is_high_priority());

        assert!(alert.mark_resolved(Some("restarted listener".into())));
        assert!(!alert.mark_resolved(Some("second note".into())));

        assert!(alert.resolved);
        assert_eq!(alert.resolution_note.as_deref(), Some("restarted listener"));
        assert!(!alert.is_high_priority());
    }
}
