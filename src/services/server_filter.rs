//! Server grid filtering.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{MigrationStatus, Server};
use crate::services::lifecycle::current_status;

/// Criteria for the server grid. `None` disables a criterion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerFilter {
    pub search: String,
    pub environment: Option<String>,
    pub status: Option<MigrationStatus>,
}

impl ServerFilter {
    /// Build a filter from view parameters; `"all"` or `""` disables a criterion.
    pub fn from_params(search: &str, environment: &str, status: &str) -> DomainResult<Self> {
        let environment = match environment.trim() {
            "" => None,
            env if env.eq_ignore_ascii_case("all") => None,
            env => Some(env.to_string()),
        };
        let status = match status.trim() {
            "" => None,
            s if s.eq_ignore_ascii_case("all") => None,
            s => Some(MigrationStatus::from_str(s).ok_or_else(|| {
                DomainError::ValidationRejected(format!("unknown migration status: {s}"))
            })?),
        };
        Ok(Self {
            search: search.trim().to_string(),
            environment,
            status,
        })
    }

    /// Whether `server` passes every criterion.
    ///
    /// Search matches the name case-insensitively or the IP address by
    /// substring. Environment compares case-insensitively. Status compares
    /// against the server's current status.
    pub fn matches(&self, server: &Server) -> bool {
        let search_ok = self.search.is_empty()
            || server.name.to_lowercase().contains(&self.search.to_lowercase())
            || server.ip_address.contains(&self.search);
        let env_ok = self
            .environment
            .as_deref()
            .is_none_or(|env| server.environment.eq_ignore_ascii_case(env));
        let status_ok = self
            .status
            .is_none_or(|status| current_status(server).migration_status == status);

        search_ok && env_ok && status_ok
    }

    /// Servers passing the filter, in input order.
    pub fn apply<'a>(&self, servers: &'a [Server]) -> Vec<&'a Server> {
        servers.iter().filter(|s| self.matches(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CheckStatus, ServerId, StatusHistory, StatusSnapshot};

    fn servers() -> Vec<Server> {
        let ready = StatusSnapshot::new(MigrationStatus::Ready, CheckStatus::NotStarted, CheckStatus::NotApplicable);
        let blocked = StatusSnapshot::new(MigrationStatus::Blocked, CheckStatus::Warning, CheckStatus::NotApplicable);
        vec![
            Server::new(ServerId(1), "PROD-DB-01", "10.0.1.20", "Production")
                .with_history(StatusHistory::from_unordered(vec![ready])),
            Server::new(ServerId(2), "UAT-WEB-03", "10.0.2.31", "UAT")
                .with_history(StatusHistory::from_unordered(vec![blocked])),
            Server::new(ServerId(3), "prod-cache-02", "10.0.1.77", "Production"),
        ]
    }

    fn ids(filter: &ServerFilter) -> Vec<i64> {
        let servers = servers();
        filter.apply(&servers).iter().map(|s| s.id.0).collect()
    }

    #[test]
    fn test_empty_filter_returns_everything() {
        assert_eq!(ids(&ServerFilter::default()), vec![1, 2, 3]);
    }

    #[test]
    fn test_search_by_name_and_ip() {
        let by_name = ServerFilter::from_params("PROD", "all", "all").unwrap();
        assert_eq!(ids(&by_name), vec![1, 3]);

        let by_ip = ServerFilter::from_params("10.0.2", "", "").unwrap();
        assert_eq!(ids(&by_ip), vec![2]);
    }

    #[test]
    fn test_environment_and_status() {
        let f = ServerFilter::from_params("", "production", "ready").unwrap();
        assert_eq!(ids(&f), vec![1]);

        let f = ServerFilter::from_params("", "all", "unknown").unwrap();
        assert_eq!(ids(&f), vec![3]);
    }

    #[test]
    fn test_unknown_status_param_is_rejected() {
        assert!(matches!(
            ServerFilter::from_params("", "all", "teleported"),
            Err(DomainError::ValidationRejected(_))
        ));
    }
}
