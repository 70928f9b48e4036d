//! Wiring shared by all commands.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::http::{HttpClientConfig, MigrationApiClient};
use crate::domain::models::Config;
use crate::services::{
    CheckOrchestrator, CheckTimeouts, FleetRefresh, FleetSession, FleetSync, RetrySettings,
};

/// One fleet session wired to the migration backend.
pub struct AppContext {
    pub config: Config,
    client: Arc<MigrationApiClient>,
    sync: FleetSync,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let client = Arc::new(
            MigrationApiClient::new(HttpClientConfig::from_config(&config.api, &config.checks))
                .context("Failed to create backend client")?,
        );
        let sync = FleetSync::new(
            client.clone(),
            FleetSession::shared(),
            RetrySettings::from(&config.refresh),
        );
        Ok(Self {
            config,
            client,
            sync,
        })
    }

    pub fn session(&self) -> &Arc<FleetSession> {
        self.sync.session()
    }

    pub fn sync(&self) -> &FleetSync {
        &self.sync
    }

    pub fn orchestrator(&self) -> CheckOrchestrator {
        CheckOrchestrator::new(
            self.sync.clone(),
            self.client.clone(),
            CheckTimeouts::from(&self.config.checks),
        )
    }

    /// Load servers and alerts into the session.
    pub async fn load_fleet(&self) -> Result<FleetRefresh> {
        self.sync
            .refresh_all()
            .await
            .with_context(|| format!("Failed to load fleet from {}", self.client.base_url()))
    }
}
