//! Check executor port: the backend that actually runs pre/post-checks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::{CheckKind, ServerId};

/// Acknowledgement returned when a check execution finishes.
///
/// It never carries the resulting status; that is only ever read back
/// from the system of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckAck {
    pub accepted: bool,
    pub message: String,
}

impl CheckAck {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

/// Executes checks against a server.
#[async_trait]
pub trait CheckExecutor: Send + Sync {
    /// Run a check. The returned future resolves once the external
    /// operation has finished (or was refused). It has no guaranteed
    /// completion time; callers bound it.
    async fn execute(&self, server_id: ServerId, kind: CheckKind) -> DomainResult<CheckAck>;
}
