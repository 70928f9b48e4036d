pub mod alert;
pub mod config;
pub mod server;
pub mod summary;

pub use alert::{Alert, AlertId, AlertSeverity};
pub use config::{
    ApiConfig, CheckConfig, Config, LoggingConfig, RefreshConfig, ReportingConfig,
};
pub use server::{
    CheckKind, CheckStatus, MigrationStatus, Server, ServerId, StatusHistory, StatusSnapshot,
    UNKNOWN_SNAPSHOT,
};
pub use summary::{
    ActivityEntry, ChartSlice, CheckCounts, CountDrift, DashboardCounts, EnvironmentRow,
    FleetSummary, ReportingWindow, StatusTone, SuccessRate, TrendPoint,
};
