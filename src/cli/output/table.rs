//! Table output formatting for CLI commands
//!
//! Renders servers, alerts and summary sections with comfy-table.
//! Status cells are colored unless `NO_COLOR` is set or the terminal is dumb;
//! without color they carry a text marker instead.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{
    AlertSeverity, CheckStatus, EnvironmentRow, Server, StatusSnapshot, StatusTone, TrendPoint,
};
use crate::services::{lifecycle, CorrelatedAlert};

use super::truncate;

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// One row per server with its current status.
    pub fn format_servers(&self, servers: &[Server]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Name", "IP", "Environment", "Migration", "Pre-check", "Post-check", "Issue"]));

        for server in servers {
            let current = lifecycle::current_status(server);
            table.add_row(vec![
                Cell::new(server.id),
                Cell::new(&server.name),
                Cell::new(&server.ip_address),
                Cell::new(&server.environment),
                self.migration_cell(current),
                self.check_cell(current.precheck_status),
                self.check_cell(current.postcheck_status),
                Cell::new(truncate(&current.issue_summary, 40)),
            ]);
        }

        table.to_string()
    }

    /// Full status history of one server, oldest first.
    pub fn format_history(&self, server: &Server) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["#", "Recorded", "Migration", "Pre-check", "Post-check", "Issue"]));

        for (index, snapshot) in server.history.iter().enumerate() {
            let recorded = snapshot
                .recorded_at
                .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string());
            table.add_row(vec![
                Cell::new(index + 1),
                Cell::new(recorded),
                self.migration_cell(snapshot),
                self.check_cell(snapshot.precheck_status),
                self.check_cell(snapshot.postcheck_status),
                Cell::new(truncate(&snapshot.issue_summary, 50)),
            ]);
        }

        table.to_string()
    }

    pub fn format_alerts(&self, alerts: &[CorrelatedAlert]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Severity", "Server", "Title", "Message", "Created", "Status"]));

        for item in alerts {
            let alert = &item.alert;
            let status = if alert.resolved { "resolved" } else { "open" };
            table.add_row(vec![
                Cell::new(alert.id),
                self.severity_cell(alert.severity),
                Cell::new(item.server.display_name()),
                Cell::new(truncate(alert.title.as_deref().unwrap_or("-"), 30)),
                Cell::new(truncate(&alert.message, 50)),
                Cell::new(alert.created_at.format("%Y-%m-%d %H:%M")),
                self.tone_cell(
                    status,
                    if alert.resolved { StatusTone::Success } else { StatusTone::Warning },
                ),
            ]);
        }

        table.to_string()
    }

    pub fn format_timeline(&self, points: &[TrendPoint]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Date", "Completed", "Failed", "Total"]));
        for point in points {
            table.add_row(vec![
                Cell::new(point.date.format("%b %d")),
                Cell::new(point.completed),
                Cell::new(point.failed),
                Cell::new(point.total()),
            ]);
        }
        table.to_string()
    }

    pub fn format_environments(&self, rows: &[EnvironmentRow]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Environment", "Completed", "Failed", "Warning"]));
        for row in rows {
            table.add_row(vec![
                Cell::new(&row.environment),
                Cell::new(row.completed),
                Cell::new(row.failed),
                Cell::new(row.warning),
            ]);
        }
        table.to_string()
    }

    /// Two-column key/value table.
    pub fn format_pairs<K: AsRef<str>, V: AsRef<str>>(&self, pairs: &[(K, V)]) -> String {
        let mut table = self.create_base_table();
        for (key, value) in pairs {
            table.add_row(vec![
                Cell::new(key.as_ref()).add_attribute(Attribute::Bold),
                Cell::new(value.as_ref()),
            ]);
        }
        table.to_string()
    }

    pub fn migration_cell(&self, snapshot: &StatusSnapshot) -> Cell {
        self.tone_cell(snapshot.migration_status.label(), lifecycle::status_tone(snapshot))
    }

    pub fn check_cell(&self, status: CheckStatus) -> Cell {
        self.tone_cell(status.label(), check_tone(status))
    }

    pub fn severity_cell(&self, severity: AlertSeverity) -> Cell {
        let tone = match severity {
            AlertSeverity::High => StatusTone::Error,
            AlertSeverity::Medium => StatusTone::Warning,
            AlertSeverity::Low => StatusTone::Info,
        };
        self.tone_cell(severity.as_str(), tone)
    }

    pub fn tone_cell(&self, text: &str, tone: StatusTone) -> Cell {
        if self.use_colors {
            Cell::new(text).fg(tone_color(tone))
        } else {
            Cell::new(format!("{} {text}", tone_icon(tone)))
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

fn check_tone(status: CheckStatus) -> StatusTone {
    match status {
        CheckStatus::Passed => StatusTone::Success,
        CheckStatus::Failed => StatusTone::Error,
        CheckStatus::Warning | CheckStatus::Running => StatusTone::Warning,
        CheckStatus::NotStarted | CheckStatus::NotApplicable | CheckStatus::Unknown => StatusTone::Info,
    }
}

fn tone_color(tone: StatusTone) -> Color {
    match tone {
        StatusTone::Success => Color::Green,
        StatusTone::Warning => Color::Yellow,
        StatusTone::Error => Color::Red,
        StatusTone::Info => Color::Blue,
    }
}

fn tone_icon(tone: StatusTone) -> &'static str {
    match tone {
        StatusTone::Success => "✓",
        StatusTone::Warning => "!",
        StatusTone::Error => "✗",
        StatusTone::Info => "·",
    }
}

/// Check if the terminal supports colors
fn supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("TERM").is_ok_and(|term| term == "dumb") {
        return false;
    }
    console::colors_enabled()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{MigrationStatus, ServerId, StatusHistory};

    fn server() -> Server {
        Server::new(ServerId(7), "PROD-API-01", "10.0.1.7", "Production").with_history(
            StatusHistory::from_unordered(vec![StatusSnapshot::new(
                MigrationStatus::Blocked,
                CheckStatus::Failed,
                CheckStatus::NotApplicable,
            )
            .with_issue("Port 443 unreachable")]),
        )
    }

    #[test]
    fn test_server_table_without_colors_uses_markers() {
        let formatter = TableFormatter::with_config(false, Some(160));
        let out = formatter.format_servers(&[server()]);
        assert!(out.contains("PROD-API-01"));
        assert!(out.contains("! Blocked"), "got:\n{out}");
        assert!(out.contains("Port 443 unreachable"));
    }

    #[test]
    fn test_history_table_lists_every_snapshot() {
        let formatter = TableFormatter::with_config(false, Some(160));
        let out = formatter.format_history(&server());
        assert!(out.contains("Recorded"));
        assert!(out.contains("✗ Failed"));
    }

    #[test]
    fn test_pairs_table() {
        let formatter = TableFormatter::with_config(false, None);
        let out = formatter.format_pairs(&[("Servers", "12"), ("Success rate", "N/A")]);
        assert!(out.contains("Success rate"));
        assert!(out.contains("N/A"));
    }
}
