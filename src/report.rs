use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};

use crate::types::ScanReport;

pub const BANNER: &str = "Checking for available ports...";

/// Live line printed when a port is found open.
pub fn format_open_port(port: u16) -> String {
    format!("Port {port} is open")
}

/// Final summary line, e.g. `Ports available: [22 80 443]`.
pub fn format_summary(report: &ScanReport) -> String {
    let ports: Vec<String> = report.open_ports.iter().map(u16::to_string).collect();
    format!("Ports available: [{}]", ports.join(" "))
}

/// Write results as pretty JSON.
pub fn write_report_json(path: &Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create report file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}
