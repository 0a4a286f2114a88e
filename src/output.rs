//! Output formatting for scan results

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

use crate::error::{DirProbeError, Result};
use crate::session::ScanResult;
use crate::tracker::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = DirProbeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(DirProbeError::Config(format!(
                "unknown output format '{other}' (expected text or json)"
            ))),
        }
    }
}

/// Complete scan report for machine-readable output.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub target: String,
    pub generated_at: DateTime<Utc>,
    pub summary: Snapshot,
    pub results: Vec<ScanResult>,
}

impl ScanReport {
    pub fn new(target: String, summary: Snapshot, results: Vec<ScanResult>) -> Self {
        Self {
            target,
            generated_at: Utc::now(),
            summary,
            results,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One result as a terminal line, e.g. `[200] http://host/admin (size: 1234)`.
pub fn format_result(result: &ScanResult) -> String {
    result.to_string()
}

/// Human-readable summary printed after a text-format scan.
pub fn format_summary(snapshot: &Snapshot) -> String {
    format!(
        "{} paths probed in {:.1}s: {} reported, {} suppressed, {} failed",
        snapshot.completed,
        snapshot.elapsed.as_secs_f64(),
        snapshot.reported,
        snapshot.suppressed,
        snapshot.failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Verdict;
    use crate::probe::{ProbeError, ProbeOutcome};
    use std::time::Duration;

    fn result(status: Option<u16>, length: Option<u64>, location: Option<&str>) -> ScanResult {
        ScanResult {
            candidate: "admin".to_string(),
            url: "http://example.com/admin".to_string(),
            verdict: Verdict::Report,
            attempts: 1,
            outcome: ProbeOutcome {
                status,
                content_length: length,
                redirect_location: location.map(|s| s.to_string()),
                elapsed: Duration::from_millis(12),
                error: if status.is_none() {
                    Some(ProbeError::Timeout)
                } else {
                    None
                },
            },
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            total: 3,
            completed: 3,
            in_flight: 0,
            remaining: 0,
            reported: 1,
            suppressed: 1,
            failed: 1,
            elapsed: Duration::from_millis(2500),
        }
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_format_result_with_size() {
        let line = format_result(&result(Some(200), Some(512), None));
        assert_eq!(line, "[200] http://example.com/admin (size: 512)");
    }

    #[test]
    fn test_format_result_redirect() {
        let line = format_result(&result(Some(301), None, Some("/login")));
        assert_eq!(line, "[301] http://example.com/admin -> /login");
    }

    #[test]
    fn test_format_result_failure() {
        let line = format_result(&result(None, None, None));
        assert!(line.starts_with("[ERR] http://example.com/admin"));
        assert!(line.contains("timeout"));
    }

    #[test]
    fn test_format_summary() {
        let line = format_summary(&snapshot());
        assert_eq!(line, "3 paths probed in 2.5s: 1 reported, 1 suppressed, 1 failed");
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = ScanReport::new(
            "http://example.com/".to_string(),
            snapshot(),
            vec![result(Some(200), Some(512), None)],
        );

        let json = report.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["target"], "http://example.com/");
        assert_eq!(parsed["summary"]["reported"], 1);
        assert_eq!(parsed["results"][0]["outcome"]["status"], 200);
        assert_eq!(parsed["results"][0]["verdict"], "report");
        assert!(parsed["generated_at"].is_string());
    }
}
