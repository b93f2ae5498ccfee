//! Rendering rounds for the console.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::metrics::Round;
use crate::scheduler::RoundSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Timestamp line followed by an aligned table
    #[default]
    Table,
    /// One JSON document per round
    Json,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Table => write!(f, "table"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(ReportFormat::Table),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{other}' (expected table or json)")),
        }
    }
}

/// Render `round` as a table: one row per instance, one column per metric.
pub fn render_table(round: &Round) -> String {
    let mut header = vec!["instance".to_string()];
    header.extend(round.metrics.iter().map(|metric| metric.name().to_string()));

    let rows: Vec<Vec<String>> = round
        .instances
        .iter()
        .map(|record| {
            let mut row = vec![record.key().to_string()];
            row.extend(round.metrics.iter().map(|metric| {
                record.get(*metric).map(ToString::to_string).unwrap_or_default()
            }));
            row
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|column| {
            rows.iter()
                .map(|row| row[column].chars().count())
                .chain(std::iter::once(header[column].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_row = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!(" {cell:<width$} "))
            .collect();
        format!("|{}|", padded.join("|"))
    };
    let rule = format!(
        "+{}+",
        widths.iter().map(|width| "-".repeat(width + 2)).collect::<Vec<_>>().join("+")
    );

    let mut out = String::new();
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format_row(&header));
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    for row in &rows {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

/// Render `round` as `{ "timestamp": ..., "instances": { key: { metric: value } } }`.
pub fn render_json(round: &Round) -> Result<String, serde_json::Error> {
    let mut instances = Map::new();
    for record in &round.instances {
        instances.insert(record.key().to_string(), serde_json::to_value(record)?);
    }

    serde_json::to_string(&json!({
        "timestamp": round.started_at.to_rfc3339(),
        "elapsedMs": round.elapsed.as_millis() as u64,
        "instances": Value::Object(instances),
    }))
}

/// Writes every round to `out`, prefixed by its start time in table mode.
pub struct ConsoleReporter<W> {
    out: W,
    format: ReportFormat,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout(format: ReportFormat) -> Self {
        Self::new(std::io::stdout(), format)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, format: ReportFormat) -> Self {
        Self { out, format }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RoundSink for ConsoleReporter<W> {
    fn publish(&mut self, round: &Round) -> std::io::Result<()> {
        match self.format {
            ReportFormat::Table => {
                writeln!(self.out, "{}", round.started_at.format("%Y-%m-%d %H:%M:%S %:z"))?;
                write!(self.out, "{}", render_table(round))?;
            }
            ReportFormat::Json => {
                writeln!(self.out, "{}", render_json(round).map_err(std::io::Error::other)?)?;
            }
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Local;

    use super::*;
    use crate::metrics::{InstanceResult, Metric, MetricValue, PartialResult};

    fn round() -> Round {
        let metrics = vec![Metric::SyncConnection, Metric::CreatedRooms, Metric::CorsHeaders];
        let mut first = InstanceResult::pending("alpha", &metrics);
        first.merge(
            PartialResult::new()
                .with(Metric::SyncConnection, true)
                .with(Metric::CreatedRooms, 12u64)
                .with(Metric::CorsHeaders, "3/8".to_string()),
        );
        let mut second = InstanceResult::pending("b", &metrics);
        second.merge(
            PartialResult::new()
                .with(Metric::SyncConnection, false)
                .with(Metric::CorsHeaders, MetricValue::Failed),
        );

        Round {
            started_at: Local::now(),
            elapsed: Duration::from_millis(1500),
            metrics,
            instances: vec![first, second],
        }
    }

    #[test]
    fn test_table_layout() {
        let table = render_table(&round());
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[1], "| instance | syncConnection | createdRooms | corsHeaders |");
        assert_eq!(lines[3], "| alpha    | true           | 12           | 3/8         |");
        assert_eq!(lines[4], "| b        | false          | N/A          | FAILED      |");
        assert!(lines.iter().all(|line| line.len() == lines[0].len()));
    }

    #[test]
    fn test_json_keeps_value_types() {
        let json: Value = serde_json::from_str(&render_json(&round()).unwrap()).unwrap();

        assert_eq!(json["elapsedMs"], 1500);
        assert_eq!(json["instances"]["alpha"]["syncConnection"], true);
        assert_eq!(json["instances"]["alpha"]["createdRooms"], 12);
        assert_eq!(json["instances"]["b"]["createdRooms"], "N/A");
        assert_eq!(json["instances"]["b"]["corsHeaders"], "FAILED");
    }

    #[test]
    fn test_console_reporter_prefixes_timestamp() {
        let round = round();
        let mut reporter = ConsoleReporter::new(Vec::new(), ReportFormat::Table);
        reporter.publish(&round).unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let first_line = output.lines().next().unwrap();
        assert_eq!(first_line, round.started_at.format("%Y-%m-%d %H:%M:%S %:z").to_string());
        assert!(output.contains("| alpha "));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert_eq!("table".parse::<ReportFormat>(), Ok(ReportFormat::Table));
        assert!("csv".parse::<ReportFormat>().is_err());
    }
}
