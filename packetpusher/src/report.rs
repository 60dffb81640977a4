//! Result rows handed to the outside world, plus a plain-text table.
use std::fmt::Write as _;

use crate::orchestrator::worker_label;
use crate::telemetry::Telemetry;
use crate::util::round_to;

pub const TOTAL_LABEL: &str = "total";

const HEADERS: [&str; 8] = [
    "worker",
    "data out MB",
    "data in MB",
    "rate MB/s",
    "packets out",
    "packets in",
    "packet/s",
    "seconds",
];

/// One row of the results table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub label: String,
    pub mbytes_out: f64,
    pub mbytes_in: f64,
    /// Combined in+out megabytes per second.
    pub rate_mbps: f64,
    pub packets_out: u64,
    pub packets_in: u64,
    pub packets_per_sec: f64,
    pub elapsed: f64,
}

impl ReportRow {
    pub fn from_telemetry(label: impl Into<String>, telemetry: &Telemetry) -> Self {
        Self {
            label: label.into(),
            mbytes_out: telemetry.mbytes_out(),
            mbytes_in: telemetry.mbytes_in(),
            rate_mbps: telemetry.throughput_bytes_per_sec() / (1024.0 * 1024.0),
            packets_out: telemetry.packets_out,
            packets_in: telemetry.packets_in,
            packets_per_sec: telemetry.throughput_packets_per_sec(),
            elapsed: telemetry.elapsed(),
        }
    }

    fn cells(&self) -> [String; 8] {
        [
            self.label.clone(),
            format!("{:.2}", round_to(self.mbytes_out, 2)),
            format!("{:.2}", round_to(self.mbytes_in, 2)),
            format!("{:.2}", round_to(self.rate_mbps, 2)),
            self.packets_out.to_string(),
            self.packets_in.to_string(),
            format!("{:.2}", round_to(self.packets_per_sec, 2)),
            format!("{:.4}", round_to(self.elapsed, 4)),
        ]
    }
}

/// Per-worker rows in worker-index order followed by the merged total.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub rows: Vec<ReportRow>,
    pub total: ReportRow,
}

impl Report {
    pub fn new(results: &[Telemetry]) -> Self {
        let rows = results
            .iter()
            .enumerate()
            .map(|(index, t)| ReportRow::from_telemetry(worker_label(index), t))
            .collect();
        let total: Telemetry = results.iter().sum();
        Self {
            rows,
            total: ReportRow::from_telemetry(TOTAL_LABEL, &total),
        }
    }

    /// Renders the rows as a boxed, right-aligned text table.
    pub fn render(&self) -> String {
        let body: Vec<[String; 8]> = self
            .rows
            .iter()
            .chain(std::iter::once(&self.total))
            .map(ReportRow::cells)
            .collect();

        let mut widths = HEADERS.map(str::len);
        for cells in &body {
            for (width, cell) in widths.iter_mut().zip(cells) {
                *width = (*width).max(cell.len());
            }
        }

        let rule = widths.iter().fold(String::from("+"), |mut acc, w| {
            acc.push_str(&"-".repeat(w + 2));
            acc.push('+');
            acc
        });

        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        push_line(&mut out, &HEADERS.map(String::from), &widths);
        let _ = writeln!(out, "{}", rule);
        for cells in &body {
            push_line(&mut out, cells, &widths);
        }
        let _ = writeln!(out, "{}", rule);
        out
    }
}

fn push_line(out: &mut String, cells: &[String; 8], widths: &[usize; 8]) {
    out.push('|');
    for (cell, width) in cells.iter().zip(widths) {
        let _ = write!(out, " {:>width$} |", cell, width = width);
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(packets: u64, start: f64, end: f64) -> Telemetry {
        Telemetry {
            bytes_in: 0,
            bytes_out: packets * 1024,
            packets_in: 0,
            packets_out: packets,
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn test_row_metrics() {
        let row = ReportRow::from_telemetry("worker-0", &result(2048, 10.0, 12.0));
        assert_eq!(row.mbytes_out, 2.0);
        assert_eq!(row.mbytes_in, 0.0);
        assert_eq!(row.rate_mbps, 1.0);
        assert_eq!(row.packets_out, 2048);
        assert_eq!(row.packets_per_sec, 1024.0);
        assert_eq!(row.elapsed, 2.0);
    }

    #[test]
    fn test_report_total_uses_merge() {
        let report = Report::new(&[result(100, 10.0, 12.0), result(300, 11.0, 14.0)]);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].label, "worker-0");
        assert_eq!(report.rows[1].label, "worker-1");
        assert_eq!(report.total.label, TOTAL_LABEL);
        assert_eq!(report.total.packets_out, 400);
        assert_eq!(report.total.elapsed, 4.0);
        assert_eq!(report.total.packets_per_sec, 100.0);
    }

    #[test]
    fn test_render_contains_every_row() {
        let report = Report::new(&[result(100, 10.0, 12.0)]);
        let table = report.render();
        let lines: Vec<&str> = table.lines().collect();
        // rule, header, rule, worker-0, total, rule
        assert_eq!(lines.len(), 6);
        assert!(lines[1].contains("packets out"));
        assert!(lines[3].contains("worker-0"));
        assert!(lines[4].contains("total"));
        assert!(lines[4].contains("2.0000"));
        assert!(lines.iter().all(|l| l.len() == lines[0].len()));
    }

    #[test]
    fn test_empty_report() {
        let report = Report::new(&[]);
        assert!(report.rows.is_empty());
        assert_eq!(report.total.packets_out, 0);
        assert_eq!(report.total.rate_mbps, 0.0);
    }
}
