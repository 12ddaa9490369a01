use std::io::{self, Write};

use serde::Serialize;

use crate::ledger::ResolutionRecord;
use crate::pipeline::{BatchReport, ProgressEvent, ProgressSink, RecordOutcome};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &BatchReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_status(records: &[ResolutionRecord]) -> io::Result<()> {
        Self::print_json(&records)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub fn print_summary(report: &BatchReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!("{cyan}KIRA-GR summary{reset}");
    println!(
        "{green}downloaded: {}  cached: {}{reset}",
        report.downloaded, report.cached
    );
    println!(
        "{yellow}previously failed: {}  failed: {}  no identifier: {}{reset}",
        report.previously_failed, report.failed, report.unidentifiable
    );
    println!(
        "missing archives: {} of {}",
        report.missing, report.total
    );

    for item in &report.records {
        let id = item.original_id.as_deref().unwrap_or("-");
        let (color, text) = match &item.outcome {
            RecordOutcome::Cached { accession } => (green, format!("cached {accession}")),
            RecordOutcome::Downloaded { accession } => (cyan, format!("downloaded {accession}")),
            RecordOutcome::PreviouslyFailed => (yellow, "skipped, failed earlier".to_string()),
            RecordOutcome::Failed { stage, reason } => (red, format!("failed at {stage:?}: {reason}")),
            RecordOutcome::Unidentifiable => (red, "no usable identifier".to_string()),
        };
        println!("{color}  {} [{id}] {text}{reset}", item.genome_label);
    }

    if report.all_missing() {
        println!("{red}failed to retrieve ANY genome data{reset}");
    }
}

pub fn print_status(records: &[ResolutionRecord]) {
    for record in records {
        println!(
            "{}\t{}\t{}\t{}",
            record.original_id,
            record.resolved_id.as_deref().unwrap_or("None"),
            if record.attempted { "attempted" } else { "pending" },
            if record.filename.is_empty() {
                "-"
            } else {
                record.filename.as_str()
            }
        );
    }
}
