//! Display logic for the bulkdns CLI.
//!
//! All result lines go through [`Output::drain`], which is the only code
//! that writes results to stdout. Diagnostics and the summary go to stderr
//! so stdout can be piped into other tools.

use bulkdns_lib::{
    BulkDnsError, DispatchEvent, DispatchReport, QueryOutcome, QueryResult, ResolverEndpoint,
};
use console::{style, Style};
use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc;

/// Width of the domain column, as in `%-30s`.
const DOMAIN_WIDTH: usize = 30;

/// Where and how results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub verbose: bool,
}

/// Counters gathered while draining events.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub completed: usize,
    pub with_nameservers: usize,
    pub without_nameservers: usize,
    pub transport_errors: usize,
    pub empty_responses: usize,
    pub protocol_errors: usize,
    pub task_failures: usize,
}

impl RunStats {
    pub fn record(&mut self, outcome: &QueryOutcome) {
        self.completed += 1;
        match outcome {
            QueryOutcome::Success { nameservers } if nameservers.is_empty() => {
                self.without_nameservers += 1
            }
            QueryOutcome::Success { .. } => self.with_nameservers += 1,
            QueryOutcome::TransportError { .. } => self.transport_errors += 1,
            QueryOutcome::EmptyResponse => self.empty_responses += 1,
            QueryOutcome::ProtocolError { .. } => self.protocol_errors += 1,
            QueryOutcome::TaskFailed { .. } => self.task_failures += 1,
        }
    }

    pub fn failed(&self) -> usize {
        self.transport_errors + self.empty_responses + self.protocol_errors + self.task_failures
    }
}

/// One JSON line per result.
#[derive(Serialize)]
struct JsonRecord<'a> {
    index: usize,
    domain: &'a str,
    resolver: &'a ResolverEndpoint,
    #[serde(flatten)]
    outcome: &'a QueryOutcome,
    elapsed_ms: u64,
}

impl Output {
    pub fn new(json: bool, verbose: bool) -> Self {
        Self { json, verbose }
    }

    /// Announce a resolver picked up during discovery.
    pub fn found_resolver(&self, resolver: &ResolverEndpoint) {
        if !self.verbose {
            return;
        }
        self.diagnostic(format!("Found resolver {}", resolver));
    }

    /// Print every event until the dispatcher drops its sender.
    pub async fn drain(&self, mut events: mpsc::Receiver<DispatchEvent>) -> RunStats {
        let mut stats = RunStats::default();

        while let Some(event) = events.recv().await {
            match event {
                DispatchEvent::Assigned {
                    domain, resolver, ..
                } => {
                    if self.verbose {
                        self.diagnostic(format!("Resolving {} using {}", domain, resolver));
                    }
                }
                DispatchEvent::Completed(result) => {
                    stats.record(&result.outcome);
                    let line = if self.json {
                        json_line(&result)
                    } else {
                        outcome_style(&result.outcome)
                            .apply_to(format_result(&result))
                            .to_string()
                    };
                    self.write_line(&line);
                }
            }
        }

        stats
    }

    /// Verbose chatter. Goes to stderr in JSON mode so stdout stays one
    /// record per line.
    fn diagnostic(&self, line: String) {
        if self.json {
            let _ = writeln!(io::stderr().lock(), "{}", style(line).for_stderr().dim());
        } else {
            self.write_line(&style(line).dim().to_string());
        }
    }

    fn write_line(&self, line: &str) {
        // Write errors (closed pipe) are ignored; events are still drained.
        let _ = writeln!(io::stdout().lock(), "{}", line);
    }
}

/// Plain text line for one result.
pub fn format_result(result: &QueryResult) -> String {
    let domain = &result.domain;
    let server = &result.resolver;
    match &result.outcome {
        QueryOutcome::Success { nameservers } if !nameservers.is_empty() => {
            format!("{:<width$}: {}", domain, nameservers.join(" "), width = DOMAIN_WIDTH)
        }
        QueryOutcome::Success { .. } => format!(
            "{:<width$}: No NS records (server {})",
            domain,
            server,
            width = DOMAIN_WIDTH
        ),
        QueryOutcome::TransportError { cause } => format!(
            "{:<width$}: Error resolving: {} (server {})",
            domain,
            cause,
            server,
            width = DOMAIN_WIDTH
        ),
        QueryOutcome::EmptyResponse => format!(
            "{:<width$}: No answer (server {})",
            domain,
            server,
            width = DOMAIN_WIDTH
        ),
        QueryOutcome::ProtocolError { code, label } => format!(
            "{:<width$}: {} (Rcode {}, server {})",
            domain,
            label,
            code,
            server,
            width = DOMAIN_WIDTH
        ),
        QueryOutcome::TaskFailed { cause } => format!(
            "{:<width$}: Query failed: {} (server {})",
            domain,
            cause,
            server,
            width = DOMAIN_WIDTH
        ),
    }
}

fn json_line(result: &QueryResult) -> String {
    let record = JsonRecord {
        index: result.index,
        domain: &result.domain,
        resolver: &result.resolver,
        outcome: &result.outcome,
        elapsed_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
    };
    serde_json::to_string(&record).unwrap_or_else(|e| {
        format!(
            r#"{{"index":{},"status":"task_failed","cause":"cannot encode result: {}"}}"#,
            result.index, e
        )
    })
}

fn outcome_style(outcome: &QueryOutcome) -> Style {
    match outcome {
        QueryOutcome::Success { nameservers } if !nameservers.is_empty() => Style::new(),
        QueryOutcome::Success { .. }
        | QueryOutcome::EmptyResponse
        | QueryOutcome::ProtocolError { .. } => Style::new().yellow(),
        QueryOutcome::TransportError { .. } | QueryOutcome::TaskFailed { .. } => {
            Style::new().red()
        }
    }
}

/// Print the end-of-run summary to stderr.
pub fn print_summary(stats: &RunStats, report: &DispatchReport, duration: Duration) {
    eprintln!();
    eprintln!(
        "{} {} domain{} in {:.1}s",
        style("Resolved").bold(),
        stats.completed,
        if stats.completed == 1 { "" } else { "s" },
        duration.as_secs_f64()
    );
    eprintln!(
        "  {} with NS records, {} without, {} failed",
        style(stats.with_nameservers).green(),
        style(stats.without_nameservers).yellow(),
        style(stats.failed()).red()
    );

    if stats.failed() > 0 {
        let breakdown = [
            ("transport", stats.transport_errors),
            ("no answer", stats.empty_responses),
            ("rcode", stats.protocol_errors),
            ("crashed", stats.task_failures),
        ]
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(label, count)| format!("{} {}", count, label))
        .collect::<Vec<_>>()
        .join(", ");
        eprintln!("  {}", style(format!("Failures: {}", breakdown)).dim());
    }

    if report.lost > 0 {
        eprintln!(
            "  {}",
            style(format!("{} result(s) could not be reported", report.lost)).red()
        );
    }
}

/// Print a fatal error to stderr.
pub fn print_error(error: &BulkDnsError) {
    eprintln!("{} {}", style("Error:").red().bold(), error);
}
