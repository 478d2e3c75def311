use std::fmt;

use crate::error::ProcessingMessage;

/// Engine phases surfaced through progress events and per-row messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parse,
    Bind,
    Materialize,
    Write,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Parse => "parse",
            Phase::Bind => "bind",
            Phase::Materialize => "materialize",
            Phase::Write => "write",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-mapping result handed to the caller when one template/CSV pair
/// finishes, successfully or not.
#[derive(Debug, Clone)]
pub struct MappingSummary {
    pub mapping: String,
    pub rows_processed: usize,
    pub manifests_written: usize,
    pub warning_count: usize,
    /// First messages only; the cap keeps summaries bounded on bad inputs.
    pub messages: Vec<ProcessingMessage>,
    pub succeeded: bool,
}

/// Caller-supplied collaborator receiving checkpoint events. The engine owns
/// no transport beyond invoking these methods.
pub trait ProgressReporter: Send + Sync {
    fn phase_started(&self, mapping: &str, phase: Phase);
    fn rows_processed(&self, mapping: &str, rows: usize);
    fn row_message(&self, mapping: &str, message: &ProcessingMessage);
    fn mapping_finished(&self, summary: &MappingSummary);
}

/// Default reporter: forwards every checkpoint to `tracing`.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn phase_started(&self, mapping: &str, phase: Phase) {
        tracing::debug!("[{}] entering phase: {}", mapping, phase);
    }

    fn rows_processed(&self, mapping: &str, rows: usize) {
        tracing::debug!("[{}] processed {} rows", mapping, rows);
    }

    fn row_message(&self, mapping: &str, message: &ProcessingMessage) {
        match (message.row, &message.phase) {
            (Some(row), Some(phase)) => {
                tracing::warn!("[{}] row {} ({}): {}", mapping, row, phase, message.message)
            }
            (Some(row), None) => tracing::warn!("[{}] row {}: {}", mapping, row, message.message),
            _ => tracing::warn!("[{}] {}", mapping, message.message),
        }
    }

    fn mapping_finished(&self, summary: &MappingSummary) {
        if summary.succeeded {
            tracing::info!(
                "[{}] finished: {} rows, {} manifests written, {} warnings",
                summary.mapping,
                summary.rows_processed,
                summary.manifests_written,
                summary.warning_count
            );
        } else {
            tracing::error!(
                "[{}] failed after {} rows ({} manifests written)",
                summary.mapping,
                summary.rows_processed,
                summary.manifests_written
            );
        }
    }
}
