use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid load manifest: {0}")]
    InvalidManifest(String),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Mapping error: {0}")]
    Mapping(String),
    #[error("Processing error: {0}")]
    Processing(String),
    /// Output-side filesystem failures; these end the whole run rather than
    /// a single mapping.
    #[error("Filesystem error: {0}")]
    Filesystem(String),
}

#[derive(Debug, Clone)]
pub struct ProcessingMessage {
    pub message: String,
    /// Processing phase that raised the message, e.g. "substitute".
    pub phase: Option<String>,
    /// 1-based CSV data row, when the message concerns a single row.
    pub row: Option<usize>,
}

impl ProcessingMessage {
    pub fn new(message: impl Into<String>, phase: Option<String>, row: Option<usize>) -> Self {
        Self {
            message: message.into(),
            phase,
            row,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProcessingState {
    warnings: Vec<ProcessingMessage>,
    errors: Vec<ProcessingMessage>,
}

impl ProcessingState {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn add_warning(
        &mut self,
        message: impl Into<String>,
        phase: Option<String>,
        row: Option<usize>,
    ) {
        self.warnings
            .push(ProcessingMessage::new(message, phase, row));
    }

    pub fn add_error(
        &mut self,
        message: impl Into<String>,
        phase: Option<String>,
        row: Option<usize>,
    ) {
        self.errors.push(ProcessingMessage::new(message, phase, row));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn get_warnings(&self) -> &[ProcessingMessage] {
        &self.warnings
    }

    pub fn get_errors(&self) -> &[ProcessingMessage] {
        &self.errors
    }

    pub fn merge(&mut self, other: ProcessingState) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }
}

#[derive(Debug)]
pub enum ProcessingOutcome {
    Success,
    SuccessWithWarnings(Vec<ProcessingMessage>),
    Failure {
        errors: Vec<ProcessingMessage>,
        warnings: Vec<ProcessingMessage>,
    },
}

impl ProcessingOutcome {
    pub fn from_state(state: ProcessingState) -> Self {
        if state.errors.is_empty() && state.warnings.is_empty() {
            ProcessingOutcome::Success
        } else if state.has_errors() {
            ProcessingOutcome::Failure {
                errors: state.errors,
                warnings: state.warnings,
            }
        } else {
            ProcessingOutcome::SuccessWithWarnings(state.warnings)
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, ProcessingOutcome::Failure { .. })
    }
}
