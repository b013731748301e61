use thiserror::Error;

/// Why a widget path could not be turned into a live element.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no widget matches path \"{0}\"")]
    NotFound(String),
    #[error("{count} widgets match path \"{path}\"")]
    Ambiguous { path: String, count: usize },
}

/// A line inside a `#macro` block that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("line {line}: expected a trigger line KeyDown(<hex>, <state>, NULL)")]
    BadTrigger { line: usize },
    #[error("line {line}: unrecognized event: {text}")]
    BadEvent { line: usize, text: String },
    #[error("line {line}: number out of range: {text}")]
    BadNumber { line: usize, text: String },
    #[error("line {line}: #macro inside an unterminated block")]
    Unterminated { line: usize },
}
