use thiserror::Error;

use crate::diag::Diagnostics;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
	#[error("empty statements are illegal")]
	InvalidStatement,

	#[error("bulk extraction not allowed without a row limit")]
	UnboundedBulkFetch,

	#[error("streamed parameter transfer failed: {0}")]
	DataTransfer(String),

	#[error("next row not available")]
	RowNotAvailable,

	#[error("different extraction counts: {first} vs {second}")]
	InconsistentExtractionCount { first: usize, second: usize },

	#[error("invalid column number: {pos} (have {count})")]
	InvalidColumnIndex { pos: usize, count: usize },

	#[error("data set index {index} out of range")]
	InvalidState { index: usize },

	#[error("malformed column descriptor at position {pos}")]
	ColumnFormat { pos: usize },

	#[error(
		"{context} failed\nRequested SQL statement: {statement}\nNative SQL statement: {}\n{diagnostics}",
		.native.as_deref().unwrap_or("<unavailable>")
	)]
	Execution { context: String, statement: String, native: Option<String>, diagnostics: Diagnostics },

	#[error("connection call failed: {context}\n{diagnostics}")]
	Connection { context: String, diagnostics: Diagnostics },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Driver failure reported from a place that cannot see the statement text.
/// `StatementCore` rebuilds these with the full context before they escape.
pub(crate) fn driver_failure(context: &str) -> Error {
	Error::Execution {
		context: context.to_string(),
		statement: String::new(),
		native: None,
		diagnostics: Diagnostics::new(),
	}
}
