use stanza_driver::{SqlReturn, StatementHandle, Value};

use crate::error::{Error, Result, driver_failure};
use crate::prepare::ExtractionMode;

/// Per-data-set extraction cursor, paired one-to-one with its preparation
/// context. Reset at the start of every fetch step.
///
/// Under manual extraction the call-level interface serves columns through
/// get-data calls that must walk forward; the cursor enforces that and turns
/// a backwards read into an invalid-column error before it reaches the
/// driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extractor {
	mode: ExtractionMode,
	last_column: Option<usize>,
}

impl Extractor {
	#[must_use]
	pub const fn new(mode: ExtractionMode) -> Self {
		Self { mode, last_column: None }
	}

	pub fn reset(&mut self) {
		self.last_column = None;
	}

	#[must_use]
	pub const fn mode(&self) -> ExtractionMode {
		self.mode
	}

	pub fn value(&mut self, driver: &mut dyn StatementHandle, pos: usize) -> Result<Value> {
		if self.mode == ExtractionMode::Manual {
			if let Some(last) = self.last_column {
				if pos <= last {
					return Err(Error::InvalidColumnIndex { pos, count: last + 1 });
				}
			}
			self.last_column = Some(pos);
		}

		match driver.column_value(pos) {
			SqlReturn::Success(value) | SqlReturn::SuccessWithInfo(value) => Ok(value),
			_ => Err(driver_failure("column_value")),
		}
	}
}
