use std::fmt;

use stanza_driver::{DiagnosticRecord, SqlReturn, StatementHandle};

/// Ordered trail of driver diagnostic records, refilled after any call that
/// reports "succeeded with info" or fails outright.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
	records: Vec<DiagnosticRecord>,
}

impl Diagnostics {
	#[must_use]
	pub const fn new() -> Self {
		Self { records: Vec::new() }
	}

	/// Pulls records by one-based index until the driver stops yielding. A
	/// truncated record (success with info) is kept and ends the pull; any
	/// other non-success status ends it without appending.
	pub fn collect(&mut self, driver: &mut dyn StatementHandle) {
		let mut index = 1;
		loop {
			match driver.diagnostic_record(index) {
				SqlReturn::Success(record) => {
					self.records.push(record);
					index += 1;
				}
				SqlReturn::SuccessWithInfo(record) => {
					self.records.push(record);
					break;
				}
				_ => break,
			}
		}
	}

	pub fn clear(&mut self) {
		self.records.clear();
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.records.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	#[must_use]
	pub fn records(&self) -> &[DiagnosticRecord] {
		&self.records
	}

	pub fn iter(&self) -> impl Iterator<Item = &DiagnosticRecord> {
		self.records.iter()
	}
}

impl From<Vec<DiagnosticRecord>> for Diagnostics {
	fn from(records: Vec<DiagnosticRecord>) -> Self {
		Self { records }
	}
}

impl fmt::Display for Diagnostics {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.records.is_empty() {
			return Ok(());
		}

		write!(f, "Errors\n==================")?;
		for record in &self.records {
			write!(
				f,
				"\nstate: {}\nnative: {}\ntext: {}\n",
				record.state, record.native, record.message
			)?;
		}
		write!(f, "==================\n")
	}
}
