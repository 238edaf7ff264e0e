use stanza_driver::{ColumnDescriptor, ColumnSlot, StatementHandle};

use crate::error::{Error, Result, driver_failure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
	Bound,
	Manual,
}

/// Compiled column layout and buffer sizing policy for one result set.
///
/// The master context is built at compile time; result sets beyond the first
/// clone it, so stored-procedure and batch statements share one sizing
/// policy across all of their shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preparator {
	text: String,
	mode: ExtractionMode,
	max_field_size: usize,
}

impl Preparator {
	pub fn new(text: &str, max_field_size: usize, mode: ExtractionMode) -> Result<Self> {
		if text.trim().is_empty() {
			return Err(Error::InvalidStatement);
		}

		Ok(Self { text: text.to_string(), mode, max_field_size })
	}

	#[must_use]
	pub fn sql(&self) -> &str {
		&self.text
	}

	#[must_use]
	pub const fn mode(&self) -> ExtractionMode {
		self.mode
	}

	#[must_use]
	pub const fn max_field_size(&self) -> usize {
		self.max_field_size
	}

	/// Creates one driver-level column preparation. A no-op under manual
	/// extraction, where values travel through per-column get-data calls.
	pub fn prepare_column(
		&self,
		driver: &mut dyn StatementHandle,
		pos: usize,
		descriptor: &ColumnDescriptor,
	) -> Result<()> {
		if self.mode != ExtractionMode::Bound {
			return Ok(());
		}

		let buffer_len = self.buffer_len(descriptor);
		let status =
			driver.bind_column(pos, ColumnSlot { data_type: descriptor.data_type, buffer_len });
		if status.succeeded() { Ok(()) } else { Err(driver_failure("bind_column")) }
	}

	fn buffer_len(&self, descriptor: &ColumnDescriptor) -> usize {
		let len = descriptor.length.max(1);
		if self.max_field_size > 0 { len.min(self.max_field_size) } else { len }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_statement_text_is_rejected() {
		assert_eq!(Preparator::new("", 1024, ExtractionMode::Bound), Err(Error::InvalidStatement));
		assert_eq!(
			Preparator::new("   \t", 1024, ExtractionMode::Manual),
			Err(Error::InvalidStatement)
		);
	}

	#[test]
	fn clones_share_the_master_policy() {
		let master =
			Preparator::new("select 1", 512, ExtractionMode::Bound).expect("build preparator");
		let clone = master.clone();
		assert_eq!(clone.sql(), "select 1");
		assert_eq!(clone.mode(), ExtractionMode::Bound);
		assert_eq!(clone.max_field_size(), 512);
	}
}
