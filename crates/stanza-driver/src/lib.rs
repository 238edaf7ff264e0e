pub mod status;
pub mod types;

pub use status::SqlReturn;
pub use types::{
	ColumnDescriptor, ColumnSlot, DiagnosticRecord, NativeSql, ParamDataPoll, ParamFlow,
	ParamToken, ParameterSlot, SqlDataType, StatementAttr, Value,
};

/// One prepared-statement resource of a call-level database interface.
///
/// Every call is a blocking round-trip and reports its outcome as an explicit
/// [`SqlReturn`] status instead of raising. Implementors own the underlying
/// driver resource and must release it on drop; the engine guarantees a
/// `close_cursor` call on every `clear`, but destruction must succeed even
/// after a failed call. Column and parameter positions are zero-based;
/// diagnostic records are retrieved by one-based index, in order.
pub trait StatementHandle {
	fn set_attr(&mut self, attr: StatementAttr) -> SqlReturn<()>;

	fn prepare(&mut self, text: &str) -> SqlReturn<()>;

	fn execute(&mut self) -> SqlReturn<()>;

	fn exec_direct(&mut self, text: &str) -> SqlReturn<()>;

	fn fetch(&mut self) -> SqlReturn<()>;

	fn more_results(&mut self) -> SqlReturn<()>;

	fn num_result_cols(&mut self) -> SqlReturn<usize>;

	fn describe_col(&mut self, pos: usize) -> SqlReturn<ColumnDescriptor>;

	fn bind_parameter(&mut self, pos: usize, slot: ParameterSlot) -> SqlReturn<()>;

	fn bind_column(&mut self, pos: usize, slot: ColumnSlot) -> SqlReturn<()>;

	fn column_value(&mut self, pos: usize) -> SqlReturn<Value>;

	/// Value of `pos` in row `row` of the fetched row set. Drivers without
	/// array fetch serve row zero only.
	fn bulk_value(&mut self, row: usize, pos: usize) -> SqlReturn<Value> {
		let _ = row;
		self.column_value(pos)
	}

	/// Number of rows the last `fetch` produced. One unless a row-array size
	/// was set through [`StatementAttr::RowArraySize`].
	fn rows_fetched(&self) -> usize {
		1
	}

	fn param_data(&mut self) -> ParamDataPoll;

	fn put_data(&mut self, token: Option<ParamToken>, size: usize) -> SqlReturn<()>;

	fn param_value(&mut self, pos: usize) -> SqlReturn<Value>;

	fn row_count(&mut self) -> SqlReturn<i64>;

	fn close_cursor(&mut self) -> SqlReturn<()>;

	/// Driver-expanded form of `text`, truncated to `capacity`. `required`
	/// reports the full length so callers can grow and retry.
	fn native_sql(&mut self, text: &str, capacity: usize) -> SqlReturn<NativeSql>;

	fn diagnostic_record(&mut self, index: usize) -> SqlReturn<DiagnosticRecord>;
}
