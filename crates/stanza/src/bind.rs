use std::cell::RefCell;
use std::collections::HashMap;
use std::mem::size_of;
use std::rc::Rc;

use stanza_driver::{
	ColumnDescriptor, ParamFlow, ParamToken, ParameterSlot, SqlDataType, SqlReturn,
	StatementHandle, Value,
};

use crate::encoding::EncodingPair;
use crate::error::{Error, Result, driver_failure};
use crate::extract::Extractor;
use crate::prepare::Preparator;
use crate::session::DataTypeInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindPolicy {
	Immediate,
	Deferred,
}

/// One caller-supplied input parameter binding. A binding may span several
/// parameter slots and, for batched execution, several rows.
pub trait InputBinding {
	fn columns_handled(&self) -> usize;

	fn rows_handled(&self) -> usize;

	fn can_bind(&self) -> bool;

	fn bind(
		&mut self,
		driver: &mut dyn StatementHandle,
		binder: &mut ParamBinder,
		pos: usize,
	) -> Result<()>;

	/// Copies output-parameter values from driver-owned storage back into
	/// caller-visible storage after execution.
	fn synchronize(&mut self, driver: &mut dyn StatementHandle, pos: usize) -> SqlReturn<()> {
		let _ = (driver, pos);
		SqlReturn::Success(())
	}
}

/// One caller-supplied output column binding.
pub trait OutputBinding {
	fn columns_handled(&self) -> usize;

	fn is_bulk(&self) -> bool;

	fn prepare(
		&mut self,
		driver: &mut dyn StatementHandle,
		preparator: &Preparator,
		pos: usize,
		columns: &[ColumnDescriptor],
	) -> Result<()>;

	/// Extracts the current row (or row set) into caller storage, returning
	/// the number of rows consumed.
	fn extract(
		&mut self,
		driver: &mut dyn StatementHandle,
		extractor: &mut Extractor,
		pos: usize,
	) -> Result<usize>;
}

/// Sizes parameter slots and tracks deferred buffers for the put-data loop.
#[derive(Debug, Clone)]
pub struct ParamBinder {
	policy: BindPolicy,
	max_field_size: usize,
	encodings: EncodingPair,
	type_info: Option<DataTypeInfo>,
	deferred_sizes: HashMap<u64, usize>,
	next_token: u64,
}

impl ParamBinder {
	#[must_use]
	pub fn new(
		policy: BindPolicy,
		max_field_size: usize,
		encodings: EncodingPair,
		type_info: Option<DataTypeInfo>,
	) -> Self {
		Self { policy, max_field_size, encodings, type_info, deferred_sizes: HashMap::new(), next_token: 1 }
	}

	pub fn reset(&mut self) {
		self.deferred_sizes.clear();
	}

	#[must_use]
	pub const fn policy(&self) -> BindPolicy {
		self.policy
	}

	#[must_use]
	pub const fn encodings(&self) -> EncodingPair {
		self.encodings
	}

	/// Builds the driver slot for one value, registering its declared size
	/// when the binding policy defers the actual data transfer.
	pub fn slot_for(&mut self, value: &Value, flow: ParamFlow) -> ParameterSlot {
		let data_type = Self::data_type_of(value);
		let size = self.parameter_len(value, data_type);
		let deferred = self.policy == BindPolicy::Deferred;
		let token = ParamToken(self.next_token);
		self.next_token += 1;
		if deferred {
			self.deferred_sizes.insert(token.0, size);
		}

		ParameterSlot { token, flow, deferred, size, data_type }
	}

	/// Declared size of a deferred parameter buffer, by token.
	#[must_use]
	pub fn parameter_size(&self, token: ParamToken) -> Option<usize> {
		self.deferred_sizes.get(&token.0).copied()
	}

	const fn data_type_of(value: &Value) -> SqlDataType {
		match value {
			Value::Null | Value::Text(_) => SqlDataType::Varchar,
			Value::Integer(_) => SqlDataType::BigInt,
			Value::Float(_) => SqlDataType::Double,
			Value::Blob(_) => SqlDataType::VarBinary,
		}
	}

	fn parameter_len(&self, value: &Value, data_type: SqlDataType) -> usize {
		let raw = match value {
			Value::Null => 0,
			Value::Integer(_) => size_of::<i64>(),
			Value::Float(_) => size_of::<f64>(),
			Value::Text(text) => text.chars().count() * self.encodings.wire.max_bytes_per_char(),
			Value::Blob(blob) => blob.len(),
		};

		let mut len = raw;
		if self.max_field_size > 0 {
			len = len.min(self.max_field_size);
		}
		if let Some(info) = &self.type_info {
			if let Some(max) = info.max_length(data_type) {
				len = len.min(max);
			}
		}
		len
	}
}

/// Row-major [`Value`] batches bound positionally, usable for any parameter
/// flow. Output-parameter values synchronized after execution are visible
/// through the shared handle from [`ValueBinding::out_values`].
pub struct ValueBinding {
	rows: Vec<Vec<Value>>,
	flow: ParamFlow,
	bound: bool,
	out_values: Rc<RefCell<Vec<Value>>>,
}

impl ValueBinding {
	#[must_use]
	pub fn new(row: Vec<Value>) -> Self {
		Self::batch(vec![row], ParamFlow::Input)
	}

	#[must_use]
	pub fn with_flow(row: Vec<Value>, flow: ParamFlow) -> Self {
		Self::batch(vec![row], flow)
	}

	#[must_use]
	pub fn batch(rows: Vec<Vec<Value>>, flow: ParamFlow) -> Self {
		Self { rows, flow, bound: false, out_values: Rc::new(RefCell::new(Vec::new())) }
	}

	#[must_use]
	pub fn out_values(&self) -> Rc<RefCell<Vec<Value>>> {
		Rc::clone(&self.out_values)
	}
}

impl InputBinding for ValueBinding {
	fn columns_handled(&self) -> usize {
		self.rows.first().map_or(0, Vec::len)
	}

	fn rows_handled(&self) -> usize {
		self.rows.len()
	}

	fn can_bind(&self) -> bool {
		!self.bound && self.columns_handled() > 0
	}

	fn bind(
		&mut self,
		driver: &mut dyn StatementHandle,
		binder: &mut ParamBinder,
		pos: usize,
	) -> Result<()> {
		let Some(row) = self.rows.first() else {
			return Ok(());
		};

		for (offset, value) in row.iter().enumerate() {
			let slot = binder.slot_for(value, self.flow);
			let status = driver.bind_parameter(pos + offset, slot);
			if !status.succeeded() {
				return Err(driver_failure("bind_parameter"));
			}
		}

		self.bound = true;
		Ok(())
	}

	fn synchronize(&mut self, driver: &mut dyn StatementHandle, pos: usize) -> SqlReturn<()> {
		if self.flow == ParamFlow::Input {
			return SqlReturn::Success(());
		}

		let mut values = Vec::with_capacity(self.columns_handled());
		for offset in 0..self.columns_handled() {
			match driver.param_value(pos + offset) {
				SqlReturn::Success(value) | SqlReturn::SuccessWithInfo(value) => values.push(value),
				SqlReturn::NoData => break,
				_ => return SqlReturn::Error,
			}
		}

		*self.out_values.borrow_mut() = values;
		SqlReturn::Success(())
	}
}

/// Collects fetched [`Value`]s row by row; the engine also uses it as the
/// internally created extraction adapter when the caller supplies none.
pub struct ColumnExtraction {
	columns: usize,
	bulk: bool,
	rows: Rc<RefCell<Vec<Vec<Value>>>>,
}

impl ColumnExtraction {
	#[must_use]
	pub fn new(columns: usize) -> Self {
		Self { columns, bulk: false, rows: Rc::new(RefCell::new(Vec::new())) }
	}

	#[must_use]
	pub fn bulk(columns: usize) -> Self {
		Self { columns, bulk: true, rows: Rc::new(RefCell::new(Vec::new())) }
	}

	#[must_use]
	pub fn rows(&self) -> Rc<RefCell<Vec<Vec<Value>>>> {
		Rc::clone(&self.rows)
	}
}

impl OutputBinding for ColumnExtraction {
	fn columns_handled(&self) -> usize {
		self.columns
	}

	fn is_bulk(&self) -> bool {
		self.bulk
	}

	fn prepare(
		&mut self,
		driver: &mut dyn StatementHandle,
		preparator: &Preparator,
		pos: usize,
		columns: &[ColumnDescriptor],
	) -> Result<()> {
		for offset in 0..self.columns {
			let descriptor = columns
				.get(pos + offset)
				.ok_or(Error::InvalidColumnIndex { pos: pos + offset, count: columns.len() })?;
			preparator.prepare_column(driver, pos + offset, descriptor)?;
		}
		Ok(())
	}

	fn extract(
		&mut self,
		driver: &mut dyn StatementHandle,
		extractor: &mut Extractor,
		pos: usize,
	) -> Result<usize> {
		let fetched = if self.bulk { driver.rows_fetched() } else { 1 };

		for row in 0..fetched {
			let mut values = Vec::with_capacity(self.columns);
			for offset in 0..self.columns {
				let value = if self.bulk {
					match driver.bulk_value(row, pos + offset) {
						SqlReturn::Success(value) | SqlReturn::SuccessWithInfo(value) => value,
						_ => return Err(driver_failure("bulk_value")),
					}
				} else {
					extractor.value(driver, pos + offset)?
				};
				values.push(value);
			}
			self.rows.borrow_mut().push(values);
		}

		Ok(fetched)
	}
}
