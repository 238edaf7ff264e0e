use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use stanza::driver::{
	ColumnDescriptor, ColumnSlot, DiagnosticRecord, NativeSql, ParamDataPoll, ParamToken,
	ParameterSlot, SqlDataType, SqlReturn, StatementAttr, StatementHandle, Value,
};
use stanza::{NameResolver, SessionSettings};

pub struct FakeResultSet {
	pub columns: Vec<ColumnDescriptor>,
	pub rows: Vec<Vec<Value>>,
}

#[derive(Default)]
pub struct FakeState {
	pub sets: Vec<FakeResultSet>,
	pub set_index: usize,
	pub cursor: usize,
	pub last_fetched: usize,
	pub rows_per_fetch: usize,

	pub cursor_state_glitch: bool,
	pub fail_put_data: bool,
	pub fail_exec_direct: bool,
	pub fail_close_cursor: bool,
	pub format_error_at: Option<(usize, usize)>,
	pub need_data: VecDeque<Option<ParamToken>>,
	pub out_params: Vec<Value>,
	pub row_count: i64,
	pub diag_queue: Vec<DiagnosticRecord>,

	pub prepare_calls: usize,
	pub execute_calls: usize,
	pub exec_direct_calls: usize,
	pub fetch_calls: usize,
	pub more_results_calls: usize,
	pub close_cursor_calls: usize,
	pub describe_calls: usize,
	pub native_sql_calls: usize,
	pub row_count_calls: usize,
	pub set_attrs: Vec<StatementAttr>,
	pub bound_params: Vec<(usize, ParameterSlot)>,
	pub bound_columns: Vec<(usize, ColumnSlot)>,
	pub put_calls: Vec<(Option<ParamToken>, usize)>,
}

impl FakeState {
	fn begin_op(&mut self) {
		self.diag_queue.clear();
	}

	fn current_set(&self) -> Option<&FakeResultSet> {
		self.sets.get(self.set_index)
	}
}

/// Scripted driver handle over shared state; tests keep a second handle to
/// inspect recorded calls after the engine takes ownership of the first.
#[derive(Clone)]
pub struct FakeDriver {
	state: Rc<RefCell<FakeState>>,
}

impl FakeDriver {
	pub fn new(sets: Vec<FakeResultSet>) -> Self {
		let state = FakeState { sets, rows_per_fetch: 1, row_count: 0, ..FakeState::default() };
		Self { state: Rc::new(RefCell::new(state)) }
	}

	pub fn empty() -> Self {
		Self::new(Vec::new())
	}

	pub fn state(&self) -> Rc<RefCell<FakeState>> {
		Rc::clone(&self.state)
	}

	pub fn with_glitch(self) -> Self {
		self.state.borrow_mut().cursor_state_glitch = true;
		self
	}

	pub fn with_row_count(self, rows: i64) -> Self {
		self.state.borrow_mut().row_count = rows;
		self
	}

	pub fn with_format_error(self, set: usize, column: usize) -> Self {
		self.state.borrow_mut().format_error_at = Some((set, column));
		self
	}

	pub fn with_need_data(self, tokens: Vec<Option<ParamToken>>) -> Self {
		self.state.borrow_mut().need_data = tokens.into();
		self
	}

	pub fn with_fail_put_data(self) -> Self {
		self.state.borrow_mut().fail_put_data = true;
		self
	}

	pub fn with_fail_exec_direct(self) -> Self {
		self.state.borrow_mut().fail_exec_direct = true;
		self
	}

	pub fn with_out_params(self, values: Vec<Value>) -> Self {
		self.state.borrow_mut().out_params = values;
		self
	}
}

impl StatementHandle for FakeDriver {
	fn set_attr(&mut self, attr: StatementAttr) -> SqlReturn<()> {
		let mut state = self.state.borrow_mut();
		if let StatementAttr::RowArraySize(rows) = attr {
			state.rows_per_fetch = rows.max(1);
		}
		state.set_attrs.push(attr);
		SqlReturn::Success(())
	}

	fn prepare(&mut self, _text: &str) -> SqlReturn<()> {
		self.state.borrow_mut().prepare_calls += 1;
		SqlReturn::Success(())
	}

	fn execute(&mut self) -> SqlReturn<()> {
		let mut state = self.state.borrow_mut();
		state.begin_op();
		state.execute_calls += 1;
		state.set_index = 0;
		state.cursor = 0;
		state.last_fetched = 0;
		if state.need_data.is_empty() { SqlReturn::Success(()) } else { SqlReturn::NeedData }
	}

	fn exec_direct(&mut self, _text: &str) -> SqlReturn<()> {
		let mut state = self.state.borrow_mut();
		state.begin_op();
		state.exec_direct_calls += 1;
		if state.fail_exec_direct {
			state.diag_queue.push(DiagnosticRecord::new("42000", 102, "syntax error"));
			SqlReturn::Error
		} else {
			SqlReturn::Success(())
		}
	}

	fn fetch(&mut self) -> SqlReturn<()> {
		let mut state = self.state.borrow_mut();
		state.begin_op();
		state.fetch_calls += 1;

		let (total, per_fetch) =
			(state.current_set().map_or(0, |set| set.rows.len()), state.rows_per_fetch);
		let remaining = total.saturating_sub(state.cursor);
		if remaining == 0 {
			state.last_fetched = 0;
			if state.cursor_state_glitch {
				state.cursor_state_glitch = false;
				state
					.diag_queue
					.push(DiagnosticRecord::new("24000", 0, "invalid cursor state"));
				return SqlReturn::Error;
			}
			return SqlReturn::NoData;
		}

		let take = per_fetch.min(remaining).max(1);
		state.last_fetched = take;
		state.cursor += take;
		SqlReturn::Success(())
	}

	fn more_results(&mut self) -> SqlReturn<()> {
		let mut state = self.state.borrow_mut();
		state.begin_op();
		state.more_results_calls += 1;
		if state.set_index + 1 < state.sets.len() {
			state.set_index += 1;
			state.cursor = 0;
			state.last_fetched = 0;
			SqlReturn::Success(())
		} else {
			SqlReturn::NoData
		}
	}

	fn num_result_cols(&mut self) -> SqlReturn<usize> {
		let state = self.state.borrow();
		SqlReturn::Success(state.current_set().map_or(0, |set| set.columns.len()))
	}

	fn describe_col(&mut self, pos: usize) -> SqlReturn<ColumnDescriptor> {
		let mut state = self.state.borrow_mut();
		state.describe_calls += 1;
		if state.format_error_at == Some((state.set_index, pos)) {
			return SqlReturn::Success(ColumnDescriptor::new("?", SqlDataType::Unknown, 0));
		}
		match state.current_set().and_then(|set| set.columns.get(pos)) {
			Some(descriptor) => SqlReturn::Success(descriptor.clone()),
			None => SqlReturn::Error,
		}
	}

	fn bind_parameter(&mut self, pos: usize, slot: ParameterSlot) -> SqlReturn<()> {
		self.state.borrow_mut().bound_params.push((pos, slot));
		SqlReturn::Success(())
	}

	fn bind_column(&mut self, pos: usize, slot: ColumnSlot) -> SqlReturn<()> {
		self.state.borrow_mut().bound_columns.push((pos, slot));
		SqlReturn::Success(())
	}

	fn column_value(&mut self, pos: usize) -> SqlReturn<Value> {
		self.bulk_value(0, pos)
	}

	fn bulk_value(&mut self, row: usize, pos: usize) -> SqlReturn<Value> {
		let state = self.state.borrow();
		if state.last_fetched == 0 || row >= state.last_fetched {
			return SqlReturn::Error;
		}
		let base = state.cursor - state.last_fetched;
		match state.current_set().and_then(|set| set.rows.get(base + row)).and_then(|r| r.get(pos))
		{
			Some(value) => SqlReturn::Success(value.clone()),
			None => SqlReturn::Error,
		}
	}

	fn rows_fetched(&self) -> usize {
		self.state.borrow().last_fetched
	}

	fn param_data(&mut self) -> ParamDataPoll {
		let mut state = self.state.borrow_mut();
		match state.need_data.pop_front() {
			Some(request) => ParamDataPoll::Need(request),
			None => ParamDataPoll::Done(SqlReturn::Success(())),
		}
	}

	fn put_data(&mut self, token: Option<ParamToken>, size: usize) -> SqlReturn<()> {
		let mut state = self.state.borrow_mut();
		state.put_calls.push((token, size));
		if state.fail_put_data { SqlReturn::Error } else { SqlReturn::Success(()) }
	}

	fn param_value(&mut self, pos: usize) -> SqlReturn<Value> {
		let state = self.state.borrow();
		match state.out_params.get(pos) {
			Some(value) => SqlReturn::Success(value.clone()),
			None => SqlReturn::NoData,
		}
	}

	fn row_count(&mut self) -> SqlReturn<i64> {
		let mut state = self.state.borrow_mut();
		state.row_count_calls += 1;
		SqlReturn::Success(state.row_count)
	}

	fn close_cursor(&mut self) -> SqlReturn<()> {
		let mut state = self.state.borrow_mut();
		state.close_cursor_calls += 1;
		if state.fail_close_cursor {
			return SqlReturn::Error;
		}
		state.set_index = 0;
		state.cursor = 0;
		state.last_fetched = 0;
		SqlReturn::Success(())
	}

	fn native_sql(&mut self, text: &str, capacity: usize) -> SqlReturn<NativeSql> {
		let mut state = self.state.borrow_mut();
		state.native_sql_calls += 1;
		let native = format!("/*native*/ {text}");
		let required = native.len();
		let truncated: String = native.chars().take(capacity).collect();
		SqlReturn::Success(NativeSql { text: truncated, required })
	}

	fn diagnostic_record(&mut self, index: usize) -> SqlReturn<DiagnosticRecord> {
		let state = self.state.borrow();
		match index.checked_sub(1).and_then(|i| state.diag_queue.get(i)) {
			Some(record) => SqlReturn::Success(record.clone()),
			None => SqlReturn::NoData,
		}
	}
}

pub fn int_column(name: &str) -> ColumnDescriptor {
	ColumnDescriptor::new(name, SqlDataType::Integer, 8)
}

pub fn text_column(name: &str) -> ColumnDescriptor {
	ColumnDescriptor::new(name, SqlDataType::Varchar, 64)
}

pub fn session() -> SessionSettings {
	SessionSettings::new()
}

pub fn resolver() -> NameResolver {
	NameResolver
}
