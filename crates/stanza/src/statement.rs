use log::{debug, warn};

use stanza_driver::{
	ColumnDescriptor, ParamDataPoll, SqlDataType, SqlReturn, StatementAttr, StatementHandle,
};

use crate::bind::{BindPolicy, ColumnExtraction, InputBinding, OutputBinding, ParamBinder};
use crate::diag::Diagnostics;
use crate::encoding::{Encoding, EncodingPair, EncodingResolver};
use crate::error::{Error, Result};
use crate::extract::Extractor;
use crate::prepare::{ExtractionMode, Preparator};
use crate::session::{self, DataTypeInfo, FEATURE_AUTO_BIND, FEATURE_AUTO_EXTRACT, Session};

/// SQLSTATE some drivers report when a stored-procedure call leaves trailing
/// metadata behind the last row; fetching then fails instead of reporting
/// no-data. Recovery: reissue more-results to force a clean terminal state.
pub const INVALID_CURSOR_STATE: &str = "24000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchState {
	Idle,
	RowReady,
	NoMoreRows,
}

/// Drives one prepared statement through compilation, parameter binding,
/// execution, result-set iteration and column extraction against a
/// call-level driver handle. Owns the handle exclusively for its lifetime.
pub struct StatementCore<D: StatementHandle> {
	driver: D,
	text: String,
	auto_bind: bool,
	auto_extract: bool,
	max_field_size: usize,
	type_info: Option<DataTypeInfo>,
	encodings: EncodingPair,
	binder: ParamBinder,
	bindings: Vec<Box<dyn InputBinding>>,
	extraction_sets: Vec<Vec<Box<dyn OutputBinding>>>,
	internal_extraction: bool,
	preparations: Vec<Preparator>,
	extractors: Vec<Extractor>,
	columns: Vec<Vec<ColumnDescriptor>>,
	diagnostics: Diagnostics,
	fetch_state: FetchState,
	step_called: bool,
	prepared: bool,
	can_compile: bool,
	affected_rows: Option<u64>,
	extraction_limit: Option<usize>,
	current_data_set: usize,
}

impl<D: StatementHandle> StatementCore<D> {
	/// Takes exclusive ownership of the driver handle. The session's query
	/// timeout, if any, is applied here, once; a driver refusal is a
	/// connection-level failure.
	pub fn new(
		mut driver: D,
		text: impl Into<String>,
		session: &dyn Session,
		resolver: &dyn EncodingResolver,
	) -> Result<Self> {
		if let Some(timeout) = session.query_timeout() {
			let status = driver.set_attr(StatementAttr::QueryTimeout(timeout));
			if !status.succeeded() {
				let mut diagnostics = Diagnostics::new();
				diagnostics.collect(&mut driver);
				return Err(Error::Connection {
					context: format!("set_attr(query_timeout={timeout})"),
					diagnostics,
				});
			}
		}

		let auto_bind = session.feature(FEATURE_AUTO_BIND);
		let auto_extract = session.feature(FEATURE_AUTO_EXTRACT);
		let max_field_size = session::max_field_size(session);
		let type_info = session::data_type_info(session);

		let wire_name = session::db_encoding(session);
		let wire = resolver.resolve(&wire_name).unwrap_or(Encoding::Utf8);
		let client = resolver.resolve("UTF-8").unwrap_or(Encoding::Utf8);
		let encodings = EncodingPair { client, wire };

		let policy = if auto_bind { BindPolicy::Immediate } else { BindPolicy::Deferred };
		let binder = ParamBinder::new(policy, max_field_size, encodings, type_info.clone());

		Ok(Self {
			driver,
			text: text.into(),
			auto_bind,
			auto_extract,
			max_field_size,
			type_info,
			encodings,
			binder,
			bindings: Vec::new(),
			extraction_sets: Vec::new(),
			internal_extraction: false,
			preparations: Vec::new(),
			extractors: Vec::new(),
			columns: Vec::new(),
			diagnostics: Diagnostics::new(),
			fetch_state: FetchState::Idle,
			step_called: false,
			prepared: false,
			can_compile: true,
			affected_rows: None,
			extraction_limit: None,
			current_data_set: 0,
		})
	}

	#[must_use]
	pub fn sql(&self) -> &str {
		&self.text
	}

	#[must_use]
	pub const fn current_data_set(&self) -> usize {
		self.current_data_set
	}

	#[must_use]
	pub const fn diagnostics(&self) -> &Diagnostics {
		&self.diagnostics
	}

	/// Row-array limit for bulk extraction. Bulk fetch refuses to run
	/// without one.
	pub const fn set_extraction_limit(&mut self, limit: Option<usize>) {
		self.extraction_limit = limit;
	}

	pub fn add_binding(&mut self, binding: Box<dyn InputBinding>) {
		self.bindings.push(binding);
	}

	/// Registers the output bindings for the next unclaimed data set.
	pub fn add_extraction_set(&mut self, extractions: Vec<Box<dyn OutputBinding>>) {
		self.extraction_sets.push(extractions);
	}

	#[must_use]
	pub fn can_bind(&self) -> bool {
		self.bindings.first().is_some_and(|binding| binding.can_bind())
	}

	#[must_use]
	pub fn is_stored_procedure(&self) -> bool {
		is_call_statement(&self.text)
	}

	/// Builds the compiled form of the statement: master preparation
	/// context, binding and extraction policies, parameter binder, and (when
	/// result data is already pending) the extraction adapters for the first
	/// data set. Idempotent until [`Self::invalidate`].
	pub fn compile(&mut self) -> Result<()> {
		match self.compile_inner() {
			Ok(()) => Ok(()),
			Err(err) => Err(self.enrich(err)),
		}
	}

	/// Re-arms [`Self::compile`] after the statement text or session state
	/// changed underneath the compiled form.
	pub const fn invalidate(&mut self) {
		self.can_compile = true;
	}

	/// Binds parameters and executes the compiled statement, running the
	/// deferred-data protocol when the driver asks for streamed parameter
	/// data, then synchronizes output parameters back to the caller.
	pub fn bind_execute(&mut self) -> Result<()> {
		match self.bind_execute_inner() {
			Ok(()) => Ok(()),
			Err(err) => Err(self.enrich(err)),
		}
	}

	/// Compile-and-execute in one call.
	pub fn execute(&mut self) -> Result<()> {
		self.compile()?;
		self.bind_execute()
	}

	/// Executes raw statement text without a prepare step.
	pub fn exec_direct(&mut self, text: &str) -> Result<()> {
		let status = self.driver.exec_direct(text);
		self.check(status, "exec_direct")
	}

	/// True when a row is available for [`Self::next`]. Transparently
	/// advances to the next result set when the current one is exhausted.
	pub fn has_next(&mut self) -> Result<bool> {
		match self.has_next_inner() {
			Ok(ready) => Ok(ready),
			Err(err) => Err(self.enrich(err)),
		}
	}

	/// Extracts the ready row through the output bindings, in declared
	/// order, returning the row count consumed (one, or more for bulk
	/// fetch). All bindings must agree on that count.
	pub fn next(&mut self) -> Result<usize> {
		match self.next_inner() {
			Ok(count) => Ok(count),
			Err(err) => Err(self.enrich(err)),
		}
	}

	/// Resets fetch state, the affected-row cache and the diagnostic trail,
	/// and releases the driver's active cursor.
	pub fn clear(&mut self) -> Result<()> {
		self.step_called = false;
		self.fetch_state = FetchState::Idle;
		self.affected_rows = None;
		self.diagnostics.clear();

		let status = self.driver.close_cursor();
		if status.is_error() {
			return Err(self.execution_error("close_cursor"));
		}
		Ok(())
	}

	/// Rows affected by the last execution, queried lazily and cached until
	/// [`Self::clear`]. Driver refusals leave the cache unset.
	pub fn affected_row_count(&mut self) -> u64 {
		if self.affected_rows.is_none() {
			if let Some(rows) = self.driver.row_count().ok() {
				self.affected_rows = Some(u64::try_from(rows).unwrap_or(0));
			}
		}
		self.affected_rows.unwrap_or(0)
	}

	/// Descriptor of column `pos` in the current data set.
	pub fn meta_column(&self, pos: usize) -> Result<&ColumnDescriptor> {
		let set = self.current_data_set;
		let columns = self.columns.get(set).ok_or(Error::InvalidState { index: set })?;
		columns.get(pos).ok_or(Error::InvalidColumnIndex { pos, count: columns.len() })
	}

	/// The driver's expanded, native form of the statement text, growing the
	/// transfer buffer until the driver's required length is satisfied.
	pub fn native_sql(&mut self) -> Result<String> {
		let mut capacity = (self.text.len() * 2).max(16);
		loop {
			let status = self.driver.native_sql(&self.text, capacity);
			match status {
				SqlReturn::Success(native) | SqlReturn::SuccessWithInfo(native) => {
					if native.required > capacity {
						capacity = native.required + 1;
						continue;
					}
					return Ok(native.text);
				}
				_ => {
					let mut diagnostics = Diagnostics::new();
					diagnostics.collect(&mut self.driver);
					return Err(Error::Connection { context: "native_sql".to_string(), diagnostics });
				}
			}
		}
	}

	fn compile_inner(&mut self) -> Result<()> {
		if !self.can_compile {
			return Ok(());
		}

		self.step_called = false;
		self.fetch_state = FetchState::Idle;
		self.prepared = false;
		self.current_data_set = 0;
		self.internal_extraction = false;
		self.preparations.clear();
		self.extractors.clear();
		self.columns.clear();

		self.add_preparator()?;

		let policy = if self.auto_bind { BindPolicy::Immediate } else { BindPolicy::Deferred };
		self.binder =
			ParamBinder::new(policy, self.max_field_size, self.encodings, self.type_info.clone());
		debug!("compiled `{}` ({policy:?} binding, {:?} extraction)", self.text, self.extraction_mode());

		self.ensure_extractions()?;
		self.do_prepare()?;

		self.can_compile = false;
		Ok(())
	}

	/// Ensures a preparation context and extractor exist for the current
	/// data set; contexts beyond the first clone the master.
	fn add_preparator(&mut self) -> Result<()> {
		if self.preparations.is_empty() {
			let preparator = Preparator::new(&self.text, self.max_field_size, self.extraction_mode())?;
			let status = self.driver.prepare(&self.text);
			self.check(status, "prepare")?;
			self.preparations.push(preparator);
		} else if let Some(master) = self.preparations.first() {
			let clone = master.clone();
			self.preparations.push(clone);
		}

		self.extractors.push(Extractor::new(self.extraction_mode()));
		Ok(())
	}

	/// Lazy column discovery plus internal extraction adapters for the
	/// current data set when the caller registered none. A malformed column
	/// descriptor is tolerated for call-style statements, whose trailing
	/// metadata often does not describe as a result column.
	fn ensure_extractions(&mut self) -> Result<()> {
		if !self.has_data()? {
			return Ok(());
		}

		match self.fill_columns() {
			Err(Error::ColumnFormat { pos }) if is_call_statement(&self.text) => {
				warn!("ignoring malformed column {pos} while preparing a call-style statement");
				return Ok(());
			}
			result => result?,
		}

		let set = self.current_data_set;
		while self.extraction_sets.len() <= set {
			self.extraction_sets.push(Vec::new());
		}

		let count = self.columns.get(set).map_or(0, Vec::len);
		let Some(extractions) = self.extraction_sets.get_mut(set) else {
			return Ok(());
		};
		if extractions.is_empty() && count > 0 {
			*extractions = (0..count)
				.map(|_| Box::new(ColumnExtraction::new(1)) as Box<dyn OutputBinding>)
				.collect();
			self.internal_extraction = true;
		}
		Ok(())
	}

	fn fill_columns(&mut self) -> Result<()> {
		let set = self.current_data_set;
		if self.columns.get(set).is_some_and(|columns| !columns.is_empty()) {
			return Ok(());
		}

		let status = self.driver.num_result_cols();
		let count = self.check_value(status, "num_result_cols")?;

		let mut discovered = Vec::with_capacity(count);
		for pos in 0..count {
			let status = self.driver.describe_col(pos);
			let descriptor = self.check_value(status, "describe_col")?;
			if descriptor.data_type == SqlDataType::Unknown {
				return Err(Error::ColumnFormat { pos });
			}
			discovered.push(descriptor);
		}

		while self.columns.len() <= set {
			self.columns.push(Vec::new());
		}
		if let Some(slot) = self.columns.get_mut(set) {
			*slot = discovered;
		}
		Ok(())
	}

	/// Creates driver-level column preparations for every output binding of
	/// the current data set, in declared order, at accumulating column
	/// offsets. Only runs under bound extraction; idempotent per execution.
	fn do_prepare(&mut self) -> Result<()> {
		if self.extraction_mode() != ExtractionMode::Bound || self.prepared {
			return Ok(());
		}

		let set = self.current_data_set;
		let bulk_first = self
			.extraction_sets
			.get(set)
			.and_then(|extractions| extractions.first())
			.is_some_and(|extraction| extraction.is_bulk());
		if bulk_first {
			// checked before touching the driver
			let limit = self.extraction_limit.ok_or(Error::UnboundedBulkFetch)?;
			let status = self.driver.set_attr(StatementAttr::RowArraySize(limit));
			self.check(status, "set_attr(row_array_size)")?;
		}

		if !self.has_data()? {
			return Ok(());
		}
		if self.preparations.len() <= set {
			return Err(Error::InvalidState { index: set });
		}

		let Self { driver, extraction_sets, preparations, columns, .. } = self;
		let preparator = preparations.get(set).ok_or(Error::InvalidState { index: set })?;
		let descriptors = columns.get(set).map_or(&[][..], Vec::as_slice);

		let mut pos = 0usize;
		if let Some(extractions) = extraction_sets.get_mut(set) {
			for extraction in extractions.iter_mut() {
				extraction.prepare(&mut *driver, preparator, pos, descriptors)?;
				pos += extraction.columns_handled();
			}
		}
		if !descriptors.is_empty() && pos != descriptors.len() {
			return Err(Error::InvalidColumnIndex { pos, count: descriptors.len() });
		}

		self.prepared = true;
		Ok(())
	}

	/// Clears prior bound state, captures the first binding's row count as
	/// the expected affected-row count, then binds successive bindings at
	/// accumulating column offsets while each reports itself bindable.
	fn do_bind(&mut self) -> Result<()> {
		self.clear()?;
		self.binder.reset();

		if self.bindings.is_empty() {
			return Ok(());
		}

		if self.affected_rows.is_none() {
			self.affected_rows = self
				.bindings
				.first()
				.map(|binding| u64::try_from(binding.rows_handled()).unwrap_or(u64::MAX));
		}

		let Self { driver, bindings, binder, .. } = self;
		let mut pos = 0usize;
		for binding in bindings.iter_mut() {
			if !binding.can_bind() {
				break;
			}
			binding.bind(&mut *driver, binder, pos)?;
			pos += binding.columns_handled();
		}
		Ok(())
	}

	fn bind_execute_inner(&mut self) -> Result<()> {
		self.compile_inner()?;
		self.do_bind()?;

		match self.driver.execute() {
			SqlReturn::NeedData => self.run_put_data()?,
			status => self.check(status, "execute")?,
		}

		self.synchronize_outputs()
	}

	/// Streamed transfer of deferred parameter data: the driver names the
	/// parameter buffer it wants and receives exactly that buffer's declared
	/// size; an unidentified request gets a zero-length placeholder chunk.
	fn run_put_data(&mut self) -> Result<()> {
		loop {
			match self.driver.param_data() {
				ParamDataPoll::Need(Some(token)) => {
					let Some(size) = self.binder.parameter_size(token) else {
						return Err(Error::DataTransfer(format!(
							"driver requested unknown parameter buffer {token:?}"
						)));
					};
					debug!("streaming {size} bytes for deferred parameter {token:?}");
					let status = self.driver.put_data(Some(token), size);
					if !status.succeeded() {
						return Err(Error::DataTransfer("parameter chunk rejected".to_string()));
					}
				}
				ParamDataPoll::Need(None) => {
					let status = self.driver.put_data(None, 0);
					if !status.succeeded() {
						return Err(Error::DataTransfer("placeholder chunk rejected".to_string()));
					}
				}
				ParamDataPoll::Done(status) => return self.check(status, "param_data"),
			}
		}
	}

	fn synchronize_outputs(&mut self) -> Result<()> {
		let mut pending = SqlReturn::Success(());
		{
			let Self { driver, bindings, .. } = self;
			let mut pos = 0usize;
			for binding in bindings.iter_mut() {
				let status = binding.synchronize(&mut *driver, pos);
				pos += binding.columns_handled();
				if status != SqlReturn::Success(()) {
					pending = status;
				}
				if pending.is_error() {
					break;
				}
			}
		}
		self.check(pending, "synchronize")
	}

	fn has_next_inner(&mut self) -> Result<bool> {
		if !self.has_data()? {
			return Ok(false);
		}

		if self.extraction_sets.get(self.current_data_set).is_none_or(Vec::is_empty) {
			self.ensure_extractions()?;
		}
		if !self.prepared {
			self.do_prepare()?;
		}

		if self.step_called {
			let ready = self.fetch_state == FetchState::RowReady;
			self.step_called = ready;
			return Ok(ready);
		}

		self.make_step()?;

		if self.fetch_state == FetchState::RowReady {
			return Ok(true);
		}

		if !self.has_more_data_sets() {
			return Ok(false);
		}

		let status = self.driver.more_results();
		if status == SqlReturn::NoData {
			// exhaustion is terminal; the active data set stays addressable
			self.step_called = true;
			self.fetch_state = FetchState::NoMoreRows;
			return Ok(false);
		}
		self.check(status, "more_results")?;

		self.activate_next_data_set();
		debug!("advancing to data set {}", self.current_data_set);

		self.ensure_extractions()?;
		self.add_preparator()?;
		self.do_prepare()?;
		if let Some(extractor) = self.extractors.get_mut(self.current_data_set) {
			extractor.reset();
		}
		self.make_step()?;
		Ok(true)
	}

	/// One raw fetch step, with the named invalid-cursor-state recovery:
	/// when the fetch fails with SQLSTATE 24000 the engine reissues
	/// more-results instead of surfacing the error, which forces the driver
	/// into a clean no-data terminal state.
	fn make_step(&mut self) -> Result<()> {
		if let Some(extractor) = self.extractors.get_mut(self.current_data_set) {
			extractor.reset();
		}

		let mut status = self.driver.fetch();
		if status.is_error() {
			let mut probe = Diagnostics::new();
			probe.collect(&mut self.driver);
			if probe.iter().any(|record| record.state == INVALID_CURSOR_STATE) {
				warn!("invalid cursor state after fetch; forcing a no-data response");
				status = self.driver.more_results();
			}
		}

		match status {
			SqlReturn::Success(()) => self.fetch_state = FetchState::RowReady,
			SqlReturn::SuccessWithInfo(()) => {
				self.diagnostics.collect(&mut self.driver);
				self.fetch_state = FetchState::RowReady;
			}
			SqlReturn::NoData => self.fetch_state = FetchState::NoMoreRows,
			SqlReturn::NeedData | SqlReturn::Error => return Err(self.execution_error("fetch")),
		}

		self.step_called = true;
		Ok(())
	}

	fn next_inner(&mut self) -> Result<usize> {
		if self.fetch_state != FetchState::RowReady {
			return Err(Error::RowNotAvailable);
		}

		let set = self.current_data_set;
		let mut count = 0usize;
		{
			let Self { driver, extraction_sets, extractors, .. } = self;
			let extractions = extraction_sets
				.get_mut(set)
				.filter(|extractions| !extractions.is_empty())
				.ok_or(Error::InvalidState { index: set })?;
			let extractor = extractors.get_mut(set).ok_or(Error::InvalidState { index: set })?;

			let mut pos = 0usize;
			let mut previous = 0usize;
			for extraction in extractions.iter_mut() {
				count = extraction.extract(&mut *driver, extractor, pos)?;
				if previous != 0 && count != previous {
					return Err(Error::InconsistentExtractionCount { first: previous, second: count });
				}
				previous = count;
				pos += extraction.columns_handled();
			}
		}

		self.step_called = false;
		self.fetch_state = FetchState::Idle;
		Ok(count)
	}

	fn has_data(&mut self) -> Result<bool> {
		let status = self.driver.num_result_cols();
		let count = self.check_value(status, "num_result_cols")?;
		Ok(count > 0)
	}

	const fn extraction_mode(&self) -> ExtractionMode {
		if self.auto_extract { ExtractionMode::Bound } else { ExtractionMode::Manual }
	}

	fn has_more_data_sets(&self) -> bool {
		self.internal_extraction || self.current_data_set + 1 < self.extraction_sets.len()
	}

	fn activate_next_data_set(&mut self) {
		self.current_data_set += 1;
		self.prepared = false;
		self.step_called = false;
		self.fetch_state = FetchState::Idle;
	}

	fn check(&mut self, status: SqlReturn<()>, context: &str) -> Result<()> {
		match status {
			SqlReturn::Success(()) | SqlReturn::NoData => Ok(()),
			SqlReturn::SuccessWithInfo(()) => {
				self.diagnostics.collect(&mut self.driver);
				Ok(())
			}
			SqlReturn::NeedData | SqlReturn::Error => Err(self.execution_error(context)),
		}
	}

	fn check_value<T>(&mut self, status: SqlReturn<T>, context: &str) -> Result<T> {
		match status {
			SqlReturn::Success(value) => Ok(value),
			SqlReturn::SuccessWithInfo(value) => {
				self.diagnostics.collect(&mut self.driver);
				Ok(value)
			}
			SqlReturn::NoData | SqlReturn::NeedData | SqlReturn::Error => {
				Err(self.execution_error(context))
			}
		}
	}

	fn execution_error(&mut self, context: &str) -> Error {
		self.diagnostics.collect(&mut self.driver);
		let native = self.native_sql().ok();
		Error::Execution {
			context: context.to_string(),
			statement: self.text.clone(),
			native,
			diagnostics: self.diagnostics.clone(),
		}
	}

	/// Driver failures reported below the statement level carry no
	/// statement text; rebuild them here with the full context.
	fn enrich(&mut self, err: Error) -> Error {
		match err {
			Error::Execution { context, statement, .. } if statement.is_empty() => {
				self.execution_error(&context)
			}
			other => other,
		}
	}
}

/// Call-style statements (`{call proc}`) relax extraction-setup error
/// handling: trimmed text of length two or more wrapped in a brace pair.
fn is_call_statement(text: &str) -> bool {
	let trimmed = text.trim();
	trimmed.len() >= 2 && trimmed.starts_with('{') && trimmed.ends_with('}')
}
