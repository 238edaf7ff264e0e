use crate::status::SqlReturn;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Integer(i64),
	Float(f64),
	Text(String),
	Blob(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDataType {
	Unknown,
	Bit,
	TinyInt,
	SmallInt,
	Integer,
	BigInt,
	Real,
	Double,
	Decimal,
	Char,
	Varchar,
	LongVarchar,
	Binary,
	VarBinary,
	Date,
	Time,
	Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
	pub name: String,
	pub data_type: SqlDataType,
	pub length: usize,
	pub precision: usize,
	pub scale: usize,
	pub nullable: bool,
}

impl ColumnDescriptor {
	#[must_use]
	pub fn new(name: &str, data_type: SqlDataType, length: usize) -> Self {
		Self { name: name.to_string(), data_type, length, precision: 0, scale: 0, nullable: true }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
	pub state: String,
	pub native: i32,
	pub message: String,
}

impl DiagnosticRecord {
	#[must_use]
	pub fn new(state: &str, native: i32, message: &str) -> Self {
		Self { state: state.to_string(), native, message: message.to_string() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamFlow {
	Input,
	Output,
	InputOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementAttr {
	QueryTimeout(u64),
	RowArraySize(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSlot {
	pub token: ParamToken,
	pub flow: ParamFlow,
	pub deferred: bool,
	pub size: usize,
	pub data_type: SqlDataType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSlot {
	pub data_type: SqlDataType,
	pub buffer_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSql {
	pub text: String,
	pub required: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDataPoll {
	Need(Option<ParamToken>),
	Done(SqlReturn<()>),
}
