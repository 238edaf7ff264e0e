use std::collections::HashMap;

use stanza_driver::SqlDataType;

pub const FEATURE_AUTO_BIND: &str = "autoBind";
pub const FEATURE_AUTO_EXTRACT: &str = "autoExtract";
pub const PROP_DATA_TYPE_INFO: &str = "dataTypeInfo";
pub const PROP_MAX_FIELD_SIZE: &str = "maxFieldSize";
pub const PROP_DB_ENCODING: &str = "dbEncoding";

pub const DEFAULT_MAX_FIELD_SIZE: usize = 1024;

/// Result of one property lookup. `Unsupported` is a normal answer, not a
/// failure; `Int` is the alternate numeric width some sessions report sizes
/// through.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyLookup {
	Size(usize),
	Int(i64),
	Text(String),
	TypeInfo(DataTypeInfo),
	Unsupported,
}

/// The connection/session collaborator, seen from the statement core.
pub trait Session {
	fn query_timeout(&self) -> Option<u64>;

	fn feature(&self, name: &str) -> bool;

	fn property(&self, name: &str) -> PropertyLookup;
}

/// Per-type size limits advertised by the driver, consulted when sizing
/// parameter buffers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTypeInfo {
	max_lengths: HashMap<SqlDataType, usize>,
}

impl DataTypeInfo {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_max_length(mut self, data_type: SqlDataType, length: usize) -> Self {
		self.max_lengths.insert(data_type, length);
		self
	}

	#[must_use]
	pub fn max_length(&self, data_type: SqlDataType) -> Option<usize> {
		self.max_lengths.get(&data_type).copied()
	}
}

/// Plain settings-backed [`Session`] for embedders and tests.
#[derive(Debug, Clone)]
pub struct SessionSettings {
	query_timeout: Option<u64>,
	features: HashMap<String, bool>,
	properties: HashMap<String, PropertyLookup>,
}

impl SessionSettings {
	#[must_use]
	pub fn new() -> Self {
		let mut features = HashMap::new();
		features.insert(FEATURE_AUTO_BIND.to_string(), true);
		features.insert(FEATURE_AUTO_EXTRACT.to_string(), true);

		let mut properties = HashMap::new();
		properties
			.insert(PROP_MAX_FIELD_SIZE.to_string(), PropertyLookup::Size(DEFAULT_MAX_FIELD_SIZE));
		properties.insert(PROP_DB_ENCODING.to_string(), PropertyLookup::Text("UTF-8".to_string()));

		Self { query_timeout: None, features, properties }
	}

	#[must_use]
	pub const fn with_query_timeout(mut self, seconds: u64) -> Self {
		self.query_timeout = Some(seconds);
		self
	}

	#[must_use]
	pub fn with_feature(mut self, name: &str, enabled: bool) -> Self {
		self.features.insert(name.to_string(), enabled);
		self
	}

	#[must_use]
	pub fn with_property(mut self, name: &str, value: PropertyLookup) -> Self {
		self.properties.insert(name.to_string(), value);
		self
	}
}

impl Default for SessionSettings {
	fn default() -> Self {
		Self::new()
	}
}

impl Session for SessionSettings {
	fn query_timeout(&self) -> Option<u64> {
		self.query_timeout
	}

	fn feature(&self, name: &str) -> bool {
		self.features.get(name).copied().unwrap_or(false)
	}

	fn property(&self, name: &str) -> PropertyLookup {
		self.properties.get(name).cloned().unwrap_or(PropertyLookup::Unsupported)
	}
}

pub fn max_field_size(session: &dyn Session) -> usize {
	match session.property(PROP_MAX_FIELD_SIZE) {
		PropertyLookup::Size(size) => size,
		PropertyLookup::Int(size) => usize::try_from(size).unwrap_or(DEFAULT_MAX_FIELD_SIZE),
		_ => DEFAULT_MAX_FIELD_SIZE,
	}
}

pub fn db_encoding(session: &dyn Session) -> String {
	match session.property(PROP_DB_ENCODING) {
		PropertyLookup::Text(name) => name,
		_ => "UTF-8".to_string(),
	}
}

pub fn data_type_info(session: &dyn Session) -> Option<DataTypeInfo> {
	match session.property(PROP_DATA_TYPE_INFO) {
		PropertyLookup::TypeInfo(info) => Some(info),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn max_field_size_reads_both_numeric_widths() {
		let session = SessionSettings::new();
		assert_eq!(max_field_size(&session), DEFAULT_MAX_FIELD_SIZE);

		let session =
			SessionSettings::new().with_property(PROP_MAX_FIELD_SIZE, PropertyLookup::Size(4096));
		assert_eq!(max_field_size(&session), 4096);

		let session =
			SessionSettings::new().with_property(PROP_MAX_FIELD_SIZE, PropertyLookup::Int(2048));
		assert_eq!(max_field_size(&session), 2048);
	}

	#[test]
	fn unsupported_properties_fall_back() {
		let session =
			SessionSettings::new().with_property(PROP_MAX_FIELD_SIZE, PropertyLookup::Unsupported);
		assert_eq!(max_field_size(&session), DEFAULT_MAX_FIELD_SIZE);
		assert_eq!(db_encoding(&session), "UTF-8");
		assert!(data_type_info(&session).is_none());
	}

	#[test]
	fn negative_int_width_falls_back_to_default() {
		let session =
			SessionSettings::new().with_property(PROP_MAX_FIELD_SIZE, PropertyLookup::Int(-5));
		assert_eq!(max_field_size(&session), DEFAULT_MAX_FIELD_SIZE);
	}

	#[test]
	fn type_info_lookup_round_trips() {
		let info = DataTypeInfo::new().with_max_length(SqlDataType::Varchar, 4000);
		let session =
			SessionSettings::new().with_property(PROP_DATA_TYPE_INFO, PropertyLookup::TypeInfo(info));
		let info = data_type_info(&session).expect("type info available");
		assert_eq!(info.max_length(SqlDataType::Varchar), Some(4000));
		assert_eq!(info.max_length(SqlDataType::Binary), None);
	}

	#[test]
	fn features_default_to_off_when_unnamed() {
		let session = SessionSettings::new();
		assert!(session.feature(FEATURE_AUTO_BIND));
		assert!(!session.feature("verboseWireLog"));
	}
}
