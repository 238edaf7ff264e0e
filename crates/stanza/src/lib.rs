mod bind;
mod diag;
mod encoding;
mod error;
mod extract;
mod prepare;
mod session;
mod statement;

pub use stanza_driver as driver;

pub use bind::{BindPolicy, ColumnExtraction, InputBinding, OutputBinding, ParamBinder, ValueBinding};
pub use diag::Diagnostics;
pub use encoding::{Encoding, EncodingPair, EncodingResolver, NameResolver};
pub use error::{Error, Result};
pub use extract::Extractor;
pub use prepare::{ExtractionMode, Preparator};
pub use session::{
	DEFAULT_MAX_FIELD_SIZE, DataTypeInfo, FEATURE_AUTO_BIND, FEATURE_AUTO_EXTRACT,
	PROP_DATA_TYPE_INFO, PROP_DB_ENCODING, PROP_MAX_FIELD_SIZE, PropertyLookup, Session,
	SessionSettings, data_type_info, db_encoding, max_field_size,
};
pub use statement::{INVALID_CURSOR_STATE, StatementCore};
