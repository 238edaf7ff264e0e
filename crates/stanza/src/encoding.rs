#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
	Utf8,
	Utf16Le,
	Utf16Be,
	Latin1,
	Ascii,
}

impl Encoding {
	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			Self::Utf8 => "UTF-8",
			Self::Utf16Le => "UTF-16LE",
			Self::Utf16Be => "UTF-16BE",
			Self::Latin1 => "ISO-8859-1",
			Self::Ascii => "US-ASCII",
		}
	}

	/// Worst-case bytes one character occupies on the wire.
	#[must_use]
	pub const fn max_bytes_per_char(self) -> usize {
		match self {
			Self::Utf8 | Self::Utf16Le | Self::Utf16Be => 4,
			Self::Latin1 | Self::Ascii => 1,
		}
	}
}

/// Client and wire side of one statement's text traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingPair {
	pub client: Encoding,
	pub wire: Encoding,
}

pub trait EncodingResolver {
	fn resolve(&self, name: &str) -> Option<Encoding>;
}

/// Name-based resolver with the usual aliases; case, `-` and `_` are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameResolver;

impl EncodingResolver for NameResolver {
	fn resolve(&self, name: &str) -> Option<Encoding> {
		let normalized: String =
			name.chars().filter(|c| *c != '-' && *c != '_').map(|c| c.to_ascii_lowercase()).collect();

		match normalized.as_str() {
			"utf8" => Some(Encoding::Utf8),
			"utf16" | "utf16le" => Some(Encoding::Utf16Le),
			"utf16be" => Some(Encoding::Utf16Be),
			"latin1" | "iso88591" => Some(Encoding::Latin1),
			"ascii" | "usascii" => Some(Encoding::Ascii),
			_ => None,
		}
	}
}
