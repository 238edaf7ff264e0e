#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlReturn<T> {
	Success(T),
	SuccessWithInfo(T),
	NoData,
	NeedData,
	Error,
}

impl<T> SqlReturn<T> {
	#[must_use]
	pub const fn is_error(&self) -> bool {
		matches!(self, Self::Error)
	}

	#[must_use]
	pub const fn succeeded(&self) -> bool {
		matches!(self, Self::Success(_) | Self::SuccessWithInfo(_))
	}

	pub fn ok(self) -> Option<T> {
		match self {
			Self::Success(v) | Self::SuccessWithInfo(v) => Some(v),
			_ => None,
		}
	}
}
