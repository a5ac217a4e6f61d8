//! Redacted bearer secret.

// crates.io
use oauth2::http::{HeaderValue, header::InvalidHeaderValue};
// self
use crate::_prelude::*;

/// Access token or password that never shows up in `Debug`/`Display` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret(String);
impl Secret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Builds a sensitive `Authorization: bearer <token>` header value.
	pub fn bearer_header(&self) -> Result<HeaderValue, InvalidHeaderValue> {
		let mut value = HeaderValue::from_str(&format!("bearer {}", self.0))?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl AsRef<str> for Secret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Secret").field(&"<redacted>").finish()
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
