//! Strongly typed identifiers enforced across the decoded domain.

// std
use std::{borrow::Borrow, ops::Deref, sync::OnceLock};
// crates.io
use regex::Regex;
// self
use crate::{_prelude::*, model::Kind};

macro_rules! def_id {
	($name:ident, $doc:literal, $label:literal, $validate:ident) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$validate(view)?;

				Ok(Self(view.to_owned()))
			}

			/// Returns the identifier as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$validate(&value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($label, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

/// Longest base36 id accepted (`u64::MAX` in base36 is 13 digits).
pub const BASE36_MAX_LEN: usize = 13;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (id, fullname).
		kind: &'static str,
	},
	/// The identifier contains characters outside lowercase base36.
	#[error("{kind} identifier `{value}` is not lowercase base36.")]
	NotBase36 {
		/// Kind of identifier (id, fullname).
		kind: &'static str,
		/// Offending value.
		value: String,
	},
	/// The identifier does not follow the `t<digit>_<base36>` grammar.
	#[error("Fullname `{value}` does not match t[1-6]_<base36>.")]
	NotFullname {
		/// Offending value.
		value: String,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (id, fullname).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { Base36Id, "Lowercase base36 identifier of a single thing.", "Id", validate_base36 }
def_id! { Fullname, "Typed identifier of the form `t<digit>_<base36>`.", "Fullname", validate_fullname }

impl Fullname {
	/// Builds the fullname of `id` for the provided kind; `None` for kinds without a type prefix.
	pub fn from_parts(kind: Kind, id: &Base36Id) -> Option<Self> {
		let digit = match kind {
			Kind::Comment => '1',
			Kind::Account => '2',
			Kind::Post => '3',
			Kind::Message => '4',
			Kind::Subreddit => '5',
			Kind::Listing | Kind::More => return None,
		};

		Some(Self(format!("t{digit}_{id}")))
	}

	/// Kind encoded in the prefix; `None` for `t6` (awards), which has no decoder.
	pub fn kind(&self) -> Option<Kind> {
		Kind::from_type_digit(self.0.as_bytes()[1])
	}

	/// Base36 portion after the underscore.
	pub fn id(&self) -> &str {
		&self.0[3..]
	}
}

fn fullname_grammar() -> &'static Regex {
	static GRAMMAR: OnceLock<Regex> = OnceLock::new();

	GRAMMAR.get_or_init(|| Regex::new(r"^t[1-6]_[0-9a-z]+$").expect("Fullname grammar must compile."))
}

fn validate_base36(view: &str) -> Result<(), IdentifierError> {
	const KIND: &str = "Base36";

	if view.is_empty() {
		return Err(IdentifierError::Empty { kind: KIND });
	}
	if view.len() > BASE36_MAX_LEN {
		return Err(IdentifierError::TooLong { kind: KIND, max: BASE36_MAX_LEN });
	}
	if !view.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()) {
		return Err(IdentifierError::NotBase36 { kind: KIND, value: view.to_owned() });
	}

	Ok(())
}

fn validate_fullname(view: &str) -> Result<(), IdentifierError> {
	const KIND: &str = "Fullname";

	if view.is_empty() {
		return Err(IdentifierError::Empty { kind: KIND });
	}
	if view.len() > BASE36_MAX_LEN + 3 {
		return Err(IdentifierError::TooLong { kind: KIND, max: BASE36_MAX_LEN + 3 });
	}
	if !fullname_grammar().is_match(view) {
		return Err(IdentifierError::NotFullname { value: view.to_owned() });
	}

	Ok(())
}
