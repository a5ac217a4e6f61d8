//! The `edited` marker: `false`/`null`, legacy `true`, or an edit timestamp.

// crates.io
use serde::{
	Deserializer,
	de::{Error as DeError, Unexpected, Visitor},
};
// self
use crate::_prelude::*;

/// Edit state of a post or comment, resolved once at the decode boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Edited {
	/// Never edited (`false` or `null` on the wire).
	#[default]
	Never,
	/// Edited before the service recorded edit times (`true` on the wire).
	Legacy,
	/// Edited at the given instant (numeric seconds on the wire).
	At(OffsetDateTime),
}
impl Edited {
	/// Returns `true` for any edited state.
	pub fn is_edited(&self) -> bool {
		!matches!(self, Self::Never)
	}

	/// Edit instant, when the wire carried one.
	pub fn at(&self) -> Option<OffsetDateTime> {
		match self {
			Self::At(instant) => Some(*instant),
			_ => None,
		}
	}
}
impl<'de> Deserialize<'de> for Edited {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		deserializer.deserialize_any(EditedVisitor)
	}
}

struct EditedVisitor;
impl EditedVisitor {
	fn instant<E>(secs: f64) -> Result<Edited, E>
	where
		E: DeError,
	{
		crate::decode::instant_from_secs(secs)
			.map(Edited::At)
			.ok_or_else(|| E::invalid_value(Unexpected::Float(secs), &"a unix timestamp in seconds"))
	}
}
impl<'de> Visitor<'de> for EditedVisitor {
	type Value = Edited;

	fn expecting(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("false, null, true, or a unix timestamp")
	}

	fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
	where
		E: DeError,
	{
		Ok(if value { Edited::Legacy } else { Edited::Never })
	}

	fn visit_unit<E>(self) -> Result<Self::Value, E>
	where
		E: DeError,
	{
		Ok(Edited::Never)
	}

	fn visit_none<E>(self) -> Result<Self::Value, E>
	where
		E: DeError,
	{
		Ok(Edited::Never)
	}

	fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
	where
		E: DeError,
	{
		Self::instant(value as f64)
	}

	fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
	where
		E: DeError,
	{
		Self::instant(value as f64)
	}

	fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
	where
		E: DeError,
	{
		Self::instant(value)
	}
}
