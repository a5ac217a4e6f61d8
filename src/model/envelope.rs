//! Wire envelope (`{kind, data}`) and body normalization.
//!
//! Payloads stay as unparsed [`RawValue`]s until a decoder asks for them, so nested replies are
//! only ever walked by the depth-bounded tree builder and never by a recursive generic parse.

// crates.io
use serde_json::value::RawValue;
// self
use crate::{_prelude::*, decode, error::DecodeError, model::Kind};

/// Wire-level tagged union: a discriminator plus an opaque payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
	/// Discriminator as found on the wire; see [`Envelope::kind`].
	pub kind: String,
	/// Optional bare id carried next to the payload.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Optional fullname carried next to the payload.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Unparsed payload.
	pub data: Box<RawValue>,
}
impl Envelope {
	/// Wraps an already serialized payload.
	pub fn new(kind: Kind, data: Box<RawValue>) -> Self {
		Self { kind: kind.as_str().to_owned(), id: None, name: None, data }
	}

	/// Parses a single envelope from JSON text.
	pub fn from_json(raw: &str) -> Result<Self, DecodeError> {
		decode::from_json(raw)
	}

	/// Resolves the discriminator against the closed kind set.
	pub fn kind(&self) -> Result<Kind, DecodeError> {
		Kind::parse(&self.kind).ok_or_else(|| DecodeError::UnknownKind { kind: self.kind.clone() })
	}

	/// Resolves the discriminator and requires it to equal `expected`.
	pub fn expect_kind(&self, expected: Kind) -> Result<(), DecodeError> {
		if self.kind()? == expected {
			Ok(())
		} else {
			Err(DecodeError::UnexpectedKind { expected: expected.as_str(), found: self.kind.clone() })
		}
	}

	/// Raw JSON text of the payload.
	pub fn payload(&self) -> &str {
		self.data.get()
	}
}

/// Three-way `replies` field: absent, the `""` sentinel, or a nested listing envelope.
#[derive(Clone, Debug, Default)]
pub enum Replies {
	/// No replies (absent, `""`, or `null`).
	#[default]
	Empty,
	/// Nested listing of direct replies.
	Listing(Envelope),
}
impl Replies {
	/// Resolves the raw `replies` value; the `""` sentinel is matched exactly before any
	/// structured decode is attempted.
	pub fn from_raw(raw: Option<&RawValue>) -> Result<Self, DecodeError> {
		let Some(raw) = raw else {
			return Ok(Self::Empty);
		};

		match raw.get().trim() {
			"\"\"" | "null" => Ok(Self::Empty),
			text => Envelope::from_json(text).map(Self::Listing),
		}
	}
}

/// Normalizes a response body into envelopes: a bare JSON array is taken as-is, a lone object
/// becomes a one-element vector.
pub fn normalize_body(body: &[u8]) -> Result<Vec<Envelope>, DecodeError> {
	let text = std::str::from_utf8(body)
		.map_err(|err| DecodeError::Syntax(serde::de::Error::custom(err)))?
		.trim_start();

	let envelopes = match text.as_bytes().first() {
		Some(b'[') => decode::from_json::<Vec<Envelope>>(text)?,
		Some(_) => vec![decode::from_json::<Envelope>(text)?],
		None => return Err(DecodeError::EmptyBody),
	};

	if envelopes.is_empty() {
		return Err(DecodeError::EmptyBody);
	}

	Ok(envelopes)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{comment_json, listing_json, post_json};

	#[test]
	fn array_and_object_bodies_share_shape() {
		let array = format!("[{}, {}]", listing_json(&[post_json("p1")]), listing_json(&[]));
		let single = listing_json(&[post_json("p1")]);
		let from_array = normalize_body(array.as_bytes()).expect("Array body should normalize.");
		let from_object = normalize_body(single.as_bytes()).expect("Object body should normalize.");

		assert_eq!(from_array.len(), 2);
		assert_eq!(from_object.len(), 1);
		assert_eq!(from_array[0].payload(), from_object[0].payload());
		assert!(
			from_array.iter().chain(&from_object).all(|env| matches!(env.kind(), Ok(Kind::Listing)))
		);
	}

	#[test]
	fn empty_and_invalid_bodies_fail() {
		assert!(matches!(normalize_body(b"  "), Err(DecodeError::EmptyBody)));
		assert!(matches!(normalize_body(b"[]"), Err(DecodeError::EmptyBody)));
		assert!(matches!(normalize_body(b"{\"kind\":1}"), Err(DecodeError::Malformed { .. })));
		assert!(matches!(
			normalize_body(b"{\"kind\":\"t1\",\"data\":{}} trailing"),
			Err(DecodeError::Syntax(_))
		));
	}

	#[test]
	fn unknown_kind_is_kept_until_resolved() {
		let envelope = Envelope::from_json("{\"kind\":\"t9\",\"data\":{}}")
			.expect("Unknown kinds should still parse as envelopes.");

		assert!(matches!(envelope.kind(), Err(DecodeError::UnknownKind { kind }) if kind == "t9"));
	}

	#[test]
	fn replies_sentinel_matches_exactly() {
		let empty = RawValue::from_string("\"\"".into()).expect("Sentinel should be valid JSON.");
		let null = RawValue::from_string("null".into()).expect("Null should be valid JSON.");
		let text = RawValue::from_string("\"x\"".into()).expect("String should be valid JSON.");
		let nested = RawValue::from_string(listing_json(&[comment_json("a1", "t3_p1", "\"\"")]))
			.expect("Listing should be valid JSON.");

		assert!(matches!(Replies::from_raw(None), Ok(Replies::Empty)));
		assert!(matches!(Replies::from_raw(Some(&*empty)), Ok(Replies::Empty)));
		assert!(matches!(Replies::from_raw(Some(&*null)), Ok(Replies::Empty)));
		assert!(Replies::from_raw(Some(&*text)).is_err());
		assert!(matches!(Replies::from_raw(Some(&*nested)), Ok(Replies::Listing(_))));
	}
}
