//! Domain model: identifiers, the wire envelope, and the typed records decoded from it.

pub mod edited;
pub mod envelope;
pub mod id;
pub mod record;

pub use edited::*;
pub use envelope::*;
pub use id::*;
pub use record::*;

// self
use crate::_prelude::*;

/// Closed set of envelope discriminators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
	/// Page of sibling envelopes (`Listing`).
	Listing,
	/// Comment node (`t1`).
	Comment,
	/// Account (`t2`).
	Account,
	/// Post (`t3`).
	Post,
	/// Private message (`t4`).
	Message,
	/// Subreddit (`t5`).
	Subreddit,
	/// Elided-children marker (`more`).
	More,
}
impl Kind {
	/// Every recognized kind.
	pub const ALL: [Kind; 7] = [
		Kind::Listing,
		Kind::Comment,
		Kind::Account,
		Kind::Post,
		Kind::Message,
		Kind::Subreddit,
		Kind::More,
	];

	/// Returns the wire discriminator.
	pub const fn as_str(self) -> &'static str {
		match self {
			Kind::Listing => "Listing",
			Kind::Comment => "t1",
			Kind::Account => "t2",
			Kind::Post => "t3",
			Kind::Message => "t4",
			Kind::Subreddit => "t5",
			Kind::More => "more",
		}
	}

	/// Parses a wire discriminator, returning `None` for anything outside the closed set.
	pub fn parse(tag: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
	}

	/// Maps the digit of a fullname prefix (`t<digit>_`) to its kind.
	pub const fn from_type_digit(digit: u8) -> Option<Self> {
		match digit {
			b'1' => Some(Kind::Comment),
			b'2' => Some(Kind::Account),
			b'3' => Some(Kind::Post),
			b'4' => Some(Kind::Message),
			b'5' => Some(Kind::Subreddit),
			_ => None,
		}
	}
}
impl Display for Kind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
