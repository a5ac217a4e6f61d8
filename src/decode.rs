//! Envelope decoding: closed kind dispatch, domain validation, and the JSON plumbing shared by the
//! model and tree builder.

pub mod context;
pub mod tree;

mod wire;

pub use context::*;
pub use tree::*;

// crates.io
use time::macros;
// self
use crate::{
	_prelude::*,
	error::DecodeError,
	model::{Comment, CommentForest, CommentsPage, Envelope, Kind, Listing, ListingPage, Thing},
};

/// Earliest creation instant accepted for any record.
pub const SERVICE_EPOCH: OffsetDateTime = macros::datetime!(2005-06-01 00:00 UTC);
/// Default bound on reply nesting.
pub const DEFAULT_MAX_DEPTH: usize = 50;
/// Default tolerance for creation instants slightly ahead of the local clock.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::minutes(5);

/// Knobs applied to every decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
	/// Maximum reply nesting; deeper trees fail with [`DecodeError::DepthExceeded`].
	pub max_depth: usize,
	/// How far in the future a creation instant may lie before it is rejected.
	pub clock_skew: Duration,
}
impl Default for DecodeOptions {
	fn default() -> Self {
		Self { max_depth: DEFAULT_MAX_DEPTH, clock_skew: DEFAULT_CLOCK_SKEW }
	}
}

/// Turns envelopes into typed, validated [`Thing`]s.
///
/// The decoder is cheap to share: per-call scratch state lives in [`ParseContext`]s drawn from an
/// internal pool and handed out exclusively, so concurrent decodes never observe each other.
#[derive(Debug, Default)]
pub struct Decoder {
	options: DecodeOptions,
	pool: ContextPool,
}
impl Decoder {
	/// Creates a decoder with the provided options.
	pub fn new(options: DecodeOptions) -> Self {
		Self { options, pool: ContextPool::default() }
	}

	/// Options applied to every decode.
	pub fn options(&self) -> DecodeOptions {
		self.options
	}

	/// Checks out a reset context anchored at the current time.
	pub fn context(&self) -> PooledContext<'_> {
		self.context_at(OffsetDateTime::now_utc())
	}

	/// Checks out a reset context anchored at `now`.
	pub fn context_at(&self, now: OffsetDateTime) -> PooledContext<'_> {
		self.pool.checkout(self.options.max_depth, now + self.options.clock_skew)
	}

	/// Decodes one envelope, dispatching strictly on its kind.
	pub fn decode(&self, envelope: &Envelope) -> Result<Thing, DecodeError> {
		decode_with(envelope, &mut self.context())
	}

	/// Decodes a response body holding one envelope or an array of them.
	///
	/// Every envelope is a top-level decode, so the first failure fails the whole body.
	pub fn decode_body(&self, body: &[u8]) -> Result<Vec<Thing>, DecodeError> {
		crate::model::normalize_body(body)?.iter().map(|envelope| self.decode(envelope)).collect()
	}

	/// Decodes a listing endpoint response into a page of things.
	pub fn decode_listing_page(&self, body: &[u8]) -> Result<ListingPage, DecodeError> {
		let envelopes = crate::model::normalize_body(body)?;
		let envelope = envelopes.first().ok_or(DecodeError::EmptyBody)?;
		let listing = wire::listing(envelope, &self.context())?;
		let things = listing.decode_children(self)?;

		Ok(ListingPage { before: listing.before, after: listing.after, things })
	}

	/// Rebuilds a comment and its replies from a `t1` envelope.
	pub fn build_tree(&self, envelope: &Envelope) -> Result<Comment, DecodeError> {
		tree::build_tree(envelope, &mut self.context())
	}

	/// Rebuilds every top-level comment of a comment listing.
	pub fn build_forest(&self, envelope: &Envelope) -> Result<CommentForest, DecodeError> {
		tree::build_forest(envelope, &mut self.context())
	}

	/// Decodes a record + comments response, salvaging whichever half is intact.
	pub fn decode_comments_page(&self, body: &[u8]) -> Result<CommentsPage, DecodeError> {
		tree::decode_comments_page(body, &mut self.context())
	}

	/// Decodes a `/api/morechildren` response into a flat forest.
	pub fn decode_more_children(&self, body: &[u8]) -> Result<CommentForest, DecodeError> {
		tree::decode_more_children(body, &mut self.context())
	}
}

impl Listing {
	/// Decodes every child as a top-level envelope; one bad child fails the page.
	pub fn decode_children(&self, decoder: &Decoder) -> Result<Vec<Thing>, DecodeError> {
		self.children.iter().map(|child| decoder.decode(child)).collect()
	}
}

/// Dispatches `envelope` on its kind using the caller's context.
pub fn decode_with(envelope: &Envelope, ctx: &mut ParseContext) -> Result<Thing, DecodeError> {
	Ok(match envelope.kind()? {
		Kind::Listing => Thing::Listing(wire::listing(envelope, ctx)?),
		Kind::Comment => Thing::Comment(tree::build_tree(envelope, ctx)?),
		Kind::Account => Thing::Account(wire::account(envelope.payload(), ctx)?),
		Kind::Post => Thing::Post(wire::post(envelope.payload(), ctx)?),
		Kind::Message => Thing::Message(wire::message(envelope.payload(), ctx)?),
		Kind::Subreddit => Thing::Subreddit(wire::subreddit(envelope.payload(), ctx)?),
		Kind::More => Thing::More(wire::more(envelope.payload(), ctx)?),
	})
}

/// Parses JSON text, reporting the failing path on shape errors.
pub(crate) fn from_json<'de, T>(raw: &'de str) -> Result<T, DecodeError>
where
	T: Deserialize<'de>,
{
	let mut de = serde_json::Deserializer::from_str(raw);
	let value = serde_path_to_error::deserialize(&mut de).map_err(|source| {
		if source.inner().is_syntax() || source.inner().is_eof() {
			DecodeError::Syntax(source.into_inner())
		} else {
			DecodeError::Malformed { source }
		}
	})?;

	de.end().map_err(DecodeError::Syntax)?;

	Ok(value)
}

/// Converts float unix seconds to an instant; `None` for non-finite or out-of-range values.
pub(crate) fn instant_from_secs(secs: f64) -> Option<OffsetDateTime> {
	if !secs.is_finite() {
		return None;
	}

	let nanos = (secs * 1_000_000_000.) as i128;

	OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{comment_json, listing_json, more_json, post_json},
		model::Edited,
	};

	fn envelope(raw: &str) -> Envelope {
		Envelope::from_json(raw).expect("Fixture envelope should parse.")
	}

	fn account_json(created: &str) -> String {
		format!(
			"{{\"kind\":\"t2\",\"data\":{{\"id\":\"u1\",\"name\":\"someone\",\
			 \"created_utc\":{created},\"link_karma\":4,\"comment_karma\":7,\"is_mod\":false,\
			 \"has_verified_email\":true}}}}"
		)
	}

	#[test]
	fn dispatches_every_kind() {
		let decoder = Decoder::default();
		let fixtures = [
			(listing_json(&[]), Kind::Listing),
			(comment_json("a1", "t3_post1", "\"\""), Kind::Comment),
			(account_json("1700000000.0"), Kind::Account),
			(post_json("p1"), Kind::Post),
			(
				"{\"kind\":\"t4\",\"data\":{\"id\":\"m1\",\"name\":\"t4_m1\",\"author\":\"a\",\
				 \"dest\":\"b\",\"subject\":\"hi\",\"body\":\"yo\",\"created_utc\":1700000000,\
				 \"new\":true,\"was_comment\":false,\"parent_id\":null}}"
					.to_owned(),
				Kind::Message,
			),
			(
				"{\"kind\":\"t5\",\"data\":{\"id\":\"2qh1i\",\"name\":\"t5_2qh1i\",\
				 \"display_name\":\"rust\",\"title\":\"Rust\",\"public_description\":\"\",\
				 \"subscribers\":300000,\"created_utc\":1200000000.0,\"over18\":false}}"
					.to_owned(),
				Kind::Subreddit,
			),
			(more_json("m9", "t1_a1", &["b1", "b2"]), Kind::More),
		];

		for (raw, kind) in fixtures {
			let thing = decoder.decode(&envelope(&raw)).expect("Fixture should decode.");

			assert_eq!(thing.kind(), kind);
		}
	}

	#[test]
	fn unknown_kind_is_a_hard_error() {
		let err = Decoder::default()
			.decode(&envelope("{\"kind\":\"t6\",\"data\":{}}"))
			.expect_err("Awards have no decoder.");

		assert!(matches!(err, DecodeError::UnknownKind { kind } if kind == "t6"));
	}

	#[test]
	fn listing_keeps_every_child_and_checks_cursors() {
		let decoder = Decoder::default();
		let children =
			[post_json("p1"), comment_json("a1", "t3_p1", "\"\""), more_json("m1", "t3_p1", &[])];
		let Thing::Listing(listing) =
			decoder.decode(&envelope(&listing_json(&children))).expect("Listing should decode.")
		else {
			panic!("Listing envelope should decode to a listing.");
		};

		assert_eq!(listing.children.len(), 3);
		assert_eq!(listing.after, None);

		let with_cursor = "{\"kind\":\"Listing\",\"data\":{\"after\":\"t3_p9\",\"before\":\"\",\
		                   \"children\":[]}}";
		let Thing::Listing(listing) =
			decoder.decode(&envelope(with_cursor)).expect("Listing should decode.")
		else {
			panic!("Listing envelope should decode to a listing.");
		};

		assert_eq!(listing.after.as_deref(), Some("t3_p9"));
		assert_eq!(listing.before, None);

		let bad_cursor = "{\"kind\":\"Listing\",\"data\":{\"after\":\"page2\",\"children\":[]}}";

		assert!(matches!(
			decoder.decode(&envelope(bad_cursor)),
			Err(DecodeError::Validation { kind: Kind::Listing, field: "after", .. })
		));
	}

	#[test]
	fn post_fields_are_validated() {
		let decoder = Decoder::default();
		let post = decoder.decode(&envelope(&post_json("p1"))).expect("Post should decode.");
		let post = post.as_post().expect("Fixture is a post.");

		assert_eq!(post.fullname.as_str(), "t3_p1");
		assert_eq!(post.upvote_ratio, 0.5);
		assert_eq!(post.edited, Edited::Never);

		let cases = [
			(post_json("p1").replace("\"upvote_ratio\":0.5", "\"upvote_ratio\":1.5"), "upvote_ratio"),
			(post_json("p1").replace("\"num_comments\":2", "\"num_comments\":-1"), "num_comments"),
			(post_json("p1").replace("\"id\":\"p1\"", "\"id\":\"P1\""), "id"),
			(post_json("p1").replace("\"name\":\"t3_p1\"", "\"name\":\"t3_zz\""), "name"),
			(post_json("p1").replace("1700000000.0", "1000000000.0"), "created_utc"),
			(post_json("p1").replace("1700000000.0", "99999999999.0"), "created_utc"),
		];

		for (raw, field) in cases {
			let err = decoder.decode(&envelope(&raw)).expect_err("Invalid post should fail.");

			assert!(
				matches!(&err, DecodeError::Validation { kind: Kind::Post, field: f, .. } if *f == field),
				"Unexpected error for {field}: {err:?}."
			);
		}
	}

	#[test]
	fn created_tolerates_clock_skew() {
		let decoder = Decoder::default();
		let now = OffsetDateTime::now_utc();
		let soon = (now + Duration::minutes(1)).unix_timestamp();
		let later = (now + Duration::minutes(10)).unix_timestamp();

		assert!(
			decoder.decode(&envelope(&account_json(&soon.to_string()))).is_ok(),
			"Instants within the skew should be accepted."
		);
		assert!(matches!(
			decoder.decode(&envelope(&account_json(&later.to_string()))),
			Err(DecodeError::Validation { kind: Kind::Account, field: "created_utc", .. })
		));
	}

	#[test]
	fn shape_errors_report_the_json_path() {
		let raw = post_json("p1").replace("\"score\":10", "\"score\":\"ten\"");
		let err = Decoder::default().decode(&envelope(&raw)).expect_err("Bad score should fail.");
		let DecodeError::Malformed { source } = err else {
			panic!("Shape errors should be reported as malformed.");
		};

		assert_eq!(source.path().to_string(), "score");
	}

	#[test]
	fn more_marker_continue_thread_has_no_id() {
		let raw = more_json("_", "t1_a1", &[]);
		let Thing::More(more) =
			Decoder::default().decode(&envelope(&raw)).expect("Continue marker should decode.")
		else {
			panic!("More envelope should decode to a marker.");
		};

		assert!(more.is_continue_thread());
		assert!(
			Decoder::default().decode(&envelope(&more_json("m1", "t1_a1", &["Bad"]))).is_err(),
			"Child ids must be lowercase base36."
		);
	}

	#[test]
	fn body_normalization_feeds_typed_decode() {
		let decoder = Decoder::default();
		let array = format!("[{}, {}]", post_json("p1"), post_json("p2"));
		let things = decoder.decode_body(array.as_bytes()).expect("Array body should decode.");
		let single = decoder.decode_body(post_json("p3").as_bytes()).expect("Object should decode.");

		assert_eq!(things.len(), 2);
		assert_eq!(single.len(), 1);
		assert!(things.iter().chain(&single).all(|thing| thing.kind() == Kind::Post));
	}

	#[test]
	fn listing_page_fails_on_any_bad_child() {
		let decoder = Decoder::default();
		let good = listing_json(&[post_json("p1"), post_json("p2")]);
		let page = decoder.decode_listing_page(good.as_bytes()).expect("Page should decode.");

		assert_eq!(page.things.len(), 2);

		let bad = listing_json(&[post_json("p1"), post_json("P2")]);

		assert!(decoder.decode_listing_page(bad.as_bytes()).is_err());
	}

	#[test]
	fn instant_conversion_rejects_non_finite() {
		assert!(instant_from_secs(f64::NAN).is_none());
		assert!(instant_from_secs(f64::INFINITY).is_none());
		assert_eq!(
			instant_from_secs(1_117_584_000.).map(OffsetDateTime::unix_timestamp),
			Some(SERVICE_EPOCH.unix_timestamp())
		);
	}
}
