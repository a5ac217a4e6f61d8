//! Wire shapes of each payload kind and their validated conversion into records.

// crates.io
use serde_json::value::RawValue;
// self
use crate::{
	_prelude::*,
	decode::{ParseContext, SERVICE_EPOCH, from_json, instant_from_secs},
	error::DecodeError,
	model::{
		Account, Base36Id, Comment, Edited, Envelope, Fullname, Kind, Listing, Message, More, Post,
		Replies, Subreddit,
	},
};

const DELETED_AUTHOR: &str = "[deleted]";
const CONTINUE_THREAD_ID: &str = "_";

#[derive(Deserialize)]
struct RawListing {
	#[serde(default)]
	before: Option<String>,
	#[serde(default)]
	after: Option<String>,
	#[serde(default)]
	modhash: Option<String>,
	#[serde(default)]
	dist: Option<u64>,
	children: Vec<Envelope>,
}

#[derive(Deserialize)]
struct RawComment<'a> {
	id: String,
	#[serde(default)]
	name: Option<String>,
	#[serde(default)]
	author: Option<String>,
	#[serde(default)]
	body: String,
	#[serde(default)]
	score: i64,
	created_utc: f64,
	#[serde(default)]
	edited: Edited,
	parent_id: String,
	link_id: String,
	#[serde(default)]
	subreddit: Option<String>,
	#[serde(default)]
	depth: Option<u32>,
	#[serde(default)]
	stickied: bool,
	#[serde(default, borrow)]
	replies: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct RawAccount {
	id: String,
	name: String,
	created_utc: f64,
	#[serde(default)]
	link_karma: i64,
	#[serde(default)]
	comment_karma: i64,
	#[serde(default)]
	is_mod: bool,
	#[serde(default)]
	has_verified_email: Option<bool>,
}

#[derive(Deserialize)]
struct RawPost {
	id: String,
	#[serde(default)]
	name: Option<String>,
	title: String,
	#[serde(default)]
	author: Option<String>,
	subreddit: String,
	#[serde(default)]
	selftext: String,
	#[serde(default)]
	url: Option<String>,
	#[serde(default)]
	permalink: Option<String>,
	#[serde(default)]
	score: i64,
	#[serde(default)]
	upvote_ratio: f64,
	#[serde(default)]
	num_comments: i64,
	created_utc: f64,
	#[serde(default)]
	edited: Edited,
	#[serde(default)]
	over_18: bool,
	#[serde(default)]
	stickied: bool,
	#[serde(default)]
	is_self: bool,
}

#[derive(Deserialize)]
struct RawMessage {
	id: String,
	#[serde(default)]
	name: Option<String>,
	#[serde(default)]
	author: Option<String>,
	dest: String,
	#[serde(default)]
	subject: String,
	#[serde(default)]
	body: String,
	created_utc: f64,
	#[serde(default, rename = "new")]
	unread: bool,
	#[serde(default)]
	was_comment: bool,
	#[serde(default)]
	parent_id: Option<String>,
}

#[derive(Deserialize)]
struct RawSubreddit {
	id: String,
	#[serde(default)]
	name: Option<String>,
	display_name: String,
	#[serde(default)]
	title: String,
	#[serde(default)]
	public_description: String,
	#[serde(default)]
	subscribers: Option<i64>,
	created_utc: f64,
	#[serde(default, rename = "over18")]
	over_18: bool,
}

#[derive(Deserialize)]
struct RawMore {
	id: String,
	#[serde(default)]
	count: i64,
	#[serde(default)]
	depth: i64,
	parent_id: String,
	#[serde(default)]
	children: Vec<String>,
}

/// Validation rules shared by every payload kind.
struct Rules {
	kind: Kind,
	horizon: OffsetDateTime,
}
impl Rules {
	fn new(kind: Kind, ctx: &ParseContext) -> Self {
		Self { kind, horizon: ctx.horizon() }
	}

	fn invalid(&self, field: &'static str, reason: impl Display) -> DecodeError {
		DecodeError::invalid(self.kind, field, reason)
	}

	fn id(&self, field: &'static str, value: String) -> Result<Base36Id, DecodeError> {
		Base36Id::try_from(value).map_err(|err| self.invalid(field, err))
	}

	fn fullname(&self, field: &'static str, value: String) -> Result<Fullname, DecodeError> {
		Fullname::try_from(value).map_err(|err| self.invalid(field, err))
	}

	fn cursor(
		&self,
		field: &'static str,
		value: Option<String>,
	) -> Result<Option<Fullname>, DecodeError> {
		match value {
			Some(value) if !value.is_empty() => self.fullname(field, value).map(Some),
			_ => Ok(None),
		}
	}

	/// Derives the fullname from `id`, rejecting a wire `name` that disagrees with it.
	fn own_fullname(&self, id: &Base36Id, name: Option<String>) -> Result<Fullname, DecodeError> {
		let derived = Fullname::from_parts(self.kind, id)
			.ok_or_else(|| self.invalid("name", "kind has no fullname prefix"))?;

		match name {
			Some(name) if name != derived.as_str() =>
				Err(self.invalid("name", format!("`{name}` does not match id `{id}`"))),
			_ => Ok(derived),
		}
	}

	fn created(&self, secs: f64) -> Result<OffsetDateTime, DecodeError> {
		let created = instant_from_secs(secs)
			.ok_or_else(|| self.invalid("created_utc", "is not a valid unix timestamp"))?;

		if created < SERVICE_EPOCH {
			return Err(self.invalid("created_utc", "precedes the service epoch"));
		}
		if created > self.horizon {
			return Err(self.invalid("created_utc", "lies in the future"));
		}

		Ok(created)
	}

	fn ratio(&self, field: &'static str, value: f64) -> Result<f64, DecodeError> {
		if (0.0..=1.0).contains(&value) {
			Ok(value)
		} else {
			Err(self.invalid(field, format!("{value} must lie within [0, 1]")))
		}
	}

	fn count(&self, field: &'static str, value: i64) -> Result<u64, DecodeError> {
		u64::try_from(value).map_err(|_| self.invalid(field, format!("{value} must not be negative")))
	}
}

fn author(value: Option<String>) -> Option<String> {
	value.filter(|name| !name.is_empty() && name != DELETED_AUTHOR)
}

pub(crate) fn listing(envelope: &Envelope, ctx: &ParseContext) -> Result<Listing, DecodeError> {
	envelope.expect_kind(Kind::Listing)?;

	let raw: RawListing = from_json(envelope.payload())?;
	let rules = Rules::new(Kind::Listing, ctx);

	Ok(Listing {
		before: rules.cursor("before", raw.before)?,
		after: rules.cursor("after", raw.after)?,
		modhash: raw.modhash.filter(|value| !value.is_empty()),
		dist: raw.dist,
		children: raw.children,
	})
}

/// Decodes a comment without its replies, handing the unresolved replies back to the caller.
pub(crate) fn comment(raw: &str, ctx: &ParseContext) -> Result<(Comment, Replies), DecodeError> {
	let raw: RawComment = from_json(raw)?;
	let rules = Rules::new(Kind::Comment, ctx);
	let id = rules.id("id", raw.id)?;
	let fullname = rules.own_fullname(&id, raw.name)?;
	let replies = Replies::from_raw(raw.replies)?;
	let comment = Comment {
		fullname,
		author: author(raw.author),
		body: raw.body,
		score: raw.score,
		created: rules.created(raw.created_utc)?,
		edited: raw.edited,
		parent_id: rules.fullname("parent_id", raw.parent_id)?,
		link_id: rules.fullname("link_id", raw.link_id)?,
		subreddit: raw.subreddit,
		depth: raw.depth,
		stickied: raw.stickied,
		replies: Vec::new(),
		deferred_child_ids: Vec::new(),
		id,
	};

	Ok((comment, replies))
}

pub(crate) fn account(raw: &str, ctx: &ParseContext) -> Result<Account, DecodeError> {
	let raw: RawAccount = from_json(raw)?;
	let rules = Rules::new(Kind::Account, ctx);
	let id = rules.id("id", raw.id)?;

	Ok(Account {
		fullname: rules.own_fullname(&id, None)?,
		id,
		name: raw.name,
		created: rules.created(raw.created_utc)?,
		link_karma: raw.link_karma,
		comment_karma: raw.comment_karma,
		is_mod: raw.is_mod,
		has_verified_email: raw.has_verified_email.unwrap_or_default(),
	})
}

pub(crate) fn post(raw: &str, ctx: &ParseContext) -> Result<Post, DecodeError> {
	let raw: RawPost = from_json(raw)?;
	let rules = Rules::new(Kind::Post, ctx);
	let id = rules.id("id", raw.id)?;

	Ok(Post {
		fullname: rules.own_fullname(&id, raw.name)?,
		id,
		title: raw.title,
		author: author(raw.author),
		subreddit: raw.subreddit,
		selftext: raw.selftext,
		url: raw.url,
		permalink: raw.permalink,
		score: raw.score,
		upvote_ratio: rules.ratio("upvote_ratio", raw.upvote_ratio)?,
		num_comments: rules.count("num_comments", raw.num_comments)?,
		created: rules.created(raw.created_utc)?,
		edited: raw.edited,
		over_18: raw.over_18,
		stickied: raw.stickied,
		is_self: raw.is_self,
	})
}

pub(crate) fn message(raw: &str, ctx: &ParseContext) -> Result<Message, DecodeError> {
	let raw: RawMessage = from_json(raw)?;
	let rules = Rules::new(Kind::Message, ctx);
	let id = rules.id("id", raw.id)?;

	Ok(Message {
		fullname: rules.own_fullname(&id, raw.name)?,
		id,
		author: author(raw.author),
		dest: raw.dest,
		subject: raw.subject,
		body: raw.body,
		created: rules.created(raw.created_utc)?,
		unread: raw.unread,
		was_comment: raw.was_comment,
		parent_id: rules.cursor("parent_id", raw.parent_id)?,
	})
}

pub(crate) fn subreddit(raw: &str, ctx: &ParseContext) -> Result<Subreddit, DecodeError> {
	let raw: RawSubreddit = from_json(raw)?;
	let rules = Rules::new(Kind::Subreddit, ctx);
	let id = rules.id("id", raw.id)?;

	Ok(Subreddit {
		fullname: rules.own_fullname(&id, raw.name)?,
		id,
		display_name: raw.display_name,
		title: raw.title,
		public_description: raw.public_description,
		subscribers: raw.subscribers.map(|n| rules.count("subscribers", n)).transpose()?,
		created: rules.created(raw.created_utc)?,
		over_18: raw.over_18,
	})
}

pub(crate) fn more(raw: &str, ctx: &ParseContext) -> Result<More, DecodeError> {
	let raw: RawMore = from_json(raw)?;
	let rules = Rules::new(Kind::More, ctx);
	let id = if raw.id == CONTINUE_THREAD_ID { None } else { Some(rules.id("id", raw.id)?) };
	let children =
		raw.children.into_iter().map(|child| rules.id("children", child)).collect::<Result<_, _>>()?;

	Ok(More {
		id,
		parent_id: rules.fullname("parent_id", raw.parent_id)?,
		count: rules.count("count", raw.count)?,
		depth: u32::try_from(raw.depth)
			.map_err(|_| rules.invalid("depth", format!("{} is out of range", raw.depth)))?,
		children,
	})
}
