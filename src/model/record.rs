//! Typed records produced by the decoder.

// self
use crate::{
	_prelude::*,
	error::DecodeError,
	model::{Base36Id, Edited, Envelope, Fullname, Kind},
};

/// Page of sibling envelopes plus opaque pagination cursors.
#[derive(Clone, Debug)]
pub struct Listing {
	/// Cursor for the previous page.
	pub before: Option<Fullname>,
	/// Cursor for the next page.
	pub after: Option<Fullname>,
	/// Opaque modhash echoed by the service.
	pub modhash: Option<String>,
	/// Number of children the service claims to have sent.
	pub dist: Option<u64>,
	/// Undecoded children, in wire order.
	pub children: Vec<Envelope>,
}

/// Comment node; `replies` holds direct children only.
#[derive(Clone, Debug, PartialEq)]
pub struct Comment {
	/// Bare id.
	pub id: Base36Id,
	/// `t1_` fullname.
	pub fullname: Fullname,
	/// Author name; `None` for deleted authors.
	pub author: Option<String>,
	/// Markdown body.
	pub body: String,
	/// Net score.
	pub score: i64,
	/// Creation instant.
	pub created: OffsetDateTime,
	/// Edit marker.
	pub edited: Edited,
	/// Parent comment or post.
	pub parent_id: Fullname,
	/// Post the comment belongs to.
	pub link_id: Fullname,
	/// Subreddit display name.
	pub subreddit: Option<String>,
	/// Depth reported by the service, when present.
	pub depth: Option<u32>,
	/// Whether moderators pinned the comment.
	pub stickied: bool,
	/// Direct replies, in wire order.
	pub replies: Vec<Comment>,
	/// Ids of replies elided anywhere below this node, flattened across the subtree.
	pub deferred_child_ids: Vec<Base36Id>,
}
impl Comment {
	/// Returns `true` when the parent is a post rather than a comment.
	pub fn is_top_level(&self) -> bool {
		self.parent_id.kind() == Some(Kind::Post)
	}

	/// Number of comments in the subtree, this node included.
	pub fn subtree_len(&self) -> usize {
		let mut stack = vec![self];
		let mut count = 0;

		while let Some(node) = stack.pop() {
			count += 1;

			stack.extend(node.replies.iter());
		}

		count
	}

	/// Longest root-to-leaf path in the subtree, counting this node as 1.
	pub fn height(&self) -> usize {
		let mut stack = vec![(self, 1)];
		let mut height = 0;

		while let Some((node, level)) = stack.pop() {
			height = height.max(level);

			stack.extend(node.replies.iter().map(|reply| (reply, level + 1)));
		}

		height
	}
}

/// Account (`t2`).
#[derive(Clone, Debug, PartialEq)]
pub struct Account {
	/// Bare id.
	pub id: Base36Id,
	/// `t2_` fullname.
	pub fullname: Fullname,
	/// Username.
	pub name: String,
	/// Creation instant.
	pub created: OffsetDateTime,
	/// Karma earned from posts.
	pub link_karma: i64,
	/// Karma earned from comments.
	pub comment_karma: i64,
	/// Whether the account moderates any community.
	pub is_mod: bool,
	/// Whether the account verified an email address.
	pub has_verified_email: bool,
}

/// Post (`t3`).
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
	/// Bare id.
	pub id: Base36Id,
	/// `t3_` fullname.
	pub fullname: Fullname,
	/// Title.
	pub title: String,
	/// Author name; `None` for deleted authors.
	pub author: Option<String>,
	/// Subreddit display name.
	pub subreddit: String,
	/// Markdown body for self posts.
	pub selftext: String,
	/// Link target.
	pub url: Option<String>,
	/// Site-relative permalink.
	pub permalink: Option<String>,
	/// Net score.
	pub score: i64,
	/// Share of upvotes within `[0, 1]`.
	pub upvote_ratio: f64,
	/// Comment count.
	pub num_comments: u64,
	/// Creation instant.
	pub created: OffsetDateTime,
	/// Edit marker.
	pub edited: Edited,
	/// Whether the post is marked NSFW.
	pub over_18: bool,
	/// Whether moderators pinned the post.
	pub stickied: bool,
	/// Whether the post is a text post.
	pub is_self: bool,
}

/// Private message (`t4`).
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
	/// Bare id.
	pub id: Base36Id,
	/// `t4_` fullname.
	pub fullname: Fullname,
	/// Sender; `None` for system messages.
	pub author: Option<String>,
	/// Recipient.
	pub dest: String,
	/// Subject line.
	pub subject: String,
	/// Markdown body.
	pub body: String,
	/// Creation instant.
	pub created: OffsetDateTime,
	/// Whether the message is unread.
	pub unread: bool,
	/// Whether the message is a comment reply notification.
	pub was_comment: bool,
	/// Parent message, for replies.
	pub parent_id: Option<Fullname>,
}

/// Subreddit (`t5`).
#[derive(Clone, Debug, PartialEq)]
pub struct Subreddit {
	/// Bare id.
	pub id: Base36Id,
	/// `t5_` fullname.
	pub fullname: Fullname,
	/// Display name (`rust`).
	pub display_name: String,
	/// Title.
	pub title: String,
	/// Sidebar blurb.
	pub public_description: String,
	/// Subscriber count, when visible.
	pub subscribers: Option<u64>,
	/// Creation instant.
	pub created: OffsetDateTime,
	/// Whether the community is marked NSFW.
	pub over_18: bool,
}

/// Marker referencing replies elided from a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct More {
	/// Marker id; `None` for "continue this thread" markers (`_` on the wire).
	pub id: Option<Base36Id>,
	/// Node owning the elided replies.
	pub parent_id: Fullname,
	/// Number of elided replies the service reports.
	pub count: u64,
	/// Depth of the elided replies.
	pub depth: u32,
	/// Elided reply ids.
	pub children: Vec<Base36Id>,
}
impl More {
	/// Returns `true` for "continue this thread" markers that carry no child ids.
	pub fn is_continue_thread(&self) -> bool {
		self.id.is_none() && self.children.is_empty()
	}
}

/// Closed variant produced by dispatching an envelope on its kind.
#[allow(clippy::large_enum_variant)]
#[derive(Clone, Debug)]
pub enum Thing {
	/// `Listing`.
	Listing(Listing),
	/// `t1`, with its reply tree.
	Comment(Comment),
	/// `t2`.
	Account(Account),
	/// `t3`.
	Post(Post),
	/// `t4`.
	Message(Message),
	/// `t5`.
	Subreddit(Subreddit),
	/// `more`.
	More(More),
}
impl Thing {
	/// Kind the thing was decoded from.
	pub fn kind(&self) -> Kind {
		match self {
			Self::Listing(_) => Kind::Listing,
			Self::Comment(_) => Kind::Comment,
			Self::Account(_) => Kind::Account,
			Self::Post(_) => Kind::Post,
			Self::Message(_) => Kind::Message,
			Self::Subreddit(_) => Kind::Subreddit,
			Self::More(_) => Kind::More,
		}
	}

	/// Fullname of the thing, for kinds that have one.
	pub fn fullname(&self) -> Option<&Fullname> {
		match self {
			Self::Comment(comment) => Some(&comment.fullname),
			Self::Account(account) => Some(&account.fullname),
			Self::Post(post) => Some(&post.fullname),
			Self::Message(message) => Some(&message.fullname),
			Self::Subreddit(subreddit) => Some(&subreddit.fullname),
			Self::Listing(_) | Self::More(_) => None,
		}
	}

	/// Returns the comment, if this is one.
	pub fn as_comment(&self) -> Option<&Comment> {
		match self {
			Self::Comment(comment) => Some(comment),
			_ => None,
		}
	}

	/// Returns the post, if this is one.
	pub fn as_post(&self) -> Option<&Post> {
		match self {
			Self::Post(post) => Some(post),
			_ => None,
		}
	}
}

/// Decoded page of a listing endpoint.
#[derive(Clone, Debug, Default)]
pub struct ListingPage {
	/// Cursor for the previous page.
	pub before: Option<Fullname>,
	/// Cursor for the next page.
	pub after: Option<Fullname>,
	/// Decoded children, in wire order.
	pub things: Vec<Thing>,
}

/// Top-level comments of a thread plus the elided ids found at top level.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommentForest {
	/// Top-level comments, each carrying its own subtree.
	pub comments: Vec<Comment>,
	/// Every elided id in the forest: top-level markers plus each comment's aggregate.
	pub deferred_child_ids: Vec<Base36Id>,
}
impl CommentForest {
	/// Number of comments across all trees.
	pub fn len(&self) -> usize {
		self.comments.iter().map(Comment::subtree_len).sum()
	}

	/// Returns `true` when the forest holds no comments.
	pub fn is_empty(&self) -> bool {
		self.comments.is_empty()
	}
}

/// Result of decoding a record + comments response; either half may be missing.
#[derive(Debug, Default)]
pub struct CommentsPage {
	/// Record the comments belong to.
	pub post: Option<Post>,
	/// Comment tree.
	pub comments: Option<CommentForest>,
	/// Why the record half failed, if it did.
	pub post_error: Option<DecodeError>,
	/// Why the tree half failed, if it did.
	pub comments_error: Option<DecodeError>,
}
impl CommentsPage {
	/// Returns `true` when both halves decoded.
	pub fn is_complete(&self) -> bool {
		self.post.is_some() && self.comments.is_some()
	}
}
