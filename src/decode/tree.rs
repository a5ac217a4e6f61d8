//! Reply-tree reconstruction over untrusted nesting.
//!
//! Every nested level passes through [`ParseContext::enter`], so the call depth of the builder is
//! bounded by the context's `max_depth` no matter how deep the payload is. Payloads below the
//! current level stay unparsed until the builder reaches them.

// self
use crate::{
	_prelude::*,
	decode::{ParseContext, from_json, wire},
	error::DecodeError,
	model::{Base36Id, Comment, CommentForest, CommentsPage, Envelope, Kind, Post, Replies},
	obs,
};

/// Rebuilds a comment and its reply tree from a `t1` envelope.
pub fn build_tree(envelope: &Envelope, ctx: &mut ParseContext) -> Result<Comment, DecodeError> {
	envelope.expect_kind(Kind::Comment)?;

	expand_comment(envelope, ctx)
}

/// Rebuilds the top-level comments of a comment listing.
pub fn build_forest(
	envelope: &Envelope,
	ctx: &mut ParseContext,
) -> Result<CommentForest, DecodeError> {
	let listing = wire::listing(envelope, ctx)?;
	let Children { comments, deferred } = collect_children(&listing.children, ctx)?;

	Ok(CommentForest { comments, deferred_child_ids: deferred })
}

/// Decodes a record + comments response.
///
/// Two or more listings are read as a record listing followed by a comment listing, each half
/// decoded independently. When both halves fail, the first listing is retried as a comment
/// listing before giving up with [`DecodeError::Unrecoverable`]. A single listing holds comments,
/// unless every child is a post, in which case it is the record alone.
pub fn decode_comments_page(
	body: &[u8],
	ctx: &mut ParseContext,
) -> Result<CommentsPage, DecodeError> {
	let envelopes = crate::model::normalize_body(body)?;

	match envelopes.as_slice() {
		[] => Err(DecodeError::EmptyBody),
		[only] => decode_single_listing(only, ctx),
		[record, tree, ..] => {
			let post = decode_record(record, ctx);

			ctx.clear();

			let comments = build_forest(tree, ctx);

			match (post, comments) {
				(Err(record_err), Err(tree_err)) => {
					ctx.clear();

					match build_forest(record, ctx) {
						Ok(forest) => Ok(CommentsPage {
							comments: Some(forest),
							post_error: Some(record_err),
							..Default::default()
						}),
						Err(_) => Err(DecodeError::Unrecoverable {
							record: Box::new(record_err),
							tree: Box::new(tree_err),
						}),
					}
				},
				(post, comments) => {
					let (post, post_error) = split(post);
					let (comments, comments_error) = split(comments);

					Ok(CommentsPage { post, comments, post_error, comments_error })
				},
			}
		},
	}
}

/// Decodes a `/api/morechildren` response (`{"json":{"errors":[],"data":{"things":[..]}}}`).
///
/// The service returns the requested comments flat; each becomes a root of the forest and any
/// markers it still carries land in the forest's deferred ids.
pub fn decode_more_children(
	body: &[u8],
	ctx: &mut ParseContext,
) -> Result<CommentForest, DecodeError> {
	#[derive(Deserialize)]
	struct Response {
		json: Inner,
	}
	#[derive(Deserialize)]
	struct Inner {
		#[serde(default)]
		errors: Vec<serde_json::Value>,
		#[serde(default)]
		data: Option<Things>,
	}
	#[derive(Deserialize)]
	struct Things {
		#[serde(default)]
		things: Vec<Envelope>,
	}

	let text = std::str::from_utf8(body)
		.map_err(|err| DecodeError::Syntax(serde::de::Error::custom(err)))?;
	let response: Response = from_json(text)?;

	if let Some(first) = response.json.errors.first() {
		return Err(DecodeError::invalid(Kind::More, "errors", first));
	}

	let things = response.json.data.map(|data| data.things).unwrap_or_default();
	let Children { comments, deferred } = collect_children(&things, ctx)?;

	Ok(CommentForest { comments, deferred_child_ids: deferred })
}

#[derive(Default)]
struct Children {
	comments: Vec<Comment>,
	deferred: Vec<Base36Id>,
}

fn split<T>(result: Result<T, DecodeError>) -> (Option<T>, Option<DecodeError>) {
	match result {
		Ok(value) => (Some(value), None),
		Err(err) => (None, Some(err)),
	}
}

fn decode_record(envelope: &Envelope, ctx: &mut ParseContext) -> Result<Post, DecodeError> {
	let listing = wire::listing(envelope, ctx)?;
	let first = listing
		.children
		.first()
		.ok_or_else(|| DecodeError::invalid(Kind::Listing, "children", "record listing is empty"))?;

	first.expect_kind(Kind::Post)?;

	wire::post(first.payload(), ctx)
}

fn decode_single_listing(
	envelope: &Envelope,
	ctx: &mut ParseContext,
) -> Result<CommentsPage, DecodeError> {
	let listing = wire::listing(envelope, ctx)?;
	let record_only = !listing.children.is_empty()
		&& listing.children.iter().all(|child| matches!(child.kind(), Ok(Kind::Post)));

	if record_only {
		let post = decode_record(envelope, ctx)?;

		return Ok(CommentsPage { post: Some(post), ..Default::default() });
	}

	let Children { comments, deferred } = collect_children(&listing.children, ctx)?;

	Ok(CommentsPage {
		comments: Some(CommentForest { comments, deferred_child_ids: deferred }),
		..Default::default()
	})
}

fn expand_comment(envelope: &Envelope, ctx: &mut ParseContext) -> Result<Comment, DecodeError> {
	ctx.enter()?;

	let result = expand_entered(envelope, ctx);

	ctx.exit();

	result
}

fn expand_entered(envelope: &Envelope, ctx: &mut ParseContext) -> Result<Comment, DecodeError> {
	let (mut comment, replies) = wire::comment(envelope.payload(), ctx)?;

	if !ctx.mark_seen(&comment.id) {
		obs::cycle_truncated(&comment.id);

		return Ok(comment);
	}

	if let Replies::Listing(nested) = replies {
		let listing = wire::listing(&nested, ctx)?;
		let Children { comments, deferred } = collect_children(&listing.children, ctx)?;

		comment.replies = comments;
		comment.deferred_child_ids = deferred;
	}

	Ok(comment)
}

/// Decodes sibling envelopes, skipping broken ones and folding markers into deferred ids.
///
/// Depth failures are returned instead of skipped.
fn collect_children(
	children: &[Envelope],
	ctx: &mut ParseContext,
) -> Result<Children, DecodeError> {
	let mut out = Children::default();

	for child in children {
		let outcome = match child.kind() {
			Ok(Kind::Comment) => expand_comment(child, ctx).map(|comment| {
				out.deferred.extend(comment.deferred_child_ids.iter().cloned());
				out.comments.push(comment);
			}),
			Ok(Kind::More) =>
				wire::more(child.payload(), ctx).map(|more| out.deferred.extend(more.children)),
			Ok(kind) =>
				Err(DecodeError::UnexpectedKind { expected: "t1 or more", found: kind.to_string() }),
			Err(err) => Err(err),
		};

		match outcome {
			Err(err) if err.is_fatal() => return Err(err),
			Err(err) => obs::skipped_child(child.kind().ok(), &err),
			Ok(()) => {},
		}
	}

	Ok(out)
}
