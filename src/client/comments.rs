//! Record + comment tree fetches, batched fan-out, and elided reply expansion.

// crates.io
use futures::future;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	client::{Client, observed},
	http::HttpTransport,
	model::{Base36Id, CommentForest, CommentsPage, Fullname},
	obs::Operation,
};

impl<C> Client<C>
where
	C: HttpTransport,
{
	/// Fetches a record and its comment tree.
	///
	/// The two halves of the response decode independently, so the returned page may carry one
	/// half plus the error that sank the other.
	pub async fn fetch_comments(
		&self,
		post: &Base36Id,
		cancel: &CancellationToken,
	) -> Result<CommentsPage> {
		observed(Operation::FetchComments, post.as_str(), async {
			let url = self.endpoint(&format!("comments/{post}"), &[])?;
			let body = self.get(url, cancel).await?;

			self.decoder.decode_comments_page(&body).map_err(Error::from)
		})
		.await
	}

	/// Fetches many comment trees concurrently.
	///
	/// Results line up with `posts` by index. Nothing caps the fan-out besides the gate, so a large
	/// batch simply queues on it.
	pub async fn fetch_comments_batch(
		&self,
		posts: &[Base36Id],
		cancel: &CancellationToken,
	) -> Vec<Result<CommentsPage>> {
		future::join_all(posts.iter().map(|post| self.fetch_comments(post, cancel))).await
	}

	/// Expands elided replies of `link` into a flat forest.
	pub async fn fetch_more_children(
		&self,
		link: &Fullname,
		children: &[Base36Id],
		cancel: &CancellationToken,
	) -> Result<CommentForest> {
		if children.is_empty() {
			return Ok(CommentForest::default());
		}

		observed(Operation::FetchMoreChildren, link.as_str(), async {
			let children = children.iter().map(Base36Id::as_str).collect::<Vec<_>>().join(",");
			let query =
				[("api_type", "json".to_owned()), ("link_id", link.to_string()), ("children", children)];
			let url = self.endpoint("api/morechildren", &query)?;
			let body = self.get(url, cancel).await?;

			self.decoder.decode_more_children(&body).map_err(Error::from)
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, config::ClientConfig, error::TransportError};

	fn client(transport: &ScriptedTransport) -> Client<ScriptedTransport> {
		let config = ClientConfig::builder("threadline-test/0.1")
			.api_base(Url::parse("https://api.example.com").expect("Fixture URL should parse."))
			.build()
			.expect("Config should build.");
		let source = CountingCredentials::new(OffsetDateTime::now_utc(), Duration::hours(1));

		Client::with_credentials(config, transport.clone(), source)
	}

	fn id(value: &str) -> Base36Id {
		Base36Id::new(value).expect("Fixture id should parse.")
	}

	fn page_json(post: &str) -> String {
		format!(
			"[{},{}]",
			listing_json(&[post_json(post)]),
			listing_json(&[comment_json(&format!("{post}c"), &format!("t3_{post}"), "\"\"")])
		)
	}

	#[tokio::test]
	async fn comments_page_decodes_both_halves() {
		let transport = ScriptedTransport::default();
		let client = client(&transport);

		transport.push(200, &[], page_json("abc"));

		let page = client
			.fetch_comments(&id("abc"), &CancellationToken::new())
			.await
			.expect("Page should decode.");

		assert!(page.is_complete());
		assert_eq!(page.post.map(|post| post.id), Some(id("abc")));
		assert_eq!(page.comments.map(|forest| forest.len()), Some(1));
		assert_eq!(transport.requests()[0].uri, "https://api.example.com/comments/abc?raw_json=1");
	}

	#[tokio::test]
	async fn batch_results_follow_input_order() {
		let transport = ScriptedTransport::default();
		let client = client(&transport);

		transport.push(200, &[], page_json("a"));
		transport.push(200, &[], page_json("b"));
		transport.push(500, &[], "");

		let results = client
			.fetch_comments_batch(&[id("a"), id("b"), id("c")], &CancellationToken::new())
			.await;

		assert_eq!(results.len(), 3);

		let post_id = |index: usize| {
			results[index]
				.as_ref()
				.ok()
				.and_then(|page| page.post.as_ref())
				.map(|post| post.id.as_str().to_owned())
		};

		assert_eq!(post_id(0).as_deref(), Some("a"));
		assert_eq!(post_id(1).as_deref(), Some("b"));
		assert!(matches!(
			results[2],
			Err(Error::Transport(TransportError::Status { status: 500 }))
		));
	}

	#[tokio::test]
	async fn more_children_joins_ids_and_returns_a_flat_forest() {
		let transport = ScriptedTransport::default();
		let client = client(&transport);
		let link = Fullname::new("t3_post1").expect("Fixture fullname should parse.");
		let body = format!(
			"{{\"json\":{{\"errors\":[],\"data\":{{\"things\":[{},{}]}}}}}}",
			comment_json("x1", "t1_root", "\"\""),
			comment_json("x2", "t1_x1", "\"\"")
		);

		transport.push(200, &[], body);

		let forest = client
			.fetch_more_children(&link, &[id("x1"), id("x2")], &CancellationToken::new())
			.await
			.expect("Forest should decode.");

		assert_eq!(forest.comments.len(), 2);
		assert!(forest.deferred_child_ids.is_empty());

		let uri = &transport.requests()[0].uri;

		assert!(uri.starts_with("https://api.example.com/api/morechildren?raw_json=1&api_type=json"));
		assert!(uri.contains("link_id=t3_post1"));
		assert!(uri.contains("children=x1%2Cx2"));
	}

	#[tokio::test]
	async fn more_children_without_ids_skips_the_request() {
		let transport = ScriptedTransport::default();
		let client = client(&transport);
		let link = Fullname::new("t3_post1").expect("Fixture fullname should parse.");
		let forest = client
			.fetch_more_children(&link, &[], &CancellationToken::new())
			.await
			.expect("Empty requests should succeed.");

		assert!(forest.is_empty());
		assert!(transport.requests().is_empty());
	}
}
