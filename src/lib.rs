//! Adaptive, rate-gated client runtime for thread-shaped JSON APIs: lock-free throttling fed by
//! server headers, depth-guarded envelope decoding, and CAS-smart bearer caching in one crate.

#![deny(clippy::all, unused_crate_dependencies)]
#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod gate;
pub mod http;
pub mod model;
pub mod obs;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// crates.io
	use oauth2::{
		AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
		http::{HeaderMap, HeaderValue, StatusCode},
	};
	// self
	use crate::{
		auth::{CredentialFuture, CredentialSource, IssuedCredential, Secret},
		gate::RateLimitHeaders,
		http::{HttpTransport, ResponseMetadata, ResponseMetadataSlot},
	};

	/// Error surfaced by [`ScriptedTransport`] when its response queue runs dry.
	#[derive(Debug, ThisError)]
	#[error("Scripted transport has no response queued.")]
	pub struct ScriptedTransportError;

	/// Request snapshot captured by [`ScriptedTransport`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// Request URI as sent.
		pub uri: String,
		/// Request headers as sent.
		pub headers: HeaderMap,
	}

	#[derive(Debug, Default)]
	struct ScriptedInner {
		responses: Mutex<VecDeque<HttpResponse>>,
		requests: Mutex<Vec<RecordedRequest>>,
	}

	/// In-memory [`HttpTransport`] that replays queued responses in order.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedTransport(Arc<ScriptedInner>);
	impl ScriptedTransport {
		/// Queues a response with the provided status, headers, and body.
		pub fn push(&self, status: u16, headers: &[(&'static str, &str)], body: impl Into<Vec<u8>>) {
			let mut response = HttpResponse::new(body.into());

			*response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);

			for (name, value) in headers {
				if let Ok(value) = HeaderValue::from_str(value) {
					response.headers_mut().insert(*name, value);
				}
			}

			self.0.responses.lock().push_back(response);
		}

		/// Returns every request observed so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.0.requests.lock().clone()
		}
	}
	impl HttpTransport for ScriptedTransport {
		type Handle = ScriptedHandle;
		type TransportError = ScriptedTransportError;

		fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
			ScriptedHandle { inner: self.0.clone(), slot }
		}
	}

	/// Handle produced by [`ScriptedTransport::with_metadata`].
	pub struct ScriptedHandle {
		inner: Arc<ScriptedInner>,
		slot: ResponseMetadataSlot,
	}
	impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
		type Error = HttpClientError<ScriptedTransportError>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			self.slot.take();
			self.inner.requests.lock().push(RecordedRequest {
				uri: request.uri().to_string(),
				headers: request.headers().clone(),
			});

			let next = self.inner.responses.lock().pop_front();
			let slot = self.slot.clone();

			Box::pin(async move {
				let response =
					next.ok_or_else(|| HttpClientError::Reqwest(Box::new(ScriptedTransportError)))?;

				slot.store(ResponseMetadata {
					status: Some(response.status().as_u16()),
					rate_limit: RateLimitHeaders::from_headers(response.headers()),
				});

				Ok(response)
			})
		}
	}

	/// Credential source that mints `token-<n>` secrets with a fixed lifetime.
	#[derive(Debug)]
	pub struct CountingCredentials {
		/// Lifetime declared for every issued credential.
		pub lifetime: Duration,
		/// Issue instant stamped on every credential.
		pub issued_at: OffsetDateTime,
		fetches: AtomicUsize,
	}
	impl CountingCredentials {
		/// Creates a source issuing credentials at `issued_at` valid for `lifetime`.
		pub fn new(issued_at: OffsetDateTime, lifetime: Duration) -> Self {
			Self { lifetime, issued_at, fetches: AtomicUsize::new(0) }
		}

		/// Number of fetches performed so far.
		pub fn fetches(&self) -> usize {
			self.fetches.load(Ordering::SeqCst)
		}
	}
	impl CredentialSource for CountingCredentials {
		fn fetch(&self) -> CredentialFuture<'_> {
			Box::pin(async move {
				let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;

				Ok(IssuedCredential {
					token: Secret::new(format!("token-{n}")),
					issued_at: self.issued_at,
					lifetime: self.lifetime,
				})
			})
		}
	}

	/// JSON for a `t1` envelope with the provided id, parent, and raw `replies` value.
	pub fn comment_json(id: &str, parent: &str, replies: &str) -> String {
		format!(
			"{{\"kind\":\"t1\",\"data\":{{\"id\":\"{id}\",\"name\":\"t1_{id}\",\"author\":\"poster\",\
			 \"body\":\"reply {id}\",\"score\":3,\"created_utc\":1700000000.0,\"edited\":false,\
			 \"parent_id\":\"{parent}\",\"link_id\":\"t3_post1\",\"subreddit\":\"rust\",\
			 \"replies\":{replies}}}}}"
		)
	}

	/// JSON for a `more` envelope eliding the provided child ids.
	pub fn more_json(id: &str, parent: &str, children: &[&str]) -> String {
		let count = children.len();
		let children =
			children.iter().map(|child| format!("\"{child}\"")).collect::<Vec<_>>().join(",");

		format!(
			"{{\"kind\":\"more\",\"data\":{{\"id\":\"{id}\",\"name\":\"t1_{id}\",\"count\":{count},\
			 \"depth\":1,\"parent_id\":\"{parent}\",\"children\":[{children}]}}}}"
		)
	}

	/// JSON for a `Listing` envelope wrapping raw child envelopes.
	pub fn listing_json(children: &[String]) -> String {
		format!(
			"{{\"kind\":\"Listing\",\"data\":{{\"before\":null,\"after\":null,\"modhash\":\"\",\
			 \"children\":[{}]}}}}",
			children.join(",")
		)
	}

	/// JSON for a `t3` envelope with the provided id.
	pub fn post_json(id: &str) -> String {
		format!(
			"{{\"kind\":\"t3\",\"data\":{{\"id\":\"{id}\",\"name\":\"t3_{id}\",\"title\":\"Hello\",\
			 \"author\":\"poster\",\"subreddit\":\"rust\",\"selftext\":\"\",\"score\":10,\
			 \"upvote_ratio\":0.5,\"num_comments\":2,\"created_utc\":1700000000.0,\
			 \"edited\":false,\"over_18\":false,\"permalink\":\"/r/rust/comments/{id}/\"}}}}"
		)
	}

	/// Builds a listing holding a reply chain `depth` comments deep (`c1` → `c<depth>`).
	pub fn comment_chain(depth: usize) -> String {
		const HOLE: &str = "\u{0}";

		let mut head = String::new();
		let mut tails = Vec::with_capacity(depth);

		for level in 1..=depth {
			let parent = if level == 1 { "t3_post1".to_owned() } else { format!("t1_c{}", level - 1) };
			let frame = listing_json(&[comment_json(&format!("c{level}"), &parent, HOLE)]);
			let (open, close) = frame.split_once(HOLE).unwrap_or((frame.as_str(), ""));

			head.push_str(open);
			tails.push(close.to_owned());
		}

		head.push_str("\"\"");

		for close in tails.iter().rev() {
			head.push_str(close);
		}

		head
	}
}

mod _prelude {
	pub use std::{
		collections::HashSet,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use httpmock as _;
