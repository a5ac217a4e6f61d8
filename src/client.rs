//! Request pipeline tying the gate, the token cache, the transport, and the decoder together.
//!
//! Every call goes through the same steps: wait on the [`RateGate`], attach a cached bearer,
//! dispatch through the [`HttpTransport`] while honoring cancellation, feed whatever rate-limit
//! headers came back into the gate (success or not), and only then look at the status code.

mod comments;
mod listing;

pub use listing::*;

// crates.io
use oauth2::{
	AsyncHttpClient,
	http::{
		Method, Request, StatusCode,
		header::{ACCEPT, AUTHORIZATION, USER_AGENT},
	},
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{CredentialSource, Grant, OAuth2CredentialSource, TokenCache},
	config::ClientConfig,
	decode::Decoder,
	error::TransportError,
	gate::{RateGate, RateLimitHeaders},
	http::{HttpTransport, ResponseMetadataSlot},
	obs::{self, OpSpan, Operation, Outcome},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's bundled reqwest transport.
pub type ReqwestApiClient = Client<ReqwestHttpClient>;

/// Rate-gated, authenticated API client.
///
/// Cloning is cheap and every clone shares the same gate and token cache, so one `Client` per
/// process (or per credential) is the intended shape.
pub struct Client<C>
where
	C: HttpTransport,
{
	/// Validated configuration.
	pub config: Arc<ClientConfig>,
	/// Gate every request waits on.
	pub gate: Arc<RateGate>,
	/// Bearer cache shared by all requests.
	pub tokens: Arc<TokenCache>,
	/// Envelope decoder with its context pool.
	pub decoder: Arc<Decoder>,
	/// Transport used for every API call.
	pub http_client: Arc<C>,
}
impl<C> Client<C>
where
	C: HttpTransport,
{
	/// Assembles a client from its parts.
	pub fn new(config: ClientConfig, http_client: impl Into<Arc<C>>, tokens: TokenCache) -> Self {
		Self {
			gate: Arc::new(RateGate::new(config.rate)),
			tokens: Arc::new(tokens),
			decoder: Arc::new(Decoder::new(config.decode)),
			http_client: http_client.into(),
			config: Arc::new(config),
		}
	}

	/// Assembles a client that fetches bearers from `source`.
	pub fn with_credentials<S>(
		config: ClientConfig,
		http_client: impl Into<Arc<C>>,
		source: S,
	) -> Self
	where
		S: CredentialSource,
	{
		Self::new(config, http_client, TokenCache::new(source))
	}

	/// Assembles a client whose bearers come from the configured OAuth2 token endpoint, reusing
	/// `http_client` for the token exchange.
	pub fn with_oauth2(
		config: ClientConfig,
		http_client: impl Into<Arc<C>>,
		client_id: &str,
		client_secret: Option<&str>,
		grant: Grant,
	) -> Result<Self> {
		let http_client: Arc<C> = http_client.into();
		let source = OAuth2CredentialSource::<C>::new(
			&config.token_endpoint,
			client_id,
			client_secret,
			grant,
			http_client.clone(),
		)?;

		Ok(Self::with_credentials(config, http_client, source))
	}

	/// Resolves `path` against the API base and appends `raw_json=1` plus `query`.
	pub fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
		let mut url = self.config.endpoint(path)?;

		{
			let mut pairs = url.query_pairs_mut();

			pairs.append_pair("raw_json", "1");

			for (key, value) in query {
				pairs.append_pair(key, value);
			}
		}

		Ok(url)
	}

	/// Issues an authenticated `GET` and returns the body of a 2xx response.
	///
	/// A cancelled `cancel` yields [`Error::RateLimitCancelled`] while the call still waits on the
	/// gate and [`TransportError::Cancelled`] once it has passed the gate, whether it is fetching a
	/// bearer or waiting on the API. A 401 evicts the bearer that was sent so the next call fetches
	/// a new one.
	pub async fn get(&self, url: Url, cancel: &CancellationToken) -> Result<Vec<u8>> {
		self.gate.acquire(cancel).await?;

		let token = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
			token = self.tokens.get() => token?,
		};
		let authorization =
			token.bearer_header().map_err(|err| TransportError::Request(err.into()))?;
		let request = Request::builder()
			.method(Method::GET)
			.uri(url.as_str())
			.header(AUTHORIZATION, authorization)
			.header(USER_AGENT, self.config.user_agent.as_str())
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(TransportError::from)?;
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let outcome = tokio::select! {
			biased;
			_ = cancel.cancelled() => None,
			outcome = instrumented.call(request) => Some(outcome),
		};
		let observed = meta.take();

		if let Some(meta) = &observed {
			self.gate.observe(&meta.rate_limit);
		}

		let response = match outcome {
			None => return Err(TransportError::Cancelled.into()),
			Some(Err(err)) => return Err(self.http_client.classify_error(err).into()),
			Some(Ok(response)) => response,
		};

		if observed.is_none() {
			self.gate.observe(&RateLimitHeaders::from_headers(response.headers()));
		}

		let status = response.status();

		if status == StatusCode::UNAUTHORIZED {
			self.tokens.invalidate_token(&token);
		}
		if !status.is_success() {
			return Err(TransportError::Status { status: status.as_u16() }.into());
		}

		Ok(response.into_body())
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestHttpClient> {
	/// Builds the bundled reqwest transport from `config` and authenticates through OAuth2.
	pub fn from_config(
		config: ClientConfig,
		client_id: &str,
		client_secret: Option<&str>,
		grant: Grant,
	) -> Result<Self> {
		let http_client = ReqwestHttpClient::from_config(&config)?;

		Self::with_oauth2(config, http_client, client_id, client_secret, grant)
	}
}
impl<C> Clone for Client<C>
where
	C: HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			gate: self.gate.clone(),
			tokens: self.tokens.clone(),
			decoder: self.decoder.clone(),
			http_client: self.http_client.clone(),
		}
	}
}
impl<C> Debug for Client<C>
where
	C: HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("config", &self.config)
			.field("gate", &self.gate)
			.field("tokens", &self.tokens)
			.finish_non_exhaustive()
	}
}

async fn observed<T, F>(op: Operation, subject: &str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = OpSpan::new(op, subject);

	obs::record_op_outcome(op, Outcome::Attempt);

	let result = span.instrument(fut).await;
	let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };

	span.finish(outcome);
	obs::record_op_outcome(op, outcome);

	result
}
