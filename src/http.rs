//! Transport primitives shared by API calls and credential fetches.
//!
//! The module exposes [`HttpTransport`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can plug in custom HTTP clients without losing
//! the gate's header feedback. Implementations call [`ResponseMetadataSlot::take`] before
//! dispatching a request and [`ResponseMetadataSlot::store`] once a status and rate-limit headers
//! are known, so the client can feed the gate even when the call itself fails.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError};
#[cfg(feature = "reqwest")] use oauth2::{HttpRequest, HttpResponse};
// self
use crate::{_prelude::*, error::TransportError, gate::RateLimitHeaders};
#[cfg(feature = "reqwest")] use crate::{config::ClientConfig, error::ConfigError};

/// Abstraction over HTTP transports able to execute API calls and token exchanges while
/// publishing response metadata to the rate gate.
///
/// The trait is the crate's only dependency on an HTTP stack. Callers provide an implementation
/// (typically behind `Arc<T>`) and the client requests short-lived [`AsyncHttpClient`] handles that
/// each carry a clone of a [`ResponseMetadataSlot`]. Implementations must be
/// `Send + Sync + 'static`, and the handles they return must own whatever state they need so
/// their request futures stay `Send` for the lifetime of the call.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	///
	/// The request future returned by [`AsyncHttpClient::call`] must be `Send` so the client's
	/// futures inherit the same guarantee.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the request so stale information
	///   never leaks across calls.
	/// - Once a response (successful or not) is available, save its status and rate-limit headers
	///   with [`ResponseMetadataSlot::store`].
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;

	/// Maps a transport failure into the crate's [`TransportError`].
	fn classify_error(&self, error: HttpClientError<Self::TransportError>) -> TransportError {
		classify_http_client_error(error)
	}
}

/// Metadata captured from the most recent HTTP response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, if a response arrived.
	pub status: Option<u16>,
	/// Rate-limit hints carried by the response.
	pub rate_limit: RateLimitHeaders,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between the transport and the client.
///
/// The client creates a fresh slot for each request and reads the captured metadata as soon as
/// the call resolves.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Default classification for transports without special knowledge of their error type.
pub fn classify_http_client_error<E>(error: HttpClientError<E>) -> TransportError
where
	E: 'static + Send + Sync + StdError,
{
	match error {
		HttpClientError::Reqwest(inner) => TransportError::network(*inner),
		HttpClientError::Http(inner) => TransportError::Request(inner),
		HttpClientError::Io(inner) => TransportError::Io(inner),
		HttpClientError::Other(message) => TransportError::Network { source: message.into() },
		_ => TransportError::Network { source: "unrecognized HTTP client failure".into() },
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Redirects are not followed: API and token endpoints answer directly, and a redirect usually
/// means the bearer header would be replayed somewhere unexpected.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client carrying the configured user agent and timeout.
	pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder()
			.user_agent(config.user_agent.as_str())
			.redirect(reqwest::redirect::Policy::none());

		if let Some(timeout) = config.request_timeout {
			builder = builder.timeout(timeout);
		}

		Ok(Self(builder.build()?))
	}

	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}

	fn classify_error(&self, error: HttpClientError<ReqwestError>) -> TransportError {
		match error {
			HttpClientError::Reqwest(inner) => TransportError::from(*inner),
			other => classify_http_client_error(other),
		}
	}
}

#[cfg(feature = "reqwest")]
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`HttpTransport`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let inner = Arc::clone(&self.0);

		Box::pin(async move {
			inner.slot.take();

			let response = inner
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			inner.slot.store(ResponseMetadata {
				status: Some(status.as_u16()),
				rate_limit: RateLimitHeaders::from_headers(&headers),
			});

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
