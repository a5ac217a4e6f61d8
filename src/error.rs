//! Crate-level error types shared by the gate, decoder, token cache, and client.

// self
use crate::{_prelude::*, model::Kind};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Malformed or invalid payload.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Credential fetch or refresh failure.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Transport failure (DNS, TCP, TLS, timeout, HTTP status).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The caller cancelled while waiting on the rate gate; the request never reached the network.
	#[error("Rate limit wait was cancelled.")]
	RateLimitCancelled,
}

/// Payload failures raised while decoding envelopes and trees.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Envelope discriminator is outside the closed kind set.
	#[error("Envelope kind `{kind}` is not recognized.")]
	UnknownKind {
		/// Discriminator found on the wire.
		kind: String,
	},
	/// Envelope carried a known kind where another one was required.
	#[error("Expected a {expected} envelope but found `{found}`.")]
	UnexpectedKind {
		/// Kinds accepted at this position.
		expected: &'static str,
		/// Discriminator found on the wire.
		found: String,
	},
	/// Payload does not match the expected shape.
	#[error("Payload is malformed.")]
	Malformed {
		/// Structured parsing failure carrying the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Payload is not well-formed JSON.
	#[error("Payload is not valid JSON.")]
	Syntax(#[source] serde_json::Error),
	/// Response body contained no envelopes.
	#[error("Response body contains no envelopes.")]
	EmptyBody,
	/// Domain validation rejected the payload.
	#[error("Invalid {kind} field `{field}`: {reason}.")]
	Validation {
		/// Kind whose payload failed validation.
		kind: Kind,
		/// Offending field.
		field: &'static str,
		/// Human-readable reason.
		reason: String,
	},
	/// Reply nesting exceeded the configured bound.
	#[error("Reply nesting exceeds the maximum depth of {max}.")]
	DepthExceeded {
		/// Configured maximum depth.
		max: usize,
	},
	/// Neither half of a record + comments response could be decoded.
	#[error("Neither the record nor the comment tree could be decoded.")]
	Unrecoverable {
		/// Failure decoding the record listing.
		record: Box<DecodeError>,
		/// Failure decoding the comment listing.
		#[source]
		tree: Box<DecodeError>,
	},
}
impl DecodeError {
	/// Builds a [`DecodeError::Validation`] value.
	pub fn invalid(kind: Kind, field: &'static str, reason: impl Display) -> Self {
		Self::Validation { kind, field, reason: reason.to_string() }
	}

	/// Returns `true` for failures that must abort a whole tree instead of a single branch.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::DepthExceeded { .. })
	}
}

/// Credential fetch and refresh failures.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Token endpoint rejected the grant.
	#[error("Token endpoint rejected the grant: {reason}.")]
	Rejected {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Token endpoint could not be reached.
	#[error("Token endpoint could not be reached.")]
	Transport(#[source] TransportError),
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive lifetime.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Endpoint could not be parsed.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Endpoint does not use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Request path cannot be joined onto the API base or resolves outside of it.
	#[error("Request path `{path}` is invalid.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure; `None` when the path parsed but left the API base.
		#[source]
		source: Option<url::ParseError>,
	},
	/// User agent is empty.
	#[error("User agent cannot be empty.")]
	EmptyUserAgent,
	/// Steady-state rate is zero.
	#[error("The requests_per_minute value must be positive.")]
	ZeroRate,
	/// Burst capacity is zero.
	#[error("The burst value must be positive.")]
	ZeroBurst,
	/// Proactive throttle threshold is negative or not finite.
	#[error("The throttle threshold {threshold} must be a finite, non-negative number.")]
	InvalidThreshold {
		/// Rejected threshold.
		threshold: f64,
	},
	/// Tree depth bound is zero.
	#[error("The max_depth value must be positive.")]
	ZeroDepth,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, HTTP status).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request timed out.
	#[error("Request timed out while calling the API.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
	/// HTTP request construction failed.
	#[error(transparent)]
	Request(#[from] oauth2::http::Error),
	/// The API answered with a non-success status.
	#[error("API responded with HTTP status {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
	},
	/// The caller cancelled while the request was in flight.
	#[error("Request was cancelled while in flight.")]
	Cancelled,
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout { source: Box::new(e) } } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn decode_error_converts_into_crate_error_with_message() {
		let err: Error = DecodeError::UnknownKind { kind: "t9".into() }.into();

		assert!(matches!(err, Error::Decode(DecodeError::UnknownKind { .. })));
		assert_eq!(err.to_string(), "Envelope kind `t9` is not recognized.");
	}

	#[test]
	fn validation_helper_formats_reason() {
		let err = DecodeError::invalid(Kind::Post, "upvote_ratio", "must lie within [0, 1]");

		assert_eq!(err.to_string(), "Invalid t3 field `upvote_ratio`: must lie within [0, 1].");
		assert!(!err.is_fatal());
		assert!(DecodeError::DepthExceeded { max: 50 }.is_fatal());
	}

	#[test]
	fn auth_transport_error_exposes_source() {
		let err: Error = AuthError::Transport(TransportError::Status { status: 503 }).into();
		let source = StdError::source(&err).expect("Auth error should expose its transport source.");

		assert_eq!(source.to_string(), "API responded with HTTP status 503.");
	}
}
