//! Client configuration and its validating builder.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	decode::{DEFAULT_CLOCK_SKEW, DEFAULT_MAX_DEPTH, DecodeOptions},
	error::ConfigError,
};

/// Default API base for authenticated calls.
pub const DEFAULT_API_BASE: &str = "https://oauth.reddit.com/";
/// Default token endpoint.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://www.reddit.com/api/v1/access_token";

/// Steady-state rate, burst, and proactive throttle settings for the gate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
	/// Sustained request rate.
	pub requests_per_minute: u32,
	/// Requests that may go out back to back.
	pub burst: u32,
	/// Remaining-budget level below which the gate starts spreading requests.
	pub throttle_threshold: f64,
}
impl RateConfig {
	/// Checks every field.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.requests_per_minute == 0 {
			return Err(ConfigError::ZeroRate);
		}
		if self.burst == 0 {
			return Err(ConfigError::ZeroBurst);
		}
		if !self.throttle_threshold.is_finite() || self.throttle_threshold < 0. {
			return Err(ConfigError::InvalidThreshold { threshold: self.throttle_threshold });
		}

		Ok(())
	}
}
impl Default for RateConfig {
	fn default() -> Self {
		Self { requests_per_minute: 1_000, burst: 10, throttle_threshold: 5. }
	}
}

/// Validated settings shared by the gate, the decoder, and the transports.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Fixed `User-Agent` sent with every request.
	pub user_agent: String,
	/// Base URL request paths are joined onto; always ends with `/`.
	pub api_base: Url,
	/// Token endpoint used by credential sources.
	pub token_endpoint: Url,
	/// Gate settings.
	pub rate: RateConfig,
	/// Decoder settings.
	pub decode: DecodeOptions,
	/// Per-request timeout applied by the bundled transport.
	pub request_timeout: Option<StdDuration>,
}
impl ClientConfig {
	/// Starts a builder for a client identifying itself as `user_agent`.
	pub fn builder(user_agent: impl Into<String>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(user_agent)
	}

	/// Resolves `path` (leading `/` optional) against the API base.
	///
	/// Absolute URLs and `..` segments that land on another origin or above the base path are
	/// rejected, so the bearer never leaves the configured API.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let invalid = |source: Option<url::ParseError>| ConfigError::InvalidPath {
			path: path.to_owned(),
			source,
		};
		let url =
			self.api_base.join(path.trim_start_matches('/')).map_err(|e| invalid(Some(e)))?;

		if url.origin() != self.api_base.origin() || !url.path().starts_with(self.api_base.path()) {
			return Err(invalid(None));
		}

		Ok(url)
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Fixed `User-Agent`.
	pub user_agent: String,
	/// API base override.
	pub api_base: Option<Url>,
	/// Token endpoint override.
	pub token_endpoint: Option<Url>,
	/// Gate settings.
	pub rate: RateConfig,
	/// Maximum reply nesting.
	pub max_depth: usize,
	/// Tolerance for creation instants ahead of the local clock.
	pub clock_skew: Duration,
	/// Optional per-request timeout.
	pub request_timeout: Option<StdDuration>,
}
impl ClientConfigBuilder {
	/// Creates a builder seeded with defaults.
	pub fn new(user_agent: impl Into<String>) -> Self {
		Self {
			user_agent: user_agent.into(),
			api_base: None,
			token_endpoint: None,
			rate: RateConfig::default(),
			max_depth: DEFAULT_MAX_DEPTH,
			clock_skew: DEFAULT_CLOCK_SKEW,
			request_timeout: None,
		}
	}

	/// Overrides the API base.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Overrides the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Replaces every gate setting at once.
	pub fn rate(mut self, rate: RateConfig) -> Self {
		self.rate = rate;

		self
	}

	/// Sets the sustained request rate.
	pub fn requests_per_minute(mut self, requests_per_minute: u32) -> Self {
		self.rate.requests_per_minute = requests_per_minute;

		self
	}

	/// Sets the burst capacity.
	pub fn burst(mut self, burst: u32) -> Self {
		self.rate.burst = burst;

		self
	}

	/// Sets the proactive throttle threshold.
	pub fn throttle_threshold(mut self, threshold: f64) -> Self {
		self.rate.throttle_threshold = threshold;

		self
	}

	/// Sets the maximum reply nesting.
	pub fn max_depth(mut self, max_depth: usize) -> Self {
		self.max_depth = max_depth;

		self
	}

	/// Sets the clock-skew tolerance; negative values clamp to zero.
	pub fn clock_skew(mut self, skew: Duration) -> Self {
		self.clock_skew = if skew.is_negative() { Duration::ZERO } else { skew };

		self
	}

	/// Sets a per-request timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		if self.user_agent.trim().is_empty() {
			return Err(ConfigError::EmptyUserAgent);
		}
		if self.max_depth == 0 {
			return Err(ConfigError::ZeroDepth);
		}

		self.rate.validate()?;

		let api_base = with_trailing_slash(resolve("api", self.api_base, DEFAULT_API_BASE)?);
		let token_endpoint = resolve("token", self.token_endpoint, DEFAULT_TOKEN_ENDPOINT)?;

		Ok(ClientConfig {
			user_agent: self.user_agent,
			api_base,
			token_endpoint,
			rate: self.rate,
			decode: DecodeOptions { max_depth: self.max_depth, clock_skew: self.clock_skew },
			request_timeout: self.request_timeout,
		})
	}
}

fn resolve(
	name: &'static str,
	configured: Option<Url>,
	default: &str,
) -> Result<Url, ConfigError> {
	let url = match configured {
		Some(url) => url,
		None => Url::parse(default).map_err(|source| ConfigError::InvalidEndpoint { source })?,
	};

	if url.scheme() != "https" {
		return Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() });
	}

	Ok(url)
}

fn with_trailing_slash(mut url: Url) -> Url {
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_documented_values() {
		let config = ClientConfig::builder("threadline-test/0.1").build().expect("Defaults build.");

		assert_eq!(config.rate, RateConfig::default());
		assert_eq!(config.rate.requests_per_minute, 1_000);
		assert_eq!(config.rate.burst, 10);
		assert_eq!(config.rate.throttle_threshold, 5.);
		assert_eq!(config.decode.max_depth, 50);
		assert_eq!(config.decode.clock_skew, Duration::minutes(5));
		assert_eq!(config.api_base.as_str(), DEFAULT_API_BASE);
		assert_eq!(config.token_endpoint.as_str(), DEFAULT_TOKEN_ENDPOINT);
	}

	#[test]
	fn rejects_invalid_settings() {
		let builder = || ClientConfig::builder("ua");

		assert!(matches!(ClientConfig::builder(" ").build(), Err(ConfigError::EmptyUserAgent)));
		assert!(matches!(builder().requests_per_minute(0).build(), Err(ConfigError::ZeroRate)));
		assert!(matches!(builder().burst(0).build(), Err(ConfigError::ZeroBurst)));
		assert!(matches!(
			builder().throttle_threshold(f64::NAN).build(),
			Err(ConfigError::InvalidThreshold { .. })
		));
		assert!(matches!(builder().max_depth(0).build(), Err(ConfigError::ZeroDepth)));
		assert!(matches!(
			builder()
				.api_base(Url::parse("http://example.com").expect("Fixture URL should parse."))
				.build(),
			Err(ConfigError::InsecureEndpoint { endpoint: "api", .. })
		));
	}

	#[test]
	fn endpoint_joins_under_base_path() {
		let config = ClientConfig::builder("ua")
			.api_base(Url::parse("https://example.com/proxy").expect("Fixture URL should parse."))
			.build()
			.expect("Config should build.");

		assert_eq!(
			config.endpoint("/r/rust/hot").expect("Path should join.").as_str(),
			"https://example.com/proxy/r/rust/hot"
		);
		assert_eq!(
			config.endpoint("comments/abc").expect("Path should join.").as_str(),
			"https://example.com/proxy/comments/abc"
		);
	}

	#[test]
	fn endpoint_stays_under_the_api_base() {
		let config = ClientConfig::builder("ua")
			.api_base(Url::parse("https://example.com/proxy/").expect("Fixture URL should parse."))
			.build()
			.expect("Config should build.");

		for path in [
			"https://evil.example/steal",
			"../admin",
			"r/../../admin",
			"http://example.com/proxy/r/rust",
		] {
			assert!(
				matches!(config.endpoint(path), Err(ConfigError::InvalidPath { source: None, .. })),
				"Path `{path}` should be rejected."
			);
		}

		assert!(config.endpoint("r/rust/../python").is_ok());
	}
}
