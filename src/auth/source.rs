//! Credential sources feeding the token cache.
//!
//! [`CredentialSource`] is the seam: the cache only ever asks for a fresh [`IssuedCredential`].
//! [`OAuth2CredentialSource`] implements it on top of the `oauth2` crate for the two grants a
//! script or service client needs, routing every exchange through an [`HttpTransport`] so custom
//! stacks and test doubles plug in the same way they do for API calls.

// crates.io
use oauth2::{
	ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RequestTokenError,
	ResourceOwnerPassword, ResourceOwnerUsername, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::{AuthError, ConfigError, TransportError},
	http::{HttpTransport, ResponseMetadata, ResponseMetadataSlot},
};

type TokenClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Boxed future returned by [`CredentialSource::fetch`].
pub type CredentialFuture<'a> =
	Pin<Box<dyn Future<Output = Result<IssuedCredential, AuthError>> + 'a + Send>>;

/// Anything able to mint a bearer credential on demand.
pub trait CredentialSource
where
	Self: 'static + Send + Sync,
{
	/// Fetches a brand-new credential; caching is the caller's concern.
	fn fetch(&self) -> CredentialFuture<'_>;
}

/// Credential handed back by a [`CredentialSource`].
#[derive(Clone, Debug)]
pub struct IssuedCredential {
	/// Bearer token.
	pub token: Secret,
	/// Instant the token was issued.
	pub issued_at: OffsetDateTime,
	/// Lifetime declared by the issuer.
	pub lifetime: Duration,
}

/// OAuth2 grant used by [`OAuth2CredentialSource`].
#[derive(Clone, Debug)]
pub enum Grant {
	/// Application-only `client_credentials` grant.
	ClientCredentials,
	/// Resource-owner `password` grant for script applications.
	Password {
		/// Account name.
		username: String,
		/// Account password.
		password: Secret,
	},
}

/// [`CredentialSource`] backed by an OAuth2 token endpoint.
pub struct OAuth2CredentialSource<C>
where
	C: HttpTransport,
{
	oauth_client: TokenClient,
	http_client: Arc<C>,
	grant: Grant,
	scopes: Vec<String>,
}
impl<C> OAuth2CredentialSource<C>
where
	C: HttpTransport,
{
	/// Creates a source exchanging `grant` at `token_endpoint`.
	///
	/// Installed applications without a secret pass `None`; the client id is still sent through
	/// HTTP basic authentication.
	pub fn new(
		token_endpoint: &Url,
		client_id: &str,
		client_secret: Option<&str>,
		grant: Grant,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let mut oauth_client =
			BasicClient::new(ClientId::new(client_id.to_owned())).set_token_uri(token_url);

		if let Some(secret) = client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.to_owned()));
		}

		Ok(Self { oauth_client, http_client: http_client.into(), grant, scopes: Vec::new() })
	}

	/// Requests `scopes` on every exchange.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Grant exchanged by this source.
	pub fn grant(&self) -> &Grant {
		&self.grant
	}

	fn map_request_error(
		&self,
		meta: Option<ResponseMetadata>,
		err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
	) -> AuthError {
		match err {
			RequestTokenError::ServerResponse(response) =>
				AuthError::Rejected { reason: response.to_string() },
			RequestTokenError::Request(error) =>
				AuthError::Transport(self.http_client.classify_error(error)),
			RequestTokenError::Parse(source, _body) => AuthError::MalformedResponse { source },
			RequestTokenError::Other(message) => match meta.and_then(|meta| meta.status) {
				Some(status) if !(200..300).contains(&status) =>
					AuthError::Transport(TransportError::Status { status }),
				_ => AuthError::Rejected { reason: message },
			},
		}
	}
}
impl<C> CredentialSource for OAuth2CredentialSource<C>
where
	C: HttpTransport,
{
	fn fetch(&self) -> CredentialFuture<'_> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let response = match &self.grant {
				Grant::ClientCredentials => {
					let mut request = self.oauth_client.exchange_client_credentials();

					for scope in &self.scopes {
						request = request.add_scope(Scope::new(scope.clone()));
					}

					request.request_async(&instrumented).await
				},
				Grant::Password { username, password } => {
					let username = ResourceOwnerUsername::new(username.clone());
					let password = ResourceOwnerPassword::new(password.expose().to_owned());
					let mut request = self.oauth_client.exchange_password(&username, &password);

					for scope in &self.scopes {
						request = request.add_scope(Scope::new(scope.clone()));
					}

					request.request_async(&instrumented).await
				},
			}
			.map_err(|err| self.map_request_error(meta.take(), err))?;

			issued_from_response(response)
		})
	}
}

fn issued_from_response(response: BasicTokenResponse) -> Result<IssuedCredential, AuthError> {
	let expires_in = response.expires_in().ok_or(AuthError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| AuthError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(AuthError::NonPositiveExpiresIn);
	}

	Ok(IssuedCredential {
		token: Secret::new(response.access_token().secret().to_owned()),
		issued_at: OffsetDateTime::now_utc(),
		lifetime: Duration::seconds(expires_in),
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::header::AUTHORIZATION;
	// self
	use super::*;
	use crate::_preludet::*;

	const JSON: (&str, &str) = ("content-type", "application/json");

	fn source(
		transport: &ScriptedTransport,
		grant: Grant,
	) -> OAuth2CredentialSource<ScriptedTransport> {
		let endpoint = Url::parse("https://auth.example.com/api/v1/access_token")
			.expect("Fixture URL should parse.");

		OAuth2CredentialSource::new(&endpoint, "client", Some("shh"), grant, transport.clone())
			.expect("Source should build.")
			.with_scopes(["read"])
	}

	#[tokio::test]
	async fn client_credentials_exchange_yields_credential() {
		let transport = ScriptedTransport::default();

		transport.push(
			200,
			&[JSON],
			r#"{"access_token":"abc","token_type":"bearer","expires_in":3600,"scope":"read"}"#,
		);

		let issued = source(&transport, Grant::ClientCredentials)
			.fetch()
			.await
			.expect("Exchange should succeed.");

		assert_eq!(issued.token.expose(), "abc");
		assert_eq!(issued.lifetime, Duration::hours(1));

		let requests = transport.requests();

		assert_eq!(requests.len(), 1);
		assert_eq!(requests[0].uri, "https://auth.example.com/api/v1/access_token");
		assert!(requests[0].headers.contains_key(AUTHORIZATION));
	}

	#[tokio::test]
	async fn password_grant_uses_the_same_endpoint() {
		let transport = ScriptedTransport::default();
		let grant = Grant::Password { username: "bot".into(), password: Secret::new("hunter2") };

		transport.push(200, &[JSON], r#"{"access_token":"pw","token_type":"bearer","expires_in":60}"#);

		let issued = source(&transport, grant).fetch().await.expect("Exchange should succeed.");

		assert_eq!(issued.token.expose(), "pw");
		assert_eq!(issued.lifetime, Duration::minutes(1));
	}

	#[tokio::test]
	async fn rejected_grant_maps_to_rejected() {
		let transport = ScriptedTransport::default();

		transport.push(400, &[JSON], r#"{"error":"invalid_grant"}"#);

		let err = source(&transport, Grant::ClientCredentials)
			.fetch()
			.await
			.expect_err("Rejected grants should fail.");

		assert!(matches!(err, AuthError::Rejected { ref reason } if reason.contains("invalid_grant")));
	}

	#[tokio::test]
	async fn missing_lifetime_is_rejected() {
		let transport = ScriptedTransport::default();

		transport.push(200, &[JSON], r#"{"access_token":"abc","token_type":"bearer"}"#);

		let err = source(&transport, Grant::ClientCredentials)
			.fetch()
			.await
			.expect_err("Credentials without a lifetime should fail.");

		assert!(matches!(err, AuthError::MissingExpiresIn));
	}

	#[tokio::test]
	async fn transport_failure_maps_to_transport() {
		let transport = ScriptedTransport::default();
		let err = source(&transport, Grant::ClientCredentials)
			.fetch()
			.await
			.expect_err("An empty script should fail the call.");

		assert!(matches!(err, AuthError::Transport(TransportError::Network { .. })));
	}
}
