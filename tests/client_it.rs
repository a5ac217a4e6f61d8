#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use threadline::{
	CancellationToken,
	auth::Grant,
	client::{ListingParams, ReqwestApiClient},
	config::ClientConfig,
	error::{AuthError, Error, TransportError},
	http::ReqwestHttpClient,
	model::Base36Id,
	reqwest,
	url::Url,
};

const TOKEN_PATH: &str = "/api/v1/access_token";
const TOKEN_BODY: &str = r#"{"access_token":"it-token","token_type":"bearer","expires_in":3600}"#;

fn https(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path).replacen("http://", "https://", 1))
		.expect("Mock server URL should parse.")
}

fn post(id: &str) -> String {
	format!(
		"{{\"kind\":\"t3\",\"data\":{{\"id\":\"{id}\",\"name\":\"t3_{id}\",\"title\":\"Post {id}\",\
		 \"author\":\"poster\",\"subreddit\":\"rust\",\"score\":1,\"upvote_ratio\":1.0,\
		 \"num_comments\":1,\"created_utc\":1700000000.0,\"edited\":false}}}}"
	)
}

fn listing(children: &[String], after: Option<&str>) -> String {
	let after = after.map(|cursor| format!("\"{cursor}\"")).unwrap_or_else(|| "null".into());

	format!(
		"{{\"kind\":\"Listing\",\"data\":{{\"after\":{after},\"before\":null,\"children\":[{}]}}}}",
		children.join(",")
	)
}

fn client(server: &MockServer) -> ReqwestApiClient {
	let config = ClientConfig::builder("threadline-it/0.1")
		.api_base(https(server, "/"))
		.token_endpoint(https(server, TOKEN_PATH))
		.build()
		.expect("Config should build against the mock server.");
	let http_client = reqwest::Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Insecure reqwest client should build for tests.");

	ReqwestApiClient::with_oauth2(
		config,
		ReqwestHttpClient::with_client(http_client),
		"client-id",
		Some("client-secret"),
		Grant::ClientCredentials,
	)
	.expect("Client should build.")
}

#[tokio::test]
async fn listing_fetch_authenticates_once_and_decodes() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	let body = listing(&[post("a"), post("b")], Some("t3_b"));
	let hot = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/r/rust/hot")
				.query_param("raw_json", "1")
				.query_param("limit", "2")
				.header("authorization", "bearer it-token");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await;
	let client = client(&server);
	let cancel = CancellationToken::new();
	let params = ListingParams::new().limit(2);
	let first =
		client.fetch_listing("r/rust/hot", &params, &cancel).await.expect("First page should load.");

	assert_eq!(first.things.len(), 2);
	assert_eq!(first.after.as_ref().map(|cursor| cursor.as_str()), Some("t3_b"));

	client.fetch_listing("r/rust/hot", &params, &cancel).await.expect("Second call should load.");

	token.assert_calls_async(1).await;
	hot.assert_calls_async(2).await;
}

#[tokio::test]
async fn low_budget_headers_push_the_forced_deadline() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;

	let body = listing(&[], None);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/r/rust/new");
			then.status(200)
				.header("x-ratelimit-remaining", "0")
				.header("x-ratelimit-reset", "8")
				.body(body);
		})
		.await;

	let client = client(&server);

	client
		.fetch_listing("r/rust/new", &ListingParams::default(), &CancellationToken::new())
		.await
		.expect("Empty listing should load.");

	assert!(client.gate.forced_delay_remaining().as_secs_f64() > 6.);
}

#[tokio::test]
async fn comments_page_round_trip() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;

	let comment = "{\"kind\":\"t1\",\"data\":{\"id\":\"c1\",\"name\":\"t1_c1\",\"author\":\"x\",\
	               \"body\":\"hi\",\"score\":1,\"created_utc\":1700000000.0,\
	               \"parent_id\":\"t3_abc\",\"link_id\":\"t3_abc\",\"subreddit\":\"rust\",\
	               \"replies\":\"\"}}"
		.to_owned();
	let body = format!("[{},{}]", listing(&[post("abc")], None), listing(&[comment], None));

	server
		.mock_async(|when, then| {
			when.method(GET).path("/comments/abc");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await;

	let client = client(&server);
	let post_id = Base36Id::new("abc").expect("Fixture id should parse.");
	let page = client
		.fetch_comments(&post_id, &CancellationToken::new())
		.await
		.expect("Comments page should load.");

	assert!(page.is_complete());
	assert_eq!(page.comments.map(|forest| forest.len()), Some(1));
}

#[tokio::test]
async fn server_errors_surface_status() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").body(TOKEN_BODY);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/r/rust/top");
			then.status(503);
		})
		.await;

	let err = client(&server)
		.fetch_listing("r/rust/top", &ListingParams::default(), &CancellationToken::new())
		.await
		.expect_err("A 503 should surface as an error.");

	assert!(matches!(err, Error::Transport(TransportError::Status { status: 503 })));
}

#[tokio::test]
async fn rejected_credentials_never_reach_the_api() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_client"}"#);
		})
		.await;

	let api = server
		.mock_async(|when, then| {
			when.method(GET).path("/r/rust/hot");
			then.status(200).body(listing(&[], None));
		})
		.await;
	let err = client(&server)
		.fetch_listing("r/rust/hot", &ListingParams::default(), &CancellationToken::new())
		.await
		.expect_err("Rejected credentials should fail the call.");

	assert!(matches!(err, Error::Auth(AuthError::Rejected { .. })));
	api.assert_calls_async(0).await;
}
