//! Listing pages and their pagination parameters.

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	client::{Client, observed},
	http::HttpTransport,
	model::{Fullname, ListingPage},
	obs::Operation,
};

/// Pagination parameters accepted by listing endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListingParams {
	/// Page size, always within `1..=100` once set.
	pub limit: Option<u8>,
	/// Cursor to continue after.
	pub after: Option<Fullname>,
	/// Cursor to continue before.
	pub before: Option<Fullname>,
	/// Number of items already seen, used by the service to number results.
	pub count: Option<u32>,
}
impl ListingParams {
	/// Largest page the service hands out.
	pub const MAX_LIMIT: u8 = 100;

	/// Creates empty parameters.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the page size, clamped to `1..=100`.
	pub fn limit(mut self, limit: u8) -> Self {
		self.limit = Some(limit.clamp(1, Self::MAX_LIMIT));

		self
	}

	/// Continues after `cursor`.
	pub fn after(mut self, cursor: Fullname) -> Self {
		self.after = Some(cursor);

		self
	}

	/// Continues before `cursor`.
	pub fn before(mut self, cursor: Fullname) -> Self {
		self.before = Some(cursor);

		self
	}

	/// Sets the number of items already seen.
	pub fn count(mut self, count: u32) -> Self {
		self.count = Some(count);

		self
	}

	/// Parameters for the page following `page`, or `None` on the last page.
	pub fn next_page(&self, page: &ListingPage) -> Option<Self> {
		let after = page.after.clone()?;
		let seen = u32::try_from(page.things.len()).unwrap_or(u32::MAX);

		Some(Self {
			limit: self.limit,
			after: Some(after),
			before: None,
			count: Some(self.count.unwrap_or_default().saturating_add(seen)),
		})
	}

	/// Query pairs in the order they are sent.
	pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
		let mut pairs = Vec::with_capacity(4);

		if let Some(limit) = self.limit {
			pairs.push(("limit", limit.to_string()));
		}
		if let Some(after) = &self.after {
			pairs.push(("after", after.to_string()));
		}
		if let Some(before) = &self.before {
			pairs.push(("before", before.to_string()));
		}
		if let Some(count) = self.count {
			pairs.push(("count", count.to_string()));
		}

		pairs
	}
}

impl<C> Client<C>
where
	C: HttpTransport,
{
	/// Fetches one listing page from `path` (for example `r/rust/hot`).
	pub async fn fetch_listing(
		&self,
		path: &str,
		params: &ListingParams,
		cancel: &CancellationToken,
	) -> Result<ListingPage> {
		observed(Operation::FetchListing, path, async {
			let url = self.endpoint(path, &params.query_pairs())?;
			let body = self.get(url, cancel).await?;

			self.decoder.decode_listing_page(&body).map_err(Error::from)
		})
		.await
	}
}
