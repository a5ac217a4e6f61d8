//! Shared bearer cache with lock-free reads and coalesced refreshes.
//!
//! Readers load the current [`CachedToken`] through an [`ArcSwapOption`] and never block while it
//! is fresh. A miss takes the refresh guard, re-checks (another caller may have refreshed in the
//! meantime), and only then asks the [`CredentialSource`] for a new credential, so a burst of
//! callers that all see an expired token produces exactly one fetch.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use arc_swap::ArcSwapOption;
// self
use crate::{
	_prelude::*,
	auth::{CredentialSource, IssuedCredential, Secret},
	error::AuthError,
	obs::{self, OpSpan, Operation, Outcome},
};

/// Token plus the window in which it may be handed out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedToken {
	/// Bearer secret.
	pub token: Secret,
	/// Issue instant reported by the source.
	pub issued_at: OffsetDateTime,
	/// Instant after which the token is treated as stale (90% of the declared lifetime).
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Converts a fresh credential, applying the 90% usable-lifetime cut.
	pub fn from_issued(issued: IssuedCredential) -> Self {
		let expires_at = issued.issued_at + issued.lifetime * 9 / 10;

		Self { token: issued.token, issued_at: issued.issued_at, expires_at }
	}

	/// Returns `true` while `now` falls before the stale instant.
	pub fn is_fresh_at(&self, now: OffsetDateTime) -> bool {
		now < self.expires_at
	}
}

/// Process-wide bearer cache shared by every request.
pub struct TokenCache {
	source: Arc<dyn CredentialSource>,
	current: ArcSwapOption<CachedToken>,
	refresh: AsyncMutex<()>,
	fetches: AtomicUsize,
}
impl TokenCache {
	/// Creates an empty cache backed by `source`.
	pub fn new<S>(source: S) -> Self
	where
		S: CredentialSource,
	{
		Self::from_arc(Arc::new(source))
	}

	/// Creates an empty cache backed by a shared source.
	pub fn from_arc(source: Arc<dyn CredentialSource>) -> Self {
		Self {
			source,
			current: ArcSwapOption::empty(),
			refresh: AsyncMutex::new(()),
			fetches: AtomicUsize::new(0),
		}
	}

	/// Snapshot of the cached token, fresh or not.
	pub fn cached(&self) -> Option<Arc<CachedToken>> {
		self.current.load_full()
	}

	/// Number of fetches this cache has issued.
	pub fn fetch_count(&self) -> usize {
		self.fetches.load(Ordering::Acquire)
	}

	/// Returns a fresh bearer secret, fetching one when needed.
	pub async fn get(&self) -> Result<Secret> {
		self.get_at(OffsetDateTime::now_utc()).await
	}

	/// Same as [`TokenCache::get`] with an explicit clock reading.
	pub async fn get_at(&self, now: OffsetDateTime) -> Result<Secret> {
		if let Some(token) = self.fresh(now) {
			return Ok(token);
		}

		let _singleflight = self.refresh.lock().await;

		if let Some(token) = self.fresh(now) {
			return Ok(token);
		}

		const OP: Operation = Operation::TokenRefresh;

		let span = OpSpan::new(OP, "bearer");

		obs::record_op_outcome(OP, Outcome::Attempt);

		let result = span.instrument(self.refresh_locked()).await;
		let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };

		span.finish(outcome);
		obs::record_op_outcome(OP, outcome);

		result.map_err(Error::from)
	}

	/// Drops the cached token so the next [`TokenCache::get`] fetches a new one.
	pub fn invalidate(&self) {
		self.current.store(None);
	}

	/// Drops the cached token only if it still is `rejected`.
	///
	/// A 401 observed on an old token must not evict a replacement another caller already
	/// installed.
	pub fn invalidate_token(&self, rejected: &Secret) -> bool {
		let previous = self.current.rcu(|current| match current {
			Some(cached) if cached.token == *rejected => None,
			other => other.clone(),
		});

		previous.is_some_and(|cached| cached.token == *rejected)
	}

	fn fresh(&self, now: OffsetDateTime) -> Option<Secret> {
		let current = self.current.load();

		Option::as_ref(&current)
			.filter(|cached| cached.is_fresh_at(now))
			.map(|cached| cached.token.clone())
	}

	async fn refresh_locked(&self) -> Result<Secret, AuthError> {
		let issued = self.source.fetch().await?;

		self.fetches.fetch_add(1, Ordering::AcqRel);

		if !issued.lifetime.is_positive() {
			return Err(AuthError::NonPositiveExpiresIn);
		}

		let cached = CachedToken::from_issued(issued);
		let token = cached.token.clone();

		self.current.store(Some(Arc::new(cached)));

		Ok(token)
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("current", &self.current.load_full())
			.field("fetches", &self.fetch_count())
			.finish_non_exhaustive()
	}
}
