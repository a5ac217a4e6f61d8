//! Adaptive request gate: a GCRA token bucket behind a server-fed forced-delay deadline.
//!
//! Both pieces of shared state are single `AtomicU64`s holding nanoseconds since the gate's
//! origin, updated with compare-and-swap loops. No lock is taken on the request path.

mod headers;

pub use headers::*;

// std
use std::{
	sync::atomic::{AtomicU64, Ordering},
	time::Duration as StdDuration,
};
// crates.io
use tokio::time::{self as tokio_time, Instant};
use tokio_util::sync::CancellationToken;
// self
use crate::{_prelude::*, config::RateConfig, obs};

/// Upper bound applied to any single forced delay.
pub const MAX_FORCED_DELAY: StdDuration = StdDuration::from_secs(60 * 60);

/// Slot handed out by the bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Reservation {
	/// Theoretical arrival time written by this reservation.
	tat: u64,
	/// Earliest offset at which the request may go out.
	ready_at: u64,
}

/// Limiter every outbound request passes through.
#[derive(Debug)]
pub struct RateGate {
	origin: Instant,
	interval: u64,
	/// How far the theoretical arrival time may run ahead of now, `interval * burst`.
	tolerance: u64,
	threshold: f64,
	tat: AtomicU64,
	forced_until: AtomicU64,
}
impl RateGate {
	/// Creates a gate allowing `requests_per_minute` with `burst` back-to-back requests.
	pub fn new(config: RateConfig) -> Self {
		let per_minute = u64::from(config.requests_per_minute.max(1));
		let interval = (60_000_000_000 / per_minute).max(1);

		Self {
			origin: Instant::now(),
			interval,
			tolerance: interval.saturating_mul(u64::from(config.burst.max(1))),
			threshold: config.throttle_threshold,
			tat: AtomicU64::new(0),
			forced_until: AtomicU64::new(0),
		}
	}

	/// Spacing between requests once the burst is spent.
	pub fn emission_interval(&self) -> StdDuration {
		StdDuration::from_nanos(self.interval)
	}

	/// Current forced deadline, if one was ever set.
	pub fn forced_until(&self) -> Option<Instant> {
		match self.forced_until.load(Ordering::Acquire) {
			0 => None,
			offset => Some(self.instant(offset)),
		}
	}

	/// Time left until the forced deadline passes.
	pub fn forced_delay_remaining(&self) -> StdDuration {
		self.forced_until()
			.map(|deadline| deadline.saturating_duration_since(Instant::now()))
			.unwrap_or_default()
	}

	/// Waits for the forced deadline and then for a bucket slot.
	///
	/// Cancellation at any point yields [`Error::RateLimitCancelled`]; a bucket slot reserved by a
	/// cancelled call is handed back when nobody queued behind it.
	pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
		if cancel.is_cancelled() {
			return Err(Error::RateLimitCancelled);
		}

		// The deadline may move while we sleep, so re-read it after every wake-up.
		while let Some(deadline) = self.forced_until().filter(|deadline| *deadline > Instant::now()) {
			sleep_until(deadline, cancel).await?;
		}

		let now = Instant::now();
		let reservation = self.reserve(now);
		let ready_at = self.instant(reservation.ready_at);

		if ready_at <= now {
			return Ok(());
		}

		sleep_until(ready_at, cancel).await.inspect_err(|_| self.refund(reservation))
	}

	/// Folds response hints into the forced deadline.
	pub fn observe(&self, headers: &RateLimitHeaders) -> Option<StdDuration> {
		self.observe_at(headers, Instant::now())
	}

	/// Folds response hints into the forced deadline as if the response arrived at `now`.
	///
	/// Returns the delay the hints asked for, clamped to [`MAX_FORCED_DELAY`].
	pub fn observe_at(&self, headers: &RateLimitHeaders, now: Instant) -> Option<StdDuration> {
		let delay = headers.forced_delay(self.threshold)?.min(MAX_FORCED_DELAY);

		if self.extend_forced_until(now + delay) {
			obs::forced_delay(delay);
		}

		Some(delay)
	}

	/// Moves the forced deadline to `deadline` if that is later; returns whether it moved.
	pub fn extend_forced_until(&self, deadline: Instant) -> bool {
		let target = self.offset(deadline);
		let mut current = self.forced_until.load(Ordering::Acquire);

		while target > current {
			match self.forced_until.compare_exchange_weak(
				current,
				target,
				Ordering::AcqRel,
				Ordering::Acquire,
			) {
				Ok(_) => return true,
				Err(actual) => current = actual,
			}
		}

		false
	}

	fn reserve(&self, now: Instant) -> Reservation {
		let now = self.offset(now);
		let mut current = self.tat.load(Ordering::Acquire);

		loop {
			let next = current.max(now).saturating_add(self.interval);

			match self.tat.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
				Ok(_) =>
					return Reservation {
						tat: next,
						ready_at: next.saturating_sub(self.tolerance),
					},
				Err(actual) => current = actual,
			}
		}
	}

	fn refund(&self, reservation: Reservation) {
		let _ = self.tat.compare_exchange(
			reservation.tat,
			reservation.tat - self.interval,
			Ordering::AcqRel,
			Ordering::Relaxed,
		);
	}

	fn offset(&self, at: Instant) -> u64 {
		u64::try_from(at.saturating_duration_since(self.origin).as_nanos()).unwrap_or(u64::MAX)
	}

	fn instant(&self, offset: u64) -> Instant {
		self.origin + StdDuration::from_nanos(offset)
	}
}
impl Default for RateGate {
	fn default() -> Self {
		Self::new(RateConfig::default())
	}
}

async fn sleep_until(deadline: Instant, cancel: &CancellationToken) -> Result<()> {
	tokio::select! {
		biased;
		_ = cancel.cancelled() => Err(Error::RateLimitCancelled),
		_ = tokio_time::sleep_until(deadline) => Ok(()),
	}
}
