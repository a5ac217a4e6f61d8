//! Per-decode scratch state and the pool it is drawn from.

// std
use std::{
	mem,
	ops::{Deref, DerefMut},
};
// self
use crate::{
	_prelude::*,
	decode::DEFAULT_MAX_DEPTH,
	error::DecodeError,
	model::Base36Id,
};

const POOL_CAPACITY: usize = 64;

/// Depth counter and visited-id set threaded through one top-level decode.
#[derive(Debug)]
pub struct ParseContext {
	depth: usize,
	max_depth: usize,
	seen: HashSet<Base36Id>,
	horizon: OffsetDateTime,
}
impl ParseContext {
	/// Creates a context bounded by `max_depth` that rejects creation instants after `horizon`.
	pub fn new(max_depth: usize, horizon: OffsetDateTime) -> Self {
		Self { depth: 0, max_depth, seen: HashSet::new(), horizon }
	}

	/// Current nesting level.
	pub fn depth(&self) -> usize {
		self.depth
	}

	/// Nesting bound.
	pub fn max_depth(&self) -> usize {
		self.max_depth
	}

	/// Latest creation instant accepted.
	pub fn horizon(&self) -> OffsetDateTime {
		self.horizon
	}

	/// Descends one level, failing once the bound would be exceeded.
	pub fn enter(&mut self) -> Result<(), DecodeError> {
		if self.depth >= self.max_depth {
			return Err(DecodeError::DepthExceeded { max: self.max_depth });
		}

		self.depth += 1;

		Ok(())
	}

	/// Ascends one level.
	pub fn exit(&mut self) {
		self.depth = self.depth.saturating_sub(1);
	}

	/// Records `id` as visited; returns `false` when it was already seen.
	pub fn mark_seen(&mut self, id: &Base36Id) -> bool {
		self.seen.insert(id.clone())
	}

	/// Forgets depth and visited ids while keeping the bounds.
	pub fn clear(&mut self) {
		self.depth = 0;
		self.seen.clear();
	}

	/// Clears the context and installs new bounds.
	pub fn reset(&mut self, max_depth: usize, horizon: OffsetDateTime) {
		self.clear();
		self.max_depth = max_depth;
		self.horizon = horizon;
	}
}
impl Default for ParseContext {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_DEPTH, OffsetDateTime::now_utc())
	}
}

/// Free list of contexts so hot decode paths reuse their visited-id allocations.
#[derive(Debug, Default)]
pub struct ContextPool {
	idle: Mutex<Vec<ParseContext>>,
}
impl ContextPool {
	/// Hands out an exclusive, reset context.
	pub fn checkout(&self, max_depth: usize, horizon: OffsetDateTime) -> PooledContext<'_> {
		let mut ctx = self.idle.lock().pop().unwrap_or_default();

		ctx.reset(max_depth, horizon);

		PooledContext { pool: self, ctx }
	}

	/// Number of contexts waiting for reuse.
	pub fn idle(&self) -> usize {
		self.idle.lock().len()
	}

	fn release(&self, mut ctx: ParseContext) {
		ctx.clear();

		let mut idle = self.idle.lock();

		if idle.len() < POOL_CAPACITY {
			idle.push(ctx);
		}
	}
}

/// Context checked out of a [`ContextPool`]; returned on drop.
#[derive(Debug)]
pub struct PooledContext<'a> {
	pool: &'a ContextPool,
	ctx: ParseContext,
}
impl Deref for PooledContext<'_> {
	type Target = ParseContext;

	fn deref(&self) -> &Self::Target {
		&self.ctx
	}
}
impl DerefMut for PooledContext<'_> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.ctx
	}
}
impl Drop for PooledContext<'_> {
	fn drop(&mut self) {
		self.pool.release(mem::take(&mut self.ctx));
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn enter_stops_at_the_bound() {
		let mut ctx = ParseContext::new(2, OffsetDateTime::now_utc());

		ctx.enter().expect("Level 1 should fit.");
		ctx.enter().expect("Level 2 should fit.");

		assert!(matches!(ctx.enter(), Err(DecodeError::DepthExceeded { max: 2 })));

		ctx.exit();

		assert_eq!(ctx.depth(), 1);
		assert!(ctx.enter().is_ok());
	}

	#[test]
	fn seen_ids_detect_repeats() {
		let mut ctx = ParseContext::default();
		let id = Base36Id::new("a1").expect("Fixture id should be valid.");

		assert!(ctx.mark_seen(&id));
		assert!(!ctx.mark_seen(&id));

		ctx.clear();

		assert!(ctx.mark_seen(&id));
	}

	#[test]
	fn pooled_contexts_return_reset() {
		let pool = ContextPool::default();
		let id = Base36Id::new("a1").expect("Fixture id should be valid.");

		{
			let mut first = pool.checkout(5, OffsetDateTime::now_utc());
			let mut second = pool.checkout(5, OffsetDateTime::now_utc());

			first.enter().expect("Level 1 should fit.");
			first.mark_seen(&id);

			assert_eq!(second.depth(), 0, "Concurrent checkouts must not share state.");
			assert!(second.mark_seen(&id));
		}

		assert_eq!(pool.idle(), 2);

		let mut reused = pool.checkout(7, OffsetDateTime::now_utc());

		assert_eq!(reused.depth(), 0);
		assert_eq!(reused.max_depth(), 7);
		assert!(reused.mark_seen(&id), "Visited ids must not leak across checkouts.");
		assert_eq!(pool.idle(), 1);
	}
}
