use std::collections::{TryReserveError, VecDeque};

use tracing::error;

use crate::history;
use crate::job;

/// Everything the shell remembers between lines. Owned by the top-level loop.
#[derive(Debug, Default)]
pub struct State {
	pub history: history::HistoryBuffer,
	pub jobs: job::ProcessTable,
}

impl State {
	pub fn new() -> State {
		State::default()
	}
}

pub trait Reserve {
	fn try_reserve_slots(&mut self, additional: usize) -> Result<(), TryReserveError>;
}

impl<T> Reserve for Vec<T> {
	fn try_reserve_slots(&mut self, additional: usize) -> Result<(), TryReserveError> {
		self.try_reserve(additional)
	}
}

impl<T> Reserve for VecDeque<T> {
	fn try_reserve_slots(&mut self, additional: usize) -> Result<(), TryReserveError> {
		self.try_reserve(additional)
	}
}

pub fn reserve_slot<R: Reserve + ?Sized>(slots: &mut R) -> Result<(), TryReserveError> {
	slots.try_reserve_slots(1)
}

/// Bookkeeping allocations go through here. The shell cannot keep its
/// table and history consistent without them, so failure aborts.
pub fn acquire<F>(what: &str, attempt: F) where F: FnOnce() -> Result<(), TryReserveError> {
	if let Err(e) = attempt() {
		error!(what, "allocation failed: {}", e);
		eprintln!("jsh: {} allocation failed: {}", what, e);
		std::process::abort();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reserve_slot_grows_by_one() {
		let mut v: Vec<u32> = Vec::new();
		reserve_slot(&mut v).unwrap();
		assert!(v.capacity() >= 1);
	}

	#[test]
	fn exhaustion_is_reported_not_panicked() {
		let mut v: Vec<u64> = vec![1];
		assert!(v.try_reserve_slots(usize::MAX).is_err());
		let mut d: VecDeque<u64> = VecDeque::new();
		assert!(d.try_reserve_slots(usize::MAX).is_err());
	}

	#[test]
	fn acquire_passes_through_success() {
		let mut v: Vec<u8> = Vec::new();
		acquire("test slot", || reserve_slot(&mut v));
		assert!(v.capacity() >= 1);
	}

	#[test]
	fn state_starts_empty() {
		let s = State::new();
		assert!(s.history.is_empty());
		assert!(s.jobs.is_empty());
	}
}
