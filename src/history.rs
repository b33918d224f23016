//! Bounded history of raw command lines.

use std::collections::VecDeque;
use std::io::{self, Write};

use crate::error::ShellError;
use crate::global;

pub const HISTLEN: usize = 10;

#[derive(Debug)]
pub struct HistoryBuffer {
	lines: VecDeque<String>,
	capacity: usize,
}

impl Default for HistoryBuffer {
	fn default() -> HistoryBuffer {
		HistoryBuffer::with_capacity(HISTLEN)
	}
}

impl HistoryBuffer {
	pub fn new() -> HistoryBuffer {
		HistoryBuffer::default()
	}

	pub fn with_capacity(capacity: usize) -> HistoryBuffer {
		assert!(capacity > 0);
		HistoryBuffer { lines: VecDeque::with_capacity(capacity), capacity }
	}

	pub fn len(&self) -> usize {
		self.lines.len()
	}

	pub fn is_empty(&self) -> bool {
		self.lines.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Appends a copy of `line`, evicting the oldest entry when full.
	pub fn push(&mut self, line: &str) {
		if self.lines.len() == self.capacity {
			self.lines.pop_front();
		}
		global::acquire("history entry", || global::reserve_slot(&mut self.lines));
		self.lines.push_back(line.to_owned());
	}

	/// 1-based, oldest retained entry first.
	pub fn get(&self, index: usize) -> Option<&str> {
		index.checked_sub(1).and_then(|i| self.lines.get(i)).map(|s| s.as_str())
	}

	pub fn last(&self) -> Option<&str> {
		self.lines.back().map(|s| s.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.lines.iter().map(|s| s.as_str())
	}

	/// Resolves a recall token (`!!` or `!N`) to the recorded line.
	pub fn resolve(&self, token: &str) -> Result<&str, ShellError> {
		if self.is_empty() {
			return Err(ShellError::HistoryEmpty);
		}
		if token == "!!" {
			return self.last().ok_or(ShellError::HistoryEmpty);
		}
		// leading digits only, so `!5abc` recalls entry 5
		let digits = token.strip_prefix('!')
			.map(|rest| &rest[.. rest.bytes().take_while(|b| b.is_ascii_digit()).count()])
			.filter(|d| !d.is_empty())
			.ok_or_else(|| ShellError::InvalidRecall(token.to_owned()))?;
		// too many digits to fit a usize is out of range as well
		let index = digits.parse::<usize>().map_err(|_| ShellError::HistoryOutOfRange)?;
		self.get(index).ok_or(ShellError::HistoryOutOfRange)
	}

	pub fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		if self.is_empty() {
			return writeln!(out, "{}", ShellError::HistoryEmpty);
		}
		for (i, line) in self.iter().enumerate() {
			writeln!(out, "{}: {}", i + 1, line)?;
		}
		Ok(())
	}
}

pub fn is_recall(name: &str) -> bool {
	name == "!!" || name.strip_prefix('!').map_or(false, |d| d.bytes().next().map_or(false, |b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn filled(n: usize) -> HistoryBuffer {
		let mut h = HistoryBuffer::new();
		for i in 1 ..= n {
			h.push(&format!("echo {}", i));
		}
		h
	}

	#[test]
	fn never_exceeds_capacity() {
		let h = filled(13);
		assert_eq!(h.capacity(), HISTLEN);
		assert_eq!(h.len(), h.capacity());
		let kept: Vec<&str> = h.iter().collect();
		let expected: Vec<String> = (4 ..= 13).map(|i| format!("echo {}", i)).collect();
		assert_eq!(kept, expected);
	}

	#[test]
	fn indices_are_one_based_over_window() {
		let h = filled(12);
		assert_eq!(h.get(1), Some("echo 3"));
		assert_eq!(h.get(10), Some("echo 12"));
		assert_eq!(h.get(0), None);
		assert_eq!(h.get(11), None);
	}

	#[test]
	fn bang_bang_is_most_recent() {
		let mut h = filled(3);
		assert_eq!(h.resolve("!!").unwrap(), "echo 3");
		let resolved = h.resolve("!1").unwrap().to_owned();
		h.push(&resolved);
		assert_eq!(h.resolve("!!").unwrap(), "echo 1");
	}

	#[test]
	fn out_of_range_changes_nothing() {
		let h = filled(2);
		assert!(matches!(h.resolve("!3"), Err(ShellError::HistoryOutOfRange)));
		assert!(matches!(h.resolve("!0"), Err(ShellError::HistoryOutOfRange)));
		assert!(matches!(h.resolve("!99999999999999999999999"), Err(ShellError::HistoryOutOfRange)));
		assert!(matches!(h.resolve("!x"), Err(ShellError::InvalidRecall(_))));
		assert!(matches!(h.resolve("!3abc"), Err(ShellError::HistoryOutOfRange)));
		assert_eq!(h.len(), 2);
	}

	#[test]
	fn trailing_garbage_after_index_is_ignored() {
		let h = filled(3);
		assert!(is_recall("!2abc"));
		assert_eq!(h.resolve("!2abc").unwrap(), "echo 2");
	}

	#[test]
	fn empty_history() {
		let h = HistoryBuffer::new();
		assert!(matches!(h.resolve("!!"), Err(ShellError::HistoryEmpty)));
		let mut out = Vec::new();
		h.render(&mut out).unwrap();
		assert_eq!(out, b"No history commands at the moment\n");
	}

	#[test]
	fn render_lists_with_index() {
		let mut h = HistoryBuffer::with_capacity(2);
		h.push("ls");
		h.push("pwd");
		h.push("procs");
		let mut out = Vec::new();
		h.render(&mut out).unwrap();
		assert_eq!(String::from_utf8(out).unwrap(), "1: pwd\n2: procs\n");
	}

	#[test]
	fn recall_names() {
		assert!(is_recall("!!"));
		assert!(is_recall("!4"));
		assert!(!is_recall("!"));
		assert!(!is_recall("!x"));
		assert!(!is_recall("history"));
	}
}
