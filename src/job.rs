use std::fmt;
use std::io::{self, Write};

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::{self, Pid};
use tracing::{debug, warn};

use crate::global;
use crate::types::Command;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Status { Running, Suspended, Terminated }

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match *self {
			Status::Running => "Running",
			Status::Suspended => "Suspended",
			Status::Terminated => "Terminated",
		})
	}
}

pub trait WaitStatusExt {
	/// `None` when the poll carried no news for this process.
	fn status(self) -> Option<Status>;
}

impl WaitStatusExt for WaitStatus {
	fn status(self) -> Option<Status> {
		match self {
			WaitStatus::Exited(..) => Some(Status::Terminated),
			WaitStatus::Signaled(..) => Some(Status::Terminated),
			WaitStatus::Stopped(..) => Some(Status::Suspended),
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceEvent(..) => Some(Status::Suspended),
			#[cfg(any(target_os = "linux", target_os = "android"))]
			WaitStatus::PtraceSyscall(..) => Some(Status::Suspended),
			WaitStatus::Continued(..) => Some(Status::Running),
			WaitStatus::StillAlive => None,
		}
	}
}

/// What `stop`, `wake` and `term` do: the signal sent and the status recorded.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SignalAction { Suspend, Resume, Terminate }

impl SignalAction {
	pub fn from_name(name: &str) -> Option<SignalAction> {
		match name {
			"stop" => Some(SignalAction::Suspend),
			"wake" => Some(SignalAction::Resume),
			"term" => Some(SignalAction::Terminate),
			_ => None,
		}
	}

	pub fn signal(self) -> Signal {
		match self {
			SignalAction::Suspend => Signal::SIGTSTP,
			SignalAction::Resume => Signal::SIGCONT,
			SignalAction::Terminate => Signal::SIGINT,
		}
	}

	pub fn status(self) -> Status {
		match self {
			SignalAction::Suspend => Status::Suspended,
			SignalAction::Resume => Status::Running,
			SignalAction::Terminate => Status::Terminated,
		}
	}
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct EntryHandle(u64);

#[derive(Debug)]
pub struct ProcessEntry {
	handle: EntryHandle,
	/// The process that forked `pid`; only it can wait on the entry.
	parent: Pid,
	/// The OS has handed over the exit status, so nothing is left to reap.
	reaped: bool,
	pub pid: Pid,
	pub command: Command,
	pub status: Status,
}

/// Every process the shell has spawned and not yet seen terminate.
///
/// Stored oldest first; listed newest first.
#[derive(Debug, Default)]
pub struct ProcessTable {
	entries: Vec<ProcessEntry>,
	/// Pruned before their exit was collected; polled until it is.
	unreaped: Vec<Pid>,
	next_handle: u64,
}

impl ProcessTable {
	pub fn new() -> ProcessTable {
		ProcessTable::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Entries in list order, most recently registered first.
	pub fn iter(&self) -> impl Iterator<Item = &ProcessEntry> {
		self.entries.iter().rev()
	}

	pub fn get(&self, handle: EntryHandle) -> Option<&ProcessEntry> {
		self.entries.iter().find(|e| e.handle == handle)
	}

	pub fn find(&self, pid: Pid) -> Option<&ProcessEntry> {
		self.entries.iter().find(|e| e.pid == pid)
	}

	pub fn register(&mut self, mut command: Command, pid: Pid) -> EntryHandle {
		// a pid already in the table belongs to a reaped process the OS has reused
		self.entries.retain(|e| e.pid != pid);
		self.unreaped.retain(|&p| p != pid);
		if command.next.take().is_some() {
			debug!(%pid, "detached pipeline continuation from registered command");
		}
		global::acquire("process table entry", || global::reserve_slot(&mut self.entries));
		let handle = EntryHandle(self.next_handle);
		self.next_handle += 1;
		self.entries.push(ProcessEntry {
			handle,
			parent: unistd::getpid(),
			reaped: false,
			pid,
			command,
			status: Status::Running,
		});
		handle
	}

	pub fn set_status(&mut self, pid: Pid, status: Status) {
		if let Some(entry) = self.entries.iter_mut().rev().find(|e| e.pid == pid) {
			entry.status = status;
		}
	}

	/// Records the result of a wait that already collected `pid`.
	pub fn record(&mut self, pid: Pid, ws: WaitStatus) {
		if let Some(entry) = self.entries.iter_mut().rev().find(|e| e.pid == pid) {
			entry.observe(ws);
		}
	}

	/// Polls every entry without blocking and records what the OS reports.
	///
	/// Entries forked by another process (a copy of the table inside a
	/// pipeline stage) are left as recorded.
	pub fn reconcile(&mut self) {
		self.collect_unreaped();
		let me = unistd::getpid();
		for entry in self.entries.iter_mut().filter(|e| e.parent == me && !e.reaped) {
			match wait::waitpid(entry.pid, Some(poll_flags())) {
				Ok(ws) => entry.observe(ws),
				Err(Errno::ECHILD) => {
					entry.status = Status::Terminated;
					entry.reaped = true;
				},
				Err(e) => warn!(pid = %entry.pid, "waitpid failed: {}", e),
			}
		}
	}

	/// Reaps pruned processes that have exited since.
	pub fn collect_unreaped(&mut self) {
		self.unreaped.retain(|&pid| {
			match wait::waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
				Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => {
					debug!(%pid, "reaped pruned process");
					false
				},
				Ok(_) => true,
				Err(Errno::ECHILD) => false,
				Err(e) => {
					warn!(%pid, "waitpid failed: {}", e);
					true
				},
			}
		});
	}

	/// Reconciles, writes the listing, then drops every terminated entry.
	pub fn list_and_prune(&mut self, out: &mut dyn Write) -> io::Result<()> {
		self.reconcile();
		writeln!(out, "Index\tPID\tCommand\tSTATUS")?;
		for (index, entry) in self.iter().enumerate() {
			writeln!(out, "{}\t{}\t{}\t{}", index, entry.pid, entry.command.text(), entry.status)?;
		}
		let me = unistd::getpid();
		let unreaped = &mut self.unreaped;
		self.entries.retain(|e| {
			if e.status != Status::Terminated {
				return true;
			}
			// terminated by `term` but not yet exited
			if !e.reaped && e.parent == me {
				global::acquire("unreaped pid", || global::reserve_slot(&mut *unreaped));
				unreaped.push(e.pid);
			}
			false
		});
		Ok(())
	}
}

impl ProcessEntry {
	fn observe(&mut self, ws: WaitStatus) {
		if let Some(status) = ws.status() {
			self.status = status;
		}
		if let WaitStatus::Exited(..) | WaitStatus::Signaled(..) = ws {
			self.reaped = true;
		}
	}
}

fn poll_flags() -> WaitPidFlag {
	WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED
}
