use std::{ffi, io};
use std::path::PathBuf;

use nix::unistd::Pid;
use thiserror::Error;

use crate::parser::ParseError;

/// Failures inside a freshly forked child. The child reports them and exits.
#[derive(Debug, Error)]
pub enum ExecError {
	#[error("Nix error: {0}")]
	Nix(#[from] nix::Error),
	#[error("Nul char error: {0}")]
	Nul(#[from] ffi::NulError),
	#[error("command not found: {0}")]
	NotFound(String),
	#[error("{}: {source}", .path.display())]
	Redirect { path: PathBuf, source: nix::Error },
}

impl ExecError {
	pub fn exit_code(&self) -> i32 {
		match *self {
			ExecError::NotFound(..) => 127,
			ExecError::Redirect { .. } => 1,
			_ => 126,
		}
	}
}

/// Errors reported to the user; the shell keeps running.
#[derive(Debug, Error)]
pub enum ShellError {
	#[error("{0}: missing argument")]
	MissingArgument(String),
	#[error("invalid pid: {0}")]
	InvalidPid(String),
	#[error("No history commands at the moment")]
	HistoryEmpty,
	#[error("History index is out of range")]
	HistoryOutOfRange,
	#[error("Invalid history command: {0}")]
	InvalidRecall(String),
	#[error("kill {pid} failed: {source}")]
	Signal { pid: Pid, source: nix::Error },
	#[error("cd failed: {}: {source}", .path.display())]
	Cd { path: PathBuf, source: nix::Error },
	#[error("Output redirect on pipe input is not allowed")]
	PipeOutputRedirect,
	#[error(transparent)]
	Redirect(ExecError),
	#[error("{what} failed: {source}")]
	Spawn { what: &'static str, source: nix::Error },
	#[error(transparent)]
	Parse(#[from] ParseError),
	#[error("IO error: {0}")]
	Io(#[from] io::Error),
}

impl ShellError {
	pub fn spawn(what: &'static str) -> impl FnOnce(nix::Error) -> ShellError {
		move |source| ShellError::Spawn { what, source }
	}
}
