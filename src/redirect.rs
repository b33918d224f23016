use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;

use nix::fcntl::{self, FcntlArg, OFlag};
use nix::sys::stat::Mode;
use nix::unistd;
use tracing::warn;

use crate::error::ExecError;
use crate::types::Command;

// keep saved copies clear of the descriptors children care about
const SAVE_FD_MIN: RawFd = 10;

fn remap(path: &Path, flags: OFlag, mode: Mode, target: RawFd) -> Result<(), ExecError> {
	let fd = fcntl::open(path, flags, mode)
		.map_err(|source| ExecError::Redirect { path: path.to_owned(), source })?;
	if fd != target {
		let r = unistd::dup2(fd, target);
		unistd::close(fd)?;
		r?;
	}
	Ok(())
}

/// Points stdin/stdout of the current process at the command's redirect
/// targets. Output files are created or truncated with mode 0644.
pub fn apply(command: &Command) -> Result<(), ExecError> {
	if let Some(ref path) = command.input_redirect {
		remap(path, OFlag::O_RDONLY, Mode::empty(), libc::STDIN_FILENO)?;
	}
	if let Some(ref path) = command.output_redirect {
		let mode = Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IROTH;
		remap(path, OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC, mode, libc::STDOUT_FILENO)?;
	}
	Ok(())
}

fn save_fd(fd: RawFd) -> nix::Result<OwnedFd> {
	let copy = fcntl::fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(SAVE_FD_MIN))?;
	// fcntl just handed us this descriptor and nothing else refers to it
	Ok(unsafe { OwnedFd::from_raw_fd(copy) })
}

/// Copies of the shell's own stdin/stdout, put back when dropped.
#[derive(Debug)]
pub struct SavedStdio {
	stdin: OwnedFd,
	stdout: OwnedFd,
}

impl SavedStdio {
	pub fn save() -> nix::Result<SavedStdio> {
		let _ = io::stdout().flush();
		let stdin = save_fd(libc::STDIN_FILENO)?;
		let stdout = save_fd(libc::STDOUT_FILENO)?;
		Ok(SavedStdio { stdin, stdout })
	}
}

impl Drop for SavedStdio {
	fn drop(&mut self) {
		let _ = io::stdout().flush();
		if let Err(e) = unistd::dup2(self.stdin.as_raw_fd(), libc::STDIN_FILENO) {
			warn!("restoring stdin failed: {}", e);
		}
		if let Err(e) = unistd::dup2(self.stdout.as_raw_fd(), libc::STDOUT_FILENO) {
			warn!("restoring stdout failed: {}", e);
		}
	}
}
