//! Two commands joined by one pipe.
//!
//! Only two stages are wired; a third chained command is dropped. The whole
//! pipeline always runs in the foreground, whatever the trailing `&` said.

use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};

use nix::fcntl::OFlag;
use nix::unistd::{self, ForkResult, Pid};
use tracing::debug;

use crate::builtin;
use crate::error::{ExecError, ShellError};
use crate::eval::{self, Program};
use crate::global;
use crate::redirect;
use crate::types::Command;

fn attach(fd: OwnedFd, target: RawFd) {
	if let Err(e) = unistd::dup2(fd.as_raw_fd(), target) {
		eval::fail_child(ExecError::from(e));
	}
	drop(fd);
}

fn run_producer(state: &mut global::State, command: &Command, program: Result<Program, ExecError>) -> ! {
	match builtin::match_builtin(command.name()) {
		Some(b) if b.writes_stdout => {
			if let Err(e) = redirect::apply(command) {
				eval::fail_child(e);
			}
			let code = (b.run)(state, command).unwrap_or_else(|e| {
				eval::report(&e);
				1
			});
			eval::exit_child(code as i32)
		},
		_ => eval::exec_command(command, program),
	}
}

pub fn run(state: &mut global::State, mut first: Command) -> Result<u8, ShellError> {
	let mut second = match first.next.take() {
		Some(next) => *next,
		None => return Ok(eval::dispatch(state, first)),
	};
	if first.output_redirect.is_some() {
		return Err(ShellError::PipeOutputRedirect);
	}
	if let Some(extra) = second.next.take() {
		debug!(dropped = %extra.text(), "only two pipeline stages are supported");
	}

	let (read_end, write_end) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ShellError::spawn("pipe"))?;
	let _saved = redirect::SavedStdio::save().map_err(ShellError::spawn("dup"))?;

	let first_program = Program::prepare(&first);
	let producer = match eval::fork().map_err(ShellError::spawn("fork"))? {
		ForkResult::Child => {
			drop(read_end);
			attach(write_end, libc::STDOUT_FILENO);
			run_producer(state, &first, first_program)
		},
		ForkResult::Parent { child } => child,
	};

	let second_program = Program::prepare(&second);
	let consumer: Option<Pid> = match eval::fork() {
		Ok(ForkResult::Child) => {
			drop(write_end);
			attach(read_end, libc::STDIN_FILENO);
			eval::exec_command(&second, second_program)
		},
		Ok(ForkResult::Parent { child }) => Some(child),
		Err(e) => {
			eval::report(&ShellError::Spawn { what: "fork", source: e });
			None
		},
	};

	// the consumer only sees EOF once every write end is closed
	drop(read_end);
	drop(write_end);

	let producer_name = first.name().to_owned();
	let consumer_name = second.name().to_owned();
	state.jobs.register(first, producer);
	if let Some(pid) = consumer {
		state.jobs.register(second, pid);
	}

	eval::wait_and_record(state, producer);
	let code = consumer.map(|pid| eval::wait_and_record(state, pid));

	debug!(pid = %producer, command = %producer_name, "executing command");
	if let Some(pid) = consumer {
		debug!(pid = %pid, command = %consumer_name, "executing command");
	}
	Ok(code.unwrap_or(1))
}
