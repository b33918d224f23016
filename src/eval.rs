use std::ffi::CString;
use std::io::{self, Write};

use nix::errno::Errno;
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, warn};

use crate::builtin;
use crate::error::{ExecError, ShellError};
use crate::global;
use crate::parser;
use crate::pipeline;
use crate::redirect;
use crate::search;
use crate::types::Command;

/// A resolved program, prepared before forking so the child only has to exec.
#[derive(Debug)]
pub struct Program {
	path: CString,
	argv: Vec<CString>,
}

impl Program {
	pub fn prepare(command: &Command) -> Result<Program, ExecError> {
		let argv = command.arguments.iter()
			.map(|a| CString::new(a.as_str()))
			.collect::<Result<Vec<CString>, _>>()?;
		let path = search::lookup(command.name())
			.ok_or_else(|| ExecError::NotFound(command.name().to_owned()))?;
		Ok(Program { path, argv })
	}

	fn exec(&self) -> ExecError {
		match unistd::execv(&self.path, &self.argv) {
			Ok(never) => match never {},
			Err(e) => ExecError::from(e),
		}
	}
}

pub(crate) fn exit_child(code: i32) -> ! {
	let _ = io::stdout().flush();
	unsafe { libc::_exit(code) }
}

pub(crate) fn fail_child(e: ExecError) -> ! {
	let _ = writeln!(io::stderr(), "jsh: {}", e);
	exit_child(e.exit_code())
}

/// Body of a freshly forked child: redirect, then replace the image.
pub(crate) fn exec_command(command: &Command, program: Result<Program, ExecError>) -> ! {
	if let Err(e) = redirect::apply(command) {
		fail_child(e);
	}
	let e = match program {
		Ok(p) => p.exec(),
		Err(e) => e,
	};
	fail_child(e)
}

pub(crate) fn fork() -> nix::Result<ForkResult> {
	// buffered output would otherwise be written twice
	let _ = io::stdout().flush();
	// the shell is single-threaded, so the child may run arbitrary code
	unsafe { unistd::fork() }
}

fn wait_for(pid: Pid) -> nix::Result<WaitStatus> {
	loop {
		match wait::waitpid(pid, None) {
			Err(Errno::EINTR) => continue,
			r => return r,
		}
	}
}

fn exit_code(ws: WaitStatus) -> u8 {
	match ws {
		WaitStatus::Exited(_, code) => code as u8,
		WaitStatus::Signaled(_, sig, _) => 128u8.wrapping_add(sig as i32 as u8),
		_ => 0,
	}
}

/// Blocks until `pid` terminates and records the outcome in the table.
pub(crate) fn wait_and_record(state: &mut global::State, pid: Pid) -> u8 {
	match wait_for(pid) {
		Ok(ws) => {
			state.jobs.record(pid, ws);
			exit_code(ws)
		},
		Err(e) => {
			warn!(%pid, "waitpid failed: {}", e);
			1
		},
	}
}

fn spawn_command(state: &mut global::State, command: Command) -> Result<u8, ShellError> {
	let program = Program::prepare(&command);
	match fork().map_err(ShellError::spawn("fork"))? {
		ForkResult::Child => exec_command(&command, program),
		ForkResult::Parent { child } => {
			debug!(pid = %child, command = command.name(), "executing command");
			let blocking = command.blocking;
			state.jobs.register(command, child);
			if blocking {
				Ok(wait_and_record(state, child))
			} else {
				Ok(0)
			}
		},
	}
}

fn run_builtin(state: &mut global::State, command: &Command, builtin: builtin::Builtin) -> Result<u8, ShellError> {
	if !builtin.writes_stdout || !command.has_redirects() {
		return (builtin.run)(state, command);
	}
	let _saved = redirect::SavedStdio::save().map_err(ShellError::spawn("dup"))?;
	redirect::apply(command).map_err(ShellError::Redirect)?;
	(builtin.run)(state, command)
}

pub fn report(e: &ShellError) {
	let _ = writeln!(io::stderr(), "jsh: {}", e);
}

/// Runs one parsed command chain and returns its exit status.
pub fn dispatch(state: &mut global::State, command: Command) -> u8 {
	let r = if command.next.is_some() {
		pipeline::run(state, command)
	} else if let Some(builtin) = builtin::match_builtin(command.name()) {
		run_builtin(state, &command, builtin)
	} else {
		spawn_command(state, command)
	};
	r.unwrap_or_else(|e| {
		report(&e);
		1
	})
}

/// Parses and runs one input line, then records it in the history.
/// Recall lines are not recorded; the recall records what it resolved to.
pub fn eval_line(state: &mut global::State, line: &str) -> u8 {
	let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
	let command = match parser::parse(line) {
		Ok(Some(command)) => command,
		Ok(None) => return 0,
		Err(e) => {
			report(&ShellError::from(e));
			return 2;
		},
	};
	state.jobs.collect_unreaped();
	let s = dispatch(state, command);
	if !line.trim_start().starts_with('!') {
		state.history.push(line);
	}
	s
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::Status;

	#[test]
	fn prepare_resolves_path_and_argv() {
		let p = Program::prepare(&Command::new(["sh", "-c", "exit 3"])).unwrap();
		assert!(p.path.to_bytes().ends_with(b"/sh"));
		assert_eq!(p.argv.len(), 3);
		let e = Program::prepare(&Command::new(["no-such-program-jsh"])).unwrap_err();
		assert_eq!(e.exit_code(), 127);
	}

	#[test]
	fn foreground_command_is_listed_once_then_pruned() {
		let mut state = global::State::new();
		assert_eq!(eval_line(&mut state, "true\n"), 0);
		assert_eq!(state.jobs.len(), 1);
		let entry = state.jobs.iter().next().unwrap();
		assert_ne!(entry.status, Status::Suspended);

		let mut out = Vec::new();
		state.jobs.list_and_prune(&mut out).unwrap();
		let listing = String::from_utf8(out).unwrap();
		assert_eq!(listing.lines().count(), 2);
		assert!(listing.ends_with("\ttrue\tTerminated\n"));

		let mut out = Vec::new();
		state.jobs.list_and_prune(&mut out).unwrap();
		assert_eq!(out, b"Index\tPID\tCommand\tSTATUS\n");
	}

	#[test]
	fn exit_status_of_foreground_command() {
		let mut state = global::State::new();
		assert_eq!(eval_line(&mut state, "sh -c exit"), 0);
		assert_eq!(eval_line(&mut state, "false"), 1);
		assert_eq!(eval_line(&mut state, "no-such-program-jsh"), 127);
	}

	#[test]
	fn background_command_returns_immediately() {
		let mut state = global::State::new();
		let start = std::time::Instant::now();
		assert_eq!(eval_line(&mut state, "sleep 5 &"), 0);
		assert!(start.elapsed() < std::time::Duration::from_secs(2));
		let pid = state.jobs.iter().next().unwrap().pid;
		state.jobs.reconcile();
		assert_eq!(state.jobs.find(pid).unwrap().status, Status::Running);
		nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL).unwrap();
		wait_for(pid).unwrap();
	}

	#[test]
	fn history_records_lines_but_not_recalls() {
		let mut state = global::State::new();
		eval_line(&mut state, "true\n");
		eval_line(&mut state, "!1\n");
		eval_line(&mut state, "!9\n");
		assert_eq!(state.history.iter().collect::<Vec<_>>(), vec!["true", "true"]);
	}

	#[test]
	fn parse_errors_are_not_recorded() {
		let mut state = global::State::new();
		assert_eq!(eval_line(&mut state, "| cat"), 2);
		assert!(state.history.is_empty());
		assert_eq!(eval_line(&mut state, "   "), 0);
		assert!(state.history.is_empty());
	}

	#[test]
	fn pipeline_with_output_redirect_spawns_nothing() {
		let dir = std::env::temp_dir().join(format!("jsh-eval-{}", std::process::id()));
		let target = dir.join("never");
		let line = format!("echo hi > {} | cat", target.display());
		let mut state = global::State::new();
		assert_eq!(eval_line(&mut state, &line), 1);
		assert!(state.jobs.is_empty());
		assert!(!target.exists());
	}
}
