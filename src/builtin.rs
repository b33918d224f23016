use std::io;

use nix::sys::signal;
use nix::unistd::{self, Pid};
use tracing::debug;

use crate::error::ShellError;
use crate::eval;
use crate::global;
use crate::history;
use crate::job::SignalAction;
use crate::parser;
use crate::types::Command;

pub type BuiltinFn = fn(&mut global::State, &Command) -> Result<u8, ShellError>;

#[derive(Clone, Copy)]
pub struct Builtin {
	pub run: BuiltinFn,
	/// Output goes to stdout, so the command's redirects apply and it may
	/// feed a pipeline.
	pub writes_stdout: bool,
}

fn required_arg<'a>(command: &'a Command) -> Result<&'a str, ShellError> {
	command.arguments.get(1)
		.map(|s| s.as_str())
		.ok_or_else(|| ShellError::MissingArgument(command.name().to_owned()))
}

pub fn builtin_cd(_: &mut global::State, command: &Command) -> Result<u8, ShellError> {
	let path = required_arg(command)?;
	unistd::chdir(path).map_err(|source| ShellError::Cd { path: path.into(), source })?;
	Ok(0)
}

pub fn builtin_history(state: &mut global::State, _: &Command) -> Result<u8, ShellError> {
	state.history.render(&mut io::stdout().lock())?;
	Ok(0)
}

/// `!!` and `!N`: record the resolved line, then run it as if typed.
pub fn builtin_recall(state: &mut global::State, command: &Command) -> Result<u8, ShellError> {
	let line = state.history.resolve(command.name())?.to_owned();
	state.history.push(&line);
	match parser::parse(&line)? {
		Some(recalled) => Ok(eval::dispatch(state, recalled)),
		None => Ok(0),
	}
}

pub fn builtin_procs(state: &mut global::State, _: &Command) -> Result<u8, ShellError> {
	state.jobs.list_and_prune(&mut io::stdout().lock())?;
	Ok(0)
}

fn signal_command(state: &mut global::State, command: &Command, action: SignalAction) -> Result<u8, ShellError> {
	let arg = required_arg(command)?;
	// kill(2) treats 0 and negative pids as process groups
	let pid = match arg.parse::<i32>() {
		Ok(n) if n > 0 => Pid::from_raw(n),
		_ => return Err(ShellError::InvalidPid(arg.to_owned())),
	};
	signal::kill(pid, action.signal()).map_err(|source| ShellError::Signal { pid, source })?;
	state.jobs.set_status(pid, action.status());
	debug!(%pid, signal = ?action.signal(), "signal sent");
	Ok(0)
}

pub fn builtin_stop(state: &mut global::State, command: &Command) -> Result<u8, ShellError> {
	signal_command(state, command, SignalAction::Suspend)
}

pub fn builtin_wake(state: &mut global::State, command: &Command) -> Result<u8, ShellError> {
	signal_command(state, command, SignalAction::Resume)
}

pub fn builtin_term(state: &mut global::State, command: &Command) -> Result<u8, ShellError> {
	signal_command(state, command, SignalAction::Terminate)
}

fn builtin(run: BuiltinFn, writes_stdout: bool) -> Option<Builtin> {
	Some(Builtin { run, writes_stdout })
}

pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"cd" => builtin(builtin_cd, false),
		"history" => builtin(builtin_history, true),
		"procs" => builtin(builtin_procs, true),
		"stop" => builtin(builtin_stop, false),
		"wake" => builtin(builtin_wake, false),
		"term" => builtin(builtin_term, false),
		_ if history::is_recall(name) => builtin(builtin_recall, true),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::Status;
	use std::process;

	fn line(s: &str) -> Command {
		parser::parse(s).unwrap().unwrap()
	}

	fn run(state: &mut global::State, s: &str) -> Result<u8, ShellError> {
		let cmd = line(s);
		let builtin = match_builtin(cmd.name()).unwrap();
		(builtin.run)(state, &cmd)
	}

	#[test]
	fn names() {
		for name in &["cd", "history", "procs", "stop", "wake", "term", "!!", "!7"] {
			assert!(match_builtin(name).is_some(), "{}", name);
		}
		assert!(match_builtin("ls").is_none());
		assert!(match_builtin("!x").is_none());
		assert!(match_builtin("history").unwrap().writes_stdout);
		assert!(!match_builtin("cd").unwrap().writes_stdout);
	}

	#[test]
	fn missing_arguments() {
		let mut state = global::State::new();
		for name in &["cd", "stop", "wake", "term"] {
			match run(&mut state, name) {
				Err(ShellError::MissingArgument(n)) => assert_eq!(n, *name),
				other => panic!("{}: {:?}", name, other),
			}
		}
	}

	#[test]
	fn cd_failure_is_reported() {
		let mut state = global::State::new();
		assert!(matches!(run(&mut state, "cd /nonexistent/jsh/dir"), Err(ShellError::Cd { .. })));
	}

	#[test]
	fn invalid_pids_make_no_call() {
		let mut state = global::State::new();
		for arg in &["abc", "0", "-1"] {
			assert!(matches!(run(&mut state, &format!("stop {}", arg)), Err(ShellError::InvalidPid(_))));
		}
	}

	#[test]
	fn failed_delivery_leaves_table_alone() {
		let mut state = global::State::new();
		// above any pid_max linux allows
		let pid = Pid::from_raw(999_999_999);
		state.jobs.register(Command::new(["ghost"]), pid);
		assert!(matches!(run(&mut state, "term 999999999"), Err(ShellError::Signal { .. })));
		assert_eq!(state.jobs.find(pid).unwrap().status, Status::Running);
	}

	#[test]
	fn stop_wake_term_track_status() {
		let mut state = global::State::new();
		let child = process::Command::new("sleep").arg("30").spawn().unwrap();
		let pid = Pid::from_raw(child.id() as i32);
		state.jobs.register(Command::new(["sleep", "30"]), pid);

		run(&mut state, &format!("stop {}", pid)).unwrap();
		state.jobs.reconcile();
		assert_eq!(state.jobs.find(pid).unwrap().status, Status::Suspended);

		run(&mut state, &format!("wake {}", pid)).unwrap();
		state.jobs.reconcile();
		assert_eq!(state.jobs.find(pid).unwrap().status, Status::Running);

		run(&mut state, &format!("term {}", pid)).unwrap();
		let mut out = Vec::new();
		state.jobs.list_and_prune(&mut out).unwrap();
		assert!(String::from_utf8(out).unwrap().contains("\tsleep 30\tTerminated\n"));
		assert!(state.jobs.find(pid).is_none());
	}

	#[test]
	fn recall_records_resolved_text_and_runs_it() {
		let mut state = global::State::new();
		state.history.push("true");
		assert_eq!(run(&mut state, "!!").unwrap(), 0);
		assert_eq!(state.history.iter().collect::<Vec<_>>(), vec!["true", "true"]);
		assert_eq!(state.jobs.len(), 1);
		assert_eq!(state.jobs.iter().next().unwrap().command.text(), "true");
	}

	#[test]
	fn recall_out_of_range_changes_nothing() {
		let mut state = global::State::new();
		state.history.push("true");
		assert!(matches!(run(&mut state, "!2"), Err(ShellError::HistoryOutOfRange)));
		assert_eq!(state.history.len(), 1);
		assert!(state.jobs.is_empty());
	}
}
