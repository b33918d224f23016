use std::env;
use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::Context;
use argh::FromArgs;
use tracing::Level;

use jsh::global;

/// A small job-control shell.
#[derive(FromArgs)]
struct Args {
	/// trace the pid and program name of every spawned process to stderr
	#[argh(switch, short = 'd')]
	debug: bool,
}

fn prompt(stdout: &mut io::Stdout) -> anyhow::Result<()> {
	let cwd = env::current_dir().context("getcwd() error")?;
	write!(stdout, "\n{}>", cwd.display())?;
	stdout.flush()?;
	Ok(())
}

fn main() -> anyhow::Result<()> {
	let args: Args = argh::from_env();
	tracing_subscriber::fmt()
		.with_writer(io::stderr)
		.with_max_level(if args.debug { Level::DEBUG } else { Level::WARN })
		.with_ansi(io::stderr().is_terminal())
		.with_target(false)
		.without_time()
		.init();

	let mut state = global::State::new();
	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut line = String::new();
	loop {
		prompt(&mut stdout)?;
		line.clear();
		if stdin.lock().read_line(&mut line).context("reading stdin")? == 0 {
			break;
		}
		if line.trim() == "quit" {
			break;
		}
		jsh::eval_line(&mut state, &line);
	}
	Ok(())
}
