use std::path::PathBuf;

/// One parsed command. `next` links the second stage of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
	pub arguments: Vec<String>,
	pub input_redirect: Option<PathBuf>,
	pub output_redirect: Option<PathBuf>,
	pub next: Option<Box<Command>>,
	pub blocking: bool,
}

impl Command {
	pub fn new<I, S>(arguments: I) -> Command
		where I: IntoIterator<Item = S>, S: Into<String> {
		Command {
			arguments: arguments.into_iter().map(Into::into).collect(),
			input_redirect: None,
			output_redirect: None,
			next: None,
			blocking: true,
		}
	}

	pub fn name(&self) -> &str {
		self.arguments.first().map_or("", |s| s.as_str())
	}

	/// Arguments joined by single spaces, no quoting.
	pub fn text(&self) -> String {
		self.arguments.join(" ")
	}

	pub fn has_redirects(&self) -> bool {
		self.input_redirect.is_some() || self.output_redirect.is_some()
	}
}
