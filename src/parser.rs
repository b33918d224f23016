use std::path::PathBuf;

use thiserror::Error;

use crate::types::Command;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("empty command")]
	EmptyCommand,
	#[error("empty redirect")]
	EmptyRedirect,
	#[error("character after '&': '{0}'")]
	TrailingAfterBackground(char),
}

type ParseResult<T> = Result<T, ParseError>;

enum RedirectType { Input, Output }

struct Parser<'a> {
	line: &'a str,
	i: usize,
}

impl<'a> Parser<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.as_bytes().get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\n' | b'\r')
	}

	fn is_letter(c: u8) -> bool {
		match c {
			b'>' | b'<' | b'&' | b'|' => false,
			_ => !Parser::is_whitespace(c),
		}
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn at_end(&mut self) -> bool {
		self.skip_whitespaces();
		self.i >= self.line.len()
	}

	fn peek(&self) -> Option<u8> {
		self.line.as_bytes().get(self.i).cloned()
	}

	// word boundaries are always ascii bytes, so the slice stays on char boundaries
	fn read_word(&mut self) -> &'a str {
		let orig = self.i;
		self.proceed_while(Parser::is_letter);
		&self.line[orig .. self.i]
	}

	fn parse_redirect(&mut self) -> ParseResult<Option<(RedirectType, PathBuf)>> {
		let typ = match self.peek() {
			Some(b'<') => RedirectType::Input,
			Some(b'>') => RedirectType::Output,
			_ => { return Ok(None); },
		};
		self.i += 1;

		self.skip_whitespaces();
		let target = self.read_word();
		if target.is_empty() {
			return Err(ParseError::EmptyRedirect);
		}
		Ok(Some((typ, PathBuf::from(target))))
	}

	fn parse_command(&mut self) -> ParseResult<Command> {
		let mut arguments: Vec<String> = vec![];
		let mut input_redirect = None;
		let mut output_redirect = None;

		loop {
			self.skip_whitespaces();
			if let Some((typ, target)) = self.parse_redirect()? {
				match typ {
					RedirectType::Input => input_redirect = Some(target),
					RedirectType::Output => output_redirect = Some(target),
				}
				continue;
			}
			let word = self.read_word();
			if word.is_empty() {
				break;
			}
			arguments.push(word.to_owned());
		}

		if arguments.is_empty() {
			return Err(ParseError::EmptyCommand);
		}
		Ok(Command { arguments, input_redirect, output_redirect, next: None, blocking: true })
	}

	fn parse_pipeline(&mut self) -> ParseResult<Command> {
		let mut commands: Vec<Command> = vec![];
		let mut blocking = true;

		loop {
			commands.push(self.parse_command()?);
			match self.peek() {
				Some(b'|') => { self.i += 1; },
				Some(b'&') => {
					self.i += 1;
					blocking = false;
					self.skip_whitespaces();
					if let Some(c) = self.line[self.i ..].chars().next() {
						return Err(ParseError::TrailingAfterBackground(c));
					}
					break;
				},
				_ => { break; },
			}
		}

		let mut head: Option<Box<Command>> = None;
		for mut command in commands.into_iter().rev() {
			command.blocking = blocking;
			command.next = head;
			head = Some(Box::new(command));
		}
		// parse_command never returns an empty chain
		head.map(|b| *b).ok_or(ParseError::EmptyCommand)
	}
}

/// Parses one input line. A blank line yields `Ok(None)`.
pub fn parse(line: &str) -> ParseResult<Option<Command>> {
	let mut parser = Parser { line: line, i: 0 };
	if parser.at_end() {
		return Ok(None);
	}
	parser.parse_pipeline().map(Some)
}
