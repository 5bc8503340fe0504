use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::types::*;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
	#[error("missing file name after '{0}'")]
	MissingRedirectTarget(&'static str),
	#[error("empty command in pipeline")]
	EmptyStage,
	#[error("more than one redirection in '{0}'")]
	MultipleRedirects(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// What to do when one command group carries several redirections.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectPolicy {
	/// The last operator in the group is used, earlier ones are dropped.
	#[default]
	LastWins,
	Reject,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Token<'a> {
	Word(&'a str),
	Redirect(Redirect<'a>),
}

/// Lazy token stream over one command group. Cloning it yields an
/// independent stream starting from the same position.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
	line: &'a str,
	i: usize,
	pending: Option<Token<'a>>,
}

impl<'a> Tokens<'a> {
	pub fn new(line: &'a str) -> Tokens<'a> {
		Tokens { line: line, i: 0, pending: None }
	}

	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(&c) = self.line.as_bytes().get(self.i) {
			if !f(c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		match c {
			b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => true,
			_ => false,
		}
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Tokens::is_whitespace);
	}

	fn read_word(&mut self) -> Option<&'a str> {
		self.skip_whitespaces();
		let orig = self.i;
		self.proceed_while(|c| !Tokens::is_whitespace(c));
		if orig == self.i {
			None
		} else {
			Some(&self.line[orig .. self.i])
		}
	}

	fn find_operator(word: &str) -> Option<(RedirectType, usize)> {
		// '<' first, and ">>" before '>' since '>' is a prefix of it
		if let Some(at) = word.find('<') {
			Some((RedirectType::Input, at))
		} else if let Some(at) = word.find(">>") {
			Some((RedirectType::Append, at))
		} else if let Some(at) = word.find('>') {
			Some((RedirectType::Output, at))
		} else {
			None
		}
	}

	fn classify(&mut self, word: &'a str) -> ParseResult<Token<'a>> {
		let (typ, at) = match Tokens::find_operator(word) {
			Some(found) => found,
			None => { return Ok(Token::Word(word)); },
		};

		let rest = &word[at + typ.operator().len() ..];
		let target = if rest.is_empty() {
			match self.read_word() {
				Some(next) => next,
				None => { return Err(ParseError::MissingRedirectTarget(typ.operator())); },
			}
		} else {
			rest
		};

		let redirect = Token::Redirect(Redirect { target: target, typ: typ });
		let prefix = &word[.. at];
		if prefix.is_empty() {
			Ok(redirect)
		} else {
			self.pending = Some(redirect);
			Ok(Token::Word(prefix))
		}
	}
}

impl<'a> Iterator for Tokens<'a> {
	type Item = ParseResult<Token<'a>>;

	fn next(&mut self) -> Option<ParseResult<Token<'a>>> {
		if let Some(token) = self.pending.take() {
			return Some(Ok(token));
		}
		let word = self.read_word()?;
		Some(self.classify(word))
	}
}

/// Plain words (pipes included) and every redirection found in a group, in
/// the order they appeared.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Tokenized<'a> {
	pub words: Vec<&'a str>,
	pub redirects: Vec<Redirect<'a>>,
}

pub fn tokenize<'a>(line: &'a str) -> ParseResult<Tokenized<'a>> {
	let mut tokenized = Tokenized::default();
	for token in Tokens::new(line) {
		match token? {
			Token::Word(word) => tokenized.words.push(word),
			Token::Redirect(redirect) => tokenized.redirects.push(redirect),
		}
	}
	Ok(tokenized)
}

/// Splits a line on `;`. One leading space is stripped from every group and
/// groups holding nothing but whitespace are dropped.
pub fn split_groups(line: &str) -> Vec<&str> {
	line.split(';')
		.map(|group| group.strip_prefix(' ').unwrap_or(group))
		.filter(|group| {
			let empty = group.trim().is_empty();
			if empty {
				debug!("skipping empty command group");
			}
			!empty
		})
		.collect()
}

fn build_command<'a>(words: &[&'a str]) -> ParseResult<Command<'a>> {
	match words.split_first() {
		Some((&name, arguments)) => Ok(Command { name: name, arguments: arguments.to_vec() }),
		None => Err(ParseError::EmptyStage),
	}
}

fn pick_redirect<'a>(group: &str, mut redirects: Vec<Redirect<'a>>, policy: RedirectPolicy) -> ParseResult<Option<Redirect<'a>>> {
	if redirects.len() > 1 {
		match policy {
			RedirectPolicy::LastWins => {
				debug!("{} redirections in '{}', using the last one", redirects.len(), group);
			},
			RedirectPolicy::Reject => {
				return Err(ParseError::MultipleRedirects(group.trim().to_string()));
			},
		}
	}
	Ok(redirects.pop())
}

/// Parses one command group into its pipeline of commands.
pub fn parse_pipeline<'a>(group: &'a str, policy: RedirectPolicy) -> ParseResult<Pipeline<'a>> {
	let Tokenized { words, redirects } = tokenize(group)?;
	let redirect = pick_redirect(group, redirects, policy)?;

	let mut commands: Vec<Command<'a>> = vec![];
	for stage in words.split(|&word| word == "|") {
		commands.push(build_command(stage)?);
	}

	Ok(Pipeline { commands: commands, redirect: redirect })
}

/// Parses every non-empty group of a line.
pub fn parse<'a>(line: &'a str, policy: RedirectPolicy) -> ParseResult<Vec<Pipeline<'a>>> {
	split_groups(line).into_iter().map(|group| parse_pipeline(group, policy)).collect()
}
