use std::ffi::{CString, NulError};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Input, Output, Append }

impl RedirectType {
	pub fn operator(self) -> &'static str {
		match self {
			RedirectType::Input => "<",
			RedirectType::Output => ">",
			RedirectType::Append => ">>",
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Redirect<'a> {
	pub target: &'a str,
	pub typ: RedirectType,
}

/// One pipeline stage: the program name and the arguments after it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Command<'a> {
	pub name: &'a str,
	pub arguments: Vec<&'a str>,
}

impl<'a> Command<'a> {
	/// The full argument vector, `argv[0]` included. `execvp` appends the
	/// terminating null pointer itself.
	pub fn argv(&self) -> Result<Vec<CString>, NulError> {
		let mut argv = Vec::with_capacity(self.arguments.len() + 1);
		argv.push(CString::new(self.name)?);
		for &arg in &self.arguments {
			argv.push(CString::new(arg)?);
		}
		Ok(argv)
	}
}

/// Always holds at least one command. An input redirect feeds the first
/// command, an output redirect receives the last one.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pipeline<'a> {
	pub commands: Vec<Command<'a>>,
	pub redirect: Option<Redirect<'a>>,
}
