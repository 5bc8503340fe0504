use crate::config::OnFailure;
use crate::global;
use crate::job::{self, Job};
use crate::parser::{self, ParseError, RedirectPolicy};
use crate::types::*;

use std::convert::Infallible;
use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::{ffi, io};
use io::Write;
use log::{debug, info, warn};
use nix;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, ForkResult, Pid};
use libc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
	#[error(transparent)]
	Parse(#[from] ParseError),
	#[error("Fork failed: {0}")]
	Fork(#[source] nix::Error),
	#[error("cannot create pipe: {0}")]
	Pipe(#[source] nix::Error),
	#[error("{path}: {source}")]
	RedirectOpen { path: String, source: io::Error },
	#[error("{program}: {}", exec_reason(.source))]
	Exec { program: String, source: nix::Error },
	#[error("Nix error: {0}")]
	Nix(#[from] nix::Error),
	#[error("Nul char error: {0}")]
	Nul(#[from] ffi::NulError),
}

fn exec_reason(e: &nix::Error) -> String {
	match *e {
		Errno::ENOENT => "command not found".to_string(),
		e => e.desc().to_string(),
	}
}

impl ExecError {
	/// Status a forked process exits with after hitting this error.
	pub fn exit_code(&self) -> i32 {
		match *self {
			ExecError::Parse(_) => 2,
			ExecError::Exec { source: Errno::ENOENT, .. } => 127,
			ExecError::Exec { .. } => 126,
			_ => 1,
		}
	}
}

fn report(e: &ExecError) {
	debug!("{:?}", e);
	let _ = writeln!(&mut io::stderr(), "pipesh: {}", e);
}

/// Reports `e` and terminates the current (forked) process without running
/// destructors or flushing the parent's buffers.
fn exit_with(e: ExecError) -> ! {
	report(&e);
	unsafe { libc::_exit(e.exit_code()) }
}

fn open_redirect(redirect: &Redirect) -> Result<OwnedFd, ExecError> {
	use std::os::unix::fs::OpenOptionsExt;

	let mut oopt = OpenOptions::new();
	match redirect.typ {
		RedirectType::Input => oopt.read(true),
		RedirectType::Output => oopt.write(true).create(true).truncate(true),
		RedirectType::Append => oopt.append(true).create(true),
	};
	let file = oopt.mode(0o666).open(redirect.target)
		.map_err(|source| ExecError::RedirectOpen { path: redirect.target.to_string(), source: source })?;
	Ok(OwnedFd::from(file))
}

/// Makes `target` refer to what `fd` refers to and closes `fd`.
fn move_fd(fd: OwnedFd, target: RawFd) -> nix::Result<()> {
	if fd.as_raw_fd() == target {
		let _ = fd.into_raw_fd();
		return Ok(());
	}
	unistd::dup2(fd.as_raw_fd(), target)?;
	Ok(())
}

fn do_exec_command(command: &Command) -> Result<Infallible, ExecError> {
	let argv = command.argv()?;
	unistd::execvp(argv[0].as_c_str(), &argv)
		.map_err(|source| ExecError::Exec { program: command.name.to_string(), source: source })
}

/// Replaces the current process with `command`; exits if that fails.
fn exec_command(command: &Command) -> ! {
	match do_exec_command(command) {
		Ok(never) => match never {},
		Err(e) => exit_with(e),
	}
}

/// The Rust runtime ignores SIGPIPE and an ignored signal survives exec.
fn restore_sigpipe() -> nix::Result<()> {
	unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) }?;
	Ok(())
}

fn wire_stdio(input: Option<&OwnedFd>, output: Option<&OwnedFd>) -> nix::Result<()> {
	for (fd, target) in [(input, libc::STDIN_FILENO), (output, libc::STDOUT_FILENO)] {
		if let Some(fd) = fd {
			let raw = fd.as_raw_fd();
			if raw != target {
				unistd::dup2(raw, target)?;
				unistd::close(raw)?;
			}
		}
	}
	Ok(())
}

/// Forks a process running `command` with its stdin and stdout taken from
/// `input` and `output` (`None` keeps the inherited stream). The child is
/// not waited for.
pub fn spawn_stage(input: Option<&OwnedFd>, output: Option<&OwnedFd>, command: &Command) -> Result<Pid, ExecError> {
	match unsafe { unistd::fork() }.map_err(ExecError::Fork)? {
		ForkResult::Parent { child } => {
			debug!("spawned stage {} as pid {}", command.name, child);
			Ok(child)
		},
		ForkResult::Child => {
			if let Err(e) = restore_sigpipe().and_then(|_| wire_stdio(input, output)) {
				exit_with(e.into());
			}
			exec_command(command)
		},
	}
}

/// Builds the whole pipeline in the current process and replaces it with the
/// last command. Every command but the last runs in a child spawned here.
///
/// Since a successful exec does not return, the only possible outcome is an
/// error; the caller has to terminate the process after reporting it.
pub fn exec_pipeline(pipeline: &Pipeline) -> Result<Infallible, ExecError> {
	let (last, init) = pipeline.commands.split_last().ok_or(ParseError::EmptyStage)?;

	if let Some(redirect) = pipeline.redirect.filter(|r| r.typ == RedirectType::Input) {
		move_fd(open_redirect(&redirect)?, libc::STDIN_FILENO)?;
	}

	let mut input: Option<OwnedFd> = None;
	for command in init {
		let (pipe_read, pipe_write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?;
		if let Err(e) = spawn_stage(input.as_ref(), Some(&pipe_write), command) {
			warn!("stage {} skipped", command.name);
			report(&e);
		}
		drop(pipe_write);
		input = Some(pipe_read);
	}
	if let Some(fd) = input {
		move_fd(fd, libc::STDIN_FILENO)?;
	}

	if let Some(redirect) = pipeline.redirect.filter(|r| r.typ != RedirectType::Input) {
		move_fd(open_redirect(&redirect)?, libc::STDOUT_FILENO)?;
	}

	do_exec_command(last)
}

fn run_group_child(group: &str, policy: RedirectPolicy) -> ! {
	if let Err(e) = restore_sigpipe() {
		exit_with(e.into());
	}
	let e = match parser::parse_pipeline(group, policy) {
		Ok(pipeline) => match exec_pipeline(&pipeline) {
			Ok(never) => match never {},
			Err(e) => e,
		},
		Err(e) => e.into(),
	};
	exit_with(e)
}

/// Runs one command group in a fresh top-level child and waits for it.
pub fn run_group(state: &global::State, group: &str) -> Result<Job, ExecError> {
	let policy = state.config.shell.redirects;
	match unsafe { unistd::fork() }.map_err(ExecError::Fork)? {
		ForkResult::Parent { child } => {
			debug!("group '{}' running as pid {}", group.trim(), child);
			let status = job::wait_for(child)?;
			Ok(Job { group: group.to_string(), pid: child, status: status })
		},
		ForkResult::Child => run_group_child(group, policy),
	}
}

/// Runs the groups of `line` one after another. A group that could not be
/// started is reported and skipped; with `on_failure = "abort"` a group
/// exiting non-zero also skips the rest of the line.
pub fn run_line(state: &mut global::State, line: &str) -> Vec<Job> {
	let mut jobs = vec![];
	for group in parser::split_groups(line) {
		let job = match run_group(state, group) {
			Ok(job) => job,
			Err(e) => {
				report(&e);
				continue;
			},
		};
		info!("'{}' exited with status {}", group.trim(), job.code());
		state.last_status = job.code();
		let failed = !job.success();
		jobs.push(job);
		if failed && state.config.shell.on_failure == OnFailure::Abort {
			info!("skipping the rest of the line");
			break;
		}
	}
	jobs
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exit_codes() {
		let not_found = ExecError::Exec { program: "nope".to_string(), source: Errno::ENOENT };
		assert_eq!(not_found.exit_code(), 127);
		assert_eq!(not_found.to_string(), "nope: command not found");
		let denied = ExecError::Exec { program: "/etc".to_string(), source: Errno::EACCES };
		assert_eq!(denied.exit_code(), 126);
		assert_eq!(ExecError::Parse(ParseError::EmptyStage).exit_code(), 2);
		assert_eq!(ExecError::Fork(Errno::EAGAIN).exit_code(), 1);
		assert!(ExecError::Fork(Errno::EAGAIN).to_string().starts_with("Fork failed"));
	}

	#[test]
	fn redirect_open_failure() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("missing");
		let target = missing.to_str().unwrap();
		let err = open_redirect(&Redirect { target: target, typ: RedirectType::Input }).unwrap_err();
		assert!(matches!(err, ExecError::RedirectOpen { .. }));
		assert_eq!(err.exit_code(), 1);
	}

	#[test]
	fn redirect_create_and_append() {
		use std::io::Write;

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out");
		let target = path.to_str().unwrap();
		for _ in 0..2 {
			let fd = open_redirect(&Redirect { target: target, typ: RedirectType::Append }).unwrap();
			std::fs::File::from(fd).write_all(b"x\n").unwrap();
		}
		assert_eq!(std::fs::read_to_string(&path).unwrap(), "x\nx\n");

		let fd = open_redirect(&Redirect { target: target, typ: RedirectType::Output }).unwrap();
		std::fs::File::from(fd).write_all(b"y\n").unwrap();
		assert_eq!(std::fs::read_to_string(&path).unwrap(), "y\n");
	}
}
