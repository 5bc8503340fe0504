use nix;
use nix::errno::Errno;
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::Pid;

pub trait WaitStatusExt {
	fn is_terminated(self) -> bool;
	fn code(self) -> i32;
}

impl WaitStatusExt for WaitStatus {
	fn is_terminated(self) -> bool {
		match self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => true,
			_ => false,
		}
	}

	/// Shell-style status: the exit code, or 128 plus the signal number.
	fn code(self) -> i32 {
		match self {
			WaitStatus::Exited(_, code) => code,
			WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
			_ => 0,
		}
	}
}

/// The top-level child forked for one command group, after it terminated.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Job {
	pub group: String,
	pub pid: Pid,
	pub status: WaitStatus,
}

impl Job {
	pub fn code(&self) -> i32 {
		self.status.code()
	}

	pub fn success(&self) -> bool {
		self.code() == 0
	}
}

/// Blocks until `pid` terminates. Only that child is reaped; pipeline
/// stages forked by it are its own children and never show up here.
pub fn wait_for(pid: Pid) -> nix::Result<WaitStatus> {
	loop {
		match wait::waitpid(pid, None) {
			Err(Errno::EINTR) => continue,
			Ok(status) if !status.is_terminated() => continue,
			r => return r,
		}
	}
}
