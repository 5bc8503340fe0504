use crate::config::Config;

pub struct State {
	pub config: Config,
	/// Status of the most recent command group, 0 before any ran.
	pub last_status: i32,
}

impl State {
	pub fn new(config: Config) -> State {
		State { config: config, last_status: 0 }
	}
}
