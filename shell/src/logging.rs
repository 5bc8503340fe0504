use std::io::{self, IsTerminal};

use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Raises `level` by one step per `-v` flag.
pub fn raise(level: LevelFilter, verbose: u8) -> LevelFilter {
	let levels = [
		LevelFilter::Off,
		LevelFilter::Error,
		LevelFilter::Warn,
		LevelFilter::Info,
		LevelFilter::Debug,
		LevelFilter::Trace,
	];
	let current = levels.iter().position(|&l| l == level).unwrap_or(0);
	levels[(current + verbose as usize).min(levels.len() - 1)]
}

/// Escape codes only when stderr is a terminal.
pub fn color_choice(is_terminal: bool) -> ColorChoice {
	if is_terminal { ColorChoice::Auto } else { ColorChoice::Never }
}

/// Logs go to stderr only; stdout belongs to the programs being run.
pub fn init(level: LevelFilter) {
	let config = ConfigBuilder::new()
		.set_time_level(LevelFilter::Off)
		.set_thread_level(LevelFilter::Off)
		.set_target_level(LevelFilter::Debug)
		.build();
	// a logger may already be installed when embedded in tests
	let _ = TermLogger::init(level, config, TerminalMode::Stderr, color_choice(io::stderr().is_terminal()));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn raise_levels() {
		assert_eq!(raise(LevelFilter::Warn, 0), LevelFilter::Warn);
		assert_eq!(raise(LevelFilter::Warn, 1), LevelFilter::Info);
		assert_eq!(raise(LevelFilter::Warn, 2), LevelFilter::Debug);
		assert_eq!(raise(LevelFilter::Off, 9), LevelFilter::Trace);
	}

	#[test]
	fn no_colors_off_a_terminal() {
		assert!(matches!(color_choice(false), ColorChoice::Never));
		assert!(matches!(color_choice(true), ColorChoice::Auto));
	}
}
