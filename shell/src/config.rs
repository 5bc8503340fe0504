use std::path::{Path, PathBuf};
use std::{env, fs, io};

use log::LevelFilter;
use serde::Deserialize;
use thiserror::Error;

use crate::parser::RedirectPolicy;

/// Example configuration shipped with the crate; every key at its default.
pub const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

const CONFIG_ENV: &str = "PIPESH_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("cannot read {path}: {source}")]
	Read { path: PathBuf, source: io::Error },
	#[error("invalid config {path}: {source}")]
	Parse { path: PathBuf, source: toml::de::Error },
}

/// Whether a failing command group stops the rest of its line.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnFailure {
	#[default]
	Continue,
	Abort,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Off,
	Error,
	#[default]
	Warn,
	Info,
	Debug,
	Trace,
}

impl From<LogLevel> for LevelFilter {
	fn from(level: LogLevel) -> LevelFilter {
		match level {
			LogLevel::Off => LevelFilter::Off,
			LogLevel::Error => LevelFilter::Error,
			LogLevel::Warn => LevelFilter::Warn,
			LogLevel::Info => LevelFilter::Info,
			LogLevel::Debug => LevelFilter::Debug,
			LogLevel::Trace => LevelFilter::Trace,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Default, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub shell: ShellConfig,
	#[serde(default)]
	pub logging: LoggingConfig,
}

#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct ShellConfig {
	#[serde(default = "default_prompt")]
	pub prompt: String,
	/// A line equal to this word ends the prompt loop.
	#[serde(default = "default_exit_word")]
	pub exit_word: String,
	#[serde(default)]
	pub on_failure: OnFailure,
	#[serde(default)]
	pub redirects: RedirectPolicy,
}

fn default_prompt() -> String {
	"$ ".to_string()
}

fn default_exit_word() -> String {
	"exit".to_string()
}

impl Default for ShellConfig {
	fn default() -> ShellConfig {
		ShellConfig {
			prompt: default_prompt(),
			exit_word: default_exit_word(),
			on_failure: OnFailure::default(),
			redirects: RedirectPolicy::default(),
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Default, Deserialize)]
pub struct LoggingConfig {
	#[serde(default)]
	pub level: LogLevel,
}

impl Config {
	pub fn from_toml(path: &Path, text: &str) -> Result<Config, ConfigError> {
		toml::from_str(text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
	}

	pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
		let text = fs::read_to_string(path)
			.map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
		Config::from_toml(path, &text)
	}

	/// Resolution order:
	/// 1. the explicit path (`--config`), which must exist
	/// 2. `$PIPESH_CONFIG`, which must exist
	/// 3. `~/.config/pipesh/config.toml` if present
	/// 4. built-in defaults
	pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
		if let Some(path) = explicit {
			return Config::from_file(path);
		}
		if let Some(path) = env::var_os(CONFIG_ENV) {
			return Config::from_file(Path::new(&path));
		}
		if let Some(home) = env::var_os("HOME") {
			let path = Path::new(&home).join(".config/pipesh/config.toml");
			if path.is_file() {
				return Config::from_file(&path);
			}
		}
		Ok(Config::default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(text: &str) -> Config {
		Config::from_toml(Path::new("test.toml"), text).unwrap()
	}

	#[test]
	fn shipped_config_matches_defaults() {
		assert_eq!(parse(DEFAULT_CONFIG), Config::default());
	}

	#[test]
	fn empty_file_is_default() {
		assert_eq!(parse(""), Config::default());
	}

	#[test]
	fn partial_file() {
		let config = parse("[shell]\non_failure = \"abort\"\n");
		assert_eq!(config.shell.on_failure, OnFailure::Abort);
		assert_eq!(config.shell.prompt, "$ ");
		assert_eq!(config.shell.exit_word, "exit");
		assert_eq!(config.logging.level, LogLevel::Warn);
	}

	#[test]
	fn every_key() {
		let config = parse(concat!(
			"[shell]\n",
			"prompt = \"> \"\n",
			"exit_word = \"quit\"\n",
			"redirects = \"reject\"\n",
			"[logging]\n",
			"level = \"debug\"\n",
		));
		assert_eq!(config.shell.prompt, "> ");
		assert_eq!(config.shell.exit_word, "quit");
		assert_eq!(config.shell.redirects, RedirectPolicy::Reject);
		assert_eq!(LevelFilter::from(config.logging.level), LevelFilter::Debug);
	}

	#[test]
	fn bad_value() {
		let err = Config::from_toml(Path::new("bad.toml"), "[shell]\nredirects = \"first-wins\"\n").unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
		assert!(err.to_string().starts_with("invalid config bad.toml"));
	}

	#[test]
	fn missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
		assert!(matches!(err, ConfigError::Read { .. }));
	}

	#[test]
	fn explicit_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.toml");
		fs::write(&path, "[shell]\nprompt = \"ish> \"\n").unwrap();
		assert_eq!(Config::load(Some(&path)).unwrap().shell.prompt, "ish> ");
	}
}
