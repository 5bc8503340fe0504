use std::io;
use std::path::PathBuf;
use std::process;
use io::Write;
use io::BufRead;

use clap::Parser;
use log::{debug, error};

use pipesh::config::Config;
use pipesh::{eval, global, logging, parser};

#[derive(Parser)]
#[command(name = "pipesh")]
#[command(about = "A small shell: command groups, pipelines and redirections")]
#[command(version)]
struct Cli {
	/// Run this line and exit with the status of its last group
	#[arg(short = 'c')]
	line: Option<String>,

	/// Configuration file (default: $PIPESH_CONFIG, then ~/.config/pipesh/config.toml)
	#[arg(long = "config")]
	config: Option<PathBuf>,

	/// Print the parsed pipelines instead of running them
	#[arg(short = 'n', long = "dry-run")]
	dry_run: bool,

	/// Raise the log level, repeatable
	#[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
	verbose: u8,
}

fn run(state: &mut global::State, line: &str, dry_run: bool) {
	if !dry_run {
		eval::run_line(state, line);
		return;
	}
	for group in parser::split_groups(line) {
		match parser::parse_pipeline(group, state.config.shell.redirects) {
			Ok(pipeline) => println!("{:?}", pipeline),
			Err(e) => {
				let _ = writeln!(&mut io::stderr(), "pipesh: {}", e);
				state.last_status = 2;
			},
		}
	}
}

fn main() {
	let cli = Cli::parse();

	let config = match Config::load(cli.config.as_deref()) {
		Ok(config) => config,
		Err(e) => {
			let _ = writeln!(&mut io::stderr(), "pipesh: {}", e);
			process::exit(2);
		}
	};
	logging::init(logging::raise(config.logging.level.into(), cli.verbose));
	debug!("{:?}", config);

	let mut state = global::State::new(config);

	if let Some(ref line) = cli.line {
		run(&mut state, line, cli.dry_run);
		process::exit(state.last_status);
	}

	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	loop {
		let _ = stdout.write_all(state.config.shell.prompt.as_bytes());
		let _ = stdout.flush();
		let mut line: Vec<u8> = vec![];
		match stdin_locked.read_until(b'\n', &mut line) {
			Ok(0) => break,
			Ok(_) => {},
			Err(e) => {
				error!("reading input: {}", e);
				break;
			},
		}
		let line = match String::from_utf8(line) {
			Ok(line) => line,
			Err(_) => {
				let _ = writeln!(&mut io::stderr(), "pipesh: input is not valid UTF-8, line skipped");
				state.last_status = 2;
				continue;
			},
		};
		let line = line.trim_end_matches(&['\n', '\r'][..]);
		if line == state.config.shell.exit_word {
			break;
		}
		run(&mut state, line, cli.dry_run);
	}
	process::exit(state.last_status);
}
