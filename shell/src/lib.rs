//! pipesh: a small command-line shell.
//!
//! A line is split on `;` into command groups that run one after another.
//! Each group is a pipeline of commands joined by `|`, optionally with one
//! redirection (`<`, `>` or `>>`). Every group runs in its own forked child,
//! which wires the pipes, spawns all but the last command and finally execs
//! the last one.

pub mod config;
pub mod eval;
pub mod global;
pub mod job;
pub mod logging;
pub mod parser;
pub mod types;
