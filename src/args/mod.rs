//! CLI argument types and parsing helpers.
mod cli;
mod parsers;


pub use cli::{CheckArgs, Cli, Command, CompareArgs, RunArgs};
