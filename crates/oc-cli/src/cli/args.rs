//! Argument definitions for the `oc` binary.

use std::path::PathBuf;

use clap::{Arg, Command, value_parser};

/// Source file to compile (positional, optional).
///
/// Omitted entirely when the user wants the built-in default sample.
pub fn input_path_arg() -> Arg {
    Arg::new("input")
        .value_name("SOURCE")
        .value_parser(value_parser!(PathBuf))
        .help("languageO source file to compile (defaults to a built-in sample)")
}

pub fn build_cli() -> Command {
    Command::new("oc")
        .about("Compiles languageO source to LLVM IR")
        .arg(input_path_arg())
}
