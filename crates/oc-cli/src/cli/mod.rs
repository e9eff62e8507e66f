mod args;

pub use args::build_cli;
