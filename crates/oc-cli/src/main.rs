mod cli;

use std::path::{Path, PathBuf};

use cli::build_cli;

/// Used when no input path is given, so the binary is useful with zero setup.
const DEFAULT_SAMPLE: &str = "class Main { method Main() { 1.Print(); } }\n";

fn main() {
    let matches = build_cli().get_matches();
    let input = matches.get_one::<PathBuf>("input").cloned();

    let (source, output_path) = match &input {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(source) => (source, output_path_for(path)),
            Err(err) => {
                eprintln!("error: could not read '{}': {err}", path.display());
                std::process::exit(1);
            }
        },
        None => (DEFAULT_SAMPLE.to_string(), PathBuf::from("output.ll")),
    };

    match oc_compiler::compile_to_llvm_ir(&source) {
        Ok(ir) => {
            if let Err(err) = std::fs::write(&output_path, ir) {
                eprintln!("error: could not write '{}': {err}", output_path.display());
                std::process::exit(1);
            }
        }
        Err(oc_compiler::Error::Parse(_)) => {
            println!("Parse failed");
        }
        Err(oc_compiler::Error::Semantic(err)) => {
            println!("Semantic error: {err}");
        }
    }
}

/// `foo/bar.o` compiles to `foo/bar.ll`, next to the source.
fn output_path_for(input: &Path) -> PathBuf {
    input.with_extension("ll")
}
