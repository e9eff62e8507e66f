//! languageO compiler: lexer, parser, analyzer, and LLVM IR emitter.
//!
//! This crate provides the compilation pipeline for languageO sources:
//! - `lexer` - token stream
//! - `parser` - hand-written recursive-descent parser producing `oc_core::ast`
//! - `analyze` - semantic analysis (symbol table, type checking, dead-code elimination)
//! - `layout` - object layout and dispatch table construction
//! - `emit` - LLVM IR text emission
//! - `diagnostics` - error taxonomy shared by parsing and analysis
//! - `builtins` - the fixed table of `Array`/`List`/primitive built-in methods

pub mod analyze;
pub mod builtins;
pub mod diagnostics;
pub mod emit;
pub mod layout;
pub mod lexer;
pub mod parser;

use oc_core::ast::Program;

pub use analyze::model::SemanticModel;
pub use diagnostics::{Located, SemanticError};
pub use layout::Layout;
pub use parser::ParseError;

/// Errors that can occur while compiling a languageO source file to LLVM IR.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("semantic error: {0}")]
    Semantic(#[from] Located<SemanticError>),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The parsed and analyzed form of a source file, retained together since
/// emission needs the AST (for initializer expressions), the model (for
/// resolved types), and the layout (for field/dispatch offsets) at once.
pub struct Compiled {
    pub program: Program,
    pub model: SemanticModel,
    pub layout: Layout,
}

/// Runs the full pipeline short of emission: parse, then analyze.
///
/// Split out from [`compile_to_llvm_ir`] so the CLI and tests can inspect
/// the model or layout without generating IR text.
pub fn compile(source: &str) -> Result<Compiled> {
    let mut program = parser::parse(source)?;
    let model = analyze::analyze(&mut program)?;
    let layout = layout::build(&model);
    Ok(Compiled {
        program,
        model,
        layout,
    })
}

/// Parses, analyzes, and emits a complete LLVM IR module for a source file.
pub fn compile_to_llvm_ir(source: &str) -> Result<String> {
    let compiled = compile(source)?;
    Ok(emit::emit(&compiled.program, &compiled.model, &compiled.layout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_main_class_compiles_to_a_module_with_a_trivial_entry_point() {
        let ir = compile_to_llvm_ir("class Main { method Main() { 1.Print(); } }")
            .expect("valid program should compile");
        assert!(ir.contains("define i32 @main()"));
        assert!(ir.contains("ret i32 0"));
    }

    #[test]
    fn parse_failure_is_reported_as_a_parse_error() {
        let err = compile_to_llvm_ir("class").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn semantic_failure_is_reported_as_a_semantic_error() {
        let err = compile_to_llvm_ir("class A extends B { }").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)));
    }
}
