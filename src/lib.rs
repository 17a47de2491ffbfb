pub mod ast;
pub mod codegen;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod optimize;
pub mod parse;
pub mod typecheck;

use std::io;

use tracing::info;

pub use config::Options;
pub use diagnostic::Diagnostic;
pub use error::{Error, Result};

use codegen::gen;
use optimize::optimize;
use parse::parse;
use typecheck::check;

/// Compiles one source text into one x86-64 assembly module.
///
/// The returned diagnostics describe functions or calls that were degraded
/// while generating code; the module is complete regardless.
pub fn compile<Write: io::Write>(src: &str, dest: &mut Write) -> Result<Vec<Diagnostic>> {
    compile_with(src, dest, &Options::default())
}

pub fn compile_with<Write: io::Write>(
    src: &str,
    dest: &mut Write,
    options: &Options,
) -> Result<Vec<Diagnostic>> {
    let mut program = parse(src)?;
    info!(
        functions = program.function_decls.len(),
        globals = program.var_decls.len(),
        "parsed"
    );

    let symbols = check(&mut program)?;
    info!(
        globals = symbols.globals.len(),
        functions = symbols.functions.len(),
        "type checked"
    );

    if options.optimize {
        optimize(&mut program, options);
        info!(nested = options.fold_nested_blocks, "optimized");
    }

    let diagnostics = gen(&program, dest)?;
    info!(diagnostics = diagnostics.len(), "generated");
    Ok(diagnostics)
}
