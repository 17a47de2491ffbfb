use std::io;

use thiserror::Error;

use crate::typecheck;

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal failures of a compilation. Everything else degrades to a
/// [`Diagnostic`](crate::diagnostic::Diagnostic).
#[derive(Debug, Error)]
pub enum Error {
    #[error("lexical error: {0}")]
    Lex(String),

    #[error("syntax error: {0}")]
    Parse(String),

    #[error(transparent)]
    TypeCheck(#[from] typecheck::Error),

    #[error("failed to write assembly: {0}")]
    Io(#[from] io::Error),
}
