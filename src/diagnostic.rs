use thiserror::Error;

use crate::ast::name::Name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterClass {
    Integer,
    Float,
}

impl RegisterClass {
    fn describe(self) -> &'static str {
        match self {
            RegisterClass::Integer => "integer",
            RegisterClass::Float => "float",
        }
    }
}

/// Non-fatal conditions reported while generating code. The affected
/// construct is degraded and compilation carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error(
        "function '{function}' has {names} parameter names but {types} parameter types; emitting an empty stub"
    )]
    ParameterMismatch {
        function: Name,
        names: usize,
        types: usize,
    },

    #[error("call to '{callee}' passes more than six {} arguments; the excess is dropped", .class.describe())]
    TooManyArguments { callee: Name, class: RegisterClass },

    #[error("function '{function}' takes more than six {} parameters; the excess is not stored", .class.describe())]
    TooManyParameters { function: Name, class: RegisterClass },
}
