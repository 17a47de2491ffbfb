pub mod declaration;
pub mod expression;
pub mod literal;
pub mod name;
pub mod operator;
pub mod statement;
pub mod r#type;

use rustc_hash::FxHashMap;

use self::declaration::{FunctionDecl, VarDecl};
use self::name::Name;

/// Root of the tree handed over by the front end.
///
/// The last entry of `function_decls` is the synthesized `main` built from
/// the top-level `begin ... end.` block.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub var_decls: Vec<VarDecl>,
    pub function_decls: Vec<FunctionDecl>,
    /// Alias name to underlying type name, one level per entry.
    pub type_aliases: FxHashMap<Name, Name>,
}
