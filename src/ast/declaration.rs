use super::name::Name;
use super::r#type::Type;
use super::statement::Block;

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub names: Vec<Name>,
    pub type_name: Name,
    /// Resolved from `type_name` by the type checker.
    pub r#type: Type,
}

impl VarDecl {
    pub fn new(names: Vec<Name>, type_name: Name) -> Self {
        VarDecl {
            names,
            type_name,
            r#type: Type::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Name,
    pub return_type_name: Name,
    pub block: Block,
    /// Parallel to `param_type_names`. A length mismatch is tolerated and
    /// reported during code generation.
    pub param_names: Vec<Name>,
    pub param_type_names: Vec<Name>,
    // Decorations filled in by the type checker.
    pub return_type: Type,
    pub param_types: Vec<Type>,
}

impl FunctionDecl {
    pub fn new(
        name: Name,
        param_names: Vec<Name>,
        param_type_names: Vec<Name>,
        return_type_name: Name,
        block: Block,
    ) -> Self {
        FunctionDecl {
            name,
            return_type_name,
            block,
            param_names,
            param_type_names,
            return_type: Type::default(),
            param_types: vec![],
        }
    }

    pub fn has_consistent_params(&self) -> bool {
        self.param_names.len() == self.param_type_names.len()
    }
}
