use super::declaration::VarDecl;
use super::expression::Expression;
use super::name::Name;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign(Name, Expression),
    Print(Expression),
    If(IfStmt),
    While(WhileStmt),
    Expression(Expression),
    Return(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expression,
    pub then_block: Block,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expression,
    pub body: Block,
}

/// Declarations and statements in source order. Nested blocks do not open a
/// scope: their locals belong to the enclosing function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub var_decls: Vec<VarDecl>,
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(var_decls: Vec<VarDecl>, statements: Vec<Statement>) -> Self {
        Block {
            var_decls,
            statements,
        }
    }

    pub fn single(statement: Statement) -> Self {
        Block::new(vec![], vec![statement])
    }
}
