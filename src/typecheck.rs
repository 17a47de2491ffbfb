mod alias;
mod scope;

use std::mem;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ast::declaration::{FunctionDecl, VarDecl};
use crate::ast::expression::{Expression, ExpressionKind};
use crate::ast::literal::Number;
use crate::ast::name::Name;
use crate::ast::r#type::Type;
use crate::ast::statement::{Block, IfStmt, Statement, WhileStmt};
use crate::ast::Program;

use self::alias::Aliases;
use self::scope::{FunctionScope, TopLevelScope};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("type alias '{alias}' is defined in terms of itself")]
    AliasCycle { alias: Name },
}

/// Symbol tables built while checking one program. Code generation works
/// from the decorated tree alone; these are for callers that want to inspect
/// the resolved globals and per-function locals.
#[derive(Debug, Default)]
pub struct Symbols {
    pub globals: FxHashMap<Name, Type>,
    pub functions: FxHashMap<Name, FunctionSymbols>,
}

#[derive(Debug, Default)]
pub struct FunctionSymbols {
    pub return_type: Type,
    /// Parameters, declared locals and implicitly declared names.
    pub locals: FxHashMap<Name, Type>,
}

/// Decorates every expression with its type and inserts the conversions its
/// context requires. Unknown type names and undeclared identifiers fall back
/// to int32; the only rejected input is a cyclic type alias.
pub fn check(program: &mut Program) -> Result<Symbols> {
    let aliases = Aliases::new(&program.type_aliases);
    aliases.validate()?;

    let mut scope = TopLevelScope::default();
    for var_decl in &mut program.var_decls {
        resolve_var_decl(&aliases, var_decl)?;
        for name in &var_decl.names {
            scope.register_global(name.clone(), var_decl.r#type);
        }
    }

    register_function_decls(&aliases, &mut scope, &mut program.function_decls)?;

    let mut functions = FxHashMap::default();
    for func_decl in &mut program.function_decls {
        let symbols = check_function_decl(&aliases, &scope, func_decl)?;
        functions.insert(func_decl.name.clone(), symbols);
    }

    Ok(Symbols {
        globals: scope.globals().clone(),
        functions,
    })
}

fn resolve_var_decl(aliases: &Aliases, var_decl: &mut VarDecl) -> Result<()> {
    var_decl.r#type = aliases.resolve(&var_decl.type_name)?;
    Ok(())
}

/// Signatures are known before any body is checked, so calls to functions
/// declared further down still get the callee's return type.
fn register_function_decls(
    aliases: &Aliases,
    scope: &mut TopLevelScope,
    func_decls: &mut [FunctionDecl],
) -> Result<()> {
    func_decls.iter_mut().try_for_each(|func_decl| {
        func_decl.return_type = aliases.resolve(&func_decl.return_type_name)?;
        func_decl.param_types = func_decl
            .param_type_names
            .iter()
            .map(|type_name| aliases.resolve(type_name))
            .collect::<Result<_>>()?;
        scope.register_function(func_decl.name.clone(), func_decl.return_type);
        Ok(())
    })
}

fn check_function_decl(
    aliases: &Aliases,
    scope: &TopLevelScope,
    func_decl: &mut FunctionDecl,
) -> Result<FunctionSymbols> {
    debug!(function = %func_decl.name, "type checking function");
    let mut scope = scope.to_function_scope(func_decl.name.clone(), func_decl.return_type);

    for (index, name) in func_decl.param_names.iter().enumerate() {
        let r#type = func_decl.param_types.get(index).copied().unwrap_or_default();
        scope.register_local(name.clone(), r#type);
    }

    check_block(aliases, &mut scope, &mut func_decl.block)?;

    let return_type = scope.return_type();
    let (locals, implicit) = scope.into_parts();
    if !implicit.is_empty() {
        debug!(function = %func_decl.name, names = ?implicit, "implicitly declared as integer");
        let mut var_decl = VarDecl::new(implicit, Name::from("integer"));
        var_decl.r#type = Type::Int32;
        func_decl.block.var_decls.push(var_decl);
    }

    Ok(FunctionSymbols {
        return_type,
        locals,
    })
}

fn check_block(aliases: &Aliases, scope: &mut FunctionScope, block: &mut Block) -> Result<()> {
    for var_decl in &mut block.var_decls {
        resolve_var_decl(aliases, var_decl)?;
        for name in &var_decl.names {
            scope.register_local(name.clone(), var_decl.r#type);
        }
    }

    block.statements = mem::take(&mut block.statements)
        .into_iter()
        .map(|stmt| check_statement(aliases, scope, stmt))
        .collect::<Result<_>>()?;
    Ok(())
}

fn check_statement(
    aliases: &Aliases,
    scope: &mut FunctionScope,
    stmt: Statement,
) -> Result<Statement> {
    let stmt = match stmt {
        Statement::Assign(name, expr) => check_assign(scope, name, expr),
        Statement::Print(expr) => Statement::Print(check_expression(scope, expr)),
        Statement::If(if_stmt) => Statement::If(check_if_stmt(aliases, scope, if_stmt)?),
        Statement::While(while_stmt) => {
            Statement::While(check_while_stmt(aliases, scope, while_stmt)?)
        }
        Statement::Expression(expr) => Statement::Expression(check_expression(scope, expr)),
        Statement::Return(expr) => {
            let expr = check_expression(scope, expr);
            Statement::Return(coerce(expr, scope.return_type()))
        }
    };
    Ok(stmt)
}

fn check_assign(scope: &mut FunctionScope, name: Name, expr: Expression) -> Statement {
    // `f := expr` inside `f` sets the result; `f` never becomes a local.
    let destination = if scope.is_result_name(&name) {
        scope.return_type()
    } else {
        scope.value_type_or_declare(&name)
    };
    let expr = check_expression(scope, expr);
    Statement::Assign(name, coerce(expr, destination))
}

fn check_condition(scope: &mut FunctionScope, condition: Expression) -> Expression {
    coerce(check_expression(scope, condition), Type::Int32)
}

fn check_if_stmt(aliases: &Aliases, scope: &mut FunctionScope, if_stmt: IfStmt) -> Result<IfStmt> {
    let IfStmt {
        condition,
        mut then_block,
        mut else_block,
    } = if_stmt;

    let condition = check_condition(scope, condition);
    check_block(aliases, scope, &mut then_block)?;
    if let Some(else_block) = &mut else_block {
        check_block(aliases, scope, else_block)?;
    }

    Ok(IfStmt {
        condition,
        then_block,
        else_block,
    })
}

fn check_while_stmt(
    aliases: &Aliases,
    scope: &mut FunctionScope,
    while_stmt: WhileStmt,
) -> Result<WhileStmt> {
    let WhileStmt { condition, mut body } = while_stmt;
    let condition = check_condition(scope, condition);
    check_block(aliases, scope, &mut body)?;
    Ok(WhileStmt { condition, body })
}

fn check_expression(scope: &mut FunctionScope, expr: Expression) -> Expression {
    match expr.kind {
        ExpressionKind::Number(number) => Expression::number(number),
        ExpressionKind::Identifier(name) => {
            if scope.is_result_name(&name) && scope.value_type(&name).is_none() {
                // The result only lives in a register; a read gets a fresh local.
                warn!(function = %name, "function reads its own name; using an int32 local");
            }
            let r#type = scope.value_type_or_declare(&name);
            Expression {
                kind: ExpressionKind::Identifier(name),
                r#type,
            }
        }
        ExpressionKind::Binary(op, lhs, rhs) => {
            let lhs = check_expression(scope, *lhs);
            let rhs = check_expression(scope, *rhs);
            let operand_type = Type::unify(lhs.r#type, rhs.r#type);
            let r#type = if op.is_relational() {
                Type::Int32
            } else {
                operand_type
            };
            Expression {
                kind: ExpressionKind::Binary(
                    op,
                    Box::new(coerce(lhs, operand_type)),
                    Box::new(coerce(rhs, operand_type)),
                ),
                r#type,
            }
        }
        ExpressionKind::Cast(operand) => {
            Expression::cast(check_expression(scope, *operand), expr.r#type)
        }
        ExpressionKind::Call(callee, args) => {
            // Arguments keep their own types; they are not matched against
            // the callee's parameters.
            let args = args
                .into_iter()
                .map(|arg| check_expression(scope, arg))
                .collect();
            let r#type = scope.call_type(&callee);
            Expression {
                kind: ExpressionKind::Call(callee, args),
                r#type,
            }
        }
    }
}

/// Wraps `expr` in a conversion to `destination` unless it already has that
/// type. Integer literals headed for int64 are retyped in place instead, so
/// they still load as a single immediate.
fn coerce(mut expr: Expression, destination: Type) -> Expression {
    if expr.r#type == destination {
        return expr;
    }
    if destination == Type::Int64 && matches!(expr.kind, ExpressionKind::Number(Number::Int(_))) {
        expr.r#type = Type::Int64;
        return expr;
    }
    Expression::cast(expr, destination)
}

#[cfg(test)]
mod tests {
    use super::{check, Error};
    use crate::ast::expression::{Expression, ExpressionKind};
    use crate::ast::name::Name;
    use crate::ast::r#type::Type;
    use crate::ast::statement::Statement;
    use crate::ast::Program;
    use crate::parse::parse;

    fn checked(src: &str) -> (Program, super::Symbols) {
        let mut program = parse(src).unwrap();
        let symbols = check(&mut program).unwrap();
        (program, symbols)
    }

    fn main_statements(program: &Program) -> &[Statement] {
        &program.function_decls.last().unwrap().block.statements
    }

    fn assigned(stmt: &Statement) -> &Expression {
        match stmt {
            Statement::Assign(_, expr) => expr,
            other => panic!("expected assignment, found {other:?}"),
        }
    }

    #[test]
    fn binary_operands_are_unified() {
        let (program, _) = checked(
            "var i: integer; f: real; l: longint; u: unsigned;
             begin
               f := i + f;
               l := u * l;
               u := i - u;
               i := i < f
             end.",
        );
        let statements = main_statements(&program);
        let expected = [Type::Float32, Type::Int64, Type::Unsigned32, Type::Float32];

        for (stmt, operand_type) in statements.iter().zip(expected) {
            let mut expr = assigned(stmt);
            if let ExpressionKind::Cast(inner) = &expr.kind {
                expr = inner;
            }
            let ExpressionKind::Binary(op, lhs, rhs) = &expr.kind else {
                panic!("expected binary operation, found {expr:?}");
            };
            assert_eq!(lhs.r#type, operand_type);
            assert_eq!(rhs.r#type, operand_type);
            let result_type = if op.is_relational() {
                Type::Int32
            } else {
                operand_type
            };
            assert_eq!(expr.r#type, result_type);
        }
    }

    #[test]
    fn mismatched_operand_gets_a_conversion() {
        let (program, _) = checked("var i: integer; f: real; begin f := i + f end.");
        let expr = assigned(&main_statements(&program)[0]);
        let ExpressionKind::Binary(_, lhs, _) = &expr.kind else {
            panic!("expected binary operation");
        };
        assert_eq!(
            **lhs,
            Expression::cast(
                Expression {
                    kind: ExpressionKind::Identifier(Name::from("i")),
                    r#type: Type::Int32,
                },
                Type::Float32
            )
        );
    }

    #[test]
    fn integer_literal_retyped_for_longint() {
        let (program, _) = checked("var l: longint; begin l := 5; l := l + 1 end.");
        let statements = main_statements(&program);

        let literal = assigned(&statements[0]);
        assert!(matches!(literal.kind, ExpressionKind::Number(_)));
        assert_eq!(literal.r#type, Type::Int64);

        let ExpressionKind::Binary(_, _, rhs) = &assigned(&statements[1]).kind else {
            panic!("expected binary operation");
        };
        assert!(matches!(rhs.kind, ExpressionKind::Number(_)));
        assert_eq!(rhs.r#type, Type::Int64);
    }

    #[test]
    fn float_literal_is_converted_not_retyped() {
        let (program, _) = checked("var l: longint; begin l := 2.5 end.");
        let expr = assigned(&main_statements(&program)[0]);
        assert!(matches!(expr.kind, ExpressionKind::Cast(_)));
        assert_eq!(expr.r#type, Type::Int64);
    }

    #[test]
    fn result_assignment_is_not_a_local() {
        let (program, symbols) = checked(
            "function half(n: integer): real;
             begin half := n / 2 end;
             begin writeln(half(3)) end.",
        );
        let half = &symbols.functions[&Name::from("half")];
        assert_eq!(half.return_type, Type::Float32);
        assert!(!half.locals.contains_key(&Name::from("half")));
        assert_eq!(half.locals.len(), 1);

        let expr = assigned(&program.function_decls[0].block.statements[0]);
        assert_eq!(expr.r#type, Type::Float32);
        assert!(matches!(expr.kind, ExpressionKind::Cast(_)));

        let Statement::Print(call) = &main_statements(&program)[0] else {
            panic!("expected print");
        };
        assert_eq!(call.r#type, Type::Float32);
    }

    #[test]
    fn reading_the_result_name_declares_an_int32_local() {
        let (program, symbols) = checked(
            "function grow(n: integer): longint;
             begin grow := grow * n end;
             begin end.",
        );
        let grow = &symbols.functions[&Name::from("grow")];
        assert_eq!(grow.locals[&Name::from("grow")], Type::Int32);

        let block = &program.function_decls[0].block;
        assert_eq!(block.var_decls.len(), 1);
        assert_eq!(block.var_decls[0].names, vec![Name::from("grow")]);

        // The assignment still targets the result and converts to its type.
        let expr = assigned(&block.statements[0]);
        assert_eq!(expr.r#type, Type::Int64);
    }

    #[test]
    fn conditions_are_cast_to_integer() {
        let (program, _) = checked(
            "var f: real;
             begin
               if f then writeln(1);
               while f - 1.0 do f := f - 1.0
             end.",
        );
        for stmt in main_statements(&program) {
            let condition = match stmt {
                Statement::If(if_stmt) => &if_stmt.condition,
                Statement::While(while_stmt) => &while_stmt.condition,
                other => panic!("unexpected statement {other:?}"),
            };
            assert_eq!(condition.r#type, Type::Int32);
            assert!(matches!(condition.kind, ExpressionKind::Cast(_)));
        }
    }

    #[test]
    fn calls_use_declared_return_type_or_default() {
        let (program, _) = checked(
            "var l: longint;
             function big(): longint; begin big := 1 end;
             begin readln(l); l := big() end.",
        );
        let statements = main_statements(&program);

        let Statement::Expression(read) = &statements[0] else {
            panic!("expected call statement");
        };
        assert_eq!(read.r#type, Type::Int32);
        let ExpressionKind::Call(_, args) = &read.kind else {
            panic!("expected call");
        };
        assert_eq!(args[0].r#type, Type::Int64);

        let call = assigned(&statements[1]);
        assert_eq!(call.r#type, Type::Int64);
        assert!(matches!(call.kind, ExpressionKind::Call(..)));
    }

    #[test]
    fn undeclared_names_become_integer_locals() {
        let (program, symbols) = checked("begin total := 1; writeln(total + other) end.");
        let main = &symbols.functions[&Name::from("main")];
        assert_eq!(main.locals[&Name::from("total")], Type::Int32);
        assert_eq!(main.locals[&Name::from("other")], Type::Int32);

        let var_decls = &program.function_decls[0].block.var_decls;
        assert_eq!(var_decls.len(), 1);
        assert_eq!(var_decls[0].names, vec![Name::from("total"), Name::from("other")]);
    }

    #[test]
    fn aliases_resolve_for_declarations() {
        let (program, symbols) = checked(
            "type money = real; cash = money;
             var wallet: cash; count: whatever;
             begin wallet := 1 end.",
        );
        assert_eq!(symbols.globals[&Name::from("wallet")], Type::Float32);
        assert_eq!(symbols.globals[&Name::from("count")], Type::Int32);
        assert_eq!(program.var_decls[0].r#type, Type::Float32);
    }

    #[test]
    fn cyclic_alias_is_rejected() {
        let mut program = parse("type a = b; b = a; var x: a; begin x := 1 end.").unwrap();
        assert!(matches!(check(&mut program), Err(Error::AliasCycle { .. })));
    }
}
