mod fold;

use std::mem;

use tracing::debug;

use crate::ast::expression::Expression;
use crate::ast::statement::{Block, IfStmt, Statement};
use crate::ast::Program;
use crate::config::Options;

pub use self::fold::fold_expression;
use self::fold::fold_statement;

/// Runs dead-code elimination and then constant folding over every function.
///
/// Unless `fold_nested_blocks` is set, only a function's top-level statements
/// are touched; bodies of `if` and `while` are left as written.
pub fn optimize(program: &mut Program, options: &Options) {
    for func_decl in &mut program.function_decls {
        debug!(function = %func_decl.name, "optimizing function");
        optimize_block(&mut func_decl.block, options.fold_nested_blocks);
    }
}

fn optimize_block(block: &mut Block, nested: bool) {
    let slots = mem::take(&mut block.statements)
        .into_iter()
        .map(eliminate_dead_code)
        .collect::<Vec<_>>();

    block.statements = slots.into_iter().flatten().map(fold_statement).collect();

    if nested {
        for stmt in &mut block.statements {
            match stmt {
                Statement::If(if_stmt) => {
                    optimize_block(&mut if_stmt.then_block, nested);
                    if let Some(else_block) = &mut if_stmt.else_block {
                        optimize_block(else_block, nested);
                    }
                }
                Statement::While(while_stmt) => optimize_block(&mut while_stmt.body, nested),
                _ => {}
            }
        }
    }
}

/// `None` means the statement can never run.
fn eliminate_dead_code(stmt: Statement) -> Option<Statement> {
    match stmt {
        Statement::While(mut while_stmt) => {
            while_stmt.condition = fold_expression(while_stmt.condition);
            match while_stmt.condition.as_number() {
                Some(number) if number.is_zero() => None,
                _ => Some(Statement::While(while_stmt)),
            }
        }
        Statement::If(mut if_stmt) => {
            if_stmt.condition = fold_expression(if_stmt.condition);
            let Some(number) = if_stmt.condition.as_number() else {
                return Some(Statement::If(if_stmt));
            };
            if number.is_zero() {
                let else_block = if_stmt.else_block.take()?;
                Some(Statement::If(IfStmt {
                    condition: Expression::int(1),
                    then_block: else_block,
                    else_block: None,
                }))
            } else {
                if_stmt.condition = Expression::int(1);
                if_stmt.else_block = None;
                Some(Statement::If(if_stmt))
            }
        }
        stmt => Some(stmt),
    }
}

#[cfg(test)]
mod tests {
    use super::optimize;
    use crate::ast::expression::{Expression, ExpressionKind};
    use crate::ast::statement::{Block, Statement};
    use crate::ast::Program;
    use crate::config::Options;
    use crate::parse::parse;
    use crate::typecheck::check;

    fn optimized(src: &str, options: Options) -> Program {
        let mut program = parse(src).unwrap();
        check(&mut program).unwrap();
        optimize(&mut program, &options);
        program
    }

    fn main_block(program: &Program) -> &Block {
        &program.function_decls.last().unwrap().block
    }

    #[test]
    fn folds_assignment_to_a_single_literal() {
        let program = optimized(
            "var x: integer; begin x := 2 + 3 * 4; writeln(x) end.",
            Options::default(),
        );
        let statements = &main_block(&program).statements;
        assert_eq!(
            statements[0],
            Statement::Assign("x".into(), Expression::int(14))
        );
    }

    #[test]
    fn false_if_with_else_keeps_only_the_else_branch() {
        let program = optimized(
            "begin if 0 then writeln(1) else writeln(2) end.",
            Options::default(),
        );
        let statements = &main_block(&program).statements;
        assert_eq!(statements.len(), 1);
        let Statement::If(if_stmt) = &statements[0] else {
            panic!("expected if");
        };
        assert_eq!(if_stmt.condition, Expression::int(1));
        assert_eq!(if_stmt.then_block, Block::single(Statement::Print(Expression::int(2))));
        assert!(if_stmt.else_block.is_none());
    }

    #[test]
    fn false_if_without_else_and_false_loop_disappear() {
        let program = optimized(
            "begin
               if 1 > 2 then writeln(1);
               while 0 do writeln(2);
               writeln(3)
             end.",
            Options::default(),
        );
        assert_eq!(
            main_block(&program).statements,
            vec![Statement::Print(Expression::int(3))]
        );
    }

    #[test]
    fn true_if_drops_its_else_branch() {
        let program = optimized(
            "begin if 2 > 1 then writeln(1) else writeln(2) end.",
            Options::default(),
        );
        let Statement::If(if_stmt) = &main_block(&program).statements[0] else {
            panic!("expected if");
        };
        assert_eq!(if_stmt.condition, Expression::int(1));
        assert!(if_stmt.else_block.is_none());
    }

    #[test]
    fn nested_bodies_are_untouched_by_default() {
        let src = "var x: integer;
                   begin
                     while x < 10 do begin
                       x := x + 2 * 3;
                       if 0 then writeln(x)
                     end
                   end.";

        let program = optimized(src, Options::default());
        let Statement::While(while_stmt) = &main_block(&program).statements[0] else {
            panic!("expected while");
        };
        assert_eq!(while_stmt.body.statements.len(), 2);
        let Statement::Assign(_, expr) = &while_stmt.body.statements[0] else {
            panic!("expected assignment");
        };
        let ExpressionKind::Binary(_, _, rhs) = &expr.kind else {
            panic!("expected binary operation");
        };
        assert!(matches!(rhs.kind, ExpressionKind::Binary(..)));

        let options = Options {
            fold_nested_blocks: true,
            ..Options::default()
        };
        let program = optimized(src, options);
        let Statement::While(while_stmt) = &main_block(&program).statements[0] else {
            panic!("expected while");
        };
        assert_eq!(while_stmt.body.statements.len(), 1);
        let Statement::Assign(_, expr) = &while_stmt.body.statements[0] else {
            panic!("expected assignment");
        };
        let ExpressionKind::Binary(_, _, rhs) = &expr.kind else {
            panic!("expected binary operation");
        };
        assert_eq!(**rhs, Expression::int(6));
    }
}
