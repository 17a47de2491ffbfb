use crate::ast::expression::{Expression, ExpressionKind};
use crate::ast::literal::Number;
use crate::ast::operator::BinaryOp;
use crate::ast::r#type::Type;
use crate::ast::statement::Statement;

pub fn fold_statement(stmt: Statement) -> Statement {
    match stmt {
        Statement::Assign(name, expr) => Statement::Assign(name, fold_expression(expr)),
        Statement::Print(expr) => Statement::Print(fold_expression(expr)),
        Statement::If(mut if_stmt) => {
            if_stmt.condition = fold_expression(if_stmt.condition);
            Statement::If(if_stmt)
        }
        Statement::While(mut while_stmt) => {
            while_stmt.condition = fold_expression(while_stmt.condition);
            Statement::While(while_stmt)
        }
        Statement::Expression(expr) => Statement::Expression(fold_expression(expr)),
        Statement::Return(expr) => Statement::Return(fold_expression(expr)),
    }
}

/// Replaces every operation on literals by its value. The folded literal
/// keeps the type the checker gave the operation. Operations that would
/// fault (division by zero) are left for the program to hit at run time.
pub fn fold_expression(expr: Expression) -> Expression {
    let r#type = expr.r#type;
    match expr.kind {
        ExpressionKind::Binary(op, lhs, rhs) => {
            let lhs = fold_expression(*lhs);
            let rhs = fold_expression(*rhs);
            let value = lhs
                .as_number()
                .zip(rhs.as_number())
                .and_then(|(lhs, rhs)| evaluate(op, lhs, rhs));
            match value {
                Some(value) => literal(value, r#type),
                None => Expression {
                    kind: ExpressionKind::Binary(op, Box::new(lhs), Box::new(rhs)),
                    r#type,
                },
            }
        }
        ExpressionKind::Cast(operand) => {
            let operand = fold_expression(*operand);
            match operand.as_number() {
                Some(number) => literal(number, r#type),
                None => Expression::cast(operand, r#type),
            }
        }
        ExpressionKind::Call(callee, args) => Expression {
            kind: ExpressionKind::Call(callee, args.into_iter().map(fold_expression).collect()),
            r#type,
        },
        kind @ (ExpressionKind::Number(_) | ExpressionKind::Identifier(_)) => {
            Expression { kind, r#type }
        }
    }
}

/// Evaluates in double precision, except integer powers, which wrap like the
/// generated multiply loop. Relational operators give 1 or 0.
fn evaluate(op: BinaryOp, lhs: Number, rhs: Number) -> Option<Number> {
    if let (BinaryOp::Pow, Number::Int(base), Number::Int(exponent)) = (op, lhs, rhs) {
        return Some(Number::Int(int_pow(base, exponent)));
    }
    let (l, r) = (lhs.as_f64(), rhs.as_f64());
    let value = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if r == 0.0 {
                return None;
            }
            l / r
        }
        BinaryOp::Pow => l.powf(r),
        BinaryOp::Lt => truth(l < r),
        BinaryOp::Le => truth(l <= r),
        BinaryOp::Gt => truth(l > r),
        BinaryOp::Ge => truth(l >= r),
        BinaryOp::Eq => truth(l == r),
        BinaryOp::Ne => truth(l != r),
        // Both operands must truncate to non-zero integers.
        BinaryOp::Mod => {
            let (l, r) = (l as i64, r as i64);
            if l == 0 || r == 0 {
                return None;
            }
            l.checked_rem(r)? as f64
        }
    };
    Some(Number::Float(value))
}

/// A negative exponent truncates the real power toward zero, which only a
/// base of 1 or -1 survives.
fn int_pow(base: i64, exponent: i64) -> i64 {
    if exponent < 0 && !matches!(base, 1 | -1) {
        return 0;
    }
    let (mut base, mut exponent) = (base, exponent.unsigned_abs());
    let mut result: i64 = 1;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exponent >>= 1;
    }
    result
}

fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Integer results wrap to the width of `r#type`, as the register would.
fn literal(number: Number, r#type: Type) -> Expression {
    let number = match r#type {
        Type::Float32 => Number::Float(number.as_f64()),
        Type::Int64 => Number::Int(number.as_i64()),
        Type::Unsigned32 => Number::Int(i64::from(number.as_i64() as u32)),
        Type::Int32 | Type::Bool => Number::Int(i64::from(number.as_i64() as i32)),
    };
    Expression {
        kind: ExpressionKind::Number(number),
        r#type,
    }
}

#[cfg(test)]
mod tests {
    use super::fold_expression;
    use crate::ast::expression::{Expression, ExpressionKind};
    use crate::ast::literal::Number;
    use crate::ast::operator::BinaryOp;
    use crate::ast::r#type::Type;

    fn typed(mut expr: Expression, r#type: Type) -> Expression {
        expr.r#type = r#type;
        expr
    }

    fn fold(op: BinaryOp, lhs: Expression, rhs: Expression, r#type: Type) -> Expression {
        fold_expression(typed(Expression::binary(op, lhs, rhs), r#type))
    }

    #[test]
    fn folds_integer_arithmetic() {
        let cases = [
            (BinaryOp::Add, 2, 3, 5),
            (BinaryOp::Sub, 2, 3, -1),
            (BinaryOp::Mul, 6, 7, 42),
            (BinaryOp::Div, 7, 2, 3),
            (BinaryOp::Div, -7, 2, -3),
            (BinaryOp::Mod, 7, 3, 1),
            (BinaryOp::Pow, 2, 10, 1024),
            (BinaryOp::Lt, 1, 2, 1),
            (BinaryOp::Ge, 1, 2, 0),
            (BinaryOp::Ne, 4, 4, 0),
        ];
        for (op, lhs, rhs, expected) in cases {
            let folded = fold(op, Expression::int(lhs), Expression::int(rhs), Type::Int32);
            assert_eq!(folded, Expression::int(expected), "{lhs} {op} {rhs}");
        }
    }

    #[test]
    fn keeps_the_operation_type() {
        let folded = fold(
            BinaryOp::Mul,
            Expression::float(1.5),
            Expression::float(2.0),
            Type::Float32,
        );
        assert_eq!(folded, Expression::float(3.0));

        let folded = fold(
            BinaryOp::Add,
            typed(Expression::int(1), Type::Int64),
            typed(Expression::int(2), Type::Int64),
            Type::Int64,
        );
        assert_eq!(folded.as_number(), Some(Number::Int(3)));
        assert_eq!(folded.r#type, Type::Int64);

        let folded = fold(
            BinaryOp::Lt,
            Expression::float(0.5),
            Expression::float(0.25),
            Type::Int32,
        );
        assert_eq!(folded, Expression::int(0));
    }

    #[test]
    fn zero_divisors_are_left_alone() {
        for op in [BinaryOp::Div, BinaryOp::Mod] {
            let original = typed(
                Expression::binary(op, Expression::int(7), Expression::int(0)),
                Type::Int32,
            );
            assert_eq!(fold_expression(original.clone()), original);
        }
    }

    #[test]
    fn folds_nested_operations_bottom_up() {
        let expr = Expression::binary(
            BinaryOp::Add,
            Expression::int(2),
            Expression::binary(BinaryOp::Mul, Expression::int(3), Expression::int(4)),
        );
        assert_eq!(fold_expression(expr), Expression::int(14));
    }

    #[test]
    fn partially_constant_operation_folds_its_constant_side() {
        let expr = Expression::binary(
            BinaryOp::Add,
            Expression::identifier("x"),
            Expression::binary(BinaryOp::Mul, Expression::int(3), Expression::int(4)),
        );
        let folded = fold_expression(expr);
        let ExpressionKind::Binary(BinaryOp::Add, lhs, rhs) = folded.kind else {
            panic!("expected the addition to remain");
        };
        assert_eq!(*lhs, Expression::identifier("x"));
        assert_eq!(*rhs, Expression::int(12));
    }

    #[test]
    fn folds_conversion_of_a_literal() {
        let expr = Expression::cast(Expression::int(2), Type::Float32);
        assert_eq!(fold_expression(expr), Expression::float(2.0));

        let expr = Expression::cast(Expression::float(2.75), Type::Int32);
        assert_eq!(fold_expression(expr), Expression::int(2));
    }

    #[test]
    fn integer_powers_match_the_multiply_loop() {
        let cases = [
            (2, -1, 0),
            (0, -1, 0),
            (1, -5, 1),
            (-1, -3, -1),
            (-1, -4, 1),
            (-3, 3, -27),
            (2, 0, 1),
            (2, 32, 0),
            (3, 21, 1_870_418_611),
        ];
        for (base, exponent, expected) in cases {
            let folded = fold(
                BinaryOp::Pow,
                Expression::int(base),
                Expression::int(exponent),
                Type::Int32,
            );
            assert_eq!(folded, Expression::int(expected), "{base} ^ {exponent}");
        }
    }

    #[test]
    fn integer_results_wrap_to_their_type() {
        let max = fold(
            BinaryOp::Sub,
            Expression::cast(Expression::int(0), Type::Unsigned32),
            Expression::cast(Expression::int(1), Type::Unsigned32),
            Type::Unsigned32,
        );
        assert_eq!(max.as_number(), Some(Number::Int(4_294_967_295)));
        assert_eq!(max.r#type, Type::Unsigned32);

        let greater = fold(
            BinaryOp::Gt,
            Expression::cast(Expression::int(1), Type::Unsigned32),
            max,
            Type::Int32,
        );
        assert_eq!(greater, Expression::int(0));

        let overflow = fold(
            BinaryOp::Mul,
            Expression::int(65_536),
            Expression::int(65_536),
            Type::Int32,
        );
        assert_eq!(overflow, Expression::int(0));
    }

    #[test]
    fn modulo_of_zero_is_left_alone() {
        let original = typed(
            Expression::binary(BinaryOp::Mod, Expression::int(0), Expression::int(3)),
            Type::Int32,
        );
        assert_eq!(fold_expression(original.clone()), original);
    }
}
