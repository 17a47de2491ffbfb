use super::literal::Number;
use super::name::Name;
use super::operator::BinaryOp;
use super::r#type::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub r#type: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Number(Number),
    Identifier(Name),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    /// Explicit conversion; the destination is the node's own type.
    Cast(Box<Expression>),
    Call(Name, Vec<Expression>),
}

impl Expression {
    pub fn number(number: Number) -> Self {
        let r#type = match number {
            Number::Int(_) => Type::Int32,
            Number::Float(_) => Type::Float32,
        };
        Expression {
            kind: ExpressionKind::Number(number),
            r#type,
        }
    }

    pub fn int(value: i64) -> Self {
        Expression::number(Number::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Expression::number(Number::Float(value))
    }

    pub fn identifier(name: impl Into<Name>) -> Self {
        Expression {
            kind: ExpressionKind::Identifier(name.into()),
            r#type: Type::default(),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Expression {
            kind: ExpressionKind::Binary(op, Box::new(lhs), Box::new(rhs)),
            r#type: Type::default(),
        }
    }

    pub fn cast(expr: Expression, destination: Type) -> Self {
        Expression {
            kind: ExpressionKind::Cast(Box::new(expr)),
            r#type: destination,
        }
    }

    pub fn call(name: impl Into<Name>, args: Vec<Expression>) -> Self {
        Expression {
            kind: ExpressionKind::Call(name.into(), args),
            r#type: Type::default(),
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self.kind {
            ExpressionKind::Number(number) => Some(number),
            _ => None,
        }
    }
}
