mod lex;

use chumsky::prelude::Simple;
use chumsky::primitive::{choice, end, just};
use chumsky::recursive::recursive;
use chumsky::{select, Parser};
use itertools::Itertools;

use crate::ast::declaration::{FunctionDecl, VarDecl};
use crate::ast::expression::Expression;
use crate::ast::literal::Number;
use crate::ast::name::Name;
use crate::ast::operator::BinaryOp;
use crate::ast::r#type::Type;
use crate::ast::statement::{Block, IfStmt, Statement, WhileStmt};
use crate::ast::Program;
use crate::error::{Error, Result};

use self::lex::{Keyword, Symbol, Token};

/// Name and return type of the function synthesized from the main block.
pub const MAIN: &str = "main";
const MAIN_RETURN_TYPE: &str = "integer";

pub fn parse(src: &str) -> Result<Program> {
    let tokens = lex::lexer()
        .parse(src)
        .map_err(|errors| Error::Lex(render(errors)))?;
    program()
        .parse(tokens)
        .map_err(|errors| Error::Parse(render(errors)))
}

fn render<E: ToString>(errors: Vec<E>) -> String {
    errors.iter().map(ToString::to_string).join("; ")
}

fn keyword(keyword: Keyword) -> impl Parser<Token, Token, Error = Simple<Token>> + Clone {
    just(Token::Keyword(keyword))
}

fn symbol(symbol: Symbol) -> impl Parser<Token, Token, Error = Simple<Token>> + Clone {
    just(Token::Symbol(symbol))
}

fn name() -> impl Parser<Token, Name, Error = Simple<Token>> + Clone {
    select! {
        Token::Name(name) => Name(name)
    }
}

fn program() -> impl Parser<Token, Program, Error = Simple<Token>> {
    let header = keyword(Keyword::Program)
        .ignore_then(name())
        .then_ignore(symbol(Symbol::Semicolon))
        .or_not();

    let type_aliases = keyword(Keyword::Type)
        .ignore_then(
            name()
                .then_ignore(symbol(Symbol::Equal))
                .then(type_name())
                .then_ignore(symbol(Symbol::Semicolon))
                .repeated(),
        )
        .repeated()
        .flatten();

    let main_block = block(statement()).then_ignore(symbol(Symbol::Dot));

    header
        .ignore_then(type_aliases)
        .then(var_blocks())
        .then(function_decl().repeated())
        .then(main_block)
        .then_ignore(end())
        .map(|(((type_aliases, var_decls), mut function_decls), main_block)| {
            function_decls.push(FunctionDecl::new(
                Name::from(MAIN),
                vec![],
                vec![],
                Name::from(MAIN_RETURN_TYPE),
                main_block,
            ));
            Program {
                var_decls,
                function_decls,
                type_aliases: type_aliases.into_iter().collect(),
            }
        })
}

/// Built-in type keywords are spelled out; anything else is kept as written.
fn type_name() -> impl Parser<Token, Name, Error = Simple<Token>> + Clone {
    let builtin = select! {
        Token::Keyword(Keyword::Integer) => Name::from("integer"),
        Token::Keyword(Keyword::Longint) => Name::from("longint"),
        Token::Keyword(Keyword::Float) => Name::from("float"),
        Token::Keyword(Keyword::Unsigned) => Name::from("unsigned"),
    };
    builtin.or(name())
}

fn var_blocks() -> impl Parser<Token, Vec<VarDecl>, Error = Simple<Token>> + Clone {
    let var_decl = name()
        .separated_by(symbol(Symbol::Comma))
        .at_least(1)
        .then_ignore(symbol(Symbol::Colon))
        .then(type_name())
        .then_ignore(symbol(Symbol::Semicolon))
        .map(|(names, type_name)| VarDecl::new(names, type_name));

    keyword(Keyword::Var)
        .ignore_then(var_decl.repeated())
        .repeated()
        .flatten()
}

fn function_decl() -> impl Parser<Token, FunctionDecl, Error = Simple<Token>> {
    let param_group = name()
        .separated_by(symbol(Symbol::Comma))
        .at_least(1)
        .then_ignore(symbol(Symbol::Colon))
        .then(type_name());

    let params = param_group
        .separated_by(symbol(Symbol::Semicolon))
        .delimited_by(
            symbol(Symbol::LeftParen),
            symbol(Symbol::RightParen),
        );

    keyword(Keyword::Function)
        .ignore_then(name())
        .then(params)
        .then_ignore(symbol(Symbol::Colon))
        .then(type_name())
        .then_ignore(symbol(Symbol::Semicolon))
        .then(block(statement()))
        .then_ignore(symbol(Symbol::Semicolon))
        .map(|(((name, groups), return_type_name), block)| {
            let (param_names, param_type_names) = groups
                .into_iter()
                .flat_map(|(names, type_name)| {
                    names
                        .into_iter()
                        .map(move |name| (name, type_name.clone()))
                })
                .unzip();
            FunctionDecl::new(name, param_names, param_type_names, return_type_name, block)
        })
}

fn block(
    statement: impl Parser<Token, Statement, Error = Simple<Token>> + Clone,
) -> impl Parser<Token, Block, Error = Simple<Token>> + Clone {
    var_blocks()
        .then(compound(statement))
        .map(|(var_decls, statements)| Block::new(var_decls, statements))
}

/// `begin ... end` with any number of separating semicolons.
fn compound(
    statement: impl Parser<Token, Statement, Error = Simple<Token>> + Clone,
) -> impl Parser<Token, Vec<Statement>, Error = Simple<Token>> + Clone {
    let semicolons = symbol(Symbol::Semicolon).repeated();
    semicolons
        .clone()
        .ignore_then(statement.then_ignore(semicolons).repeated())
        .delimited_by(keyword(Keyword::Begin), keyword(Keyword::End))
}

pub fn statement() -> impl Parser<Token, Statement, Error = Simple<Token>> + Clone {
    recursive(|statement| {
        let branch = compound(statement.clone())
            .map(|statements| Block::new(vec![], statements))
            .or(statement
                .then_ignore(symbol(Symbol::Semicolon).or_not())
                .map(Block::single));

        let assign = name()
            .then_ignore(symbol(Symbol::Assign))
            .then(expression())
            .map(|(name, expr)| Statement::Assign(name, expr));

        let call = name()
            .then(arguments(expression()))
            .map(|(name, args)| Statement::Expression(Expression::call(name, args)));

        let print = keyword(Keyword::Writeln)
            .ignore_then(parenthesized(expression()))
            .map(Statement::Print);

        let read = keyword(Keyword::Readln)
            .ignore_then(arguments(expression()))
            .map(|args| Statement::Expression(Expression::call("readln", args)));

        let if_stmt = keyword(Keyword::If)
            .ignore_then(expression())
            .then_ignore(keyword(Keyword::Then))
            .then(branch.clone())
            .then(keyword(Keyword::Else).ignore_then(branch.clone()).or_not())
            .map(|((condition, then_block), else_block)| {
                Statement::If(IfStmt {
                    condition,
                    then_block,
                    else_block,
                })
            });

        let while_stmt = keyword(Keyword::While)
            .ignore_then(expression())
            .then_ignore(keyword(Keyword::Do))
            .then(branch)
            .map(|(condition, body)| Statement::While(WhileStmt { condition, body }));

        let exit = keyword(Keyword::Exit)
            .ignore_then(parenthesized(expression()))
            .map(Statement::Return);

        choice((assign, call, print, read, if_stmt, while_stmt, exit))
    })
}

fn parenthesized(
    expression: impl Parser<Token, Expression, Error = Simple<Token>> + Clone,
) -> impl Parser<Token, Expression, Error = Simple<Token>> + Clone {
    expression.delimited_by(
        symbol(Symbol::LeftParen),
        symbol(Symbol::RightParen),
    )
}

fn arguments(
    expression: impl Parser<Token, Expression, Error = Simple<Token>> + Clone,
) -> impl Parser<Token, Vec<Expression>, Error = Simple<Token>> + Clone {
    expression
        .separated_by(symbol(Symbol::Comma))
        .delimited_by(
            symbol(Symbol::LeftParen),
            symbol(Symbol::RightParen),
        )
}

pub fn expression() -> impl Parser<Token, Expression, Error = Simple<Token>> + Clone {
    recursive(|expression| {
        let primary = primary_expr(expression);

        let unary = choice((
            symbol(Symbol::Plus).to(false),
            symbol(Symbol::Minus).to(true),
        ))
        .repeated()
        .then(primary)
        .foldr(|negate, expr| {
            if negate {
                Expression::binary(BinaryOp::Sub, Expression::int(0), expr)
            } else {
                expr
            }
        });

        let multiplicative = unary
            .clone()
            .then(multiplicative_op().then(unary).repeated())
            .foldl(|lhs, (op, rhs)| Expression::binary(op, lhs, rhs));

        let additive = multiplicative
            .clone()
            .then(additive_op().then(multiplicative).repeated())
            .foldl(|lhs, (op, rhs)| Expression::binary(op, lhs, rhs));

        additive
            .clone()
            .then(relational_op().then(additive).or_not())
            .map(|(lhs, rhs)| match rhs {
                Some((op, rhs)) => Expression::binary(op, lhs, rhs),
                None => lhs,
            })
    })
}

fn primary_expr(
    expression: impl Parser<Token, Expression, Error = Simple<Token>> + Clone,
) -> impl Parser<Token, Expression, Error = Simple<Token>> + Clone {
    let int = select! { Token::Int(text) => text }.try_map(|text, span| {
        text.parse::<i64>()
            .map(Number::Int)
            .map_err(|err| Simple::custom(span, err.to_string()))
    });
    let float = select! { Token::Float(text) => text }.try_map(|text, span| {
        text.parse::<f64>()
            .map(Number::Float)
            .map_err(|err| Simple::custom(span, err.to_string()))
    });
    let literal = int.or(float).map(Expression::number);

    let cast = cast_type()
        .then(parenthesized(expression.clone()))
        .map(|(destination, expr)| Expression::cast(expr, destination));

    let name_or_call = name()
        .then(arguments(expression.clone()).or_not())
        .map(|(name, args)| match args {
            Some(args) => Expression::call(name, args),
            None => Expression::identifier(name),
        });

    choice((literal, cast, name_or_call, parenthesized(expression)))
}

fn cast_type() -> impl Parser<Token, Type, Error = Simple<Token>> + Clone {
    select! {
        Token::Keyword(Keyword::Integer) => Type::Int32,
        Token::Keyword(Keyword::Longint) => Type::Int64,
        Token::Keyword(Keyword::Unsigned) => Type::Unsigned32,
        Token::Keyword(Keyword::Float) => Type::Float32,
    }
}

fn multiplicative_op() -> impl Parser<Token, BinaryOp, Error = Simple<Token>> + Clone {
    select! {
        Token::Symbol(Symbol::Asterisk) => BinaryOp::Mul,
        Token::Symbol(Symbol::Slash) => BinaryOp::Div,
        Token::Keyword(Keyword::Div) => BinaryOp::Div,
        Token::Keyword(Keyword::Mod) => BinaryOp::Mod,
        Token::Symbol(Symbol::Caret) => BinaryOp::Pow,
    }
}

fn additive_op() -> impl Parser<Token, BinaryOp, Error = Simple<Token>> + Clone {
    select! {
        Token::Symbol(Symbol::Plus) => BinaryOp::Add,
        Token::Symbol(Symbol::Minus) => BinaryOp::Sub,
    }
}

fn relational_op() -> impl Parser<Token, BinaryOp, Error = Simple<Token>> + Clone {
    select! {
        Token::Symbol(Symbol::Less) => BinaryOp::Lt,
        Token::Symbol(Symbol::LessEqual) => BinaryOp::Le,
        Token::Symbol(Symbol::Greater) => BinaryOp::Gt,
        Token::Symbol(Symbol::GreaterEqual) => BinaryOp::Ge,
        Token::Symbol(Symbol::Equal) => BinaryOp::Eq,
        Token::Symbol(Symbol::NotEqual) => BinaryOp::Ne,
    }
}
