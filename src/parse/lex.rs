use std::fmt;

use chumsky::prelude::Simple;
use chumsky::primitive::{choice, end, just, take_until};
use chumsky::text::{self, TextParser};
use chumsky::Parser;

pub fn lexer() -> impl Parser<char, Vec<Token>, Error = Simple<char>> {
    let comment = just('{').then(take_until(just('}'))).padded();

    token()
        .padded_by(comment.repeated())
        .padded()
        .repeated()
        .then_ignore(end())
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Token {
    Int(String),
    Float(String),
    Symbol(Symbol),
    Keyword(Keyword),
    Name(String),
}

fn token() -> impl Parser<char, Token, Error = Simple<char>> {
    let float = text::digits(10)
        .then_ignore(just('.'))
        .then(text::digits(10))
        .map(|(int, frac)| Token::Float(format!("{int}.{frac}")));

    let int = text::digits(10).map(Token::Int);

    let word = text::ident().map(|ident: String| match keyword(&ident) {
        Some(keyword) => Token::Keyword(keyword),
        None => Token::Name(ident),
    });

    choice((float, int, symbol().map(Token::Symbol), word))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Symbol {
    Assign,
    Colon,
    Semicolon,
    Comma,
    Dot,
    LeftParen,
    RightParen,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Caret,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

fn symbol() -> impl Parser<char, Symbol, Error = Simple<char>> {
    choice((
        just(":=").to(Symbol::Assign),
        just(":").to(Symbol::Colon),
        just(";").to(Symbol::Semicolon),
        just(",").to(Symbol::Comma),
        just(".").to(Symbol::Dot),
        just("(").to(Symbol::LeftParen),
        just(")").to(Symbol::RightParen),
        just("+").to(Symbol::Plus),
        just("-").to(Symbol::Minus),
        just("*").to(Symbol::Asterisk),
        just("/").to(Symbol::Slash),
        just("^").to(Symbol::Caret),
        just("=").to(Symbol::Equal),
        just("<>").to(Symbol::NotEqual),
        just("<=").to(Symbol::LessEqual),
        just("<").to(Symbol::Less),
        just(">=").to(Symbol::GreaterEqual),
        just(">").to(Symbol::Greater),
    ))
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Keyword {
    Program,
    Type,
    Var,
    Function,
    Begin,
    End,
    If,
    Then,
    Else,
    While,
    Do,
    Writeln,
    Readln,
    Exit,
    Div,
    Mod,
    Integer,
    Longint,
    Float,
    Unsigned,
}

fn keyword(ident: &str) -> Option<Keyword> {
    let keyword = match ident {
        "program" => Keyword::Program,
        "type" => Keyword::Type,
        "var" => Keyword::Var,
        "function" => Keyword::Function,
        "begin" => Keyword::Begin,
        "end" => Keyword::End,
        "if" => Keyword::If,
        "then" => Keyword::Then,
        "else" => Keyword::Else,
        "while" => Keyword::While,
        "do" => Keyword::Do,
        "writeln" => Keyword::Writeln,
        "readln" => Keyword::Readln,
        "exit" => Keyword::Exit,
        "div" => Keyword::Div,
        "mod" => Keyword::Mod,
        "integer" => Keyword::Integer,
        "longint" => Keyword::Longint,
        "real" | "float" => Keyword::Float,
        "unsigned" => Keyword::Unsigned,
        _ => return None,
    };
    Some(keyword)
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(text) | Token::Float(text) | Token::Name(text) => f.write_str(text),
            Token::Symbol(symbol) => write!(f, "{symbol:?}"),
            Token::Keyword(keyword) => write!(f, "{}", format!("{keyword:?}").to_lowercase()),
        }
    }
}
