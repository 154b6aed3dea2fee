#![no_main]

use core::fmt;

use itertools::Itertools;
use libfuzzer_sys::{arbitrary::Arbitrary, fuzz_target};

// Builtins and variables
#[derive(Arbitrary, Debug)]
enum SchemeAtom {
    Add, Sub, Mul, Div,
    Quotient, Modulo, Remainder,
    True, False, Nil,
    Greater, GreaterEq,
    Less, LessEq, Eq,

    List, Car, Cdr, Cons, Length,
    Append, Map, Filter, Reduce,
    Apply, CallCc, Display,

    Identifier(u8),
    Integer(i16),
    Real(f32),
}

impl fmt::Display for SchemeAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", match self {
            SchemeAtom::Add => "+",
            SchemeAtom::Sub => "-",
            SchemeAtom::Mul => "*",
            SchemeAtom::Div => "/",
            SchemeAtom::Quotient => "quotient",
            SchemeAtom::Modulo => "modulo",
            SchemeAtom::Remainder => "remainder",
            SchemeAtom::True => "#t",
            SchemeAtom::False => "#f",
            SchemeAtom::Nil => "nil",
            SchemeAtom::Greater => ">",
            SchemeAtom::GreaterEq => ">=",
            SchemeAtom::Less => "<",
            SchemeAtom::LessEq => "<=",
            SchemeAtom::Eq => "=",
            SchemeAtom::List => "list",
            SchemeAtom::Car => "car",
            SchemeAtom::Cdr => "cdr",
            SchemeAtom::Cons => "cons",
            SchemeAtom::Length => "length",
            SchemeAtom::Append => "append",
            SchemeAtom::Map => "map",
            SchemeAtom::Filter => "filter",
            SchemeAtom::Reduce => "reduce",
            SchemeAtom::Apply => "apply",
            SchemeAtom::CallCc => "call/cc",
            SchemeAtom::Display => "display",
            // A small pool of names so definitions and uses meet
            SchemeAtom::Identifier(index) => return write!(f, "v{}", index % 8),
            SchemeAtom::Integer(value) => return write!(f, "{}", value),
            SchemeAtom::Real(value) if value.is_finite() => return write!(f, "{:?}", value),
            SchemeAtom::Real(_) => "0.5",
        })
    }
}

#[derive(Arbitrary, Debug)]
enum SchemeCommand {
    Lambda(Vec<SchemeCommand>),
    Define(Vec<SchemeCommand>),
    If(Vec<SchemeCommand>),
    And(Vec<SchemeCommand>),
    Or(Vec<SchemeCommand>),
    Begin(Vec<SchemeCommand>),
    Let(Vec<SchemeCommand>),
    LetStar(Vec<SchemeCommand>),
    Set(Vec<SchemeCommand>),
    Cond(Vec<SchemeCommand>),
    Quote(Box<SchemeCommand>),
    Quasiquote(Box<SchemeCommand>),
    Unquote(Box<SchemeCommand>),
    Call(Vec<SchemeCommand>),

    Atom(SchemeAtom),
}

fn stringify_arguments(values: &[SchemeCommand]) -> String {
    values.iter()
        .map(SchemeCommand::to_string)
        .join(" ")
}

impl fmt::Display for SchemeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (keyword, args) = match self {
            SchemeCommand::Atom(atom) => return atom.fmt(f),
            SchemeCommand::Quote(datum) => return write!(f, "'{}", datum),
            SchemeCommand::Quasiquote(datum) => return write!(f, "`{}", datum),
            SchemeCommand::Unquote(datum) => return write!(f, ",{}", datum),
            SchemeCommand::Call(args) => return write!(f, "({})", stringify_arguments(args)),
            SchemeCommand::Lambda(args) => ("lambda", args),
            SchemeCommand::Define(args) => ("define", args),
            SchemeCommand::If(args) => ("if", args),
            SchemeCommand::And(args) => ("and", args),
            SchemeCommand::Or(args) => ("or", args),
            SchemeCommand::Begin(args) => ("begin", args),
            SchemeCommand::Let(args) => ("let", args),
            SchemeCommand::LetStar(args) => ("let*", args),
            SchemeCommand::Set(args) => ("set!", args),
            SchemeCommand::Cond(args) => ("cond", args),
        };

        write!(f, "({} {})", keyword, stringify_arguments(args))
    }
}

fuzz_target!(|commands: Vec<SchemeCommand>| {
    // Generated closures can easily call themselves forever
    let mut context = skeme::EvaluationContext::with_output(skeme::OutputPort::captured())
        .with_step_limit(100_000);

    for command in commands {
        let _ = context.evaluate_str(&command.to_string());
        let _ = context.take_output();
    }
});
