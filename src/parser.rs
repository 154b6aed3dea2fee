use logos::Logos;

use crate::{error::{SchemeError, SchemeResult}, number::Number, value::Value};


#[derive(Debug, Clone, PartialEq, Logos)]
#[logos(skip r"([ \t\r\n\f]+|;[^\n]*)")]
enum Token<'a> {
    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("'")]
    Quote,

    #[token("`")]
    Quasiquote,

    #[token(",")]
    Unquote,

    #[token(",@")]
    UnquoteSplicing,

    #[regex(r#""([^"\\]|\\(.|\n))*""#, |lex| lex.slice())]
    String(&'a str),

    #[regex(r#"[^ \t\r\n\f()'`,";]+"#, |lex| lex.slice())]
    Atom(&'a str),
}

type ParseResult<O> = Result<O, SchemeError>;


fn lexer(input: &str) -> ParseResult<Vec<Token<'_>>> {
    let mut tokens = vec![];
    let mut tokenizer = Token::lexer(input);

    while let Some(result) = tokenizer.next() {
        match result {
            Ok(token) => tokens.push(token),
            // A string that never closes may still be completed by more input
            Err(_) if tokenizer.slice().starts_with('"') => return Err(SchemeError::UnexpectedEof),
            Err(_) => return Err(SchemeError::Syntax(format!("unexpected character {:?}", tokenizer.slice()))),
        }
    }

    Ok(tokens)
}

fn parse_token<'a, 'b: 'a>(token_recognizer: impl Fn(&'a Token<'b>) -> bool) -> impl Fn(&'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], &'a Token<'b>)> {
    move |tokens| {
        let Some((first, rest)) = tokens.split_first() else { return Err(SchemeError::UnexpectedEof) };
        if !token_recognizer(first) { return Err(SchemeError::Syntax(format!("unexpected token {:?}", first))) }
        Ok((rest, first))
    }
}

fn parse_atom(text: &str) -> Value {
    let text = text.to_lowercase();
    match text.as_str() {
        "#t" | "#true" => Value::Boolean(true),
        "#f" | "#false" => Value::Boolean(false),
        _ => match Number::parse(&text) {
            Some(number) => Value::Number(number),
            None => Value::symbol(&text),
        },
    }
}

fn parse_string(literal: &str) -> Value {
    // A backslash keeps the character after it, whatever it is

    let inner = &literal[1..literal.len() - 1];
    let mut text = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => text.extend(chars.next()),
            c => text.push(c),
        }
    }
    Value::string(&text)
}

/// A datum that has been opened but not yet closed.
enum Open {
    List(Vec<Value>),
    /// A list after its `.`, waiting for the tail datum.
    Dotted(Vec<Value>),
    Abbreviation(&'static str),
}

fn parse_datum<'a, 'b: 'a>(mut tokens: &'a [Token<'b>]) -> ParseResult<(&'a [Token<'b>], Value)> {
    // Open lists and quote prefixes are kept on an explicit stack, so nesting
    // depth is bounded by memory rather than by the native stack

    let mut open: Vec<Open> = vec![];
    loop {
        let Some((first, rest)) = tokens.split_first() else { return Err(SchemeError::UnexpectedEof) };
        tokens = rest;

        let mut datum = match first {
            Token::LeftParen => { open.push(Open::List(vec![])); continue; }
            Token::Quote => { open.push(Open::Abbreviation("quote")); continue; }
            Token::Quasiquote => { open.push(Open::Abbreviation("quasiquote")); continue; }
            Token::Unquote => { open.push(Open::Abbreviation("unquote")); continue; }
            Token::UnquoteSplicing => { open.push(Open::Abbreviation("unquote-splicing")); continue; }
            Token::RightParen => match open.pop() {
                Some(Open::List(items)) => Value::list(items),
                _ => return Err(SchemeError::Syntax("unexpected )".to_owned())),
            },
            Token::Atom(".") => match open.pop() {
                Some(Open::List(items)) if !items.is_empty() => { open.push(Open::Dotted(items)); continue; }
                Some(Open::List(_)) => return Err(SchemeError::Syntax(". must have at least one element before it".to_owned())),
                _ => return Err(SchemeError::Syntax("unexpected .".to_owned())),
            },
            Token::String(literal) => parse_string(literal),
            Token::Atom(atom) => parse_atom(atom),
        };

        // Hand the finished datum to whatever encloses it
        loop {
            match open.pop() {
                None => return Ok((tokens, datum)),
                Some(Open::List(mut items)) => {
                    items.push(datum);
                    open.push(Open::List(items));
                    break;
                }
                Some(Open::Dotted(items)) => {
                    let (rest, _) = parse_token(|token| matches!(token, Token::RightParen))(tokens)?;
                    tokens = rest;
                    datum = Value::list_with_tail(items, datum);
                }
                Some(Open::Abbreviation(keyword)) => datum = Value::list(vec![Value::symbol(keyword), datum]),
            }
        }
    }
}

/// Reads exactly one datum; anything but whitespace and comments after it
/// is a syntax error.
pub fn parse(input: &str) -> SchemeResult<Value> {
    let tokens = lexer(input)?;

    let (tokens, datum) = parse_datum(&tokens)?;
    if !tokens.is_empty() { return Err(SchemeError::Syntax(format!("unexpected {:?} after datum", tokens[0]))); }

    Ok(datum)
}

/// Reads every datum in `input`, in order.
pub fn parse_all(input: &str) -> SchemeResult<Vec<Value>> {
    let tokens = lexer(input)?;

    let mut data = vec![];
    let mut tokens = tokens.as_slice();
    while !tokens.is_empty() {
        let (rest, datum) = parse_datum(tokens)?;
        data.push(datum);
        tokens = rest;
    }

    Ok(data)
}
