//! S-expression reader
//!
//! Turns source text into [`Value`] data: numbers, booleans, strings, symbols and
//! nested lists. `'x` is read as `(quote x)`. The reader knows nothing about special
//! forms; [`crate::syntax`] gives the data its meaning.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0, satisfy},
    combinator::{cut, not, opt, recognize, value},
    error::ErrorKind,
    multi::many0,
    sequence::{pair, preceded, terminated},
};
use std::borrow::Cow;

use crate::ast::{NumberType, SYMBOL_SPECIAL_CHARS, Value, is_valid_symbol};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Reader options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseConfig {
    /// Treat `;` up to the end of the line as a comment
    pub handle_comments: bool,
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

/// Blank out `;` comments, leaving string literals alone.
/// Every byte of a comment becomes a space so error offsets still point into the source.
fn strip_comments(input: &str) -> Cow<'_, str> {
    if !input.contains(';') {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut in_comment = false;

    for ch in input.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                output.push(ch);
            } else {
                output.extend(std::iter::repeat_n(' ', ch.len_utf8()));
            }
            continue;
        }

        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        } else if ch == ';' {
            in_comment = true;
            output.push(' ');
            continue;
        }
        output.push(ch);
    }

    Cow::Owned(output)
}

/// First token of the remaining input, for error reports
fn next_token(remaining: &str) -> Option<String> {
    let token: String = remaining
        .trim_start()
        .chars()
        .take_while(|c| !c.is_whitespace())
        .take(10)
        .collect();
    (!token.is_empty()).then_some(token)
}

/// Convert nom parsing errors to structured parse errors
fn to_parse_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            let found = next_token(e.input);
            match e.code {
                ErrorKind::TooLarge => ParseError::with_context(
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                    input,
                    position,
                ),
                ErrorKind::Escaped => ParseError::with_context_and_found(
                    ParseErrorKind::InvalidSyntax,
                    format!("Invalid escape sequence at position {position}"),
                    input,
                    position,
                    found,
                ),
                _ if e.input.trim_start().is_empty() => ParseError::with_context(
                    ParseErrorKind::Incomplete,
                    "Unexpected end of input",
                    input,
                    position,
                ),
                ErrorKind::Char => ParseError::with_context_and_found(
                    ParseErrorKind::InvalidSyntax,
                    format!("Expected character at position {position}"),
                    input,
                    position,
                    found,
                ),
                _ => {
                    let remaining_chars: String = e.input.chars().take(10).collect();
                    ParseError::with_context_and_found(
                        ParseErrorKind::InvalidSyntax,
                        format!("Invalid syntax near '{remaining_chars}'"),
                        input,
                        position,
                        found,
                    )
                }
            }
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input")
        }
    }
}

/// Parse a number (integer only, supports decimal and hexadecimal)
/// A number must not run into symbol characters: `123abc` is neither.
fn parse_number(input: &str) -> IResult<&str, Value> {
    terminated(
        alt((parse_hexadecimal, parse_decimal)),
        not(satisfy(is_symbol_char)),
    )
    .parse(input)
}

fn parse_decimal(input: &str) -> IResult<&str, Value> {
    let (input, number_str) = recognize(pair(
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;

    match number_str.parse::<NumberType>() {
        Ok(n) => Ok((input, Value::Number(n))),
        // Out of range; symbol parsing rejects it too since it starts with digits
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// Parse a hexadecimal number (#x or #X prefix)
fn parse_hexadecimal(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('#').parse(input)?;
    let (input, _) = alt((char('x'), char('X'))).parse(input)?;
    let (input, hex_digits) = take_while1(|c: char| c.is_ascii_hexdigit()).parse(input)?;

    match NumberType::from_str_radix(hex_digits, 16) {
        Ok(n) => Ok((input, Value::Number(n))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::HexDigit,
        ))),
    }
}

/// Parse a boolean (#t or #f)
fn parse_bool(input: &str) -> IResult<&str, Value> {
    terminated(
        alt((
            value(Value::Bool(true), tag("#t")),
            value(Value::Bool(false), tag("#f")),
        )),
        not(satisfy(is_symbol_char)),
    )
    .parse(input)
}

fn parse_symbol(input: &str) -> IResult<&str, Value> {
    let (remaining, candidate) = take_while1(is_symbol_char).parse(input)?;

    if is_valid_symbol(candidate) {
        Ok((remaining, Value::Symbol(candidate.into())))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )))
    }
}

/// Parse a string literal. Past the opening quote, errors are failures.
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut chars = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => return Ok((char_iter.as_str(), Value::String(chars))),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => chars.push('\n'),
                    Some('t') => chars.push('\t'),
                    Some('r') => chars.push('\r'),
                    Some('\\') => chars.push('\\'),
                    Some('"') => chars.push('"'),
                    Some(_) => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            remaining,
                            ErrorKind::Escaped,
                        )));
                    }
                    // Backslash at end of input
                    None => {
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            char_iter.as_str(),
                            ErrorKind::Char,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                chars.push(ch);
                remaining = char_iter.as_str();
            }
            // Unterminated
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    remaining,
                    ErrorKind::Char,
                )));
            }
        }
    }
}

fn parse_list(input: &str, depth: usize) -> IResult<&str, Value> {
    let (input, _) = char('(').parse(input)?;
    let (input, elements) = many0(|input| parse_sexpr(input, depth + 1)).parse(input)?;
    let (input, _) = multispace0.parse(input)?;
    // Once a list is open, a missing ')' is a failure so it is reported where the list ends
    let (input, _) = cut(char(')')).parse(input)?;

    Ok((input, Value::List(elements)))
}

/// Parse quoted expression ('expr -> (quote expr))
fn parse_quote(input: &str, depth: usize) -> IResult<&str, Value> {
    let (input, _) = char('\'').parse(input)?;
    let (input, expr) = parse_sexpr(input, depth + 1)?;

    Ok((
        input,
        Value::List(vec![Value::Symbol("quote".into()), expr]),
    ))
}

/// Parse one datum, skipping leading whitespace
fn parse_sexpr(input: &str, depth: usize) -> IResult<&str, Value> {
    if depth >= MAX_PARSE_DEPTH {
        // A failure, so enclosing lists report the depth instead of a missing ')'
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    preceded(
        multispace0,
        alt((
            |input| parse_quote(input, depth),
            |input| parse_list(input, depth),
            parse_number,
            parse_bool,
            parse_string,
            parse_symbol,
        )),
    )
    .parse(input)
}

fn parse_datum(input: &str) -> Result<Value, Error> {
    match terminated(|input| parse_sexpr(input, 0), multispace0).parse(input) {
        Ok(("", value)) => Ok(value),
        Ok((remaining, _)) => Err(ParseError::with_context_and_found(
            ParseErrorKind::TrailingContent,
            format!("Unexpected remaining input: '{}'", remaining.trim_end()),
            input,
            input.len() - remaining.len(),
            next_token(remaining),
        )
        .into()),
        Err(e) => Err(to_parse_error(input, e).into()),
    }
}

fn parse_data(input: &str) -> Result<Vec<Value>, Error> {
    let mut data = Vec::new();
    let mut rest = input;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(data);
        }
        match parse_sexpr(rest, 0) {
            Ok((remaining, datum)) => {
                data.push(datum);
                rest = remaining;
            }
            Err(e) => return Err(to_parse_error(input, e).into()),
        }
    }
}

/// Parse exactly one S-expression from input.
pub fn parse_scheme(input: &str) -> Result<Value, Error> {
    parse_datum(input)
}

/// Parse exactly one S-expression with reader options.
pub fn parse_scheme_with_config(input: &str, config: ParseConfig) -> Result<Value, Error> {
    if config.handle_comments {
        parse_datum(&strip_comments(input))
    } else {
        parse_datum(input)
    }
}

/// Parse a whole program: zero or more S-expressions separated by whitespace.
pub fn parse_scheme_program(input: &str, config: ParseConfig) -> Result<Vec<Value>, Error> {
    let data = if config.handle_comments {
        parse_data(&strip_comments(input))?
    } else {
        parse_data(input)?
    };
    tracing::trace!(forms = data.len(), "read program");
    Ok(data)
}
