use std::iter::Peekable;
use std::str::Chars;

use super::{Header, Tag};
use crate::error::{Error, Result};

const NONE_VALUE: &str = "(none)";

#[derive(Debug, PartialEq)]
enum Token {
    Literal(String),
    Field { tag: Tag, width: Option<i32> },
    Array(Vec<Token>),
}

impl Header {
    /// Renders a query format such as `%{NAME}-%{VERSION}` against this header.
    ///
    /// Supports `%{TAG}`, padded `%-20{TAG}`, `%%`, backslash escapes and
    /// `[...]` groups iterating over array tags.
    pub fn sprintf(&self, fmt: &str) -> Result<String> {
        let tokens = parse_sequence(&mut fmt.chars().peekable(), false)?;
        let mut out = String::new();
        for token in &tokens {
            self.render(token, None, &mut out);
        }
        Ok(out)
    }

    fn render(&self, token: &Token, element: Option<usize>, out: &mut String) {
        match token {
            Token::Literal(text) => out.push_str(text),
            Token::Field { tag, width } => {
                let values = self.get_as_string_array_or(*tag);
                let value = match (element, values.len()) {
                    (_, 0) => NONE_VALUE,
                    (_, 1) => values[0].as_str(),
                    (Some(i), _) => values.get(i).map_or("", String::as_str),
                    (None, _) => values[0].as_str(),
                };
                out.push_str(&pad(value, *width));
            }
            Token::Array(inner) => {
                let count = inner
                    .iter()
                    .filter_map(|t| match t {
                        Token::Field { tag, .. } => Some(self.get_as_string_array_or(*tag).len()),
                        _ => None,
                    })
                    .max()
                    .unwrap_or(1);
                for i in 0..count {
                    for t in inner {
                        self.render(t, Some(i), out);
                    }
                }
            }
        }
    }
}

fn pad(value: &str, width: Option<i32>) -> String {
    match width {
        Some(w) if w < 0 => format!("{:<1$}", value, w.unsigned_abs() as usize),
        Some(w) => format!("{:>1$}", value, w as usize),
        None => value.to_owned(),
    }
}

fn parse_sequence(chars: &mut Peekable<Chars<'_>>, in_array: bool) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut literal = String::new();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => literal.push('\n'),
                Some('t') => literal.push('\t'),
                Some(other) => literal.push(other),
                None => return Err(Error::Format("trailing backslash".to_owned())),
            },
            '%' if chars.peek() == Some(&'%') => {
                chars.next();
                literal.push('%');
            }
            '%' => {
                flush(&mut literal, &mut tokens);
                tokens.push(parse_field(chars)?);
            }
            '[' if in_array => return Err(Error::Format("nested [ is not supported".to_owned())),
            '[' => {
                flush(&mut literal, &mut tokens);
                tokens.push(Token::Array(parse_sequence(chars, true)?));
            }
            ']' if in_array => {
                flush(&mut literal, &mut tokens);
                return Ok(tokens);
            }
            ']' => return Err(Error::Format("unexpected ]".to_owned())),
            other => literal.push(other),
        }
    }

    if in_array {
        return Err(Error::Format("missing ]".to_owned()));
    }
    flush(&mut literal, &mut tokens);
    Ok(tokens)
}

fn parse_field(chars: &mut Peekable<Chars<'_>>) -> Result<Token> {
    let mut width = String::new();
    while let Some(&c) = chars.peek() {
        if c != '-' && !c.is_ascii_digit() {
            break;
        }
        width.push(c);
        chars.next();
    }

    if chars.next() != Some('{') {
        return Err(Error::Format("missing { after %".to_owned()));
    }

    let mut name = String::new();
    loop {
        match chars.next() {
            Some('}') => break,
            Some(c) => name.push(c),
            None => return Err(Error::Format("missing }".to_owned())),
        }
    }

    if let Some((_, modifier)) = name.split_once(':') {
        return Err(Error::Format(format!("unsupported modifier :{}", modifier)));
    }
    let tag = Tag::from_name(&name).ok_or_else(|| Error::Format(format!("unknown tag: {}", name)))?;
    let width = match width.as_str() {
        "" => None,
        w => Some(
            w.parse()
                .map_err(|_| Error::Format(format!("bad field width: {}", w)))?,
        ),
    };

    Ok(Token::Field { tag, width })
}

fn flush(literal: &mut String, tokens: &mut Vec<Token>) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}
