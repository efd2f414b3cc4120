use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, AppResult};

lazy_static! {
    static ref ATTRIBUTE_NAME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9\-;.]*$").unwrap();
    static ref HOOK_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").unwrap();
}

/// How the values of a referenced attribute are reduced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeModifier {
    /// Keep every value
    All,
    /// Only the first value
    First,
    /// All values joined with the separator
    Join(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Attribute {
        name: String,
        modifier: AttributeModifier,
    },
    Date,
    Hook {
        name: String,
        argument: Option<String>,
    },
}

/// Parse a mapping expression such as `<givenName:first> <sn:first>` into tokens
pub fn parse_expression(expression: &str) -> AppResult<Vec<Token>> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '<' => {
                let end = find_closing(&chars, i, '>').ok_or_else(|| {
                    malformed(expression, "unterminated attribute reference")
                })?;
                flush_literal(&mut literal, &mut tokens);
                let inner: String = chars[i + 1..end].iter().collect();
                tokens.push(parse_attribute(expression, &inner)?);
                i = end + 1;
            }
            '{' => {
                let end = find_closing(&chars, i, '}')
                    .ok_or_else(|| malformed(expression, "unterminated marker"))?;
                flush_literal(&mut literal, &mut tokens);
                let inner: String = chars[i + 1..end].iter().collect();
                tokens.push(parse_marker(expression, &inner)?);
                i = end + 1;
            }
            ch => {
                literal.push(ch);
                i += 1;
            }
        }
    }
    flush_literal(&mut literal, &mut tokens);

    Ok(tokens)
}

fn find_closing(chars: &[char], start: usize, closing: char) -> Option<usize> {
    // A join separator may itself contain the closing character, e.g. `<cn:join(>)>`
    let mut depth = 0;
    for (offset, ch) in chars[start + 1..].iter().enumerate() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            c if *c == closing && depth == 0 => return Some(start + 1 + offset),
            _ => {}
        }
    }
    None
}

fn flush_literal(literal: &mut String, tokens: &mut Vec<Token>) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}

fn parse_attribute(expression: &str, inner: &str) -> AppResult<Token> {
    let (name, modifier) = match inner.split_once(':') {
        None => (inner.trim(), AttributeModifier::All),
        Some((name, modifier)) => (name.trim(), parse_modifier(expression, modifier)?),
    };

    if !ATTRIBUTE_NAME.is_match(name) {
        return Err(malformed(
            expression,
            &format!("invalid attribute name '{}'", name),
        ));
    }

    Ok(Token::Attribute {
        name: name.to_string(),
        modifier,
    })
}

fn parse_modifier(expression: &str, modifier: &str) -> AppResult<AttributeModifier> {
    if modifier.trim() == "first" {
        return Ok(AttributeModifier::First);
    }
    if let Some(rest) = modifier.strip_prefix("join(") {
        if let Some(separator) = rest.strip_suffix(')') {
            return Ok(AttributeModifier::Join(separator.to_string()));
        }
    }
    Err(malformed(
        expression,
        &format!("unknown attribute modifier '{}'", modifier),
    ))
}

fn parse_marker(expression: &str, inner: &str) -> AppResult<Token> {
    if inner == "DATE" {
        return Ok(Token::Date);
    }
    if let Some(hook) = inner.strip_prefix("hook:") {
        let (name, argument) = match hook.split_once(';') {
            Some((name, argument)) => (name.trim(), Some(argument.trim().to_string())),
            None => (hook.trim(), None),
        };
        if !HOOK_NAME.is_match(name) {
            return Err(malformed(expression, &format!("invalid hook name '{}'", name)));
        }
        return Ok(Token::Hook {
            name: name.to_string(),
            argument,
        });
    }
    Err(malformed(expression, &format!("unknown marker '{{{}}}'", inner)))
}

fn malformed(expression: &str, reason: &str) -> AppError {
    AppError::Configuration(format!(
        "Malformed mapping expression '{}': {}",
        expression, reason
    ))
}
