//! Token lexer
//!
//! Splits raw arguments into typed tokens. Lexing never fails and knows
//! nothing about flag kinds; anything that is not a well-formed flag token
//! becomes a positional.

use std::fmt;

/// One lexed argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `--name` or `--name=value`
    LongFlag { name: String, value: Option<String> },
    /// `-abc` or `-abc=value`. The first character is always a letter; how
    /// the rest is split between shorthands and a value is up to the resolver.
    ShortCluster { chars: String, value: Option<String> },
    /// A bare `--`
    Separator,
    Positional(String),
}

impl Token {
    pub fn is_flag(&self) -> bool {
        matches!(self, Token::LongFlag { .. } | Token::ShortCluster { .. })
    }

    pub fn as_positional(&self) -> Option<&str> {
        match self {
            Token::Positional(text) => Some(text),
            _ => None,
        }
    }
}

/// Renders the token back to the exact argument it was lexed from
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LongFlag { name, value } => {
                write!(f, "--{}", name)?;
                if let Some(v) = value {
                    write!(f, "={}", v)?;
                }
                Ok(())
            }
            Token::ShortCluster { chars, value } => {
                write!(f, "-{}", chars)?;
                if let Some(v) = value {
                    write!(f, "={}", v)?;
                }
                Ok(())
            }
            Token::Separator => f.write_str("--"),
            Token::Positional(text) => f.write_str(text),
        }
    }
}

/// Lex a full argument list; everything after a `--` is positional
pub fn lex<S: AsRef<str>>(argv: &[S]) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(argv.len());
    let mut after_separator = false;
    for arg in argv {
        let arg = arg.as_ref();
        if after_separator {
            tokens.push(Token::Positional(arg.to_string()));
            continue;
        }
        let token = lex_one(arg);
        after_separator = token == Token::Separator;
        tokens.push(token);
    }
    tokens
}

/// Lex a single argument without separator state
pub fn lex_one(arg: &str) -> Token {
    if arg == "--" {
        return Token::Separator;
    }

    if let Some(rest) = arg.strip_prefix("--") {
        let (name, value) = split_value(rest);
        if !name.is_empty() && !name.starts_with('-') && !name.contains("--") {
            return Token::LongFlag {
                name: name.to_string(),
                value,
            };
        }
        return Token::Positional(arg.to_string());
    }

    if let Some(rest) = arg.strip_prefix('-') {
        let (chars, value) = split_value(rest);
        if chars.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Token::ShortCluster {
                chars: chars.to_string(),
                value,
            };
        }
    }

    Token::Positional(arg.to_string())
}

fn split_value(text: &str) -> (&str, Option<String>) {
    match text.split_once('=') {
        Some((head, value)) => (head, Some(value.to_string())),
        None => (text, None),
    }
}
