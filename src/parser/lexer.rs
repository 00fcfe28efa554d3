//! Tokenizer for the ISL set/map text form.
//!
//! Locating brackets and arrows by substring search miscounts on nested
//! brackets inside constraints; this lexer produces a proper token stream
//! with byte offsets instead.

use thiserror::Error;
use unicode_xid::UnicodeXID;

/// A lexical or syntactic error in set/map text.
#[derive(Error, Debug, Clone)]
#[error("{message} at offset {offset}")]
pub struct ParseError {
    /// What went wrong.
    pub message: String,
    /// Byte offset into the input.
    pub offset: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Token kinds of the ISL text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier (dimension, tuple, or parameter name; also `and`).
    Ident(String),
    /// Integer literal.
    Int(i64),
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `->`
    Arrow,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `=`
    Eq,
}

/// A token with its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Kind and payload.
    pub kind: TokenKind,
    /// Start byte offset.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

/// Tokenize ISL set/map text.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c.is_ascii_digit() {
            let mut end = start;
            while let Some(&(i, d)) = chars.peek() {
                if d.is_ascii_digit() {
                    end = i + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let text = &source[start..end];
            let value = text
                .parse::<i64>()
                .map_err(|_| ParseError::new(format!("integer `{}` out of range", text), start))?;
            tokens.push(Token {
                kind: TokenKind::Int(value),
                start,
                end,
            });
            continue;
        }
        if UnicodeXID::is_xid_start(c) || c == '_' {
            let mut end = start + c.len_utf8();
            chars.next();
            while let Some(&(i, d)) = chars.peek() {
                if UnicodeXID::is_xid_continue(d) {
                    end = i + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Ident(source[start..end].to_string()),
                start,
                end,
            });
            continue;
        }
        chars.next();
        let kind = match c {
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '+' => TokenKind::Plus,
            '*' => TokenKind::Star,
            '-' => {
                if bytes.get(start + 1) == Some(&b'>') {
                    chars.next();
                    tokens.push(Token {
                        kind: TokenKind::Arrow,
                        start,
                        end: start + 2,
                    });
                    continue;
                }
                TokenKind::Minus
            }
            '<' => {
                if bytes.get(start + 1) == Some(&b'=') {
                    chars.next();
                    tokens.push(Token {
                        kind: TokenKind::Le,
                        start,
                        end: start + 2,
                    });
                    continue;
                }
                TokenKind::Lt
            }
            '>' => {
                if bytes.get(start + 1) == Some(&b'=') {
                    chars.next();
                    tokens.push(Token {
                        kind: TokenKind::Ge,
                        start,
                        end: start + 2,
                    });
                    continue;
                }
                TokenKind::Gt
            }
            '=' => TokenKind::Eq,
            other => {
                return Err(ParseError::new(
                    format!("unexpected character `{}`", other),
                    start,
                ))
            }
        };
        tokens.push(Token {
            kind,
            start,
            end: start + c.len_utf8(),
        });
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_set() {
        let toks = tokenize("{ S[i, j] : 0 <= i and i < 10 }").unwrap();
        assert_eq!(toks[0].kind, TokenKind::LBrace);
        assert_eq!(toks[1].kind, TokenKind::Ident("S".to_string()));
        assert!(toks.iter().any(|t| t.kind == TokenKind::Le));
        assert_eq!(toks.last().unwrap().kind, TokenKind::RBrace);
    }

    #[test]
    fn test_tokenize_arrow() {
        let toks = tokenize("[N] -> { S[i] -> [i] }").unwrap();
        let arrows = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Arrow)
            .count();
        assert_eq!(arrows, 2);
    }

    #[test]
    fn test_tokenize_error() {
        assert!(tokenize("{ S[i] : i ? 0 }").is_err());
    }
}
