//! Tokenizer for the viewer script language.
//!
//! Hand-written single-pass scanner. Every token carries the byte offset it
//! started at so parse and eval faults can point back into the source.

use crate::error::{ScriptError, ScriptErrorKind};

/// One lexical token with its source offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was scanned.
    pub kind: TokenKind,
    /// Byte offset of the token's first character.
    pub offset: usize,
}

/// Token kinds of the viewer script language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or variable name.
    Ident(String),
    /// Numeric literal.
    Number(f64),
    /// String literal (quotes and escapes already resolved).
    Str(String),
    /// `let` keyword.
    Let,
    /// `return` keyword.
    Return,
    /// `if` keyword.
    If,
    /// `else` keyword.
    Else,
    /// `true` literal.
    True,
    /// `false` literal.
    False,
    /// `null` literal.
    Null,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// `=`
    Assign,
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
}

/// Tokenizes a complete script source.
///
/// Comments run from `//` to end of line. Strings accept single or double
/// quotes with `\n`, `\t`, `\\` and quote escapes.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let c = bytes[pos];

        match c {
            b' ' | b'\t' | b'\r' | b'\n' => pos += 1,
            b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
            }
            b'0'..=b'9' => {
                let (num, next) = scan_number(source, pos)?;
                tokens.push(Token {
                    kind: TokenKind::Number(num),
                    offset: start,
                });
                pos = next;
            }
            b'"' | b'\'' => {
                let (text, next) = scan_string(source, pos)?;
                tokens.push(Token {
                    kind: TokenKind::Str(text),
                    offset: start,
                });
                pos = next;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let mut end = pos + 1;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let word = &source[pos..end];
                tokens.push(Token {
                    kind: keyword_or_ident(word),
                    offset: start,
                });
                pos = end;
            }
            _ => {
                let (kind, width) = scan_operator(bytes, pos).ok_or_else(|| {
                    ScriptError::new(
                        ScriptErrorKind::Lex,
                        format!("unexpected character '{}'", c as char),
                    )
                    .at(start)
                })?;
                tokens.push(Token {
                    kind,
                    offset: start,
                });
                pos += width;
            }
        }
    }

    Ok(tokens)
}

fn keyword_or_ident(word: &str) -> TokenKind {
    match word {
        "let" => TokenKind::Let,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        _ => TokenKind::Ident(word.to_string()),
    }
}

fn scan_number(source: &str, start: usize) -> Result<(f64, usize), ScriptError> {
    let bytes = source.as_bytes();
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' && bytes.get(end + 1).is_some_and(u8::is_ascii_digit)
    {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    let num = source[start..end].parse::<f64>().map_err(|_| {
        ScriptError::new(ScriptErrorKind::Lex, "malformed number literal").at(start)
    })?;
    Ok((num, end))
}

fn scan_string(source: &str, start: usize) -> Result<(String, usize), ScriptError> {
    let bytes = source.as_bytes();
    let quote = bytes[start];
    let mut text = String::new();
    let mut pos = start + 1;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => {
                let escaped = bytes.get(pos + 1).ok_or_else(|| {
                    ScriptError::new(ScriptErrorKind::Lex, "unterminated escape").at(pos)
                })?;
                match escaped {
                    b'n' => text.push('\n'),
                    b't' => text.push('\t'),
                    b'\\' => text.push('\\'),
                    b'\'' => text.push('\''),
                    b'"' => text.push('"'),
                    other => {
                        return Err(ScriptError::new(
                            ScriptErrorKind::Lex,
                            format!("unknown escape '\\{}'", *other as char),
                        )
                        .at(pos));
                    }
                }
                pos += 2;
            }
            c if c == quote => return Ok((text, pos + 1)),
            _ => {
                // Strings are UTF-8; advance by whole characters.
                let ch = source[pos..].chars().next().ok_or_else(|| {
                    ScriptError::new(ScriptErrorKind::Lex, "invalid utf-8 in string").at(pos)
                })?;
                text.push(ch);
                pos += ch.len_utf8();
            }
        }
    }

    Err(ScriptError::new(ScriptErrorKind::Lex, "unterminated string literal").at(start))
}

fn scan_operator(bytes: &[u8], pos: usize) -> Option<(TokenKind, usize)> {
    let two = |offset: usize| bytes.get(offset).copied();
    match (bytes[pos], two(pos + 1)) {
        (b'=', Some(b'=')) => Some((TokenKind::EqEq, 2)),
        (b'!', Some(b'=')) => Some((TokenKind::NotEq, 2)),
        (b'<', Some(b'=')) => Some((TokenKind::LtEq, 2)),
        (b'>', Some(b'=')) => Some((TokenKind::GtEq, 2)),
        (b'&', Some(b'&')) => Some((TokenKind::AndAnd, 2)),
        (b'|', Some(b'|')) => Some((TokenKind::OrOr, 2)),
        (b'+', _) => Some((TokenKind::Plus, 1)),
        (b'-', _) => Some((TokenKind::Minus, 1)),
        (b'*', _) => Some((TokenKind::Star, 1)),
        (b'/', _) => Some((TokenKind::Slash, 1)),
        (b'%', _) => Some((TokenKind::Percent, 1)),
        (b'<', _) => Some((TokenKind::Lt, 1)),
        (b'>', _) => Some((TokenKind::Gt, 1)),
        (b'!', _) => Some((TokenKind::Bang, 1)),
        (b'=', _) => Some((TokenKind::Assign, 1)),
        (b'?', _) => Some((TokenKind::Question, 1)),
        (b':', _) => Some((TokenKind::Colon, 1)),
        (b'.', _) => Some((TokenKind::Dot, 1)),
        (b',', _) => Some((TokenKind::Comma, 1)),
        (b';', _) => Some((TokenKind::Semicolon, 1)),
        (b'(', _) => Some((TokenKind::LParen, 1)),
        (b')', _) => Some((TokenKind::RParen, 1)),
        (b'[', _) => Some((TokenKind::LBracket, 1)),
        (b']', _) => Some((TokenKind::RBracket, 1)),
        (b'{', _) => Some((TokenKind::LBrace, 1)),
        (b'}', _) => Some((TokenKind::RBrace, 1)),
        _ => None,
    }
}
