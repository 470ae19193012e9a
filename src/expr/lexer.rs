//! Tokenizer for the expression language.

use super::parser::ParseError;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Integer(i64),
    Float(f64),
    Str(String),
    /// One of `==`, `!=`, `>`, `>=`, `<`, `<=`.
    Cmp(&'static str),
    Plus,
    Minus,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;
        let token = match c {
            b',' => {
                pos += 1;
                Token::Comma
            }
            b'(' => {
                pos += 1;
                Token::LParen
            }
            b')' => {
                pos += 1;
                Token::RParen
            }
            b'[' => {
                pos += 1;
                Token::LBracket
            }
            b']' => {
                pos += 1;
                Token::RBracket
            }
            b'+' => {
                pos += 1;
                Token::Plus
            }
            b'-' => {
                pos += 1;
                Token::Minus
            }
            b'=' | b'!' | b'<' | b'>' => {
                let (op, len) = match (c, bytes.get(pos + 1)) {
                    (b'=', Some(b'=')) => ("==", 2),
                    (b'!', Some(b'=')) => ("!=", 2),
                    (b'>', Some(b'=')) => (">=", 2),
                    (b'<', Some(b'=')) => ("<=", 2),
                    (b'>', _) => (">", 1),
                    (b'<', _) => ("<", 1),
                    _ => return Err(ParseError::at(input, start, "expected '==' or '!='")),
                };
                pos += len;
                Token::Cmp(op)
            }
            b'\'' | b'"' => {
                let (s, next) = lex_string(input, start)?;
                pos = next;
                Token::Str(s)
            }
            b'0'..=b'9' | b'.' => {
                let (token, next) = lex_number(input, start)?;
                pos = next;
                token
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                while pos < bytes.len() && (bytes[pos] == b'_' || bytes[pos].is_ascii_alphanumeric()) {
                    pos += 1;
                }
                Token::Ident(input[start..pos].to_string())
            }
            _ => return Err(ParseError::at(input, start, "unexpected character")),
        };
        tokens.push(Spanned { token, offset: start });
    }
    Ok(tokens)
}

fn lex_string(input: &str, start: usize) -> Result<(String, usize), ParseError> {
    let mut chars = input[start..].char_indices();
    let quote = chars.next().map(|(_, q)| q).unwrap_or('"');
    let mut out = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, e @ ('\\' | '\'' | '"'))) => out.push(e),
                Some((j, _)) => return Err(ParseError::at(input, start + j - 1, "unknown escape")),
                None => break,
            },
            c if c == quote => return Ok((out, start + i + c.len_utf8())),
            c => out.push(c),
        }
    }
    Err(ParseError::at(input, start, "unterminated string"))
}

fn lex_number(input: &str, start: usize) -> Result<(Token, usize), ParseError> {
    let bytes = input.as_bytes();
    let mut pos = start;
    let mut seen_dot = false;
    while pos < bytes.len() {
        match bytes[pos] {
            b'0'..=b'9' => {}
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        pos += 1;
    }
    if pos < bytes.len() && (bytes[pos] == b'_' || bytes[pos].is_ascii_alphabetic()) {
        return Err(ParseError::at(input, start, "malformed number"));
    }
    let text = &input[start..pos];
    let token = if seen_dot {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| ParseError::at(input, start, "malformed number"))?
    } else {
        text.parse::<i64>()
            .map(Token::Integer)
            .map_err(|_| ParseError::at(input, start, "number out of range"))?
    };
    Ok((token, pos))
}
