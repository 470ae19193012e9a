//! Recursive-descent parser. Precedence, low to high: `or`, `and`,
//! comparison, unary sign, primary.

use std::fmt;

use super::ast::{BoolOp, Expr, Literal, Operator, Sign};
use super::lexer::{tokenize, Spanned, Token};

const FRAGMENT_LEN: usize = 24;

/// Deepest bracket nesting accepted. Parsing and compiling recurse per level.
const MAX_DEPTH: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError {
    pub offset: usize,
    pub fragment: String,
    pub reason: String,
}

impl ParseError {
    pub(crate) fn at(input: &str, offset: usize, reason: impl Into<String>) -> Self {
        let rest = input.get(offset..).unwrap_or("");
        let fragment = if rest.is_empty() {
            "<end of input>".to_string()
        } else {
            rest.chars().take(FRAGMENT_LEN).collect()
        };
        ParseError {
            offset,
            fragment,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot parse `{}` at offset {}: {}", self.fragment, self.offset, self.reason)
    }
}

impl std::error::Error for ParseError {}

/// Parse an expression. A top-level comma list yields [`Expr::Tuple`].
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
        depth: 0,
    };
    if parser.tokens.is_empty() {
        return Err(ParseError::at(input, input.len(), "empty expression"));
    }
    let expr = parser.list(None)?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected token"));
    }
    Ok(expr)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|s| s.offset)
            .unwrap_or(self.input.len())
    }

    fn error(&self, reason: &str) -> ParseError {
        ParseError::at(self.input, self.offset(), reason)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w.eq_ignore_ascii_case(keyword))
    }

    /// `expr ("," expr)* [","]`, terminated by `close` or end of input.
    fn list(&mut self, close: Option<&Token>) -> Result<Expr, ParseError> {
        let first = self.expr()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.peek() == Some(&Token::Comma) {
            self.bump();
            let at_end = match close {
                Some(close) => self.peek() == Some(close),
                None => self.peek().is_none(),
            };
            if at_end {
                break;
            }
            items.push(self.expr()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.bool_chain(BoolOp::Or)
    }

    fn bool_chain(&mut self, op: BoolOp) -> Result<Expr, ParseError> {
        let (keyword, next): (&str, fn(&mut Self) -> Result<Expr, ParseError>) = match op {
            BoolOp::Or => ("or", |p| p.bool_chain(BoolOp::And)),
            BoolOp::And => ("and", Self::comparison),
        };
        let first = next(self)?;
        if !self.peek_keyword(keyword) {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.peek_keyword(keyword) {
            self.bump();
            operands.push(next(self)?);
        }
        Ok(Expr::Bool { op, operands })
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.unary()?;
        let Some(op) = self.operator()? else {
            return Ok(left);
        };
        let right = self.unary()?;
        if self.operator()?.is_some() {
            return Err(self.error("chained comparisons are not supported"));
        }
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Consume a comparison operator if one is next. Leaves the position
    /// untouched when the next token is not an operator.
    fn operator(&mut self) -> Result<Option<Operator>, ParseError> {
        let op = match self.peek() {
            Some(Token::Cmp(cmp)) => {
                let op = match *cmp {
                    "==" => Operator::Eq,
                    "!=" => Operator::Ne,
                    ">" => Operator::Gt,
                    ">=" => Operator::Ge,
                    "<" => Operator::Lt,
                    _ => Operator::Le,
                };
                self.bump();
                return Ok(Some(op));
            }
            Some(Token::Ident(w)) => w.to_ascii_lowercase(),
            _ => return Ok(None),
        };
        let next_is = |p: &Self, word: &str| matches!(p.peek_at(1), Some(Token::Ident(w)) if w.eq_ignore_ascii_case(word));
        let (op, len) = match op.as_str() {
            "in" => (Operator::In, 1),
            "like" => (Operator::Like, 1),
            "is" if next_is(&*self, "not") => (Operator::IsNot, 2),
            "is" => (Operator::Is, 1),
            "not" if next_is(&*self, "in") => (Operator::NotIn, 2),
            "not" => return Err(self.error("negation is not supported")),
            _ => return Ok(None),
        };
        self.pos += len;
        Ok(Some(op))
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let sign = match self.peek() {
            Some(Token::Plus) => Sign::Plus,
            Some(Token::Minus) => Sign::Minus,
            _ => return self.primary(),
        };
        self.bump();
        match self.peek().cloned() {
            Some(Token::Integer(n)) => {
                self.bump();
                Ok(Expr::Literal(Literal::Integer(if sign == Sign::Minus { -n } else { n })))
            }
            Some(Token::Float(n)) => {
                self.bump();
                Ok(Expr::Literal(Literal::Float(if sign == Sign::Minus { -n } else { n })))
            }
            Some(Token::Ident(ref name)) if !is_reserved(name) => {
                self.bump();
                Ok(Expr::Signed {
                    sign,
                    operand: Box::new(Expr::Identifier(name.clone())),
                })
            }
            _ => Err(self.error("a sign must precede a field name or a number")),
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let offset = self.offset();
        let Some(token) = self.bump() else {
            return Err(ParseError::at(self.input, offset, "unexpected end of expression"));
        };
        match token {
            Token::Integer(n) => Ok(Expr::Literal(Literal::Integer(n))),
            Token::Float(n) => Ok(Expr::Literal(Literal::Float(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            Token::Ident(word) => match word.as_str() {
                "true" | "True" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" | "False" => Ok(Expr::Literal(Literal::Bool(false))),
                "null" | "None" => Ok(Expr::Literal(Literal::Null)),
                w if is_reserved(w) => Err(ParseError::at(self.input, offset, "unexpected keyword")),
                _ => Ok(Expr::Identifier(word)),
            },
            Token::LParen => self.group(Token::RParen, false),
            Token::LBracket => self.group(Token::RBracket, true),
            _ => Err(ParseError::at(self.input, offset, "unexpected token")),
        }
    }

    fn group(&mut self, close: Token, always_list: bool) -> Result<Expr, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        if self.peek() == Some(&close) {
            self.bump();
            return Ok(Expr::Tuple(Vec::new()));
        }
        self.depth += 1;
        let inner = self.list(Some(&close));
        self.depth -= 1;
        let inner = inner?;
        if self.peek() != Some(&close) {
            return Err(self.error("unbalanced brackets"));
        }
        self.bump();
        Ok(match inner {
            Expr::Tuple(items) => Expr::Tuple(items),
            single if always_list => Expr::Tuple(vec![single]),
            single => single,
        })
    }
}

fn is_reserved(word: &str) -> bool {
    ["and", "or", "not", "in", "is", "like"]
        .iter()
        .any(|k| word.eq_ignore_ascii_case(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Expr {
        Expr::Identifier(name.into())
    }

    fn int(n: i64) -> Expr {
        Expr::Literal(Literal::Integer(n))
    }

    fn cmp(op: Operator, left: Expr, right: Expr) -> Expr {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn parses_filter_from_query_string() {
        // `+` in the URL arrives as a space
        let expr = parse("employee_number>1200 and office_code==3").unwrap();
        assert_eq!(
            expr,
            Expr::Bool {
                op: BoolOp::And,
                operands: vec![
                    cmp(Operator::Gt, ident("employee_number"), int(1200)),
                    cmp(Operator::Eq, ident("office_code"), int(3)),
                ],
            }
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse("a==1 or b==2 and c==3").unwrap();
        let Expr::Bool { op: BoolOp::Or, operands } = expr else {
            panic!("expected or at the root");
        };
        assert_eq!(operands[0], cmp(Operator::Eq, ident("a"), int(1)));
        assert!(matches!(operands[1], Expr::Bool { op: BoolOp::And, .. }));
    }

    #[test]
    fn parentheses_group() {
        let expr = parse("(a==1 OR b==2) and c==3").unwrap();
        let Expr::Bool { op: BoolOp::And, operands } = expr else {
            panic!("expected and at the root");
        };
        assert!(matches!(operands[0], Expr::Bool { op: BoolOp::Or, .. }));
    }

    #[test]
    fn sort_list_with_signs() {
        let expr = parse("-office_code, firstName, +lastName").unwrap();
        assert_eq!(
            expr,
            Expr::Tuple(vec![
                Expr::Signed {
                    sign: Sign::Minus,
                    operand: Box::new(ident("office_code")),
                },
                ident("firstName"),
                Expr::Signed {
                    sign: Sign::Plus,
                    operand: Box::new(ident("lastName")),
                },
            ])
        );
    }

    #[test]
    fn leading_space_from_decoded_plus_is_ignored() {
        assert_eq!(parse(" firstName").unwrap(), ident("firstName"));
    }

    #[test]
    fn sign_folds_into_numbers() {
        assert_eq!(parse("a > -5").unwrap(), cmp(Operator::Gt, ident("a"), int(-5)));
    }

    #[test]
    fn literals() {
        assert_eq!(parse("null").unwrap(), Expr::Literal(Literal::Null));
        assert_eq!(parse("True").unwrap(), Expr::Literal(Literal::Bool(true)));
        assert_eq!(parse("'x'").unwrap(), Expr::Literal(Literal::String("x".into())));
        assert_eq!(parse("2.5").unwrap(), Expr::Literal(Literal::Float(2.5)));
    }

    #[test]
    fn brackets_always_make_a_list() {
        assert_eq!(parse("[a]").unwrap(), Expr::Tuple(vec![ident("a")]));
        assert_eq!(parse("(a)").unwrap(), ident("a"));
        assert_eq!(parse("a, b,").unwrap(), Expr::Tuple(vec![ident("a"), ident("b")]));
    }

    #[test]
    fn recognises_operators_outside_the_supported_set() {
        assert_eq!(
            parse("a in (1, 2)").unwrap(),
            cmp(Operator::In, ident("a"), Expr::Tuple(vec![int(1), int(2)]))
        );
        assert_eq!(
            parse("a is not null").unwrap(),
            cmp(Operator::IsNot, ident("a"), Expr::Literal(Literal::Null))
        );
    }

    #[test]
    fn deterministic() {
        let input = "a>=1 and (b!='x' or c<2.5)";
        assert_eq!(parse(input).unwrap(), parse(input).unwrap());
    }

    #[test]
    fn errors_name_the_fragment() {
        let err = parse("a == 1 and").unwrap_err();
        assert_eq!(err.fragment, "<end of input>");

        let err = parse("a == 1 )").unwrap_err();
        assert_eq!(err.fragment, ")");
        assert_eq!(err.offset, 7);
    }

    #[test]
    fn rejects_chained_comparison() {
        assert!(parse("1 < a < 5").is_err());
    }

    #[test]
    fn rejects_sign_on_non_identifier() {
        assert!(parse("-(a)").is_err());
        assert!(parse("-'x'").is_err());
    }

    #[test]
    fn nesting_is_capped() {
        let nested = format!("{}a==1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(parse(&nested).is_ok());

        let err = parse(&"(".repeat(10_000)).unwrap_err();
        assert_eq!(err.reason, "expression nested too deeply");
        assert!(parse(&"[".repeat(10_000)).is_err());
    }

    #[test]
    fn rejects_empty_and_unbalanced() {
        assert!(parse("   ").is_err());
        assert!(parse("(a, b").is_err());
        assert!(parse("a,,b").is_err());
    }
}
