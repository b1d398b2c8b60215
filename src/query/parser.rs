use super::ast::*;
use super::lexer::{Lexeme, Lexer, Token};
use super::operand::parse_operand;
use crate::error::{QueryError, QueryResult};
use crate::field::FieldRegistry;

/// Parse a query string against a registry.
///
/// Field references are resolved and operands coerced here, so every
/// syntax, field and operand error surfaces before any backend runs.
pub fn parse<A>(input: &str, fields: &FieldRegistry<A>) -> QueryResult<Expression> {
    let mut parser = Parser::new(input, fields)?;
    let expression = parser.parse()?;
    tracing::debug!(query = input, parsed = %expression, "parsed query");
    Ok(expression)
}

/// Deepest run of nested `NOT`s and parentheses a query may contain.
/// Parsing and every backend recurse once per level.
pub const MAX_NESTING_DEPTH: usize = 256;

pub struct Parser<'r, A> {
    tokens: Vec<Lexeme>,
    position: usize,
    depth: usize,
    fields: &'r FieldRegistry<A>,
    eof: Lexeme,
}

impl<'r, A> Parser<'r, A> {
    pub fn new(input: &str, fields: &'r FieldRegistry<A>) -> QueryResult<Self> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;

        Ok(Self {
            tokens,
            position: 0,
            depth: 0,
            fields,
            eof: Lexeme {
                token: Token::Eof,
                position: input.chars().count(),
            },
        })
    }

    fn current(&self) -> &Lexeme {
        self.tokens.get(self.position).unwrap_or(&self.eof)
    }

    fn current_token(&self) -> &Token {
        &self.current().token
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::syntax(self.current().position, message)
    }

    fn enter(&mut self) -> QueryResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(format!(
                "query nested too deeply (more than {} levels)",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn expect(&mut self, expected: Token, what: &str) -> QueryResult<()> {
        if self.current_token() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {}, got {}",
                what,
                describe(self.current_token())
            )))
        }
    }

    pub fn parse(&mut self) -> QueryResult<Expression> {
        if matches!(self.current_token(), Token::Eof) {
            return Err(self.error("empty query"));
        }

        let expression = self.parse_expression()?;

        match self.current_token() {
            Token::Eof => Ok(expression),
            Token::RightParen => Err(self.error("unbalanced ')'")),
            other => Err(self.error(format!(
                "expected AND, OR or end of query, got {}",
                describe(other)
            ))),
        }
    }

    fn parse_expression(&mut self) -> QueryResult<Expression> {
        self.parse_or_expression()
    }

    fn parse_or_expression(&mut self) -> QueryResult<Expression> {
        let mut left = self.parse_and_expression()?;

        while matches!(self.current_token(), Token::Or) {
            self.advance();
            let right = self.parse_and_expression()?;
            left = Expression::or(left, right);
        }

        Ok(left)
    }

    fn parse_and_expression(&mut self) -> QueryResult<Expression> {
        let mut left = self.parse_unary_expression()?;

        while matches!(self.current_token(), Token::And) {
            self.advance();
            let right = self.parse_unary_expression()?;
            left = Expression::and(left, right);
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> QueryResult<Expression> {
        if matches!(self.current_token(), Token::Not) {
            self.enter()?;
            self.advance();
            let operand = self.parse_unary_expression()?;
            self.depth -= 1;
            return Ok(Expression::not(operand));
        }
        self.parse_primary_expression()
    }

    fn parse_primary_expression(&mut self) -> QueryResult<Expression> {
        match self.current_token() {
            Token::LeftParen => {
                self.enter()?;
                let open = self.current().position;
                self.advance();
                let inner = self.parse_expression()?;
                if !matches!(self.current_token(), Token::RightParen) {
                    return Err(QueryError::syntax(
                        open,
                        format!("unbalanced '(': got {}", describe(self.current_token())),
                    ));
                }
                self.advance();
                self.depth -= 1;
                Ok(inner)
            }
            Token::Word(_) | Token::Quoted { .. } => self.parse_condition(),
            other => Err(self.error(format!(
                "expected a condition or '(', got {}",
                describe(other)
            ))),
        }
    }

    fn parse_condition(&mut self) -> QueryResult<Expression> {
        let (value, raw) = match self.current_token() {
            Token::Word(w) => (w.clone(), w.clone()),
            Token::Quoted { value, raw } => (value.clone(), raw.clone()),
            other => return Err(self.error(format!("expected an operand, got {}", describe(other)))),
        };
        self.advance();

        self.expect(Token::LeftBracket, &format!("'[' after operand {}", raw))?;

        let name = if let Token::Word(name) = self.current_token() {
            let n = name.clone();
            self.advance();
            n
        } else {
            return Err(self.error(format!(
                "expected a field name, got {}",
                describe(self.current_token())
            )));
        };

        self.expect(Token::RightBracket, "']' after field name")?;

        let (index, field) = self.fields.resolve(&name)?;
        let operand = parse_operand(field.field_type, &value)
            .map_err(|e| QueryError::operand(name.as_str(), raw.as_str(), e.0))?;

        Ok(Expression::Condition(Condition {
            field: FieldRef {
                index,
                name: field.full_name.clone(),
            },
            operand,
            raw,
        }))
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::And => "AND".to_string(),
        Token::Or => "OR".to_string(),
        Token::Not => "NOT".to_string(),
        Token::Word(w) => format!("'{}'", w),
        Token::Quoted { raw, .. } => raw.clone(),
        Token::LeftParen => "'('".to_string(),
        Token::RightParen => "')'".to_string(),
        Token::LeftBracket => "'['".to_string(),
        Token::RightBracket => "']'".to_string(),
        Token::Eof => "end of query".to_string(),
    }
}
