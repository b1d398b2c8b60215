use crate::error::{QueryError, QueryResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    And,
    Or,
    Not,

    // Operands and field names
    Word(String),
    /// Quoted operand; holds the unescaped contents and the text as written.
    Quoted { value: String, raw: String },

    // Delimiters
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]

    // Special
    Eof,
}

/// A token and the character offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub position: usize,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
}

fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '(' | ')' | '[' | ']' | '"' | '\'')
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            input: chars,
            position: 0,
            current_char,
        }
    }

    fn advance(&mut self) {
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self) -> QueryResult<Token> {
        let start = self.position;
        let Some(quote) = self.current_char else {
            return Err(QueryError::syntax(start, "expected a quoted string"));
        };
        self.advance(); // Skip opening quote

        let mut value = String::new();

        while let Some(ch) = self.current_char {
            if ch == quote {
                self.advance(); // Skip closing quote
                let raw = self.input[start..self.position].iter().collect();
                return Ok(Token::Quoted { value, raw });
            } else if ch == '\\' {
                self.advance();
                if let Some(escaped) = self.current_char {
                    value.push(escaped);
                    self.advance();
                }
            } else {
                value.push(ch);
                self.advance();
            }
        }

        Err(QueryError::syntax(start, "unterminated string"))
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();

        while let Some(ch) = self.current_char {
            if is_delimiter(ch) {
                break;
            }
            word.push(ch);
            self.advance();
        }

        // A word directly followed by '[' is an operand, never a keyword.
        if self.current_char == Some('[') {
            return Token::Word(word);
        }

        match word.to_uppercase().as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            _ => Token::Word(word),
        }
    }

    pub fn next_token(&mut self) -> QueryResult<Lexeme> {
        self.skip_whitespace();
        let position = self.position;

        let token = match self.current_char {
            None => Token::Eof,

            Some('"') | Some('\'') => self.read_string()?,

            Some('(') => { self.advance(); Token::LeftParen }
            Some(')') => { self.advance(); Token::RightParen }
            Some('[') => { self.advance(); Token::LeftBracket }
            Some(']') => { self.advance(); Token::RightBracket }

            Some(ch) if ch.is_ascii_graphic() => self.read_word(),

            Some(ch) => {
                return Err(QueryError::syntax(
                    position,
                    format!("unexpected character: {}", ch),
                ));
            }
        };

        Ok(Lexeme { token, position })
    }

    pub fn tokenize(&mut self) -> QueryResult<Vec<Lexeme>> {
        let mut tokens = Vec::new();

        loop {
            let lexeme = self.next_token()?;
            if lexeme.token == Token::Eof {
                tokens.push(lexeme);
                break;
            }
            tokens.push(lexeme);
        }

        Ok(tokens)
    }
}
