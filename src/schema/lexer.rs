//! Tokenizer for the schema IDL. Line comments `//...` and whitespace are
//! skipped; newlines advance a line counter used in parser error messages.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    IntLiteral(i64),
    StringLiteral(String),
    Equals,
    Semicolon,
    LBrace,
    RBrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spanned<T> {
    pub token: T,
    pub line: u32,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
            line: 1,
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.chars.peek() {
                Some((_, c)) if *c == '\n' => {
                    self.line += 1;
                    self.chars.next();
                }
                Some((_, c)) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some((_, '/')) => {
                    let mut clone = self.chars.clone();
                    clone.next();
                    if let Some((_, '/')) = clone.peek() {
                        // Line comment: consume through end of line.
                        while let Some((_, c)) = self.chars.peek() {
                            if *c == '\n' {
                                break;
                            }
                            self.chars.next();
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn read_ident(&mut self, start: usize) -> &'a str {
        let mut end = start;
        while let Some((i, c)) = self.chars.peek() {
            if c.is_alphanumeric() || *c == '_' || *c == '.' {
                end = *i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        &self.src[start..end]
    }

    fn read_number(&mut self, start: usize) -> &'a str {
        let mut end = start;
        while let Some((i, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                end = *i + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        &self.src[start..end]
    }

    fn read_string(&mut self) -> Result<String, LexError> {
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some((_, '"')) => return Ok(s),
                Some((_, c)) => s.push(c),
                None => return Err(LexError::UnterminatedString(self.line)),
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Option<Spanned<Token>>, LexError> {
        self.skip_trivia();
        let line = self.line;
        let (start, c) = match self.chars.peek().copied() {
            Some(pair) => pair,
            None => return Ok(None),
        };
        let token = match c {
            '=' => {
                self.chars.next();
                Token::Equals
            }
            ';' => {
                self.chars.next();
                Token::Semicolon
            }
            '{' => {
                self.chars.next();
                Token::LBrace
            }
            '}' => {
                self.chars.next();
                Token::RBrace
            }
            '"' => {
                self.chars.next();
                Token::StringLiteral(self.read_string()?)
            }
            c if c.is_ascii_digit() => Token::IntLiteral(
                self.read_number(start)
                    .parse()
                    .map_err(|_| LexError::InvalidInteger(line))?,
            ),
            c if c.is_alphabetic() || c == '_' => Token::Ident(self.read_ident(start).to_string()),
            other => return Err(LexError::UnexpectedChar(other, line)),
        };
        Ok(Some(Spanned { token, line }))
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned<Token>>, LexError> {
        let mut tokens = Vec::new();
        while let Some(t) = self.next_token()? {
            tokens.push(t);
        }
        Ok(tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("line {0}: unterminated string literal")]
    UnterminatedString(u32),
    #[error("line {0}: invalid integer literal")]
    InvalidInteger(u32),
    #[error("line {1}: unexpected character '{0}'")]
    UnexpectedChar(char, u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_message_block() {
        let src = r#"message Person { string name = 1; }"#;
        let tokens = Lexer::new(src).tokenize().unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.token).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Ident("message".into()),
                Token::Ident("Person".into()),
                Token::LBrace,
                Token::Ident("string".into()),
                Token::Ident("name".into()),
                Token::Equals,
                Token::IntLiteral(1),
                Token::Semicolon,
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        let src = "// a comment\nmessage Foo {}";
        let tokens = Lexer::new(src).tokenize().unwrap();
        assert_eq!(tokens[0].token, Token::Ident("message".into()));
        assert_eq!(tokens[0].line, 2);
    }

    #[test]
    fn dotted_identifier() {
        let src = "package my.pkg.name;";
        let tokens = Lexer::new(src).tokenize().unwrap();
        assert_eq!(tokens[1].token, Token::Ident("my.pkg.name".into()));
    }

    #[test]
    fn unterminated_string_is_error() {
        let src = r#"syntax = "proto3;"#;
        assert!(Lexer::new(src).tokenize().is_err());
    }
}
