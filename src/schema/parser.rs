//! Recursive-descent parser over the token stream `lexer` produces. Produces
//! `MessageDef`s the registry stores.

use crate::schema::lexer::{LexError, Lexer, Token};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Message,
    Enum,
}

impl ScalarType {
    fn from_keyword(s: &str) -> Option<Self> {
        Some(match s {
            "double" => ScalarType::Double,
            "float" => ScalarType::Float,
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint32" => ScalarType::Uint32,
            "uint64" => ScalarType::Uint64,
            "sint32" => ScalarType::Sint32,
            "sint64" => ScalarType::Sint64,
            "fixed32" => ScalarType::Fixed32,
            "fixed64" => ScalarType::Fixed64,
            "sfixed32" => ScalarType::Sfixed32,
            "sfixed64" => ScalarType::Sfixed64,
            "bool" => ScalarType::Bool,
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            "enum" => ScalarType::Enum,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub tag: u32,
    pub scalar: ScalarType,
    pub label: Label,
    /// Set when `scalar == ScalarType::Message`: the referenced type's name,
    /// resolved by the registry at encode/decode time rather than at parse
    /// time (forward and self references both work).
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDef {
    pub name: String,
    pub fields: BTreeMap<u32, FieldDef>,
    /// Verbatim source text of the file this message was parsed from, needed
    /// to echo the schema back over Service Discovery.
    pub source_text: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaParseError {
    #[error("line {0}: expected a proto3 syntax declaration")]
    ExpectedSyntaxVer(u32),
    #[error("line {0}: expected a package name")]
    ExpectedPackageName(u32),
    #[error("line {0}: expected a field type")]
    ExpectedFieldType(u32),
    #[error("line {0}: expected a field name")]
    ExpectedFieldName(u32),
    #[error("line {0}: expected a positive integer field tag")]
    ExpectedFieldTag(u32),
    #[error("line {0}: unexpected token")]
    UnexpectedToken(u32),
    #[error("lexer error: {0}")]
    Lex(#[from] LexError),
}

struct Parser {
    tokens: Vec<(Token, u32)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_line(&self) -> u32 {
        self.tokens.get(self.pos).map(|(_, l)| *l).unwrap_or(0)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        t
    }

    fn expect_ident(&mut self, want: &str) -> bool {
        if let Some(Token::Ident(s)) = self.peek() {
            if s == want {
                self.advance();
                return true;
            }
        }
        false
    }
}

/// Parses a schema source file, returning every `message` it defines. The
/// source text is embedded verbatim into each returned `MessageDef`.
pub fn parse_schema(source: &str) -> Result<Vec<MessageDef>, SchemaParseError> {
    let tokens: Vec<(Token, u32)> = Lexer::new(source)
        .tokenize()?
        .into_iter()
        .map(|s| (s.token, s.line))
        .collect();
    let mut parser = Parser { tokens, pos: 0 };
    let mut messages = Vec::new();

    if parser.expect_ident("syntax") {
        if !matches!(parser.peek(), Some(Token::Equals)) {
            return Err(SchemaParseError::ExpectedSyntaxVer(parser.peek_line()));
        }
        parser.advance();
        match parser.advance() {
            Some(Token::StringLiteral(_)) => {}
            _ => return Err(SchemaParseError::ExpectedSyntaxVer(parser.peek_line())),
        }
        if !matches!(parser.peek(), Some(Token::Semicolon)) {
            return Err(SchemaParseError::ExpectedSyntaxVer(parser.peek_line()));
        }
        parser.advance();
    }

    loop {
        match parser.peek().cloned() {
            None => break,
            Some(Token::Ident(ref kw)) if kw == "package" => {
                parser.advance();
                match parser.advance() {
                    Some(Token::Ident(_)) => {}
                    _ => return Err(SchemaParseError::ExpectedPackageName(parser.peek_line())),
                }
                if !matches!(parser.peek(), Some(Token::Semicolon)) {
                    return Err(SchemaParseError::ExpectedPackageName(parser.peek_line()));
                }
                parser.advance();
            }
            Some(Token::Ident(ref kw)) if kw == "message" => {
                parser.advance();
                let name = match parser.advance() {
                    Some(Token::Ident(n)) => n,
                    _ => return Err(SchemaParseError::UnexpectedToken(parser.peek_line())),
                };
                if !matches!(parser.peek(), Some(Token::LBrace)) {
                    return Err(SchemaParseError::UnexpectedToken(parser.peek_line()));
                }
                parser.advance();
                let fields = parse_fields(&mut parser)?;
                messages.push(MessageDef {
                    name,
                    fields,
                    source_text: source.to_string(),
                });
            }
            // Unknown top-level tokens are skipped to forward-accommodate
            // optional qualifiers (`option`, `import`, `service`).
            Some(_) => {
                parser.advance();
            }
        }
    }

    Ok(messages)
}

fn parse_fields(parser: &mut Parser) -> Result<BTreeMap<u32, FieldDef>, SchemaParseError> {
    let mut fields = BTreeMap::new();
    loop {
        match parser.peek() {
            Some(Token::RBrace) => {
                parser.advance();
                return Ok(fields);
            }
            None => return Err(SchemaParseError::UnexpectedToken(parser.peek_line())),
            _ => {}
        }

        let label = match parser.peek() {
            Some(Token::Ident(s)) if s == "optional" => {
                parser.advance();
                Label::Optional
            }
            Some(Token::Ident(s)) if s == "required" => {
                parser.advance();
                Label::Required
            }
            Some(Token::Ident(s)) if s == "repeated" => {
                parser.advance();
                Label::Repeated
            }
            _ => Label::Optional,
        };

        let type_tok = match parser.advance() {
            Some(Token::Ident(s)) => s,
            _ => return Err(SchemaParseError::ExpectedFieldType(parser.peek_line())),
        };
        let (scalar, type_name) = match ScalarType::from_keyword(&type_tok) {
            Some(s) => (s, None),
            None => (ScalarType::Message, Some(type_tok)),
        };

        let name = match parser.advance() {
            Some(Token::Ident(s)) => s,
            _ => return Err(SchemaParseError::ExpectedFieldName(parser.peek_line())),
        };

        if !matches!(parser.peek(), Some(Token::Equals)) {
            return Err(SchemaParseError::ExpectedFieldTag(parser.peek_line()));
        }
        parser.advance();

        let tag = match parser.advance() {
            Some(Token::IntLiteral(n)) if n > 0 => n as u32,
            _ => return Err(SchemaParseError::ExpectedFieldTag(parser.peek_line())),
        };

        if !matches!(parser.peek(), Some(Token::Semicolon)) {
            return Err(SchemaParseError::UnexpectedToken(parser.peek_line()));
        }
        parser.advance();

        fields.insert(
            tag,
            FieldDef {
                name,
                tag,
                scalar,
                label,
                type_name,
            },
        );
    }
}
