use crate::ast::Number;
use crate::error::{ConfigError, Position};

/// A single lexical token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Number(Number),
    /// A whole preprocessor line: directive name plus the raw remainder,
    /// with `\` line continuations already joined.
    Directive { name: String, text: String },
    Comment(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Semicolon,
    Comma,
    Colon,
    Eq,
    PlusEq,
    Hash,
}

impl TokenKind {
    /// Short human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier `{name}`"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Number(_) => "number".to_string(),
            TokenKind::Directive { name, .. } => format!("`#{name}` directive"),
            TokenKind::Comment(_) => "comment".to_string(),
            TokenKind::LBrace => "`{`".to_string(),
            TokenKind::RBrace => "`}`".to_string(),
            TokenKind::LBracket => "`[`".to_string(),
            TokenKind::RBracket => "`]`".to_string(),
            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
            TokenKind::Semicolon => "`;`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::Colon => "`:`".to_string(),
            TokenKind::Eq => "`=`".to_string(),
            TokenKind::PlusEq => "`+=`".to_string(),
            TokenKind::Hash => "`#`".to_string(),
        }
    }
}

/// Streaming tokenizer for the config.cpp dialect.
///
/// Comments and preprocessor lines are emitted as tokens; the preprocessor
/// consumes directives and drops comments before the structural parser runs.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    index: usize,
    /// Byte offset into `source`, kept alongside the char index so token
    /// positions can be used to slice the original text.
    offset: usize,
    line: usize,
    column: usize,
    /// Only whitespace seen since the last newline; `#` starts a directive
    /// when this holds.
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            index: 0,
            offset: 0,
            line: 1,
            column: 1,
            at_line_start: true,
        }
    }

    /// Tokenize the whole input eagerly.
    pub fn tokenize(source: &'a str) -> Result<Vec<Token>, ConfigError> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.index + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.at_line_start = true;
        } else {
            self.column += 1;
            if !c.is_whitespace() {
                self.at_line_start = false;
            }
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    /// Produce the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, ConfigError> {
        self.skip_whitespace();
        let position = self.position();
        let line_start = self.at_line_start;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };

        let kind = match c {
            '/' if self.peek_at(1) == Some('/') => self.lex_line_comment(),
            '/' if self.peek_at(1) == Some('*') => self.lex_block_comment(position)?,
            '"' => self.lex_string(position)?,
            '#' if line_start => self.lex_directive(),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            ';' => self.single(TokenKind::Semicolon),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            '=' => self.single(TokenKind::Eq),
            '#' => self.single(TokenKind::Hash),
            '+' if self.peek_at(1) == Some('=') => {
                self.bump();
                self.bump();
                TokenKind::PlusEq
            }
            c if c.is_ascii_alphabetic() || c == '_' => self.lex_ident(),
            c if c.is_ascii_digit() => self.lex_number(position)?,
            '-' | '+' if matches!(self.peek_at(1), Some(d) if d.is_ascii_digit() || d == '.') => {
                self.lex_number(position)?
            }
            '.' if matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()) => {
                self.lex_number(position)?
            }
            other => {
                return Err(ConfigError::lex(
                    format!("unexpected character `{other}`"),
                    position,
                ));
            }
        };

        Ok(Some(Token { kind, position }))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn lex_line_comment(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.bump();
        }
        TokenKind::Comment(text)
    }

    fn lex_block_comment(&mut self, start: Position) -> Result<TokenKind, ConfigError> {
        // Nesting is not supported, matching the dialect.
        self.bump();
        self.bump();
        let mut text = String::from("/*");
        loop {
            match self.peek() {
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    text.push_str("*/");
                    return Ok(TokenKind::Comment(text));
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
                None => {
                    return Err(ConfigError::lex("unterminated block comment", start));
                }
            }
        }
    }

    fn lex_string(&mut self, start: Position) -> Result<TokenKind, ConfigError> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.peek() {
                // `""` is the dialect's escaped quote
                Some('"') if self.peek_at(1) == Some('"') => {
                    self.bump();
                    self.bump();
                    text.push('"');
                }
                Some('"') => {
                    self.bump();
                    return Ok(TokenKind::Str(text));
                }
                Some('\n') | None => {
                    return Err(ConfigError::lex("unterminated string literal", start));
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }

    fn lex_ident(&mut self) -> TokenKind {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Ident(name)
    }

    fn lex_number(&mut self, start: Position) -> Result<TokenKind, ConfigError> {
        let mut text = String::new();
        if matches!(self.peek(), Some('-') | Some('+')) {
            text.push(self.bump().unwrap());
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    text.push(c);
                    self.bump();
                }
                '.' => {
                    is_float = true;
                    text.push(c);
                    self.bump();
                }
                'e' | 'E' => {
                    is_float = true;
                    text.push(c);
                    self.bump();
                    if matches!(self.peek(), Some('-') | Some('+')) {
                        text.push(self.bump().unwrap());
                    }
                }
                _ => break,
            }
        }

        let number = if is_float {
            text.parse::<f64>()
                .map(Number::Float)
                .map_err(|_| ConfigError::lex(format!("invalid number `{text}`"), start))?
        } else {
            match text.parse::<i64>() {
                Ok(value) => Number::Int(value),
                // Falls back for integers wider than i64
                Err(_) => text
                    .parse::<f64>()
                    .map(Number::Float)
                    .map_err(|_| ConfigError::lex(format!("invalid number `{text}`"), start))?,
            }
        };
        Ok(TokenKind::Number(number))
    }

    /// Read a `#directive` line, joining `\` continuations.
    fn lex_directive(&mut self) -> TokenKind {
        self.bump(); // '#'
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }

        let mut text = String::new();
        loop {
            match self.peek() {
                Some('\\') if self.rest_of_line_is_continuation() => {
                    self.bump();
                    while matches!(self.peek(), Some(c) if c != '\n') {
                        self.bump();
                    }
                    self.bump(); // newline
                    text.push(' ');
                }
                Some('\n') | None => break,
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
        TokenKind::Directive {
            name,
            text: text.trim().to_string(),
        }
    }

    /// True when a backslash is the last non-whitespace character on the line.
    fn rest_of_line_is_continuation(&self) -> bool {
        let mut ahead = 1;
        while let Some(c) = self.peek_at(ahead) {
            if c == '\n' {
                return true;
            }
            if !c.is_whitespace() {
                return false;
            }
            ahead += 1;
        }
        false
    }

    pub fn source(&self) -> &'a str {
        self.source
    }
}
