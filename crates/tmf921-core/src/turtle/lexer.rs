//! Tokenizer for the Turtle subset used by TMF921 intent expressions.

use super::TurtleError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// `@prefix`
    PrefixDirective,
    /// `@base`
    BaseDirective,
    /// SPARQL-style `PREFIX`
    SparqlPrefix,
    /// SPARQL-style `BASE`
    SparqlBase,
    /// `<...>`
    IriRef(String),
    /// `prefix:local`, with an empty local part for namespace declarations
    PrefixedName { prefix: String, local: String },
    /// `_:label`
    BlankNodeLabel(String),
    /// Unescaped string contents
    StringLiteral(String),
    /// `@en`, only meaningful directly after a string
    LangTag(String),
    /// `^^`
    DatatypeMarker,
    Integer(String),
    Decimal(String),
    Double(String),
    Boolean(bool),
    /// The `a` keyword
    A,
    Dot,
    Semicolon,
    Comma,
    LBracket,
    RBracket,
    LParen,
    RParen,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::PrefixDirective => "@prefix".to_string(),
            Token::BaseDirective => "@base".to_string(),
            Token::SparqlPrefix => "PREFIX".to_string(),
            Token::SparqlBase => "BASE".to_string(),
            Token::IriRef(iri) => format!("<{}>", iri),
            Token::PrefixedName { prefix, local } => format!("{}:{}", prefix, local),
            Token::BlankNodeLabel(label) => format!("_:{}", label),
            Token::StringLiteral(_) => "string literal".to_string(),
            Token::LangTag(tag) => format!("@{}", tag),
            Token::DatatypeMarker => "^^".to_string(),
            Token::Integer(v) | Token::Decimal(v) | Token::Double(v) => v.clone(),
            Token::Boolean(b) => b.to_string(),
            Token::A => "a".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Semicolon => "';'".to_string(),
            Token::Comma => "','".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

/// A token with the position where it starts.
#[derive(Debug, Clone)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

pub(crate) struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<Spanned>, TurtleError> {
        let mut tokens = Vec::new();
        while let Some(spanned) = self.next_token()? {
            tokens.push(spanned);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(i, _)| *i)
            .unwrap_or(self.source.len())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.source[self.offset()..].starts_with(s)
    }

    fn error_here(&self, line: usize, column: usize, offset: usize, message: impl Into<String>) -> TurtleError {
        TurtleError::at(self.source, line, column, offset, message)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Spanned>, TurtleError> {
        self.skip_trivia();
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let (line, column, offset) = (self.line, self.column, self.offset());
        let token = match c {
            '.' if !self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => {
                self.bump();
                Token::Dot
            }
            ';' => {
                self.bump();
                Token::Semicolon
            }
            ',' => {
                self.bump();
                Token::Comma
            }
            '[' => {
                self.bump();
                Token::LBracket
            }
            ']' => {
                self.bump();
                Token::RBracket
            }
            '(' => {
                self.bump();
                Token::LParen
            }
            ')' => {
                self.bump();
                Token::RParen
            }
            '^' => {
                if self.peek_at(1) == Some('^') {
                    self.bump();
                    self.bump();
                    Token::DatatypeMarker
                } else {
                    return Err(self.error_here(line, column, offset, "expected '^^'"));
                }
            }
            '<' => self.read_iri(line, column, offset)?,
            '"' | '\'' => self.read_string(c, line, column, offset)?,
            '@' => self.read_at_keyword(line, column, offset)?,
            '_' if self.peek_at(1) == Some(':') => {
                self.bump();
                self.bump();
                let label = self.read_name_chars();
                if label.is_empty() {
                    return Err(self.error_here(line, column, offset, "empty blank node label"));
                }
                Token::BlankNodeLabel(label)
            }
            c if c.is_ascii_digit() || c == '+' || c == '-' || c == '.' => {
                self.read_number(line, column, offset)?
            }
            c if c == ':' || is_name_start(c) => self.read_name(line, column, offset)?,
            other => {
                return Err(self.error_here(
                    line,
                    column,
                    offset,
                    format!("unexpected character '{}'", other),
                ))
            }
        };

        Ok(Some(Spanned {
            token,
            line,
            column,
            offset,
        }))
    }

    fn read_iri(&mut self, line: usize, column: usize, offset: usize) -> Result<Token, TurtleError> {
        self.bump();
        let mut iri = String::new();
        loop {
            match self.bump() {
                Some('>') => return Ok(Token::IriRef(iri)),
                Some(c) if c.is_whitespace() || c == '<' || c == '"' => {
                    return Err(self.error_here(
                        line,
                        column,
                        offset,
                        "invalid character in IRI reference",
                    ))
                }
                Some(c) => iri.push(c),
                None => {
                    return Err(self.error_here(line, column, offset, "unterminated IRI reference"))
                }
            }
        }
    }

    fn read_string(
        &mut self,
        quote: char,
        line: usize,
        column: usize,
        offset: usize,
    ) -> Result<Token, TurtleError> {
        let long = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        let delimiter: String = std::iter::repeat(quote).take(if long { 3 } else { 1 }).collect();
        for _ in 0..delimiter.len() {
            self.bump();
        }

        let mut value = String::new();
        loop {
            if self.starts_with(&delimiter) {
                for _ in 0..delimiter.len() {
                    self.bump();
                }
                return Ok(Token::StringLiteral(value));
            }
            match self.bump() {
                Some('\\') => value.push(self.read_escape(line, column, offset)?),
                Some('\n') | Some('\r') if !long => {
                    return Err(self.error_here(line, column, offset, "unterminated string literal"))
                }
                Some(c) => value.push(c),
                None => {
                    return Err(self.error_here(line, column, offset, "unterminated string literal"))
                }
            }
        }
    }

    fn read_escape(&mut self, line: usize, column: usize, offset: usize) -> Result<char, TurtleError> {
        let escaped = match self.bump() {
            Some('t') => '\t',
            Some('b') => '\u{8}',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('f') => '\u{c}',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('\\') => '\\',
            Some('u') => return self.read_unicode_escape(4, line, column, offset),
            Some('U') => return self.read_unicode_escape(8, line, column, offset),
            _ => return Err(self.error_here(line, column, offset, "invalid escape sequence")),
        };
        Ok(escaped)
    }

    fn read_unicode_escape(
        &mut self,
        digits: usize,
        line: usize,
        column: usize,
        offset: usize,
    ) -> Result<char, TurtleError> {
        let mut hex = String::with_capacity(digits);
        for _ in 0..digits {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => hex.push(c),
                _ => return Err(self.error_here(line, column, offset, "invalid unicode escape")),
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error_here(line, column, offset, "invalid unicode code point"))
    }

    fn read_at_keyword(&mut self, line: usize, column: usize, offset: usize) -> Result<Token, TurtleError> {
        self.bump();
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '-' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match word.as_str() {
            "prefix" => Ok(Token::PrefixDirective),
            "base" => Ok(Token::BaseDirective),
            "" => Err(self.error_here(line, column, offset, "dangling '@'")),
            _ => Ok(Token::LangTag(word)),
        }
    }

    fn read_number(&mut self, line: usize, column: usize, offset: usize) -> Result<Token, TurtleError> {
        let mut text = String::new();
        if let Some(sign @ ('+' | '-')) = self.peek() {
            text.push(sign);
            self.bump();
        }

        let mut has_digits = false;
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
            text.push(c);
            self.bump();
            has_digits = true;
        }

        let mut is_decimal = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_decimal = true;
            text.push('.');
            self.bump();
            while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
                text.push(c);
                self.bump();
                has_digits = true;
            }
        }

        if !has_digits {
            return Err(self.error_here(line, column, offset, "malformed numeric literal"));
        }

        if let Some(e @ ('e' | 'E')) = self.peek() {
            text.push(e);
            self.bump();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.bump();
            }
            let mut exponent_digits = false;
            while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
                text.push(c);
                self.bump();
                exponent_digits = true;
            }
            if !exponent_digits {
                return Err(self.error_here(line, column, offset, "malformed exponent"));
            }
            return Ok(Token::Double(text));
        }

        Ok(if is_decimal {
            Token::Decimal(text)
        } else {
            Token::Integer(text)
        })
    }

    /// Read name characters, allowing interior dots but not a trailing one.
    fn read_name_chars(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                name.push(c);
                self.bump();
            } else if c == '.' && self.peek_at(1).is_some_and(is_name_char) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        name
    }

    fn read_local_part(&mut self, line: usize, column: usize, offset: usize) -> Result<String, TurtleError> {
        let mut local = String::new();
        loop {
            match self.peek() {
                Some(c) if is_name_char(c) || c == ':' || c == '%' => {
                    local.push(c);
                    self.bump();
                }
                Some('.') if self.peek_at(1).is_some_and(|n| is_name_char(n) || n == ':') => {
                    local.push('.');
                    self.bump();
                }
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some(c) if !c.is_whitespace() => local.push(c),
                        _ => {
                            return Err(self.error_here(
                                line,
                                column,
                                offset,
                                "invalid escape in local name",
                            ))
                        }
                    }
                }
                _ => return Ok(local),
            }
        }
    }

    fn read_name(&mut self, line: usize, column: usize, offset: usize) -> Result<Token, TurtleError> {
        let prefix = self.read_name_chars();

        if self.peek() == Some(':') {
            self.bump();
            let local = self.read_local_part(line, column, offset)?;
            return Ok(Token::PrefixedName { prefix, local });
        }

        match prefix.as_str() {
            "a" => Ok(Token::A),
            "true" => Ok(Token::Boolean(true)),
            "false" => Ok(Token::Boolean(false)),
            word if word.eq_ignore_ascii_case("prefix") => Ok(Token::SparqlPrefix),
            word if word.eq_ignore_ascii_case("base") => Ok(Token::SparqlBase),
            word => Err(self.error_here(
                line,
                column,
                offset,
                format!("unexpected bare word '{}' (missing prefix?)", word),
            )),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}
