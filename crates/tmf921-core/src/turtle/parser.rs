//! Recursive-descent parser producing triples from the token stream.

use std::collections::BTreeMap;

use super::lexer::{Spanned, Token};
use super::{Graph, Iri, Literal, Term, Triple, TurtleError, RDF_NS, RDF_TYPE, XSD_NS};

pub(crate) struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
    prefixes: BTreeMap<String, String>,
    base: Option<String>,
    triples: Vec<Triple>,
    blank_counter: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &'a str, tokens: Vec<Spanned>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            prefixes: BTreeMap::new(),
            base: None,
            triples: Vec::new(),
            blank_counter: 0,
        }
    }

    pub(crate) fn parse_document(mut self) -> Result<Graph, TurtleError> {
        while self.peek().is_some() {
            self.parse_statement()?;
        }
        Ok(Graph {
            prefixes: self.prefixes,
            triples: self.triples,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Error positioned at the current token, or at end of input.
    fn error(&self, message: impl Into<String>) -> TurtleError {
        match self.tokens.get(self.pos) {
            Some(spanned) => TurtleError::at(
                self.source,
                spanned.line,
                spanned.column,
                spanned.offset,
                message,
            ),
            None => {
                let line = self.source.lines().count().max(1);
                let column = self.source.lines().last().map(|l| l.chars().count() + 1).unwrap_or(1);
                TurtleError::at(self.source, line, column, self.source.len(), message)
            }
        }
    }

    fn unexpected(&self, expected: &str) -> TurtleError {
        match self.peek() {
            Some(token) => self.error(format!("expected {}, found {}", expected, token.describe())),
            None => self.error(format!("expected {}, found end of input", expected)),
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), TurtleError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn fresh_blank(&mut self) -> Term {
        self.blank_counter += 1;
        Term::BlankNode(format!("b{}", self.blank_counter))
    }

    fn emit(&mut self, subject: Term, predicate: Iri, object: Term) {
        self.triples.push(Triple {
            subject,
            predicate,
            object,
        });
    }

    fn parse_statement(&mut self) -> Result<(), TurtleError> {
        match self.peek() {
            Some(Token::PrefixDirective) => {
                self.pos += 1;
                self.parse_prefix_body()?;
                self.expect(Token::Dot, "'.' after @prefix directive")
            }
            Some(Token::BaseDirective) => {
                self.pos += 1;
                self.parse_base_body()?;
                self.expect(Token::Dot, "'.' after @base directive")
            }
            Some(Token::SparqlPrefix) => {
                self.pos += 1;
                self.parse_prefix_body()
            }
            Some(Token::SparqlBase) => {
                self.pos += 1;
                self.parse_base_body()
            }
            _ => {
                self.parse_triples()?;
                self.expect(Token::Dot, "'.' at end of statement")
            }
        }
    }

    fn parse_prefix_body(&mut self) -> Result<(), TurtleError> {
        let prefix = match self.peek() {
            Some(Token::PrefixedName { prefix, local }) if local.is_empty() => prefix.clone(),
            _ => return Err(self.unexpected("prefix label such as 'icm:'")),
        };
        self.pos += 1;

        let namespace = match self.peek() {
            Some(Token::IriRef(iri)) => self.resolve_relative(iri),
            _ => return Err(self.unexpected("namespace IRI")),
        };
        self.pos += 1;

        self.prefixes.insert(prefix, namespace);
        Ok(())
    }

    fn parse_base_body(&mut self) -> Result<(), TurtleError> {
        let base = match self.peek() {
            Some(Token::IriRef(iri)) => self.resolve_relative(iri),
            _ => return Err(self.unexpected("base IRI")),
        };
        self.pos += 1;
        self.base = Some(base);
        Ok(())
    }

    fn resolve_relative(&self, iri: &str) -> String {
        match &self.base {
            Some(base) if !iri.contains(':') => format!("{}{}", base, iri),
            _ => iri.to_string(),
        }
    }

    fn parse_triples(&mut self) -> Result<(), TurtleError> {
        match self.peek() {
            Some(Token::LBracket) => {
                let subject = self.parse_blank_node_property_list()?;
                // A bare `[ ... ] .` is a complete statement
                if self.peek() != Some(&Token::Dot) {
                    self.parse_predicate_object_list(&subject)?;
                }
                Ok(())
            }
            _ => {
                let subject = self.parse_subject()?;
                self.parse_predicate_object_list(&subject)
            }
        }
    }

    fn parse_subject(&mut self) -> Result<Term, TurtleError> {
        match self.peek() {
            Some(Token::IriRef(_)) | Some(Token::PrefixedName { .. }) => {
                Ok(Term::Iri(self.parse_iri()?))
            }
            Some(Token::BlankNodeLabel(label)) => {
                let term = Term::BlankNode(label.clone());
                self.pos += 1;
                Ok(term)
            }
            Some(Token::LParen) => self.parse_collection(),
            _ => Err(self.unexpected("subject")),
        }
    }

    fn parse_iri(&mut self) -> Result<Iri, TurtleError> {
        match self.peek() {
            Some(Token::IriRef(iri)) => {
                let value = self.resolve_relative(iri);
                self.pos += 1;
                Ok(Iri::new(value))
            }
            Some(Token::PrefixedName { prefix, local }) => {
                let Some(namespace) = self.prefixes.get(prefix) else {
                    return Err(self.error(format!("undeclared prefix '{}:'", prefix)));
                };
                let iri = Iri {
                    value: format!("{}{}", namespace, local),
                    compact: Some(format!("{}:{}", prefix, local)),
                };
                self.pos += 1;
                Ok(iri)
            }
            _ => Err(self.unexpected("IRI")),
        }
    }

    fn parse_predicate_object_list(&mut self, subject: &Term) -> Result<(), TurtleError> {
        let predicate = self.parse_verb()?;
        self.parse_object_list(subject, &predicate)?;

        while self.peek() == Some(&Token::Semicolon) {
            // Repeated and trailing semicolons are allowed
            while self.peek() == Some(&Token::Semicolon) {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(Token::A) | Some(Token::IriRef(_)) | Some(Token::PrefixedName { .. })) {
                let predicate = self.parse_verb()?;
                self.parse_object_list(subject, &predicate)?;
            }
        }
        Ok(())
    }

    fn parse_verb(&mut self) -> Result<Iri, TurtleError> {
        if self.peek() == Some(&Token::A) {
            self.pos += 1;
            return Ok(Iri {
                value: RDF_TYPE.to_string(),
                compact: Some("a".to_string()),
            });
        }
        match self.peek() {
            Some(Token::IriRef(_)) | Some(Token::PrefixedName { .. }) => self.parse_iri(),
            _ => Err(self.unexpected("predicate")),
        }
    }

    fn parse_object_list(&mut self, subject: &Term, predicate: &Iri) -> Result<(), TurtleError> {
        loop {
            let object = self.parse_object()?;
            self.emit(subject.clone(), predicate.clone(), object);
            if self.peek() == Some(&Token::Comma) {
                self.pos += 1;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_object(&mut self) -> Result<Term, TurtleError> {
        match self.peek() {
            Some(Token::IriRef(_)) | Some(Token::PrefixedName { .. }) => {
                Ok(Term::Iri(self.parse_iri()?))
            }
            Some(Token::BlankNodeLabel(label)) => {
                let term = Term::BlankNode(label.clone());
                self.pos += 1;
                Ok(term)
            }
            Some(Token::LBracket) => self.parse_blank_node_property_list(),
            Some(Token::LParen) => self.parse_collection(),
            Some(Token::StringLiteral(_)) => self.parse_string_literal(),
            Some(Token::Integer(_)) => Ok(self.numeric_literal("integer")),
            Some(Token::Decimal(_)) => Ok(self.numeric_literal("decimal")),
            Some(Token::Double(_)) => Ok(self.numeric_literal("double")),
            Some(Token::Boolean(value)) => {
                let lexical = value.to_string();
                self.pos += 1;
                Ok(Term::Literal(Literal {
                    lexical,
                    datatype: Some(format!("{}boolean", XSD_NS)),
                    language: None,
                }))
            }
            _ => Err(self.unexpected("object")),
        }
    }

    fn numeric_literal(&mut self, xsd_type: &str) -> Term {
        let lexical = match self.advance() {
            Some(Token::Integer(v)) | Some(Token::Decimal(v)) | Some(Token::Double(v)) => v,
            _ => String::new(),
        };
        Term::Literal(Literal {
            lexical,
            datatype: Some(format!("{}{}", XSD_NS, xsd_type)),
            language: None,
        })
    }

    fn parse_string_literal(&mut self) -> Result<Term, TurtleError> {
        let Some(Token::StringLiteral(lexical)) = self.advance() else {
            return Err(self.unexpected("string literal"));
        };

        match self.peek() {
            Some(Token::LangTag(tag)) => {
                let language = Some(tag.clone());
                self.pos += 1;
                Ok(Term::Literal(Literal {
                    lexical,
                    datatype: None,
                    language,
                }))
            }
            Some(Token::DatatypeMarker) => {
                self.pos += 1;
                let datatype = self.parse_iri()?;
                Ok(Term::Literal(Literal {
                    lexical,
                    datatype: Some(datatype.value),
                    language: None,
                }))
            }
            _ => Ok(Term::Literal(Literal {
                lexical,
                datatype: None,
                language: None,
            })),
        }
    }

    fn parse_blank_node_property_list(&mut self) -> Result<Term, TurtleError> {
        self.expect(Token::LBracket, "'['")?;
        let node = self.fresh_blank();
        if self.peek() != Some(&Token::RBracket) {
            self.parse_predicate_object_list(&node)?;
        }
        self.expect(Token::RBracket, "']' to close blank node")?;
        Ok(node)
    }

    fn parse_collection(&mut self) -> Result<Term, TurtleError> {
        self.expect(Token::LParen, "'('")?;
        let nil = Term::Iri(Iri::new(format!("{}nil", RDF_NS)));
        let first = Iri::new(format!("{}first", RDF_NS));
        let rest = Iri::new(format!("{}rest", RDF_NS));

        let mut head: Option<Term> = None;
        let mut previous: Option<Term> = None;
        while self.peek() != Some(&Token::RParen) {
            if self.peek().is_none() {
                return Err(self.unexpected("')' to close collection"));
            }
            let item = self.parse_object()?;
            let cell = self.fresh_blank();
            self.emit(cell.clone(), first.clone(), item);
            match previous.take() {
                Some(prev) => self.emit(prev, rest.clone(), cell.clone()),
                None => head = Some(cell.clone()),
            }
            previous = Some(cell);
        }
        self.pos += 1;

        if let Some(last) = previous {
            self.emit(last, rest, nil.clone());
        }
        Ok(head.unwrap_or(nil))
    }
}
