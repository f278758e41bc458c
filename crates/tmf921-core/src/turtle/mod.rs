//! Turtle (RDF 1.1) parsing for intent expressions.
//!
//! Covers the subset of Turtle that TMF921 intent expressions use:
//! `@prefix`/`PREFIX` and `@base`/`BASE` directives, IRIs and prefixed names,
//! the `a` keyword, string literals (short and long forms) with language tags
//! or datatypes, numeric and boolean literals, blank node labels, blank node
//! property lists and collections.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tmf921_core::turtle;
//!
//! let graph = turtle::parse("@prefix ex: <http://example.org/> . ex:a ex:b ex:c .")?;
//! assert_eq!(graph.triples.len(), 1);
//! ```

mod lexer;
mod parser;

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// A syntax error with the position it was detected at.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}, column {column}: {message} (near `{fragment}`)")]
pub struct TurtleError {
    pub line: usize,
    pub column: usize,
    pub message: String,
    /// Source text starting at the offending position
    pub fragment: String,
}

impl TurtleError {
    const FRAGMENT_LEN: usize = 40;

    pub(crate) fn at(
        source: &str,
        line: usize,
        column: usize,
        offset: usize,
        message: impl Into<String>,
    ) -> Self {
        let rest = source.get(offset..).unwrap_or("");
        let fragment: String = rest
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(Self::FRAGMENT_LEN)
            .collect();

        Self {
            line,
            column,
            message: message.into(),
            fragment: if fragment.is_empty() {
                "<end of input>".to_string()
            } else {
                fragment
            },
        }
    }
}

/// An IRI, remembering the prefixed form it was written in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Iri {
    pub value: String,
    pub compact: Option<String>,
}

impl Iri {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            compact: None,
        }
    }

    /// The part after the last `#` or `/`.
    pub fn local_name(&self) -> &str {
        match self.value.rfind(['#', '/']) {
            Some(pos) => &self.value[pos + 1..],
            None => &self.value,
        }
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.compact {
            Some(compact) => f.write_str(compact),
            None => write!(f, "<{}>", self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Iri(Iri),
    BlankNode(String),
    Literal(Literal),
}

impl Term {
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    /// Local name for IRIs, `None` for blank nodes and literals.
    pub fn local_name(&self) -> Option<&str> {
        self.as_iri().map(Iri::local_name)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => iri.fmt(f),
            Term::BlankNode(label) => write!(f, "_:{}", label),
            Term::Literal(literal) => write!(f, "\"{}\"", literal.lexical),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Iri,
    pub object: Term,
}

/// The parsed form of an intent expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    /// Declared prefixes, prefix label to namespace IRI
    pub prefixes: BTreeMap<String, String>,
    pub triples: Vec<Triple>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Triples whose predicate has the given local name.
    pub fn with_predicate<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Triple> + 'a {
        self.triples
            .iter()
            .filter(move |t| t.predicate.local_name() == local)
    }

    /// Subjects typed (via `rdf:type`) with a class whose local name matches.
    pub fn subjects_of_type<'a>(&'a self, class_local: &'a str) -> impl Iterator<Item = &'a Term> + 'a {
        self.triples
            .iter()
            .filter(move |t| {
                t.predicate.value == RDF_TYPE && t.object.local_name() == Some(class_local)
            })
            .map(|t| &t.subject)
    }

    /// Whether any triple has this IRI as its subject.
    pub fn declares(&self, iri: &Iri) -> bool {
        self.triples
            .iter()
            .any(|t| matches!(&t.subject, Term::Iri(s) if s.value == iri.value))
    }
}

/// Parse a Turtle document into a [`Graph`].
pub fn parse(input: &str) -> Result<Graph, TurtleError> {
    let tokens = lexer::Lexer::new(input).tokenize()?;
    parser::Parser::new(input, tokens).parse_document()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name() {
        assert_eq!(Iri::new("http://x.org/icm#Target").local_name(), "Target");
        assert_eq!(Iri::new("http://x.org/idan/Foo").local_name(), "Foo");
        assert_eq!(Iri::new("urn").local_name(), "urn");
    }

    #[test]
    fn test_error_fragment_is_bounded() {
        let source = format!("x:a {}", "y".repeat(100));
        let err = TurtleError::at(&source, 1, 5, 4, "bad");
        assert_eq!(err.fragment.len(), TurtleError::FRAGMENT_LEN);
    }

    #[test]
    fn test_error_fragment_at_end() {
        let err = TurtleError::at("x:a", 1, 4, 3, "unexpected end");
        assert_eq!(err.fragment, "<end of input>");
        assert!(err.to_string().starts_with("line 1, column 4"));
    }
}
