//! Typed transformation rules wrapping a parsed traversal.

use nom::{
    bytes::complete::take_while1,
    character::complete::char as pchar,
    combinator::all_consuming,
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::rdfpath::{parse_traversal, ParseError, Traversal};

/// How a free-text rule cell should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    RdfPath,
    RawLookup,
    Sparql,
}

impl std::str::FromStr for RuleType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rdfpath" => Ok(RuleType::RdfPath),
            "rawlookup" => Ok(RuleType::RawLookup),
            "sparql" => Ok(RuleType::Sparql),
            _ => Err(ParseError::RuleType {
                text: s.to_string(),
            }),
        }
    }
}

/// An external key→value table used to remap literal values, written as
/// `Name(KeyColumn, ValueColumn)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableLookup {
    pub name: String,
    pub key_column: String,
    pub value_column: String,
}

impl TableLookup {
    fn parse(raw: &str) -> Result<Self, ParseError> {
        fn word(input: &str) -> IResult<&str, &str> {
            take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))(input)
        }

        fn parser(input: &str) -> IResult<&str, TableLookup> {
            let (input, name) = word(input)?;
            let (input, _) = pchar('(')(input)?;
            let (input, key_column) = word(input)?;
            let (input, _) = pchar(',')(input)?;
            let (input, value_column) = word(input)?;
            let (input, _) = pchar(')')(input)?;
            Ok((
                input,
                TableLookup {
                    name: name.to_string(),
                    key_column: key_column.to_string(),
                    value_column: value_column.to_string(),
                },
            ))
        }

        all_consuming(parser)(raw)
            .map(|(_, v)| v)
            .map_err(|_| ParseError::TableLookup {
                text: raw.to_string(),
            })
    }
}

impl std::fmt::Display for TableLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({},{})", self.name, self.key_column, self.value_column)
    }
}

/// A parsed transformation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum Rule {
    /// A plain traversal with no value remapping.
    RdfPath { traversal: Traversal },
    /// A traversal whose resulting literal values are substituted via an
    /// external table.
    RawLookup {
        traversal: Traversal,
        table: TableLookup,
    },
    /// Escape hatch: a verbatim SPARQL query, bypassing the compiler. The
    /// query must project `?subject ?predicate ?object`.
    Sparql { query: String },
}

impl Rule {
    pub fn traversal(&self) -> Option<&Traversal> {
        match self {
            Rule::RdfPath { traversal } | Rule::RawLookup { traversal, .. } => Some(traversal),
            Rule::Sparql { .. } => None,
        }
    }
}

fn strip_whitespace(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Parse a free-text rule cell according to its declared [`RuleType`].
pub fn parse_rule(raw: &str, rule_type: RuleType) -> Result<Rule, ParseError> {
    match rule_type {
        RuleType::RdfPath => {
            let stripped = strip_whitespace(raw);
            let traversal = parse_traversal(&stripped)?;
            Ok(Rule::RdfPath { traversal })
        }
        RuleType::RawLookup => {
            let stripped = strip_whitespace(raw);
            let parts: Vec<&str> = stripped.split('|').collect();
            let [path, table] = parts.as_slice() else {
                return Err(ParseError::LookupSplit {
                    text: raw.to_string(),
                });
            };
            let traversal = parse_traversal(path)?;
            let table = TableLookup::parse(table)?;
            Ok(Rule::RawLookup { traversal, table })
        }
        RuleType::Sparql => Ok(Rule::Sparql {
            query: raw.to_string(),
        }),
    }
}

/// Whether the text parses as a plain traversal. Used by upstream rule-sheet
/// validators to classify free-text cells without raising.
pub fn is_rdfpath(raw: &str) -> bool {
    parse_rule(raw, RuleType::RdfPath).is_ok()
}

/// Whether the text parses as a traversal piped through a lookup table.
pub fn is_rawlookup(raw: &str) -> bool {
    parse_rule(raw, RuleType::RawLookup).is_ok()
}
