//! Graphmorph rule DSL (`rdfpath`)
//!
//! This crate defines the compact traversal syntax used by transformation
//! rules and provides a parser + typed AST for it.
//!
//! A rule cell is one of:
//! - a plain traversal (`rdfpath`), e.g.
//!   `cim:Terminal->cim:ConnectivityNode->cim:Substation(cim:name)`
//! - a traversal piped through a lookup table (`rawlookup`), e.g.
//!   `cim:Terminal->cim:Substation | TableName(OldName, NewName)`
//! - a verbatim SPARQL query (`sparql`), carried untouched.
//!
//! The AST is deliberately store-free: parsed rules are immutable value
//! objects that can be compiled and executed any number of times.

pub mod rdfpath;
pub mod rule;

pub use rdfpath::{parse_traversal, Direction, Entity, ParseError, Step, Traversal};
pub use rule::{is_rawlookup, is_rdfpath, parse_rule, Rule, RuleType, TableLookup};
