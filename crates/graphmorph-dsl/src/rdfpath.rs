//! The `rdfpath` traversal grammar and its typed AST.
//!
//! Grammar (whitespace is stripped by callers before parsing):
//!
//! ```text
//! prefix     := letter [alnum | "-" | "_" | "."]*   (ends alphanumeric)
//! name       := [alnum | "-" | "_" | "."]+          (ends alphanumeric)
//! entity     := prefix ":" name
//! class-only := entity                              -> AllReferences
//! all-props  := entity "(*)"                        -> AllProperties
//! single     := entity "(" entity ")"               -> SingleProperty
//! step       := ("->" | "<-") entity ["(" entity ")"]
//! hop        := entity step+                        -> Hop
//! ```
//!
//! The four traversal shapes are tried in exactly this precedence order;
//! the first match wins.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::char as pchar,
    combinator::{all_consuming, opt, recognize, verify},
    sequence::pair,
    IResult,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("not a valid entity: `{text}`")]
    Entity { text: String },
    #[error("not a valid hop step: `{text}`")]
    Step { text: String },
    #[error("not a valid traversal path: `{text}`")]
    Traversal { text: String },
    #[error("rawlookup rule must contain exactly one `|` separator: `{text}`")]
    LookupSplit { text: String },
    #[error("not a valid table lookup: `{text}`")]
    TableLookup { text: String },
    #[error("unknown rule type: `{text}`")]
    RuleType { text: String },
}

// ============================================================================
// AST
// ============================================================================

/// A namespaced class or property identifier, e.g. `cim:Terminal`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub prefix: String,
    pub suffix: String,
}

impl Entity {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.prefix, self.suffix)
    }
}

impl std::str::FromStr for Entity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all_consuming(entity)(s)
            .map(|(_, e)| e)
            .map_err(|_| ParseError::Entity {
                text: s.to_string(),
            })
    }
}

/// Which side of the connecting edge the step's class sits on.
///
/// `Target` walks forward along an outgoing edge to `class`; `Source` walks
/// backward (the current position is the object of an edge whose subject has
/// type `class`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Source,
    Target,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Source => write!(f, "<-"),
            Direction::Target => write!(f, "->"),
        }
    }
}

/// One hop in a multi-hop traversal.
///
/// `property` is only set on the final step, when the rule asks for a named
/// attribute of the destination class instead of its identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    pub class: Entity,
    pub property: Option<Entity>,
    pub direction: Direction,
}

impl Step {
    /// Parse one hop fragment including its direction marker, e.g.
    /// `->cim:ConnectivityNode` or `<-cim:Substation(cim:name)`.
    pub fn from_fragment(raw: &str) -> Result<Self, ParseError> {
        let (direction, rest) = if let Some(rest) = raw.strip_prefix("->") {
            (Direction::Target, rest)
        } else if let Some(rest) = raw.strip_prefix("<-") {
            (Direction::Source, rest)
        } else {
            return Err(ParseError::Step {
                text: raw.to_string(),
            });
        };

        let (class, property) =
            all_consuming(entity_with_opt_property)(rest)
                .map(|(_, v)| v)
                .map_err(|_| ParseError::Step {
                    text: raw.to_string(),
                })?;

        Ok(Self {
            class,
            property,
            direction,
        })
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.direction, self.class)?;
        if let Some(property) = &self.property {
            write!(f, "({property})")?;
        }
        Ok(())
    }
}

/// A parsed traversal: how to walk from one class to related data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum Traversal {
    /// `entity` — bare identifiers of all instances of `class`.
    AllReferences { class: Entity },
    /// `entity(*)` — every attribute of every instance of `class`.
    AllProperties { class: Entity },
    /// `entity(entity)` — one named attribute of one class.
    SingleProperty { class: Entity, property: Entity },
    /// `entity step+` — an origin class plus one or more directional hops.
    Hop { origin: Entity, steps: Vec<Step> },
}

impl Traversal {
    /// The class the traversal starts from.
    pub fn class(&self) -> &Entity {
        match self {
            Traversal::AllReferences { class }
            | Traversal::AllProperties { class }
            | Traversal::SingleProperty { class, .. } => class,
            Traversal::Hop { origin, .. } => origin,
        }
    }

    /// The terminal property, if the traversal reads a named attribute.
    pub fn property(&self) -> Option<&Entity> {
        match self {
            Traversal::AllReferences { .. } | Traversal::AllProperties { .. } => None,
            Traversal::SingleProperty { property, .. } => Some(property),
            Traversal::Hop { steps, .. } => steps.last().and_then(|s| s.property.as_ref()),
        }
    }
}

impl std::fmt::Display for Traversal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Traversal::AllReferences { class } => write!(f, "{class}"),
            Traversal::AllProperties { class } => write!(f, "{class}(*)"),
            Traversal::SingleProperty { class, property } => write!(f, "{class}({property})"),
            Traversal::Hop { origin, steps } => {
                write!(f, "{origin}")?;
                for step in steps {
                    write!(f, "{step}")?;
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn ends_alphanumeric(s: &str) -> bool {
    s.chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_alphanumeric())
}

fn entity(input: &str) -> IResult<&str, Entity> {
    let (input, prefix) = verify(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic()),
            take_while(is_ident_char),
        )),
        |s: &str| ends_alphanumeric(s),
    )(input)?;
    let (input, _) = pchar(':')(input)?;
    let (input, suffix) = verify(take_while1(is_ident_char), |s: &str| ends_alphanumeric(s))(input)?;
    Ok((
        input,
        Entity {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        },
    ))
}

fn parenthesized_entity(input: &str) -> IResult<&str, Entity> {
    let (input, _) = pchar('(')(input)?;
    let (input, property) = entity(input)?;
    let (input, _) = pchar(')')(input)?;
    Ok((input, property))
}

fn entity_with_opt_property(input: &str) -> IResult<&str, (Entity, Option<Entity>)> {
    pair(entity, opt(parenthesized_entity))(input)
}

fn class_only(input: &str) -> IResult<&str, Traversal> {
    let (input, class) = all_consuming(entity)(input)?;
    Ok((input, Traversal::AllReferences { class }))
}

fn all_properties(input: &str) -> IResult<&str, Traversal> {
    fn parser(input: &str) -> IResult<&str, Traversal> {
        let (input, class) = entity(input)?;
        let (input, _) = tag("(*)")(input)?;
        Ok((input, Traversal::AllProperties { class }))
    }
    all_consuming(parser)(input)
}

fn single_property(input: &str) -> IResult<&str, Traversal> {
    fn parser(input: &str) -> IResult<&str, Traversal> {
        let (input, class) = entity(input)?;
        let (input, property) = parenthesized_entity(input)?;
        Ok((input, Traversal::SingleProperty { class, property }))
    }
    all_consuming(parser)(input)
}

/// Locate the next `->` / `<-` direction marker at or after `from`.
///
/// Markers are two ASCII characters neither of which can terminate an
/// entity, so splitting on them before entity parsing is unambiguous.
fn find_marker(s: &str, from: usize) -> Option<usize> {
    let tail = &s[from..];
    let fwd = tail.find("->");
    let back = tail.find("<-");
    let rel = match (fwd, back) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    Some(from + rel)
}

fn hop(input: &str) -> Result<Traversal, ParseError> {
    let err = || ParseError::Traversal {
        text: input.to_string(),
    };

    let first = find_marker(input, 0).ok_or_else(err)?;
    let origin: Entity = input[..first].parse().map_err(|_| err())?;

    let mut steps = Vec::new();
    let mut cursor = first;
    loop {
        // A fragment runs from one marker to the next (or to the end).
        match find_marker(input, cursor + 2) {
            Some(next) => {
                steps.push(Step::from_fragment(&input[cursor..next])?);
                cursor = next;
            }
            None => {
                steps.push(Step::from_fragment(&input[cursor..])?);
                break;
            }
        }
    }

    // Only the final step may carry a terminal property.
    if steps
        .iter()
        .take(steps.len().saturating_sub(1))
        .any(|s| s.property.is_some())
    {
        return Err(err());
    }

    Ok(Traversal::Hop { origin, steps })
}

/// Parse a whitespace-free rule string into a [`Traversal`].
///
/// The four grammar alternatives are tried in fixed precedence order
/// (class-only, all-properties, single-property, hop); the first match wins.
pub fn parse_traversal(raw: &str) -> Result<Traversal, ParseError> {
    if let Ok((_, t)) = alt((class_only, all_properties, single_property))(raw) {
        return Ok(t);
    }
    hop(raw).map_err(|_| ParseError::Traversal {
        text: raw.to_string(),
    })
}
