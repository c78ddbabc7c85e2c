//! The externally supplied rule records the executor iterates over.

use graphmorph_dsl::RuleType;
use oxigraph::model::vocab::xsd;
use oxigraph::model::{Literal, NamedNode, NamedNodeRef, Term};
use serde::{Deserialize, Serialize};

use crate::executor::TransformError;

/// Primitive datatypes a rule's values may be expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    Boolean,
    Integer,
    Float,
    String,
    DateTime,
    Date,
}

impl PrimitiveType {
    pub fn xsd_datatype(self) -> NamedNodeRef<'static> {
        match self {
            PrimitiveType::Boolean => xsd::BOOLEAN,
            PrimitiveType::Integer => xsd::INTEGER,
            PrimitiveType::Float => xsd::DOUBLE,
            PrimitiveType::String => xsd::STRING,
            PrimitiveType::DateTime => xsd::DATE_TIME,
            PrimitiveType::Date => xsd::DATE,
        }
    }
}

/// What a rule's result values are expected to be: a primitive literal or a
/// reference to another class of the target model. Decides whether the
/// executor emits literals or IRIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum ValueType {
    Primitive(PrimitiveType),
    Reference(String),
}

impl ValueType {
    /// Classify a free-text type cell. Known primitive names map to
    /// [`ValueType::Primitive`]; anything else is a class reference.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "boolean" | "bool" => ValueType::Primitive(PrimitiveType::Boolean),
            "integer" | "int" | "long" => ValueType::Primitive(PrimitiveType::Integer),
            "float" | "double" | "decimal" | "number" => {
                ValueType::Primitive(PrimitiveType::Float)
            }
            "string" | "str" | "text" => ValueType::Primitive(PrimitiveType::String),
            "datetime" | "timestamp" => ValueType::Primitive(PrimitiveType::DateTime),
            "date" => ValueType::Primitive(PrimitiveType::Date),
            _ => ValueType::Reference(text.trim().to_string()),
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, ValueType::Primitive(_))
    }
}

/// One row of the target schema: a `(class, property)` pair in the target
/// model, the rule text that populates it, and how to interpret the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRule {
    /// Target class the populated subjects belong to.
    pub class: String,
    /// Target property the produced values are written under.
    pub property: String,
    /// Free-text rule cell; `None` or empty means "nothing to run".
    pub rule: Option<String>,
    pub rule_type: RuleType,
    pub value_type: ValueType,
    /// Rule disabled by the author; never processed, never counted.
    pub skip: bool,
}

impl PropertyRule {
    pub fn new(
        class: impl Into<String>,
        property: impl Into<String>,
        rule: impl Into<String>,
        rule_type: RuleType,
        value_type: ValueType,
    ) -> Self {
        Self {
            class: class.into(),
            property: property.into(),
            rule: Some(rule.into()),
            rule_type,
            value_type,
            skip: false,
        }
    }
}

/// A caller-supplied, already-materialized triple written after the rule
/// pass, bypassing the rule engine. Subject and predicate must be absolute
/// IRIs; the object is an IRI when it parses as one (quote it to force a
/// literal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl RawTriple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    pub(crate) fn subject_node(&self) -> Result<NamedNode, TransformError> {
        parse_iri(&self.subject)
    }

    pub(crate) fn predicate_node(&self) -> Result<NamedNode, TransformError> {
        parse_iri(&self.predicate)
    }

    pub(crate) fn object_term(&self) -> Result<Term, TransformError> {
        let text = self.object.trim();
        if let Some(quoted) = text
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
        {
            return Ok(Term::Literal(Literal::new_simple_literal(quoted)));
        }
        match parse_iri(text) {
            Ok(node) => Ok(Term::NamedNode(node)),
            Err(_) => Ok(Term::Literal(Literal::new_simple_literal(text))),
        }
    }
}

fn parse_iri(text: &str) -> Result<NamedNode, TransformError> {
    let text = text.trim();
    let bare = text
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(text);
    NamedNode::new(bare).map_err(|_| TransformError::MalformedTriple(text.to_string()))
}
