//! Compiles parsed traversals into SPARQL SELECT queries.
//!
//! Every branch emits the same three-column shape,
//! `SELECT ?subject ?predicate ?object`, so the executor can treat all
//! traversal kinds identically downstream. Multi-hop traversals are the
//! interesting case: the path syntax names classes but not the edges between
//! them, so the connecting predicate of each hop is discovered by probing
//! the source graph while compiling.

use std::collections::HashMap;

use graphmorph_dsl::{Direction, Entity, Traversal};
use graphmorph_store::{GraphError, Prefixes, SourceGraph};
use oxigraph::model::NamedNode;
use thiserror::Error;

/// Predicate tagged onto bare-reference dumps so they stay uniform with
/// property dumps.
pub const IDENTIFIER_PREDICATE: &str = "https://graphmorph.dev/internal#identifier";
/// Predicate placeholder for hops that end on a class rather than a
/// property.
pub const RELATIONSHIP_PREDICATE: &str = "https://graphmorph.dev/internal#relationship";

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("incorrectly set traversal path")]
    MalformedTraversal,
    #[error("unknown prefix `{0}`")]
    UnknownPrefix(String),
    #[error("invalid IRI: {0}")]
    InvalidIri(String),
    #[error(
        "subject and object must have exactly one relation: \
         {found} predicates link {subject_class} to {object_class}"
    )]
    AmbiguousRelation {
        subject_class: String,
        object_class: String,
        found: usize,
    },
    #[error("no relation links {subject_class} to {object_class}")]
    NoRelation {
        subject_class: String,
        object_class: String,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Compiles one [`Traversal`] at a time against a fixed source graph and
/// prefix table.
pub struct QueryCompiler<'a> {
    source: &'a dyn SourceGraph,
    prefixes: &'a Prefixes,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(source: &'a dyn SourceGraph, prefixes: &'a Prefixes) -> Self {
        Self { source, prefixes }
    }

    /// Compile a traversal into a self-contained SELECT query (PREFIX header
    /// included; long-form IRIs shrunk to prefixed names where possible).
    pub fn compile(&self, traversal: &Traversal) -> Result<String, CompileError> {
        let body = match traversal {
            Traversal::AllProperties { class } => {
                let class = self.expand(class)?;
                format!("  ?subject a {class} .\n  ?subject ?predicate ?object .\n")
            }
            Traversal::AllReferences { class } => {
                let class = self.expand(class)?;
                format!(
                    "  ?object a {class} .\n  BIND(?object AS ?subject)\n  BIND(<{IDENTIFIER_PREDICATE}> AS ?predicate)\n"
                )
            }
            Traversal::SingleProperty { class, property } => {
                let class = self.expand(class)?;
                let property = self.expand(property)?;
                format!(
                    "  ?subject a {class} .\n  ?subject {property} ?object .\n  BIND({property} AS ?predicate)\n"
                )
            }
            Traversal::Hop { origin, steps } => self.compile_hop(origin, steps)?,
        };

        let body = self.prefixes.shrink(&body);
        Ok(format!(
            "{}SELECT ?subject ?predicate ?object WHERE {{\n{body}}}",
            self.prefixes.declarations()
        ))
    }

    fn compile_hop(
        &self,
        origin: &Entity,
        steps: &[graphmorph_dsl::Step],
    ) -> Result<String, CompileError> {
        if steps.is_empty() {
            return Err(CompileError::MalformedTraversal);
        }

        let origin_class = self.expand(origin)?;
        let mut body = format!("  ?subject a {origin_class} .\n");

        // Discovery results are cached per (subject class, object class)
        // pair for the duration of this compile call only.
        let mut discovered: HashMap<(String, String), NamedNode> = HashMap::new();
        let mut variables = VariableNames::new();

        let terminal_property = steps
            .last()
            .and_then(|step| step.property.as_ref())
            .map(|property| self.expand(property))
            .transpose()?;

        let mut previous_var = "?subject".to_string();
        let mut previous_class = origin_class;

        for (index, step) in steps.iter().enumerate() {
            let step_class = self.expand(&step.class)?;
            let is_last = index == steps.len() - 1;

            // The hop that ends the traversal binds ?object directly unless
            // a terminal property still has to be read off it.
            let step_var = if is_last && terminal_property.is_none() {
                "?object".to_string()
            } else {
                variables.fresh(&step.class.suffix)
            };

            let (subject_class, object_class, pattern_subject, pattern_object) =
                match step.direction {
                    Direction::Target => {
                        (&previous_class, &step_class, &previous_var, &step_var)
                    }
                    Direction::Source => (&step_class, &previous_class, &step_var, &previous_var),
                };

            let predicate =
                self.discover_predicate(&mut discovered, subject_class, object_class)?;
            body.push_str(&format!(
                "  {pattern_subject} {predicate} {pattern_object} .\n"
            ));
            body.push_str(&format!("  {step_var} a {step_class} .\n"));

            previous_var = step_var;
            previous_class = step_class;
        }

        match terminal_property {
            Some(property) => {
                body.push_str(&format!("  {previous_var} {property} ?object .\n"));
                body.push_str(&format!("  BIND({property} AS ?predicate)\n"));
            }
            None => {
                body.push_str(&format!(
                    "  BIND(<{RELATIONSHIP_PREDICATE}> AS ?predicate)\n"
                ));
            }
        }

        Ok(body)
    }

    fn discover_predicate(
        &self,
        cache: &mut HashMap<(String, String), NamedNode>,
        subject_class: &NamedNode,
        object_class: &NamedNode,
    ) -> Result<NamedNode, CompileError> {
        let key = (
            subject_class.as_str().to_string(),
            object_class.as_str().to_string(),
        );
        if let Some(predicate) = cache.get(&key) {
            return Ok(predicate.clone());
        }

        let candidates = self.source.probe_predicates(subject_class, object_class)?;
        let predicate = match candidates.as_slice() {
            [] => {
                return Err(CompileError::NoRelation {
                    subject_class: subject_class.to_string(),
                    object_class: object_class.to_string(),
                })
            }
            [only] => only.clone(),
            many => {
                return Err(CompileError::AmbiguousRelation {
                    subject_class: subject_class.to_string(),
                    object_class: object_class.to_string(),
                    found: many.len(),
                })
            }
        };

        cache.insert(key, predicate.clone());
        Ok(predicate)
    }

    fn expand(&self, entity: &Entity) -> Result<NamedNode, CompileError> {
        match self.prefixes.expand(&entity.prefix, &entity.suffix) {
            Ok(node) => Ok(node),
            Err(GraphError::InvalidIri(message)) if message.contains("unknown prefix") => {
                Err(CompileError::UnknownPrefix(entity.prefix.clone()))
            }
            Err(GraphError::InvalidIri(message)) => Err(CompileError::InvalidIri(message)),
            Err(other) => Err(CompileError::Graph(other)),
        }
    }
}

/// Deterministic query-variable names for intermediate hop classes.
struct VariableNames {
    used: HashMap<String, usize>,
}

impl VariableNames {
    fn new() -> Self {
        let mut used = HashMap::new();
        // Never collide with the projected variables.
        for reserved in ["subject", "predicate", "object"] {
            used.insert(reserved.to_string(), 1);
        }
        Self { used }
    }

    fn fresh(&mut self, class_suffix: &str) -> String {
        let mut base: String = class_suffix
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        if !base.starts_with(|c: char| c.is_ascii_alphabetic()) {
            base.insert(0, 'v');
        }

        let count = self.used.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            format!("?{base}")
        } else {
            format!("?{base}{count}")
        }
    }
}
