//! Runs a full transformation pass: every property rule in declaration
//! order, then deduplicated type triples, then caller-supplied extras.

use std::collections::HashMap;
use std::time::Instant;

use graphmorph_dsl::{parse_rule, ParseError, Rule, Traversal};
use graphmorph_store::{DestinationGraph, GraphError, Prefixes, SourceGraph};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{Literal, NamedNode, Term, Triple};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compiler::{CompileError, QueryCompiler};
use crate::lookup::{LookupTable, RawLookupResolver};
use crate::report::{ProcessingReport, ProcessingReportRecord, RuleStatus};
use crate::rules::{PrimitiveType, PropertyRule, RawTriple, ValueType};

/// Destination commits are issued every this many insertions (and once more
/// unconditionally at the end of the pass). Purely a throughput knob for
/// stores with per-commit overhead.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
/// Substituted for raw-lookup values absent from the table.
pub const DEFAULT_MISSING_VALUE: &str = "MISSING";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("unknown lookup table `{0}`")]
    UnknownLookupTable(String),
    #[error("lookup table `{table}` has no column `{column}`")]
    MissingLookupColumn { table: String, column: String },
    #[error("unexpected term in {column} column: {term}")]
    UnexpectedTerm { column: &'static str, term: String },
    #[error("query returned a malformed result row")]
    MalformedRow,
    #[error("invalid IRI: {0}")]
    InvalidIri(String),
    #[error("malformed extra triple: {0}")]
    MalformedTriple(String),
}

/// One-shot transformation pass over a rule set.
///
/// Owns the reshaping policy: the target namespace subjects and properties
/// are re-projected into, the prefix table handed to the compiler, the
/// commit batch size, the raw-lookup missing-value sentinel, and whether a
/// failing rule aborts the pass.
pub struct GraphTransformer {
    target_namespace: String,
    prefixes: Prefixes,
    batch_size: usize,
    missing_value: String,
    stop_on_exception: bool,
}

impl GraphTransformer {
    pub fn new(target_namespace: impl Into<String>, prefixes: Prefixes) -> Self {
        Self {
            target_namespace: target_namespace.into(),
            prefixes,
            batch_size: DEFAULT_BATCH_SIZE,
            missing_value: DEFAULT_MISSING_VALUE.to_string(),
            stop_on_exception: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_missing_value(mut self, missing_value: impl Into<String>) -> Self {
        self.missing_value = missing_value.into();
        self
    }

    pub fn with_stop_on_exception(mut self, stop_on_exception: bool) -> Self {
        self.stop_on_exception = stop_on_exception;
        self
    }

    /// Process every rule in declaration order, then write one deduplicated
    /// `rdf:type` triple per produced subject, then the caller-supplied
    /// `extra_triples`.
    ///
    /// Per-rule failures are recorded in the report and only propagated when
    /// `stop_on_exception` is set; a malformed extra triple is always fatal
    /// since those bypass rule validation entirely. The caller receives a
    /// complete report for every non-stopping run.
    pub fn transform(
        &self,
        source: &dyn SourceGraph,
        rules: &[PropertyRule],
        destination: &mut dyn DestinationGraph,
        extra_triples: &[RawTriple],
        lookup_tables: &HashMap<String, LookupTable>,
    ) -> Result<ProcessingReport, TransformError> {
        let mut report = ProcessingReport::default();
        // subject -> target class; first asserting rule wins, so each
        // subject is typed exactly once across the whole pass.
        let mut typed_subjects: HashMap<NamedNode, NamedNode> = HashMap::new();
        let mut pending = 0usize;

        for rule in rules {
            let Some(expression) = rule.rule.as_deref().filter(|r| !r.trim().is_empty()) else {
                continue;
            };
            if rule.skip {
                continue;
            }

            let row_id = report.records.len();
            let started = Instant::now();
            let outcome = self.apply_rule(
                source,
                rule,
                destination,
                lookup_tables,
                &mut typed_subjects,
                &mut pending,
            );
            let elapsed_seconds = started.elapsed().as_secs_f64();

            match outcome {
                Ok(rows_returned) => {
                    let status = if rows_returned == 0 {
                        RuleStatus::SuccessNoResults
                    } else {
                        RuleStatus::Success
                    };
                    info!(rule = expression, rows = rows_returned, "rule processed");
                    report.record(ProcessingReportRecord {
                        row_id,
                        rule_expression: expression.to_string(),
                        status,
                        error_message: None,
                        elapsed_seconds,
                        rows_returned,
                    });
                }
                // Zero discovered predicates behaves like a query that
                // matched nothing: the rule simply has no data to produce.
                Err(TransformError::Compile(CompileError::NoRelation { .. })) => {
                    info!(rule = expression, "rule matched no relation");
                    report.record(ProcessingReportRecord {
                        row_id,
                        rule_expression: expression.to_string(),
                        status: RuleStatus::SuccessNoResults,
                        error_message: None,
                        elapsed_seconds,
                        rows_returned: 0,
                    });
                }
                Err(error) => {
                    warn!(rule = expression, error = %error, "rule failed");
                    report.record(ProcessingReportRecord {
                        row_id,
                        rule_expression: expression.to_string(),
                        status: RuleStatus::Failed,
                        error_message: Some(error.to_string()),
                        elapsed_seconds,
                        rows_returned: 0,
                    });
                    if self.stop_on_exception {
                        return Err(error);
                    }
                }
            }
        }

        // Type assertions, deduplicated by subject, in a deterministic
        // order.
        let mut assertions: Vec<(NamedNode, NamedNode)> = typed_subjects.into_iter().collect();
        assertions.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        for (subject, class) in assertions {
            let triple = Triple::new(subject, rdf::TYPE.into_owned(), class);
            self.insert_batched(destination, triple, &mut pending)?;
        }

        for raw in extra_triples {
            let triple = Triple::new(
                raw.subject_node()?,
                raw.predicate_node()?,
                raw.object_term()?,
            );
            self.insert_batched(destination, triple, &mut pending)?;
        }

        destination.commit()?;
        info!(
            total_rules = report.total_rules,
            total_failed = report.total_failed,
            "transformation pass finished"
        );
        Ok(report)
    }

    fn apply_rule(
        &self,
        source: &dyn SourceGraph,
        rule: &PropertyRule,
        destination: &mut dyn DestinationGraph,
        lookup_tables: &HashMap<String, LookupTable>,
        typed_subjects: &mut HashMap<NamedNode, NamedNode>,
        pending: &mut usize,
    ) -> Result<usize, TransformError> {
        let raw = rule.rule.as_deref().unwrap_or_default();
        let parsed = parse_rule(raw, rule.rule_type)?;

        let compiler = QueryCompiler::new(source, &self.prefixes);
        let (query, traversal) = match &parsed {
            Rule::Sparql { query } => (query.clone(), None),
            Rule::RdfPath { traversal } => (compiler.compile(traversal)?, Some(traversal)),
            Rule::RawLookup { traversal, .. } => (compiler.compile(traversal)?, Some(traversal)),
        };
        debug!(query = %query, "compiled rule query");

        let rows = source.select(&query, &["subject", "predicate", "object"])?;
        if rows.is_empty() {
            return Ok(0);
        }

        let resolver = match &parsed {
            Rule::RawLookup { table, .. } => {
                let data = lookup_tables
                    .get(&table.name)
                    .ok_or_else(|| TransformError::UnknownLookupTable(table.name.clone()))?;
                Some(RawLookupResolver::new(table, data, &self.missing_value)?)
            }
            _ => None,
        };

        let target_class = self.target_node(&rule.class)?;
        let target_property = self.target_node(&rule.property)?;
        // Wildcard dumps keep the source predicate (and object) verbatim.
        let wildcard = matches!(traversal, Some(Traversal::AllProperties { .. }));

        let rows_returned = rows.len();
        for row in rows {
            let mut terms = row.into_iter();
            let (Some(subject), Some(predicate), Some(object)) =
                (terms.next(), terms.next(), terms.next())
            else {
                return Err(TransformError::MalformedRow);
            };

            let Term::NamedNode(subject) = subject else {
                return Err(TransformError::UnexpectedTerm {
                    column: "subject",
                    term: subject.to_string(),
                });
            };
            let subject = self.renamespace(&subject)?;

            let predicate = if wildcard {
                match predicate {
                    Term::NamedNode(node) => node,
                    other => {
                        return Err(TransformError::UnexpectedTerm {
                            column: "predicate",
                            term: other.to_string(),
                        })
                    }
                }
            } else {
                target_property.clone()
            };

            let object = if wildcard {
                object
            } else {
                self.reshape_object(object, &rule.value_type, resolver.as_ref())?
            };

            self.insert_batched(destination, Triple::new(subject.clone(), predicate, object), pending)?;
            typed_subjects
                .entry(subject)
                .or_insert_with(|| target_class.clone());
        }

        Ok(rows_returned)
    }

    /// Reshape one object term according to the rule's expected value type,
    /// then run it through the raw-lookup resolver if the rule carries one.
    fn reshape_object(
        &self,
        object: Term,
        value_type: &ValueType,
        resolver: Option<&RawLookupResolver>,
    ) -> Result<Term, TransformError> {
        let object = match (object, value_type) {
            // Reference dumps feeding a primitive-typed property: the bare
            // identifier's local name becomes the literal value.
            (Term::NamedNode(node), ValueType::Primitive(primitive)) => {
                let local = local_name(node.as_str());
                let literal = match primitive {
                    PrimitiveType::String => Literal::new_simple_literal(local),
                    typed => Literal::new_typed_literal(local, typed.xsd_datatype().into_owned()),
                };
                Term::Literal(literal)
            }
            (Term::NamedNode(node), ValueType::Reference(_)) => {
                Term::NamedNode(self.renamespace(&node)?)
            }
            (object, _) => object,
        };

        Ok(match (object, resolver) {
            (Term::Literal(literal), Some(resolver)) => Term::Literal(resolver.resolve(&literal)),
            (object, _) => object,
        })
    }

    fn insert_batched(
        &self,
        destination: &mut dyn DestinationGraph,
        triple: Triple,
        pending: &mut usize,
    ) -> Result<(), TransformError> {
        destination.insert(triple)?;
        *pending += 1;
        if *pending >= self.batch_size {
            destination.commit()?;
            *pending = 0;
        }
        Ok(())
    }

    /// Re-project an IRI into the target namespace by local name.
    fn renamespace(&self, node: &NamedNode) -> Result<NamedNode, TransformError> {
        self.target_node(local_name(node.as_str()))
    }

    fn target_node(&self, local: &str) -> Result<NamedNode, TransformError> {
        NamedNode::new(format!("{}{local}", self.target_namespace))
            .map_err(|e| TransformError::InvalidIri(e.to_string()))
    }
}

fn local_name(iri: &str) -> &str {
    iri.rsplit(['#', '/']).next().unwrap_or(iri)
}
