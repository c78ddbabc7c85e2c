//! The engine-facing graph handle traits.

use oxigraph::model::{NamedNode, Term, Triple};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("query evaluation failed: {0}")]
    Query(String),
    #[error("query did not produce a SELECT result set")]
    NotASelect,
    #[error("missing binding for variable `{variable}` in query result")]
    MissingBinding { variable: String },
    #[error("unexpected term bound to `{variable}`: {term}")]
    UnexpectedTerm { variable: String, term: String },
    #[error("invalid IRI: {0}")]
    InvalidIri(String),
}

/// Read-only handle to the domain graph being transformed.
pub trait SourceGraph {
    /// Run a SPARQL SELECT query and return, per solution, the terms bound
    /// to `variables` in the given order. A solution missing one of the
    /// variables is an error.
    fn select(&self, query: &str, variables: &[&str]) -> Result<Vec<Vec<Term>>, GraphError>;

    /// Discover the predicates linking any instance of `subject_class` to
    /// any instance of `object_class`.
    ///
    /// This is the one place query compilation reads live data: the rdfpath
    /// syntax names classes, not the edges between them. Kept as a trait
    /// method so tests can stub the probe without a populated store.
    fn probe_predicates(
        &self,
        subject_class: &NamedNode,
        object_class: &NamedNode,
    ) -> Result<Vec<NamedNode>, GraphError> {
        let query = format!(
            "SELECT DISTINCT ?predicate WHERE {{ ?s a {subject_class} . ?o a {object_class} . ?s ?predicate ?o . }}"
        );
        let mut out = Vec::new();
        for mut row in self.select(&query, &["predicate"])? {
            match row.pop() {
                Some(Term::NamedNode(predicate)) => out.push(predicate),
                Some(other) => {
                    return Err(GraphError::UnexpectedTerm {
                        variable: "predicate".to_string(),
                        term: other.to_string(),
                    })
                }
                None => {
                    return Err(GraphError::MissingBinding {
                        variable: "predicate".to_string(),
                    })
                }
            }
        }
        Ok(out)
    }
}

/// Append-only handle to the destination graph.
///
/// `insert` may buffer; `commit` makes previously inserted triples durable.
/// The executor calls `commit` on a fixed insertion cadence and once more at
/// the end of a pass, so implementations only need per-commit durability.
pub trait DestinationGraph {
    fn insert(&mut self, triple: Triple) -> Result<(), GraphError>;
    fn commit(&mut self) -> Result<(), GraphError>;
}
