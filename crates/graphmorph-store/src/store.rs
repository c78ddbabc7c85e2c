//! In-memory oxigraph-backed implementation of the graph handles.

use oxigraph::io::GraphFormat;
use oxigraph::model::{GraphNameRef, Quad, Term, Triple};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::graph::{DestinationGraph, GraphError, SourceGraph};

/// An embedded triple store usable as both the source and the destination of
/// a transformation pass.
///
/// Writes go through a local buffer: [`DestinationGraph::insert`] only
/// stages a triple, [`DestinationGraph::commit`] flushes the stage to the
/// underlying store. A pass that fails mid-batch therefore leaves committed
/// batches durable and staged triples lost, which is the contract the
/// executor's batching assumes.
pub struct GraphStore {
    store: Store,
    staged: Vec<Triple>,
}

impl GraphStore {
    pub fn new() -> Result<Self, GraphError> {
        Ok(Self {
            store: Store::new().map_err(|e| GraphError::Storage(e.to_string()))?,
            staged: Vec::new(),
        })
    }

    pub fn from_turtle(data: &str) -> Result<Self, GraphError> {
        let graph = Self::new()?;
        graph.load_turtle(data)?;
        Ok(graph)
    }

    /// Load Turtle data into the default graph.
    pub fn load_turtle(&self, data: &str) -> Result<(), GraphError> {
        self.store
            .load_graph(
                data.as_bytes(),
                GraphFormat::Turtle,
                GraphNameRef::DefaultGraph,
                None,
            )
            .map_err(|e| GraphError::Storage(e.to_string()))
    }

    /// Number of committed triples.
    pub fn len(&self) -> Result<usize, GraphError> {
        self.store
            .len()
            .map_err(|e| GraphError::Storage(e.to_string()))
    }

    pub fn is_empty(&self) -> Result<bool, GraphError> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, triple: &Triple) -> Result<bool, GraphError> {
        let quad = Quad::new(
            triple.subject.clone(),
            triple.predicate.clone(),
            triple.object.clone(),
            GraphNameRef::DefaultGraph,
        );
        self.store
            .contains(&quad)
            .map_err(|e| GraphError::Storage(e.to_string()))
    }

    /// All committed triples, sorted, graph names dropped. Intended for
    /// assertions and small exports, not bulk reads.
    pub fn triples(&self) -> Result<Vec<Triple>, GraphError> {
        let mut out = Vec::new();
        for quad in self.store.iter() {
            let quad = quad.map_err(|e| GraphError::Storage(e.to_string()))?;
            out.push(Triple::new(quad.subject, quad.predicate, quad.object));
        }
        out.sort_by_key(|t| t.to_string());
        Ok(out)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl SourceGraph for GraphStore {
    fn select(&self, query: &str, variables: &[&str]) -> Result<Vec<Vec<Term>>, GraphError> {
        let results = self
            .store
            .query(query)
            .map_err(|e| GraphError::Query(e.to_string()))?;
        let QueryResults::Solutions(solutions) = results else {
            return Err(GraphError::NotASelect);
        };

        let mut rows = Vec::new();
        for solution in solutions {
            let solution = solution.map_err(|e| GraphError::Query(e.to_string()))?;
            let mut row = Vec::with_capacity(variables.len());
            for variable in variables {
                let term = solution
                    .get(*variable)
                    .ok_or_else(|| GraphError::MissingBinding {
                        variable: (*variable).to_string(),
                    })?;
                row.push(term.clone());
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

impl DestinationGraph for GraphStore {
    fn insert(&mut self, triple: Triple) -> Result<(), GraphError> {
        self.staged.push(triple);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), GraphError> {
        for triple in self.staged.drain(..) {
            let quad = Quad::new(
                triple.subject,
                triple.predicate,
                triple.object,
                GraphNameRef::DefaultGraph,
            );
            self.store
                .insert(&quad)
                .map_err(|e| GraphError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}
