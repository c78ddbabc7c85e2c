//! The graphmorph transformation engine.
//!
//! Takes user-authored rules (parsed by `graphmorph-dsl`), compiles each
//! traversal into a SPARQL SELECT against the source graph, reshapes the
//! resulting rows into the target data model, optionally remaps literal
//! values through external lookup tables, and appends the produced triples
//! to a destination graph in batches while accumulating a per-rule
//! [`ProcessingReport`].
//!
//! Execution is strictly sequential: later rules may rely on earlier ones
//! having run, and hop compilation issues blocking discovery queries against
//! the source graph.

pub mod compiler;
pub mod executor;
pub mod lookup;
pub mod report;
pub mod rules;

pub use compiler::{CompileError, QueryCompiler, IDENTIFIER_PREDICATE, RELATIONSHIP_PREDICATE};
pub use executor::{GraphTransformer, TransformError, DEFAULT_BATCH_SIZE, DEFAULT_MISSING_VALUE};
pub use lookup::{LookupTable, RawLookupResolver};
pub use report::{ProcessingReport, ProcessingReportRecord, RuleStatus};
pub use rules::{PrimitiveType, PropertyRule, RawTriple, ValueType};
