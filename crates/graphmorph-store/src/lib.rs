//! Graph-store collaborators for the graphmorph engine.
//!
//! The engine never talks to a concrete triple store directly; it goes
//! through two narrow traits:
//!
//! - [`SourceGraph`]: read side. SPARQL SELECT plus the predicate-discovery
//!   probe used while compiling multi-hop traversals.
//! - [`DestinationGraph`]: write side. Append triples, commit in batches.
//!
//! [`GraphStore`] implements both on top of an embedded in-memory
//! [oxigraph](https://crates.io/crates/oxigraph) store and is what callers
//! and tests normally use; the traits exist so the discovery probe and the
//! write path stay mockable independently of any real store.

pub mod graph;
pub mod prefixes;
pub mod store;

pub use graph::{DestinationGraph, GraphError, SourceGraph};
pub use prefixes::Prefixes;
pub use store::GraphStore;
