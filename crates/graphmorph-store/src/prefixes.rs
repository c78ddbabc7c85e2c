//! Prefix table: namespace expansion and textual query compaction.

use std::collections::BTreeMap;

use oxigraph::model::NamedNode;
use serde::{Deserialize, Serialize};

use crate::graph::GraphError;

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// Mapping between short prefixes and namespace IRIs.
///
/// Used in both directions: expanding `prefix:name` entities from parsed
/// rules into full IRIs, and shrinking full IRIs in assembled query text
/// back to prefixed names so compiled queries stay compact and debuggable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefixes {
    map: BTreeMap<String, String>,
}

impl Default for Prefixes {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert("rdf".to_string(), RDF_NS.to_string());
        map.insert("rdfs".to_string(), RDFS_NS.to_string());
        map.insert("owl".to_string(), OWL_NS.to_string());
        map.insert("xsd".to_string(), XSD_NS.to_string());
        Self { map }
    }
}

impl Prefixes {
    /// The W3C core set (`rdf`, `rdfs`, `owl`, `xsd`).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.map.insert(prefix.into(), namespace.into());
    }

    /// Builder form of [`Prefixes::insert`].
    pub fn with(mut self, prefix: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.insert(prefix, namespace);
        self
    }

    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.map.get(prefix).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(p, ns)| (p.as_str(), ns.as_str()))
    }

    /// Expand `prefix:local` into a full IRI node.
    pub fn expand(&self, prefix: &str, local: &str) -> Result<NamedNode, GraphError> {
        let namespace = self
            .namespace(prefix)
            .ok_or_else(|| GraphError::InvalidIri(format!("unknown prefix `{prefix}`")))?;
        NamedNode::new(format!("{namespace}{local}"))
            .map_err(|e| GraphError::InvalidIri(e.to_string()))
    }

    /// `PREFIX` declarations for every registered prefix, one per line.
    pub fn declarations(&self) -> String {
        let mut out = String::new();
        for (prefix, namespace) in &self.map {
            out.push_str(&format!("PREFIX {prefix}: <{namespace}>\n"));
        }
        out
    }

    /// Rewrite `<long-form>` IRIs in query text to their shortest prefixed
    /// form. IRIs under no registered namespace, and local names that are
    /// not valid SPARQL prefixed-name locals, are left untouched.
    pub fn shrink(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find('<') {
            let Some(end) = rest[start..].find('>') else {
                break;
            };
            out.push_str(&rest[..start]);
            let iri = &rest[start + 1..start + end];
            match self.compact(iri) {
                Some(short) => out.push_str(&short),
                None => out.push_str(&rest[start..=start + end]),
            }
            rest = &rest[start + end + 1..];
        }
        out.push_str(rest);
        out
    }

    fn compact(&self, iri: &str) -> Option<String> {
        // Longest-namespace match wins when namespaces nest.
        let (prefix, local) = self
            .map
            .iter()
            .filter_map(|(prefix, namespace)| {
                iri.strip_prefix(namespace.as_str())
                    .map(|local| (prefix, local))
            })
            .min_by_key(|(_, local)| local.len())?;
        if local.is_empty() || !is_pn_local(local) {
            return None;
        }
        Some(format!("{prefix}:{local}"))
    }
}

/// Conservative subset of SPARQL's PN_LOCAL production: ASCII word
/// characters plus `-` and interior `.`.
fn is_pn_local(s: &str) -> bool {
    let starts_ok = s
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    let ends_ok = s.chars().next_back().is_some_and(|c| c != '.');
    starts_ok
        && ends_ok
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
