//! Raw-lookup resolution: remapping literal values through an external
//! key→value table.

use std::collections::{BTreeMap, HashMap};

use graphmorph_dsl::TableLookup;
use oxigraph::model::vocab::xsd;
use oxigraph::model::Literal;
use serde::{Deserialize, Serialize};

use crate::executor::TransformError;

/// An externally loaded tabular source, addressed by column name per row.
///
/// The engine does not load tables itself; the surrounding ingestion layer
/// supplies them already parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTable {
    rows: Vec<BTreeMap<String, String>>,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_row(&mut self, row: BTreeMap<String, String>) {
        self.rows.push(row);
    }

    /// Convenience constructor for two-column tables.
    pub fn from_pairs<K, V>(
        key_column: &str,
        value_column: &str,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let rows = pairs
            .into_iter()
            .map(|(k, v)| {
                BTreeMap::from([
                    (key_column.to_string(), k.into()),
                    (value_column.to_string(), v.into()),
                ])
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[BTreeMap<String, String>] {
        &self.rows
    }
}

/// Joins query-result literals against one lookup table.
///
/// Built once per rule execution. Values missing from the table are
/// substituted with a sentinel rather than failing the rule, so one bad row
/// cannot abort an entire property's worth of triples.
#[derive(Debug)]
pub struct RawLookupResolver {
    mapping: HashMap<String, String>,
    missing_value: String,
}

impl RawLookupResolver {
    pub fn new(
        spec: &TableLookup,
        table: &LookupTable,
        missing_value: &str,
    ) -> Result<Self, TransformError> {
        let mut mapping = HashMap::with_capacity(table.rows().len());
        for row in table.rows() {
            let key = row
                .get(&spec.key_column)
                .ok_or_else(|| TransformError::MissingLookupColumn {
                    table: spec.name.clone(),
                    column: spec.key_column.clone(),
                })?;
            let value = row
                .get(&spec.value_column)
                .ok_or_else(|| TransformError::MissingLookupColumn {
                    table: spec.name.clone(),
                    column: spec.value_column.clone(),
                })?;
            mapping.insert(key.clone(), value.clone());
        }
        Ok(Self {
            mapping,
            missing_value: missing_value.to_string(),
        })
    }

    /// Substitute a literal's value through the table, preserving its
    /// language tag or datatype.
    pub fn resolve(&self, literal: &Literal) -> Literal {
        let target = self
            .mapping
            .get(literal.value())
            .map(String::as_str)
            .unwrap_or(&self.missing_value);

        if let Some(language) = literal.language() {
            // The tag was already validated when the original was built.
            Literal::new_language_tagged_literal_unchecked(target, language)
        } else if literal.datatype() == xsd::STRING {
            Literal::new_simple_literal(target)
        } else {
            Literal::new_typed_literal(target, literal.datatype().into_owned())
        }
    }
}
