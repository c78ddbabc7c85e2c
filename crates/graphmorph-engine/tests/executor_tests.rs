//! Executor behavior against scripted graph handles: rule outcomes,
//! reshaping, typing, batching, and the failure policy.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use graphmorph_dsl::RuleType;
use graphmorph_engine::{
    CompileError, GraphTransformer, LookupTable, PropertyRule, PrimitiveType, RawTriple,
    RuleStatus, TransformError, ValueType, IDENTIFIER_PREDICATE,
};
use graphmorph_store::{DestinationGraph, GraphError, SourceGraph};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{Literal, NamedNode, Term, Triple};

const CIM: &str = "http://iec.ch/cim#";
const TARGET: &str = "http://target.example/ns#";

fn node(iri: &str) -> NamedNode {
    NamedNode::new(iri).expect("iri")
}

fn cim(local: &str) -> Term {
    Term::NamedNode(node(&format!("{CIM}{local}")))
}

fn target(local: &str) -> NamedNode {
    node(&format!("{TARGET}{local}"))
}

fn prefixes() -> graphmorph_store::Prefixes {
    graphmorph_store::Prefixes::new().with("cim", CIM)
}

/// Source whose `select` answers are scripted per call, in order, and whose
/// predicate probes come from a fixed map.
#[derive(Default)]
struct ScriptedSource {
    selects: RefCell<VecDeque<Vec<Vec<Term>>>>,
    probes: HashMap<(String, String), Vec<NamedNode>>,
}

impl ScriptedSource {
    fn answering(rows: impl IntoIterator<Item = Vec<Vec<Term>>>) -> Self {
        Self {
            selects: RefCell::new(rows.into_iter().collect()),
            probes: HashMap::new(),
        }
    }

    fn link(mut self, subject_class: &str, object_class: &str, predicate: &str) -> Self {
        self.probes
            .entry((
                format!("{CIM}{subject_class}"),
                format!("{CIM}{object_class}"),
            ))
            .or_default()
            .push(node(&format!("{CIM}{predicate}")));
        self
    }
}

impl SourceGraph for ScriptedSource {
    fn select(&self, _query: &str, _variables: &[&str]) -> Result<Vec<Vec<Term>>, GraphError> {
        Ok(self.selects.borrow_mut().pop_front().unwrap_or_default())
    }

    fn probe_predicates(
        &self,
        subject_class: &NamedNode,
        object_class: &NamedNode,
    ) -> Result<Vec<NamedNode>, GraphError> {
        Ok(self
            .probes
            .get(&(
                subject_class.as_str().to_string(),
                object_class.as_str().to_string(),
            ))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct RecordingDestination {
    staged: Vec<Triple>,
    committed: Vec<Triple>,
    commits: usize,
}

impl DestinationGraph for RecordingDestination {
    fn insert(&mut self, triple: Triple) -> Result<(), GraphError> {
        self.staged.push(triple);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), GraphError> {
        self.committed.append(&mut self.staged);
        self.commits += 1;
        Ok(())
    }
}

fn transformer() -> GraphTransformer {
    GraphTransformer::new(TARGET, prefixes())
}

fn no_tables() -> HashMap<String, LookupTable> {
    HashMap::new()
}

#[test]
fn class_only_rule_renames_subjects_and_types_them() {
    let source = ScriptedSource::answering([vec![vec![
        cim("ACL1"),
        Term::NamedNode(node(IDENTIFIER_PREDICATE)),
        cim("ACL1"),
    ]]]);
    let mut destination = RecordingDestination::default();

    let rules = [PropertyRule::new(
        "Line",
        "identifier",
        "cim:ACLineSegment",
        RuleType::RdfPath,
        ValueType::Primitive(PrimitiveType::String),
    )];
    let report = transformer()
        .transform(&source, &rules, &mut destination, &[], &no_tables())
        .expect("transform");

    assert_eq!(report.total_rules, 1);
    assert_eq!(report.total_success, 1);
    assert_eq!(report.records[0].rows_returned, 1);
    assert_eq!(report.records[0].status, RuleStatus::Success);

    let value = Triple::new(
        target("ACL1"),
        target("identifier"),
        Literal::new_simple_literal("ACL1"),
    );
    let typing = Triple::new(target("ACL1"), rdf::TYPE.into_owned(), target("Line"));
    assert!(destination.committed.contains(&value));
    assert!(destination.committed.contains(&typing));
    assert_eq!(destination.committed.len(), 2);
}

#[test]
fn empty_result_is_success_no_results() {
    let source = ScriptedSource::answering([Vec::new()]);
    let mut destination = RecordingDestination::default();

    let rules = [PropertyRule::new(
        "Line",
        "identifier",
        "cim:ACLineSegment",
        RuleType::RdfPath,
        ValueType::Primitive(PrimitiveType::String),
    )];
    let report = transformer()
        .transform(&source, &rules, &mut destination, &[], &no_tables())
        .expect("transform");

    assert_eq!(report.total_success_no_results, 1);
    assert_eq!(report.records[0].status, RuleStatus::SuccessNoResults);
    assert!(report.records[0].error_message.is_none());
    assert!(destination.committed.is_empty());
}

#[test]
fn missing_relation_is_success_no_results() {
    // No probe entries: predicate discovery for the hop finds nothing.
    let source = ScriptedSource::default();
    let mut destination = RecordingDestination::default();

    let rules = [PropertyRule::new(
        "Line",
        "substation",
        "cim:ACLineSegment->cim:Substation",
        RuleType::RdfPath,
        ValueType::Reference("Substation".to_string()),
    )];
    let report = transformer()
        .transform(&source, &rules, &mut destination, &[], &no_tables())
        .expect("transform");

    assert_eq!(report.total_success_no_results, 1);
    assert!(report.records[0].error_message.is_none());
    assert!(destination.committed.is_empty());
}

#[test]
fn ambiguous_relation_fails_the_rule_but_not_the_pass() {
    let source = ScriptedSource::answering([vec![vec![
        cim("ACL1"),
        Term::NamedNode(node(IDENTIFIER_PREDICATE)),
        cim("ACL1"),
    ]]])
    .link("Terminal", "Substation", "memberOf")
    .link("Terminal", "Substation", "partOf");
    let mut destination = RecordingDestination::default();

    let rules = [
        PropertyRule::new(
            "Terminal",
            "substation",
            "cim:Terminal->cim:Substation",
            RuleType::RdfPath,
            ValueType::Reference("Substation".to_string()),
        ),
        PropertyRule::new(
            "Line",
            "identifier",
            "cim:ACLineSegment",
            RuleType::RdfPath,
            ValueType::Primitive(PrimitiveType::String),
        ),
    ];
    let report = transformer()
        .transform(&source, &rules, &mut destination, &[], &no_tables())
        .expect("transform");

    assert_eq!(report.total_rules, 2);
    assert_eq!(report.total_failed, 1);
    assert_eq!(report.total_success, 1);
    assert_eq!(report.records[0].status, RuleStatus::Failed);
    let message = report.records[0].error_message.as_deref().expect("message");
    assert!(message.contains("exactly one relation"));
    // The second rule still produced its triples.
    assert!(!destination.committed.is_empty());
}

#[test]
fn stop_on_exception_aborts_the_pass() {
    let source = ScriptedSource::default()
        .link("Terminal", "Substation", "memberOf")
        .link("Terminal", "Substation", "partOf");
    let mut destination = RecordingDestination::default();

    let rules = [PropertyRule::new(
        "Terminal",
        "substation",
        "cim:Terminal->cim:Substation",
        RuleType::RdfPath,
        ValueType::Reference("Substation".to_string()),
    )];
    let err = transformer()
        .with_stop_on_exception(true)
        .transform(&source, &rules, &mut destination, &[], &no_tables())
        .unwrap_err();

    assert!(matches!(
        err,
        TransformError::Compile(CompileError::AmbiguousRelation { found: 2, .. })
    ));
}

#[test]
fn skipped_and_blank_rules_are_not_counted() {
    let source = ScriptedSource::answering([vec![vec![
        cim("ACL1"),
        Term::NamedNode(node(IDENTIFIER_PREDICATE)),
        cim("ACL1"),
    ]]]);
    let mut destination = RecordingDestination::default();

    let mut skipped = PropertyRule::new(
        "Line",
        "identifier",
        "cim:ACLineSegment",
        RuleType::RdfPath,
        ValueType::Primitive(PrimitiveType::String),
    );
    skipped.skip = true;
    let blank = PropertyRule {
        rule: Some("   ".to_string()),
        skip: false,
        ..skipped.clone()
    };
    let absent = PropertyRule {
        rule: None,
        skip: false,
        ..skipped.clone()
    };
    let mut active = skipped.clone();
    active.skip = false;

    let report = transformer()
        .transform(
            &source,
            &[skipped, blank, absent, active],
            &mut destination,
            &[],
            &no_tables(),
        )
        .expect("transform");

    assert_eq!(report.total_rules, 1);
    assert_eq!(report.total_success, 1);
}

#[test]
fn commits_follow_the_batch_size() {
    let rows: Vec<Vec<Term>> = (1..=3)
        .map(|i| {
            vec![
                cim(&format!("ACL{i}")),
                Term::NamedNode(node(IDENTIFIER_PREDICATE)),
                cim(&format!("ACL{i}")),
            ]
        })
        .collect();
    let source = ScriptedSource::answering([rows]);
    let mut destination = RecordingDestination::default();

    let rules = [PropertyRule::new(
        "Line",
        "identifier",
        "cim:ACLineSegment",
        RuleType::RdfPath,
        ValueType::Primitive(PrimitiveType::String),
    )];
    transformer()
        .with_batch_size(2)
        .transform(&source, &rules, &mut destination, &[], &no_tables())
        .expect("transform");

    // 3 value triples and 3 type triples, committed every 2 insertions plus
    // the unconditional final commit.
    assert_eq!(destination.committed.len(), 6);
    assert_eq!(destination.commits, 4);
    assert!(destination.staged.is_empty());
}

#[test]
fn wildcard_rules_keep_source_predicates_and_objects() {
    let source = ScriptedSource::answering([vec![vec![
        cim("T1"),
        cim("name"),
        Term::Literal(Literal::new_simple_literal("hello")),
    ]]]);
    let mut destination = RecordingDestination::default();

    let rules = [PropertyRule::new(
        "Terminal",
        "unused",
        "cim:Terminal(*)",
        RuleType::RdfPath,
        ValueType::Primitive(PrimitiveType::String),
    )];
    transformer()
        .transform(&source, &rules, &mut destination, &[], &no_tables())
        .expect("transform");

    let passthrough = Triple::new(
        target("T1"),
        node(&format!("{CIM}name")),
        Literal::new_simple_literal("hello"),
    );
    assert!(destination.committed.contains(&passthrough));
}

#[test]
fn raw_lookup_rules_substitute_values() {
    let source = ScriptedSource::answering([vec![
        vec![
            cim("Sub1"),
            cim("name"),
            Term::Literal(Literal::new_simple_literal("Arendal")),
        ],
        vec![
            cim("Sub2"),
            cim("name"),
            Term::Literal(Literal::new_simple_literal("Oslo")),
        ],
    ]]);
    let mut destination = RecordingDestination::default();

    let tables = HashMap::from([(
        "Renames".to_string(),
        LookupTable::from_pairs("OldName", "NewName", [("Arendal", "Gjerstad")]),
    )]);
    let rules = [PropertyRule::new(
        "Substation",
        "name",
        "cim:Substation(cim:name) | Renames(OldName, NewName)",
        RuleType::RawLookup,
        ValueType::Primitive(PrimitiveType::String),
    )];
    let report = transformer()
        .transform(&source, &rules, &mut destination, &[], &tables)
        .expect("transform");

    assert_eq!(report.total_success, 1);
    let renamed = Triple::new(
        target("Sub1"),
        target("name"),
        Literal::new_simple_literal("Gjerstad"),
    );
    let sentinel = Triple::new(
        target("Sub2"),
        target("name"),
        Literal::new_simple_literal("MISSING"),
    );
    assert!(destination.committed.contains(&renamed));
    assert!(destination.committed.contains(&sentinel));
}

#[test]
fn unknown_lookup_table_fails_the_rule() {
    let source = ScriptedSource::answering([vec![vec![
        cim("Sub1"),
        cim("name"),
        Term::Literal(Literal::new_simple_literal("Arendal")),
    ]]]);
    let mut destination = RecordingDestination::default();

    let rules = [PropertyRule::new(
        "Substation",
        "name",
        "cim:Substation(cim:name) | Nowhere(OldName, NewName)",
        RuleType::RawLookup,
        ValueType::Primitive(PrimitiveType::String),
    )];
    let report = transformer()
        .transform(&source, &rules, &mut destination, &[], &no_tables())
        .expect("transform");

    assert_eq!(report.total_failed, 1);
    let message = report.records[0].error_message.as_deref().expect("message");
    assert!(message.contains("unknown lookup table"));
}

#[test]
fn reference_objects_are_renamespaced() {
    let source = ScriptedSource::answering([vec![vec![
        cim("T1"),
        cim("memberOf"),
        cim("Sub1"),
    ]]])
    .link("Terminal", "Substation", "memberOf");
    let mut destination = RecordingDestination::default();

    let rules = [PropertyRule::new(
        "Terminal",
        "substation",
        "cim:Terminal->cim:Substation",
        RuleType::RdfPath,
        ValueType::Reference("Substation".to_string()),
    )];
    transformer()
        .transform(&source, &rules, &mut destination, &[], &no_tables())
        .expect("transform");

    let edge = Triple::new(target("T1"), target("substation"), target("Sub1"));
    assert!(destination.committed.contains(&edge));
}

#[test]
fn first_rule_wins_subject_typing() {
    let row = || {
        vec![vec![
            cim("ACL1"),
            Term::NamedNode(node(IDENTIFIER_PREDICATE)),
            cim("ACL1"),
        ]]
    };
    let source = ScriptedSource::answering([row(), row()]);
    let mut destination = RecordingDestination::default();

    let rules = [
        PropertyRule::new(
            "Line",
            "identifier",
            "cim:ACLineSegment",
            RuleType::RdfPath,
            ValueType::Primitive(PrimitiveType::String),
        ),
        PropertyRule::new(
            "Conductor",
            "identifier",
            "cim:ACLineSegment",
            RuleType::RdfPath,
            ValueType::Primitive(PrimitiveType::String),
        ),
    ];
    transformer()
        .transform(&source, &rules, &mut destination, &[], &no_tables())
        .expect("transform");

    let type_triples: Vec<_> = destination
        .committed
        .iter()
        .filter(|t| t.predicate == rdf::TYPE.into_owned())
        .collect();
    assert_eq!(type_triples.len(), 1);
    assert_eq!(type_triples[0].object, Term::NamedNode(target("Line")));
}

#[test]
fn extra_triples_are_written_after_the_rules() {
    let source = ScriptedSource::default();
    let mut destination = RecordingDestination::default();

    let extras = [RawTriple::new(
        "http://target.example/ns#meta",
        "http://target.example/ns#generatedBy",
        "\"graphmorph\"",
    )];
    transformer()
        .transform(&source, &[], &mut destination, &extras, &no_tables())
        .expect("transform");

    let expected = Triple::new(
        target("meta"),
        target("generatedBy"),
        Literal::new_simple_literal("graphmorph"),
    );
    assert_eq!(destination.committed, vec![expected]);
}

#[test]
fn malformed_extra_triples_are_always_fatal() {
    let source = ScriptedSource::default();
    let mut destination = RecordingDestination::default();

    let extras = [RawTriple::new("not an iri", "http://x.example/p", "v")];
    let err = transformer()
        .with_stop_on_exception(false)
        .transform(&source, &[], &mut destination, &extras, &no_tables())
        .unwrap_err();

    assert!(matches!(err, TransformError::MalformedTriple(_)));
}
