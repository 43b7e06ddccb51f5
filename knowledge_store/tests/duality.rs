//! The same scenarios against both backends must give the same answers.

use knowledge_store::{
    merge_tags, ContextCoordinates, ContextPoint, FragmentationParameter, InMemoKnowledgeBase,
    Information, KbError, KnowledgeBase, PropertyHolder, SemanticNet, SemanticTag, SnSemanticTag,
    SqlKnowledgeBase, SqlStoreConfig, StSet, TagSnapshot, Taxonomy, TimeSpan, TxSemanticTag,
};
use proptest::prelude::*;

fn sql() -> SqlKnowledgeBase {
    SqlKnowledgeBase::open(SqlStoreConfig::in_memory()).unwrap()
}

fn first_sis<T: SemanticTag>(tags: &[T]) -> Vec<String> {
    let mut out: Vec<String> = tags.iter().map(|t| t.si().unwrap()[0].clone()).collect();
    out.sort();
    out
}

fn error_kind(err: &KbError) -> &'static str {
    match err {
        KbError::InvalidTag(_) => "InvalidTag",
        KbError::DuplicateIdentifier(_) => "DuplicateIdentifier",
        KbError::CycleDetected { .. } => "CycleDetected",
        KbError::NotFound(_) => "NotFound",
        KbError::ClosedStore => "ClosedStore",
        KbError::StorageFault(_) => "StorageFault",
        KbError::InvalidName(_) => "InvalidName",
        KbError::ReservedKey(_) => "ReservedKey",
    }
}

fn shark_lifecycle<K: KnowledgeBase>(kb: &K) -> TagSnapshot {
    let topics = kb.topic_set();
    let shark = topics
        .create_semantic_tag("Shark", &["http://www.sharksystem.net"])
        .unwrap();
    shark.set_property("p1", "v1").unwrap();
    shark.set_name(Some("SharkFW")).unwrap();
    shark.add_si("http://www.sharkfw.net").unwrap();
    shark.remove_si("http://www.sharksystem.net").unwrap();

    assert!(topics
        .get_semantic_tag(&["http://www.sharksystem.net"])
        .unwrap()
        .is_none());
    let found = topics
        .get_semantic_tag(&["http://www.sharkfw.net"])
        .unwrap()
        .unwrap();
    assert_eq!(found.name().unwrap().as_deref(), Some("SharkFW"));
    assert_eq!(found.property("p1").unwrap().as_deref(), Some("v1"));
    assert_eq!(
        found.remove_si("http://www.sharkfw.net").unwrap_err(),
        KbError::InvalidTag("cannot remove 'http://www.sharkfw.net', the last subject identifier".into())
    );
    found.snapshot().unwrap()
}

#[test]
fn test_shark_lifecycle_matches() {
    let memo = shark_lifecycle(&InMemoKnowledgeBase::new());
    let rel = shark_lifecycle(&sql());
    assert!(memo.same(&rel));
}

fn merge_outcome<K: KnowledgeBase>(kb: &K) -> Vec<TagSnapshot> {
    let topics = kb.topic_set();
    let a = topics.create_semantic_tag("A", &["urn:a"]).unwrap();
    a.set_property("color", "red").unwrap();
    topics.create_semantic_tag("B", &["urn:b"]).unwrap();

    let foreign = InMemoKnowledgeBase::new();
    let incoming = foreign
        .topic_set()
        .create_semantic_tag("A prime", &["urn:a", "urn:a2"])
        .unwrap();
    incoming.set_property("color", "blue").unwrap();
    incoming.set_property("size", "xl").unwrap();

    let merged = topics.merge(&incoming).unwrap();
    assert_eq!(merged.si().unwrap(), vec!["urn:a", "urn:a2"]);
    assert_eq!(merged.name().unwrap().as_deref(), Some("A"));
    assert_eq!(merged.property("color").unwrap().as_deref(), Some("red"));

    let fresh = foreign
        .topic_set()
        .create_semantic_tag("Bridge", &["urn:bridge"])
        .unwrap();
    fresh.add_si("urn:zz").unwrap();

    let copy = topics.merge(&fresh).unwrap();
    assert_eq!(copy.name().unwrap().as_deref(), Some("Bridge"));
    assert_eq!(topics.size().unwrap(), 3);

    let mut snaps: Vec<TagSnapshot> = topics
        .tags()
        .unwrap()
        .iter()
        .map(|t| t.snapshot().unwrap())
        .collect();
    snaps.sort_by(|x, y| x.sis.cmp(&y.sis));
    snaps
}

#[test]
fn test_merge_matches() {
    let memo = merge_outcome(&InMemoKnowledgeBase::new());
    let rel = merge_outcome(&sql());
    assert_eq!(memo.len(), rel.len());
    for (m, r) in memo.iter().zip(&rel) {
        assert!(m.same(r), "{:?} != {:?}", m, r);
    }
}

fn merge_spanning_two_members<K: KnowledgeBase>(kb: &K) -> &'static str {
    let topics = kb.topic_set();
    topics.create_semantic_tag("A", &["urn:a"]).unwrap();
    topics.create_semantic_tag("B", &["urn:b"]).unwrap();

    let foreign = InMemoKnowledgeBase::new();
    let both = foreign
        .topic_set()
        .create_semantic_tag("AB", &["urn:a", "urn:b"])
        .unwrap();
    let err = topics.merge(&both).unwrap_err();
    assert_eq!(topics.size().unwrap(), 2);
    error_kind(&err)
}

#[test]
fn test_merge_conflict_matches() {
    assert_eq!(
        merge_spanning_two_members(&InMemoKnowledgeBase::new()),
        "DuplicateIdentifier"
    );
    assert_eq!(merge_spanning_two_members(&sql()), "DuplicateIdentifier");
}

fn merge_against_peer_identifier<K: KnowledgeBase>(
    kb: &K,
) -> (&'static str, &'static str, Vec<String>) {
    let topics = kb.topic_set();
    let a = topics.create_semantic_tag("A", &["urn:a"]).unwrap();
    kb.peer_set()
        .create_peer_tag("P", &["urn:p"], &["tcp://p:7070"])
        .unwrap();

    let foreign = InMemoKnowledgeBase::new();
    let incoming = foreign
        .topic_set()
        .create_semantic_tag("A wide", &["urn:a", "urn:x", "urn:p"])
        .unwrap();
    incoming.set_property("size", "xl").unwrap();

    let via_set = topics.merge(&incoming).unwrap_err();
    assert_eq!(via_set, KbError::DuplicateIdentifier("urn:p".into()));
    let via_tags = merge_tags(&a, &incoming).unwrap_err();

    assert!(a.property("size").unwrap().is_none());
    assert!(topics.get_semantic_tag(&["urn:x"]).unwrap().is_none());
    assert_eq!(topics.size().unwrap(), 1);
    (error_kind(&via_set), error_kind(&via_tags), a.si().unwrap())
}

#[test]
fn test_failed_merge_leaves_target_untouched() {
    let expected = ("DuplicateIdentifier", "DuplicateIdentifier", vec!["urn:a".to_string()]);
    assert_eq!(merge_against_peer_identifier(&InMemoKnowledgeBase::new()), expected);
    assert_eq!(merge_against_peer_identifier(&sql()), expected);
}

fn taxonomy_walk<K: KnowledgeBase>(kb: &K) -> (Vec<String>, Vec<String>, &'static str) {
    let tx = kb.topics_as_taxonomy();
    let animal = tx.create_tx_semantic_tag("Animal", &["urn:animal"]).unwrap();
    let fish = tx.create_tx_semantic_tag("Fish", &["urn:fish"]).unwrap();
    let shark = tx.create_tx_semantic_tag("Shark", &["urn:shark"]).unwrap();
    fish.move_to(Some(&animal)).unwrap();
    shark.move_to(Some(&fish)).unwrap();

    let err = animal.move_to(Some(&shark)).unwrap_err();
    assert!(animal.is_root().unwrap());
    assert_eq!(first_sis(&animal.sub_tags().unwrap()), vec!["urn:fish"]);

    let fragment = tx
        .fragment(&animal, &FragmentationParameter::new().with_depth(1))
        .unwrap();
    let roots = tx.root_tags().unwrap();
    (
        first_sis(&fragment.tags().unwrap()),
        first_sis(&roots),
        error_kind(&err),
    )
}

#[test]
fn test_taxonomy_matches() {
    let memo = taxonomy_walk(&InMemoKnowledgeBase::new());
    let rel = taxonomy_walk(&sql());
    assert_eq!(memo, rel);
    assert_eq!(memo.0, vec!["urn:animal", "urn:fish"]);
    assert_eq!(memo.2, "CycleDetected");
}

fn net_walk<K: KnowledgeBase>(kb: &K) -> Vec<(String, String, String)> {
    let net = kb.topics_as_semantic_net();
    let a = net.create_semantic_tag("A", &["urn:a"]).unwrap();
    let b = net.create_semantic_tag("B", &["urn:b"]).unwrap();
    let c = net.create_semantic_tag("C", &["urn:c"]).unwrap();
    a.set_predicate("p", &b).unwrap();
    a.set_predicate("p", &c).unwrap();
    b.set_predicate("q", &a).unwrap();
    c.set_predicate("p", &c).unwrap();
    assert!(a.target_tags("nothing").unwrap().is_empty());
    assert_eq!(first_sis(&a.source_tags("q").unwrap()), vec!["urn:b"]);

    let fragment = net
        .fragment(&b, &FragmentationParameter::new().with_predicate("q"))
        .unwrap();
    assert_eq!(first_sis(&fragment.tags().unwrap()), vec!["urn:a", "urn:b"]);

    let mut edges: Vec<(String, String, String)> = net
        .edges()
        .unwrap()
        .into_iter()
        .map(|(s, p, t)| (s.si().unwrap()[0].clone(), p, t.si().unwrap()[0].clone()))
        .collect();
    edges.sort();
    edges
}

#[test]
fn test_net_matches() {
    let memo = net_walk(&InMemoKnowledgeBase::new());
    let rel = net_walk(&sql());
    assert_eq!(memo, rel);
    assert_eq!(memo.len(), 4);
}

fn hidden_and_names<K: KnowledgeBase>(kb: &K) -> (usize, usize, usize, Vec<String>) {
    let topics = kb.topic_set();
    topics.create_semantic_tag("Shark", &["urn:shark"]).unwrap();
    let hidden = topics.create_semantic_tag("SharkFW", &["urn:fw"]).unwrap();
    hidden.set_hidden(true).unwrap();
    topics.create_semantic_tag("Whale", &["urn:whale"]).unwrap();

    let visible = topics.tags().unwrap().len();
    topics.set_enumerate_hidden_tags(true);
    let all = topics.tags().unwrap().len();
    let names = first_sis(&topics.get_semantic_tag_by_name("Shark").unwrap());
    (visible, all, topics.size().unwrap(), names)
}

#[test]
fn test_enumeration_matches() {
    let memo = hidden_and_names(&InMemoKnowledgeBase::new());
    let rel = hidden_and_names(&sql());
    assert_eq!(memo, rel);
    assert_eq!(memo, (2, 3, 3, vec!["urn:fw".to_string(), "urn:shark".to_string()]));
}

fn context_points<K: KnowledgeBase>(kb: &K) -> (ContextCoordinates, Vec<String>, usize) {
    kb.topic_set().create_semantic_tag("Topic", &["urn:topic"]).unwrap();
    kb.time_set().create_time_tag(TimeSpan::always()).unwrap();
    let cc = ContextCoordinates::new()
        .with_topic("urn:topic")
        .with_time(TimeSpan::always().subject_identifier());

    let cp = kb.create_context_point(&cc).unwrap();
    cp.add_information(b"first").unwrap();
    let second = kb.create_context_point(&cc).unwrap().add_information(b"second").unwrap();
    second.set_name("second.txt").unwrap();

    let missing = kb
        .create_context_point(&ContextCoordinates::new().with_peer("urn:nobody"))
        .unwrap_err();
    assert_eq!(error_kind(&missing), "NotFound");

    let contents = cp
        .information()
        .unwrap()
        .iter()
        .map(|i| i.content_as_string().unwrap())
        .collect();
    (cp.coordinates().unwrap(), contents, kb.context_points().unwrap().len())
}

#[test]
fn test_context_points_match() {
    let memo = context_points(&InMemoKnowledgeBase::new());
    let rel = context_points(&sql());
    assert_eq!(memo, rel);
    assert_eq!(memo.1, vec!["first", "second"]);
    assert_eq!(memo.2, 1);
}

#[derive(Debug, Clone)]
enum Op {
    Create(u8, u8),
    AddSi(u8, u8),
    RemoveSi(u8, u8),
    SetProperty(u8, u8),
    Remove(u8),
    Move(u8, Option<u8>),
    Link(u8, u8),
}

fn si(n: u8) -> String {
    format!("urn:si:{}", n % 6)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Op::Create(a, b)),
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Op::AddSi(a, b)),
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Op::RemoveSi(a, b)),
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Op::SetProperty(a, b)),
        any::<u8>().prop_map(Op::Remove),
        (any::<u8>(), proptest::option::of(any::<u8>())).prop_map(|(a, b)| Op::Move(a, b)),
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Op::Link(a, b)),
    ]
}

fn apply<K: KnowledgeBase>(kb: &K, op: &Op) -> String {
    let tx = kb.topics_as_taxonomy();
    let lookup = |n: u8| tx.get_semantic_tag(&[si(n).as_str()]).unwrap();
    let outcome: Result<(), KbError> = match op {
        Op::Create(a, b) => tx
            .create_semantic_tag("t", &[si(*a).as_str(), si(*b).as_str()])
            .map(|_| ()),
        Op::AddSi(a, b) => match lookup(*a) {
            Some(tag) => tag.add_si(&si(*b)),
            None => return "absent".into(),
        },
        Op::RemoveSi(a, b) => match lookup(*a) {
            Some(tag) => tag.remove_si(&si(*b)),
            None => return "absent".into(),
        },
        Op::SetProperty(a, v) => match lookup(*a) {
            Some(tag) => tag.set_property("k", &v.to_string()),
            None => return "absent".into(),
        },
        Op::Remove(a) => match lookup(*a) {
            Some(tag) => tx.remove_semantic_tag(&tag),
            None => return "absent".into(),
        },
        Op::Move(a, b) => match (lookup(*a), b.map(lookup)) {
            (Some(tag), None) => tag.move_to(None),
            (Some(tag), Some(Some(parent))) => tag.move_to(Some(&parent)),
            _ => return "absent".into(),
        },
        Op::Link(a, b) => match (lookup(*a), lookup(*b)) {
            (Some(x), Some(y)) => x.set_predicate("rel", &y),
            _ => return "absent".into(),
        },
    };
    match outcome {
        Ok(()) => "ok".into(),
        Err(err) => error_kind(&err).into(),
    }
}

type Observed = (Vec<String>, Option<String>, Option<String>, Option<String>, Vec<String>);

fn observe<K: KnowledgeBase>(kb: &K) -> Vec<Observed> {
    let tx = kb.topics_as_taxonomy();
    let mut out: Vec<Observed> = tx
        .all_tags(true)
        .unwrap()
        .iter()
        .map(|tag| {
            let mut sis = tag.si().unwrap();
            sis.sort();
            let parent = tag
                .super_tag()
                .unwrap()
                .map(|p| p.si().unwrap()[0].clone());
            (
                sis,
                tag.name().unwrap(),
                tag.property("k").unwrap(),
                parent,
                first_sis(&tag.target_tags("rel").unwrap()),
            )
        })
        .collect();
    out.sort();
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_random_operations_agree(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let memo = InMemoKnowledgeBase::new();
        let rel = sql();
        for op in &ops {
            prop_assert_eq!(apply(&memo, op), apply(&rel, op), "diverged on {:?}", op);
        }
        prop_assert_eq!(observe(&memo), observe(&rel));
    }
}
