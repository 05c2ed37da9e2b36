#![forbid(unsafe_code)]

//! End-to-end scene scenarios: tree membership, identity indices,
//! anchorage bookkeeping, activation order and adapter replacement.

use std::any::Any;

use sgraph_core::{
    AdapterHost, AdapterKey, Capability, ContentRef, ErrorKind, PartId, Role, RoleCounts,
    SceneEvent, Traversal,
};
use sgraph_harness::{CallLog, EventRecorder, LoggingAdapter, SceneFixture};

fn track(fixture: &mut SceneFixture, part: PartId, name: &str, log: &CallLog) {
    fixture
        .viewer
        .set_adapter(
            AdapterHost::Part(part),
            AdapterKey::of::<LoggingAdapter>(),
            LoggingAdapter::boxed(name, log),
        )
        .unwrap();
}

/// R (active) -> A (obj1) -> B (obj2), B anchored on A as "source".
struct Chain {
    fixture: SceneFixture,
    log: CallLog,
    obj1: ContentRef,
    obj2: ContentRef,
    a: PartId,
    b: PartId,
}

fn chain() -> Chain {
    let mut fixture = SceneFixture::new().unwrap();
    let log = CallLog::new();
    let root = fixture.root();
    track(&mut fixture, root, "R", &log);
    fixture.viewer.activate().unwrap();

    let (obj1, a) = fixture.content("obj1").unwrap();
    track(&mut fixture, a, "A", &log);
    fixture.viewer.add_child(root, a).unwrap();
    let (obj2, b) = fixture.content("obj2").unwrap();
    track(&mut fixture, b, "B", &log);
    fixture.viewer.add_child(a, b).unwrap();
    fixture.viewer.add_anchorage(b, a, "source").unwrap();
    log.clear();
    Chain {
        fixture,
        log,
        obj1,
        obj2,
        a,
        b,
    }
}

#[test]
fn chain_scenario_indices_and_anchorages() {
    let Chain {
        mut fixture,
        log,
        obj1,
        obj2,
        a,
        b,
    } = chain();
    let viewer = &fixture.viewer;
    assert_eq!(viewer.content_part(&obj1), Some(a));
    assert_eq!(viewer.content_part(&obj2), Some(b));

    let source: RoleCounts = [("source", 1)].into_iter().collect();
    assert_eq!(viewer.anchoreds(a).unwrap().get(&b), Some(&source));
    assert_eq!(viewer.anchorages(b).unwrap().get(&a), Some(&source));
    assert!(viewer.audit().is_clean());

    fixture.viewer.deactivate().unwrap();
    assert_eq!(log.names_for("deactivate"), vec!["B", "A", "R"]);
    // Indices track membership, not activation.
    assert_eq!(fixture.viewer.content_part(&obj1), Some(a));
    assert_eq!(fixture.viewer.content_part(&obj2), Some(b));
    assert!(!fixture.viewer.part(a).unwrap().is_active());
    assert!(fixture.viewer.audit().is_clean());
}

#[test]
fn activation_is_pre_order() {
    let Chain { mut fixture, log, .. } = chain();
    fixture.viewer.deactivate().unwrap();
    log.clear();
    fixture.viewer.activate().unwrap();
    assert_eq!(log.names_for("activate"), vec!["R", "A", "B"]);
}

#[test]
fn removal_deactivates_before_removal_event() {
    let Chain {
        mut fixture,
        log,
        obj1,
        obj2,
        a,
        b,
    } = chain();
    let root = fixture.root();
    let recorder = EventRecorder::attach(&mut fixture.viewer).unwrap();

    fixture.viewer.remove_child(root, a).unwrap();

    assert_eq!(log.names_for("deactivate"), vec!["B", "A"]);
    assert_eq!(
        recorder.events(),
        vec![
            SceneEvent::Deactivated {
                host: AdapterHost::Part(b)
            },
            SceneEvent::Deactivated {
                host: AdapterHost::Part(a)
            },
            SceneEvent::ChildRemoved {
                parent: root,
                child: a,
                index: 0
            },
        ]
    );
    let viewer = &fixture.viewer;
    assert_eq!(viewer.content_part(&obj1), None);
    assert_eq!(viewer.content_part(&obj2), None);
    assert_eq!(viewer.visual_part(viewer.part(a).unwrap().visual()), None);
    assert_eq!(viewer.detached_parts(), vec![a]);
    // Detaching keeps the subtree and its anchorages.
    assert_eq!(viewer.children(a).unwrap(), &[b]);
    assert_eq!(viewer.anchorage_count(b, a, &Role::named("source")).unwrap(), 1);
}

#[test]
fn dispose_detached_subtree_drops_anchorages() {
    let Chain {
        mut fixture, a, b, ..
    } = chain();
    let root = fixture.root();
    let other = fixture.attach_content(root, "other").unwrap().1;
    fixture.viewer.add_anchorage(other, b, Role::DEFAULT).unwrap();
    fixture.viewer.remove_child(root, a).unwrap();

    let err = fixture.viewer.dispose_part(other).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);

    let recorder = EventRecorder::attach(&mut fixture.viewer).unwrap();
    fixture.viewer.dispose_part(a).unwrap();
    let labels = recorder.labels();
    assert_eq!(
        labels,
        vec![
            "anchorage-removed",
            "anchorage-removed",
            "part-disposed",
            "part-disposed"
        ]
    );
    assert!(fixture.viewer.part(a).is_none());
    assert!(fixture.viewer.part(b).is_none());
    assert!(fixture.viewer.anchorages(other).unwrap().is_empty());
    assert!(fixture.viewer.audit().is_clean());
}

#[test]
fn reparent_moves_without_duplication() {
    let Chain {
        mut fixture, a, b, ..
    } = chain();
    let root = fixture.root();
    let recorder = EventRecorder::attach_part(&mut fixture.viewer, b).unwrap();

    fixture.viewer.add_child(root, b).unwrap();

    assert_eq!(fixture.viewer.children(a).unwrap(), &[] as &[PartId]);
    assert_eq!(fixture.viewer.children(root).unwrap(), &[a, b]);
    assert_eq!(fixture.viewer.parent(b).unwrap(), Some(root));
    assert!(fixture.viewer.part(b).unwrap().is_active());
    assert_eq!(
        recorder.labels(),
        vec![
            "deactivated",
            "child-removed",
            "activated",
            "refreshed",
            "child-added"
        ]
    );
    assert!(fixture.viewer.audit().is_clean());
}

#[test]
fn self_and_cyclic_children_rejected_without_change() {
    let Chain {
        mut fixture, a, b, ..
    } = chain();
    let root = fixture.root();
    let before = fixture.viewer.subtree(root, Traversal::PreOrder).unwrap();

    let err = fixture.viewer.add_child(a, a).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = fixture.viewer.add_child(b, a).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = fixture.viewer.add_child(b, root).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = fixture.viewer.add_child(root, a).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    assert_eq!(fixture.viewer.subtree(root, Traversal::PreOrder).unwrap(), before);
    assert_eq!(fixture.viewer.parent(a).unwrap(), Some(root));
}

#[test]
fn bad_index_is_out_of_range() {
    let mut fixture = SceneFixture::active().unwrap();
    let root = fixture.root();
    let (_, part) = fixture.content("x").unwrap();
    let err = fixture.viewer.insert_child(root, part, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
    assert!(fixture.viewer.children(root).unwrap().is_empty());
}

#[test]
fn anchorage_round_trip_restores_maps() {
    let Chain {
        mut fixture, a, b, ..
    } = chain();
    let before_a = fixture.viewer.anchoreds(a).unwrap().clone();
    let before_b = fixture.viewer.anchorages(b).unwrap().clone();

    fixture.viewer.add_anchorage(b, a, "target").unwrap();
    fixture.viewer.add_anchorage(b, a, "source").unwrap();
    assert_eq!(
        fixture
            .viewer
            .anchorage_count(b, a, &Role::named("source"))
            .unwrap(),
        2
    );
    fixture.viewer.remove_anchorage(b, a, "source").unwrap();
    fixture.viewer.remove_anchorage(b, a, "target").unwrap();

    assert_eq!(fixture.viewer.anchoreds(a).unwrap(), &before_a);
    assert_eq!(fixture.viewer.anchorages(b).unwrap(), &before_b);

    let err = fixture.viewer.remove_anchorage(b, a, "target").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn adapter_replacement_deactivates_first() {
    let Chain {
        mut fixture, a, ..
    } = chain();
    let log = CallLog::new();
    let key = AdapterKey::with_role::<LoggingAdapter>("tool");
    let host = AdapterHost::Part(a);
    fixture
        .viewer
        .set_adapter(host, key.clone(), LoggingAdapter::boxed("first", &log))
        .unwrap();
    let replaced = fixture
        .viewer
        .set_adapter(host, key, LoggingAdapter::boxed("second", &log))
        .unwrap();

    assert!(replaced.is_some());
    assert_eq!(
        log.entries(),
        vec![
            "first:bind",
            "first:activate",
            "first:deactivate",
            "first:unbind",
            "second:bind",
            "second:activate",
        ]
    );
    let current = fixture
        .viewer
        .adapter::<LoggingAdapter>(host, &Role::named("tool"))
        .unwrap();
    assert_eq!(current.name(), "second");
    assert!(current.is_active());
}

/// Capability advertised by adapters that react to pointer hover.
trait HoverPolicy {}

#[test]
fn default_role_falls_back_to_advertised_capability() {
    let Chain {
        mut fixture, a, ..
    } = chain();
    let log = CallLog::new();
    let host = AdapterHost::Part(a);
    let hover = Capability::of::<dyn HoverPolicy>();
    fixture
        .viewer
        .set_adapter(
            host,
            AdapterKey::with_role::<LoggingAdapter>("plain"),
            LoggingAdapter::boxed("plain", &log),
        )
        .unwrap();
    fixture
        .viewer
        .set_adapter(
            host,
            AdapterKey::new(hover, "highlight"),
            Box::new(LoggingAdapter::new("highlight", &log).with_capability(hover)),
        )
        .unwrap();
    assert_eq!(log.names_for("activate"), vec!["plain", "highlight"]);

    let store = fixture.viewer.adapters(host).unwrap();
    let found = store.get(&hover, &Role::DEFAULT).unwrap();
    let any: &dyn Any = found;
    let found = any.downcast_ref::<LoggingAdapter>().unwrap();
    assert_eq!(found.name(), "highlight");
    assert!(found.is_active());
    assert_eq!(store.get_all(&hover).len(), 1);
    assert!(store.get(&hover, &Role::named("other")).is_none());
}

#[test]
fn two_content_parts_registered_on_activation() {
    let mut fixture = SceneFixture::new().unwrap();
    let root = fixture.root();
    let (one, p1) = fixture.attach_content(root, "one").unwrap();
    let (two, p2) = fixture.attach_content(root, "two").unwrap();
    fixture.viewer.activate().unwrap();

    let index = fixture.viewer.content_index();
    assert_eq!(index.len(), 2);
    assert!(index.contains(&(one, p1)));
    assert!(index.contains(&(two.clone(), p2)));
    assert!(fixture.viewer.part(p2).unwrap().is_active());

    fixture.viewer.remove_child(root, p2).unwrap();
    assert!(!fixture.viewer.part(p2).unwrap().is_active());
    assert_eq!(fixture.viewer.content_part(&two), None);
}

#[test]
fn content_conflict_is_invariant_error() {
    let mut fixture = SceneFixture::active().unwrap();
    let root = fixture.root();
    let (content, _) = fixture.attach_content(root, "dup").unwrap();
    let twin = fixture
        .viewer
        .insert_part(sgraph_core::PartBlueprint::content(
            content,
            sgraph_core::VisualRef::new("twin"),
        ))
        .unwrap();
    let err = fixture.viewer.add_child(root, twin).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invariant);
    assert_eq!(fixture.viewer.parent(twin).unwrap(), None);
}

#[test]
fn disposed_viewer_refuses_everything() {
    let Chain { mut fixture, log, .. } = chain();
    fixture.viewer.dispose().unwrap();
    assert_eq!(log.names_for("deactivate"), vec!["B", "A", "R"]);
    assert_eq!(log.names_for("unbind").len(), 3);
    assert!(fixture.viewer.is_disposed());

    let root = fixture.root();
    let err = fixture.viewer.refresh(root).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
    assert_eq!(fixture.viewer.dispose().unwrap_err().kind(), ErrorKind::IllegalState);
}
