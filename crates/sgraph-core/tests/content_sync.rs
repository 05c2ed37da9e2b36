#![forbid(unsafe_code)]

//! Content synchronization against a live, active scene.

use std::cell::Cell;
use std::rc::Rc;

use sgraph_core::{
    AdapterHost, AdapterKey, ChildContentSynchronizer, ContentRef, ContentSynchronizer, ErrorKind,
    PartBlueprint, PartId, VisualRef,
};
use sgraph_harness::{CallLog, EventRecorder, LoggingAdapter, SceneFixture};

fn child_contents(fixture: &SceneFixture, parent: PartId) -> Vec<ContentRef> {
    fixture
        .viewer
        .children(parent)
        .unwrap()
        .iter()
        .filter_map(|&child| fixture.viewer.part(child).and_then(|p| p.content()).cloned())
        .collect()
}

#[test]
fn sync_follows_model_edits() {
    let mut fixture = SceneFixture::active().unwrap();
    let root = fixture.root();
    let model: Vec<ContentRef> = ["a", "b", "c", "d"].into_iter().map(ContentRef::new).collect();
    let mut sync = ChildContentSynchronizer;

    let report = sync.synchronize(&mut fixture.viewer, root, &model).unwrap();
    assert_eq!(report.added.len(), 4);
    assert_eq!(child_contents(&fixture, root), model);

    // Reverse and drop one.
    let edited = vec![model[3].clone(), model[2].clone(), model[0].clone()];
    let kept_d = fixture.viewer.content_part(&model[3]).unwrap();
    let report = sync.synchronize(&mut fixture.viewer, root, &edited).unwrap();
    assert!(report.added.is_empty());
    assert_eq!(report.removed.len(), 1);
    assert_eq!(child_contents(&fixture, root), edited);
    assert_eq!(fixture.viewer.content_part(&model[3]), Some(kept_d));
    assert!(fixture.viewer.content_part(&model[1]).is_none());
    assert!(fixture.viewer.audit().is_clean());
}

#[test]
fn non_content_children_stay_behind() {
    let mut fixture = SceneFixture::active().unwrap();
    let root = fixture.root();
    let feedback = fixture.feedback().unwrap();
    fixture.viewer.add_child(root, feedback).unwrap();
    let model = vec![ContentRef::new("x"), ContentRef::new("y")];

    ChildContentSynchronizer
        .synchronize(&mut fixture.viewer, root, &model)
        .unwrap();

    let children = fixture.viewer.children(root).unwrap();
    assert_eq!(children.len(), 3);
    assert_eq!(children[2], feedback);
    assert_eq!(child_contents(&fixture, root), model);
}

#[test]
fn removed_parts_are_deactivated_and_disposed() {
    let mut fixture = SceneFixture::active().unwrap();
    let root = fixture.root();
    let log = CallLog::new();
    let model = vec![ContentRef::new("keep"), ContentRef::new("drop")];
    ChildContentSynchronizer
        .synchronize(&mut fixture.viewer, root, &model)
        .unwrap();
    let dropped = fixture.viewer.content_part(&model[1]).unwrap();
    fixture
        .viewer
        .set_adapter(
            AdapterHost::Part(dropped),
            AdapterKey::of::<LoggingAdapter>(),
            LoggingAdapter::boxed("drop", &log),
        )
        .unwrap();
    log.clear();

    let recorder = EventRecorder::attach(&mut fixture.viewer).unwrap();
    let report = ChildContentSynchronizer
        .synchronize(&mut fixture.viewer, root, &model[..1])
        .unwrap();

    assert_eq!(report.removed, vec![dropped]);
    assert_eq!(log.entries(), vec!["drop:deactivate", "drop:unbind"]);
    assert_eq!(
        recorder.labels(),
        vec!["deactivated", "child-removed", "part-disposed"]
    );
    assert!(fixture.viewer.part(dropped).is_none());
}

#[test]
fn duplicate_content_is_invalid_argument() {
    let mut fixture = SceneFixture::active().unwrap();
    let root = fixture.root();
    let a = ContentRef::new("a");
    let err = ChildContentSynchronizer
        .synchronize(&mut fixture.viewer, root, &[a.clone(), ContentRef::new("b"), a])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(fixture.viewer.children(root).unwrap().is_empty());
}

#[test]
fn factory_declining_keeps_partial_run() {
    let mut fixture = SceneFixture::active().unwrap();
    let root = fixture.root();
    let stale = ContentRef::new("stale");
    ChildContentSynchronizer
        .synchronize(&mut fixture.viewer, root, std::slice::from_ref(&stale))
        .unwrap();

    let refused = ContentRef::new("refused");
    let marker = refused.clone();
    let allow = Rc::new(Cell::new(false));
    let gate = Rc::clone(&allow);
    fixture
        .viewer
        .set_content_part_factory(move |_: &sgraph_core::Viewer, content: &ContentRef| {
            (gate.get() || content != &marker).then(|| {
                PartBlueprint::content(content.clone(), VisualRef::new(content.type_name()))
            })
        });

    let model = vec![ContentRef::new("ok"), refused];
    let err = ChildContentSynchronizer
        .synchronize(&mut fixture.viewer, root, &model)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    // Work done before the refusal stays applied.
    assert!(fixture.viewer.content_part(&stale).is_none());
    assert_eq!(child_contents(&fixture, root), &model[..1]);
    assert!(fixture.viewer.audit().is_clean());

    allow.set(true);
    let report = ChildContentSynchronizer
        .synchronize(&mut fixture.viewer, root, &model)
        .unwrap();
    assert_eq!(report.added.len(), 1);
    assert!(report.removed.is_empty());
    assert_eq!(child_contents(&fixture, root), model);
}
