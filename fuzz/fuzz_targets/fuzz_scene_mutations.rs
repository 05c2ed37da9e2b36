#![no_main]

use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sgraph_core::{
    ContentRef, ImmediateDomain, PartBlueprint, PartId, Role, Viewer, ViewerConfig, VisualRef,
};

#[derive(Debug, Arbitrary)]
enum Op {
    Content,
    Feedback,
    AddChild { parent: u8, child: u8 },
    InsertChild { parent: u8, child: u8, index: u8 },
    RemoveChild { parent: u8, child: u8 },
    Reorder { parent: u8, child: u8, index: u8 },
    AddAnchorage { anchored: u8, anchorage: u8, role: u8 },
    RemoveAnchorage { anchored: u8, anchorage: u8, role: u8 },
    Dispose { part: u8 },
    Refresh { part: u8 },
    Suppress { part: u8, on: bool },
    Toggle,
}

fn pick(viewer: &Viewer, sel: u8) -> PartId {
    let ids: Vec<PartId> = viewer.parts().map(|p| p.id()).collect();
    ids[sel as usize % ids.len()]
}

fn pick_child(viewer: &Viewer, parent: PartId, sel: u8) -> Option<PartId> {
    let children = viewer.children(parent).ok()?;
    (!children.is_empty()).then(|| children[sel as usize % children.len()])
}

fn role(sel: u8) -> Role {
    match sel % 3 {
        0 => Role::DEFAULT,
        1 => Role::named("source"),
        _ => Role::named("target"),
    }
}

fuzz_target!(|ops: Vec<Op>| {
    if ops.len() > 256 {
        return;
    }
    let config = ViewerConfig::default().with_verify_invariants(true);
    let Ok(mut viewer) = Viewer::with_config(VisualRef::new("root"), config) else {
        return;
    };
    if viewer.set_domain(Rc::new(ImmediateDomain::default())).is_err() {
        return;
    }
    viewer.set_content_part_factory(|_: &Viewer, content: &ContentRef| {
        Some(PartBlueprint::content(content.clone(), VisualRef::new(())))
    });

    let mut next = 0_u32;
    for op in &ops {
        let _ = match *op {
            Op::Content => {
                next += 1;
                viewer.create_content_part(&ContentRef::new(next)).map(drop)
            }
            Op::Feedback => viewer
                .insert_part(PartBlueprint::feedback(VisualRef::new(())))
                .map(drop),
            Op::AddChild { parent, child } => {
                let (parent, child) = (pick(&viewer, parent), pick(&viewer, child));
                viewer.add_child(parent, child)
            }
            Op::InsertChild { parent, child, index } => {
                let (parent, child) = (pick(&viewer, parent), pick(&viewer, child));
                viewer.insert_child(parent, child, usize::from(index % 8))
            }
            Op::RemoveChild { parent, child } => {
                let parent = pick(&viewer, parent);
                match pick_child(&viewer, parent, child) {
                    Some(child) => viewer.remove_child(parent, child),
                    None => Ok(()),
                }
            }
            Op::Reorder { parent, child, index } => {
                let parent = pick(&viewer, parent);
                match pick_child(&viewer, parent, child) {
                    Some(child) => viewer.reorder_child(parent, child, usize::from(index % 8)),
                    None => Ok(()),
                }
            }
            Op::AddAnchorage { anchored, anchorage, role: r } => {
                let (a, b) = (pick(&viewer, anchored), pick(&viewer, anchorage));
                viewer.add_anchorage(a, b, role(r))
            }
            Op::RemoveAnchorage { anchored, anchorage, role: r } => {
                let (a, b) = (pick(&viewer, anchored), pick(&viewer, anchorage));
                viewer.remove_anchorage(a, b, role(r))
            }
            Op::Dispose { part } => {
                let part = pick(&viewer, part);
                viewer.dispose_part(part)
            }
            Op::Refresh { part } => {
                let part = pick(&viewer, part);
                viewer.refresh(part).map(drop)
            }
            Op::Suppress { part, on } => {
                let part = pick(&viewer, part);
                viewer.set_refresh_suppressed(part, on)
            }
            Op::Toggle => {
                if viewer.is_active() {
                    viewer.deactivate()
                } else {
                    viewer.activate()
                }
            }
        };
        let report = viewer.audit();
        assert!(report.is_clean(), "{op:?}: {:?}", report.issues);
    }

    let _ = viewer.dispose();
    assert!(viewer.is_empty());
});
