#![forbid(unsafe_code)]

//! Structural invariant audit.
//!
//! [`Viewer::audit`] rescans the whole scene and reports every violation it
//! finds as an [`InvariantIssue`] with a stable [`InvariantCode`]. A correct
//! viewer always produces a clean report; the audit exists for tests, fuzz
//! targets and the `verify_invariants` configuration.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::adapter::AdapterKey;
use crate::part::{PartId, PartKind};
use crate::tree::Traversal;
use crate::viewer::Viewer;

/// Stable code for invariant findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvariantCode {
    MissingRoot,
    RootHasParent,
    MissingParent,
    MissingChild,
    ParentMismatch,
    DuplicateChild,
    CycleDetected,
    MissingAnchorage,
    TransposeMismatch,
    ZeroRoleCount,
    SelfAnchorage,
    ContentIndexMissing,
    ContentIndexStale,
    VisualIndexMissing,
    VisualIndexStale,
    ContentKindMismatch,
    ActivationMismatch,
    DuplicateAdapterKey,
}

/// One invariant finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantIssue {
    pub code: InvariantCode,
    pub part: Option<PartId>,
    pub related: Option<PartId>,
    pub message: String,
}

impl fmt::Display for InvariantIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// Result of [`Viewer::audit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvariantReport {
    pub issues: Vec<InvariantIssue>,
}

impl InvariantReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Distinct codes present in the report, sorted.
    #[must_use]
    pub fn codes(&self) -> Vec<InvariantCode> {
        let mut codes: Vec<_> = self.issues.iter().map(|issue| issue.code).collect();
        codes.sort();
        codes.dedup();
        codes
    }
}

fn push_issue(
    issues: &mut Vec<InvariantIssue>,
    code: InvariantCode,
    part: Option<PartId>,
    related: Option<PartId>,
    message: impl Into<String>,
) {
    issues.push(InvariantIssue {
        code,
        part,
        related,
        message: message.into(),
    });
}

impl Viewer {
    /// Check every structural invariant of the scene.
    ///
    /// A disposed viewer has no parts and audits clean.
    #[must_use]
    pub fn audit(&self) -> InvariantReport {
        let mut issues = Vec::new();
        if self.is_disposed() {
            return InvariantReport { issues };
        }

        let root = self.root();
        match self.part(root) {
            None => push_issue(
                &mut issues,
                InvariantCode::MissingRoot,
                Some(root),
                None,
                "root part missing",
            ),
            Some(part) if part.parent().is_some() => push_issue(
                &mut issues,
                InvariantCode::RootHasParent,
                Some(root),
                part.parent(),
                "root part has a parent",
            ),
            Some(part) if part.is_active() != self.is_active() => push_issue(
                &mut issues,
                InvariantCode::ActivationMismatch,
                Some(root),
                None,
                format!(
                    "root active={} but viewer active={}",
                    part.is_active(),
                    self.is_active()
                ),
            ),
            Some(_) => {}
        }

        self.audit_tree(&mut issues);
        self.audit_anchorages(&mut issues);
        self.audit_indices(&mut issues);
        self.audit_adapters(&mut issues);
        InvariantReport { issues }
    }

    fn audit_tree(&self, issues: &mut Vec<InvariantIssue>) {
        for part in self.parts() {
            let id = part.id();
            if let Some(parent) = part.parent() {
                match self.part(parent) {
                    None => push_issue(
                        issues,
                        InvariantCode::MissingParent,
                        Some(id),
                        Some(parent),
                        format!("{id} points at missing parent {parent}"),
                    ),
                    Some(node) => {
                        if !node.children().contains(&id) {
                            push_issue(
                                issues,
                                InvariantCode::ParentMismatch,
                                Some(id),
                                Some(parent),
                                format!("{parent} does not list {id} as a child"),
                            );
                        }
                        if part.is_active() && !node.is_active() {
                            push_issue(
                                issues,
                                InvariantCode::ActivationMismatch,
                                Some(id),
                                Some(parent),
                                format!("{id} is active under inactive {parent}"),
                            );
                        }
                        if node.is_active() && !part.is_active() {
                            push_issue(
                                issues,
                                InvariantCode::ActivationMismatch,
                                Some(id),
                                Some(parent),
                                format!("{id} is inactive under active {parent}"),
                            );
                        }
                    }
                }
            } else if id != self.root() && part.is_active() {
                push_issue(
                    issues,
                    InvariantCode::ActivationMismatch,
                    Some(id),
                    None,
                    format!("detached {id} is active"),
                );
            }

            let mut seen = FxHashSet::default();
            for &child in part.children() {
                if !seen.insert(child) {
                    push_issue(
                        issues,
                        InvariantCode::DuplicateChild,
                        Some(id),
                        Some(child),
                        format!("{child} listed twice under {id}"),
                    );
                }
                match self.part(child) {
                    None => push_issue(
                        issues,
                        InvariantCode::MissingChild,
                        Some(id),
                        Some(child),
                        format!("{id} lists missing child {child}"),
                    ),
                    Some(node) if node.parent() != Some(id) => push_issue(
                        issues,
                        InvariantCode::ParentMismatch,
                        Some(child),
                        Some(id),
                        format!("{child} listed under {id} but has parent {:?}", node.parent()),
                    ),
                    Some(_) => {}
                }
            }

            let mut chain = FxHashSet::default();
            let mut cursor = part.parent();
            while let Some(ancestor) = cursor {
                if ancestor == id || !chain.insert(ancestor) {
                    push_issue(
                        issues,
                        InvariantCode::CycleDetected,
                        Some(id),
                        Some(ancestor),
                        format!("{id} is its own ancestor"),
                    );
                    break;
                }
                cursor = self.part(ancestor).and_then(|p| p.parent());
            }
        }
    }

    fn audit_anchorages(&self, issues: &mut Vec<InvariantIssue>) {
        for part in self.parts() {
            let id = part.id();
            for (&anchorage, counts) in part.anchorages() {
                if anchorage == id {
                    push_issue(
                        issues,
                        InvariantCode::SelfAnchorage,
                        Some(id),
                        Some(id),
                        format!("{id} anchors itself"),
                    );
                }
                for role in counts.zero_roles() {
                    push_issue(
                        issues,
                        InvariantCode::ZeroRoleCount,
                        Some(id),
                        Some(anchorage),
                        format!("zero count for role {role} on {id} -> {anchorage}"),
                    );
                }
                if counts.is_empty() {
                    push_issue(
                        issues,
                        InvariantCode::ZeroRoleCount,
                        Some(id),
                        Some(anchorage),
                        format!("empty link {id} -> {anchorage}"),
                    );
                }
                let Some(other) = self.part(anchorage) else {
                    push_issue(
                        issues,
                        InvariantCode::MissingAnchorage,
                        Some(id),
                        Some(anchorage),
                        format!("{id} anchored on missing {anchorage}"),
                    );
                    continue;
                };
                if other.anchoreds().get(&id) != Some(counts) {
                    push_issue(
                        issues,
                        InvariantCode::TransposeMismatch,
                        Some(id),
                        Some(anchorage),
                        format!(
                            "{anchorage}.anchoreds[{id}] does not mirror {id}.anchorages[{anchorage}]"
                        ),
                    );
                }
            }
            for (&anchored, counts) in part.anchoreds() {
                let mirrored = self
                    .part(anchored)
                    .and_then(|other| other.anchorages().get(&id));
                if mirrored != Some(counts) {
                    push_issue(
                        issues,
                        InvariantCode::TransposeMismatch,
                        Some(id),
                        Some(anchored),
                        format!("{id}.anchoreds[{anchored}] has no matching anchorage"),
                    );
                }
            }
        }
    }

    fn audit_indices(&self, issues: &mut Vec<InvariantIssue>) {
        let attached: FxHashSet<PartId> = self
            .collect_subtree(self.root(), Traversal::PreOrder)
            .into_iter()
            .collect();

        let mut content_expected = FxHashMap::default();
        let mut visual_expected = FxHashMap::default();
        for part in self.parts() {
            let id = part.id();
            match (part.kind(), part.content()) {
                (PartKind::Content, None)
                | (PartKind::Root | PartKind::Feedback | PartKind::Handle, Some(_)) => {
                    push_issue(
                        issues,
                        InvariantCode::ContentKindMismatch,
                        Some(id),
                        None,
                        format!(
                            "{id} of kind {:?} has content={}",
                            part.kind(),
                            part.content().is_some()
                        ),
                    );
                }
                _ => {}
            }
            if !attached.contains(&id) {
                continue;
            }
            if let Some(content) = part.content() {
                content_expected.insert(content.clone(), id);
                if self.content_part(content) != Some(id) {
                    push_issue(
                        issues,
                        InvariantCode::ContentIndexMissing,
                        Some(id),
                        self.content_part(content),
                        format!("attached {id} missing from content index"),
                    );
                }
            }
            visual_expected.insert(part.visual().clone(), id);
            if self.visual_part(part.visual()) != Some(id) {
                push_issue(
                    issues,
                    InvariantCode::VisualIndexMissing,
                    Some(id),
                    self.visual_part(part.visual()),
                    format!("attached {id} missing from visual index"),
                );
            }
        }

        for (content, &id) in &self.content_index {
            if content_expected.get(content) != Some(&id) {
                push_issue(
                    issues,
                    InvariantCode::ContentIndexStale,
                    Some(id),
                    None,
                    format!("content index maps {content:?} to unattached or foreign {id}"),
                );
            }
        }
        for (visual, &id) in &self.visual_index {
            if visual_expected.get(visual) != Some(&id) {
                push_issue(
                    issues,
                    InvariantCode::VisualIndexStale,
                    Some(id),
                    None,
                    format!("visual index maps {visual:?} to unattached or foreign {id}"),
                );
            }
        }
    }

    fn audit_adapters(&self, issues: &mut Vec<InvariantIssue>) {
        let hosts = std::iter::once((None, &self.adapters))
            .chain(self.parts().map(|part| (Some(part.id()), part.adapters())));
        for (host, store) in hosts {
            let mut seen: Vec<&AdapterKey> = Vec::new();
            for key in store.keys() {
                if seen.contains(&key) {
                    push_issue(
                        issues,
                        InvariantCode::DuplicateAdapterKey,
                        host,
                        None,
                        format!("adapter key {key} registered twice"),
                    );
                }
                seen.push(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImmediateDomain;
    use crate::identity::{ContentRef, VisualRef};
    use crate::part::PartBlueprint;
    use std::rc::Rc;

    fn scene() -> (Viewer, PartId, PartId) {
        let mut viewer = Viewer::new(VisualRef::new(()));
        viewer.set_domain(Rc::new(ImmediateDomain::default())).unwrap();
        viewer.activate().unwrap();
        let root = viewer.root();
        let a = viewer
            .insert_part(PartBlueprint::content(ContentRef::new("a"), VisualRef::new(())))
            .unwrap();
        let b = viewer
            .insert_part(PartBlueprint::content(ContentRef::new("b"), VisualRef::new(())))
            .unwrap();
        viewer.add_child(root, a).unwrap();
        viewer.add_child(a, b).unwrap();
        viewer.add_anchorage(b, a, "source").unwrap();
        (viewer, a, b)
    }

    #[test]
    fn healthy_scene_is_clean() {
        let (viewer, _, _) = scene();
        let report = viewer.audit();
        assert!(report.is_clean(), "{:?}", report.issues);
    }

    #[test]
    fn broken_parent_link_is_reported() {
        let (mut viewer, a, b) = scene();
        if let Some(part) = viewer.parts.get_mut(&a) {
            part.children.clear();
        }
        let report = viewer.audit();
        assert!(report.codes().contains(&InvariantCode::ParentMismatch));
        assert!(report.issues.iter().any(|i| i.part == Some(b)));
    }

    #[test]
    fn broken_transpose_is_reported() {
        let (mut viewer, a, _) = scene();
        if let Some(part) = viewer.parts.get_mut(&a) {
            part.anchoreds.clear();
        }
        assert_eq!(viewer.audit().codes(), vec![InvariantCode::TransposeMismatch]);
    }

    #[test]
    fn stale_index_is_reported() {
        let (mut viewer, _, _) = scene();
        viewer.content_index.insert(ContentRef::new("ghost"), viewer.root());
        assert_eq!(viewer.audit().codes(), vec![InvariantCode::ContentIndexStale]);
    }

    #[test]
    fn activation_mismatch_is_reported() {
        let (mut viewer, _, b) = scene();
        if let Some(part) = viewer.parts.get_mut(&b) {
            part.adapters.deactivate();
        }
        assert_eq!(viewer.audit().codes(), vec![InvariantCode::ActivationMismatch]);
    }
}
