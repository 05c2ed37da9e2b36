#![forbid(unsafe_code)]

//! Content synchronization.
//!
//! Reconciles the content children of a part against an ordered list of
//! content objects. Content identity must be unique within the list; the
//! synchronizer checks this up front so the viewer's content index never
//! sees a duplicate.
//!
//! After a successful run the first `contents.len()` children of the parent
//! are the content parts for `contents`, in order. Children without content
//! (feedback, handles) keep their relative order behind them.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::{Result, SceneError};
use crate::identity::ContentRef;
use crate::part::{PartId, PartKind};
use crate::viewer::Viewer;

/// Outcome of one synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Parts created through the content factory.
    pub added: Vec<PartId>,
    /// Parts removed and disposed because their content is gone.
    pub removed: Vec<PartId>,
    /// Existing parts that were reordered or reparented.
    pub moved: Vec<PartId>,
}

impl SyncReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.moved.is_empty()
    }
}

/// Strategy keeping a part's content children in step with the model.
///
/// A run is a sequence of viewer operations, each atomic on its own, but
/// the run as a whole is not. If the content factory declines part-way,
/// the removals, disposals and moves already made stay applied and the
/// error is returned. [`ChildContentSynchronizer`] only rejects duplicate
/// content before changing anything; calling `synchronize` again with the
/// same list resumes from the partial state.
pub trait ContentSynchronizer {
    fn synchronize(
        &mut self,
        viewer: &mut Viewer,
        parent: PartId,
        contents: &[ContentRef],
    ) -> Result<SyncReport>;
}

/// Synchronizer for the direct children of one part.
///
/// Parts for known content are reused: children of `parent` are matched by
/// content first, then the viewer's content index, so a content object
/// that moved between parents keeps its part.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildContentSynchronizer;

impl ChildContentSynchronizer {
    fn find_child(viewer: &Viewer, parent: PartId, content: &ContentRef) -> Result<Option<PartId>> {
        for &child in viewer.children(parent)? {
            if viewer.part(child).and_then(|p| p.content()) == Some(content) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }
}

impl ContentSynchronizer for ChildContentSynchronizer {
    fn synchronize(
        &mut self,
        viewer: &mut Viewer,
        parent: PartId,
        contents: &[ContentRef],
    ) -> Result<SyncReport> {
        let mut wanted = FxHashSet::default();
        for (position, content) in contents.iter().enumerate() {
            if !wanted.insert(content) {
                return Err(SceneError::DuplicateContent { position });
            }
        }

        let mut report = SyncReport::default();
        let stale: Vec<PartId> = viewer
            .children(parent)?
            .iter()
            .copied()
            .filter(|&child| {
                viewer.part(child).is_some_and(|part| {
                    part.kind() == PartKind::Content
                        && part.content().is_some_and(|c| !wanted.contains(c))
                })
            })
            .collect();
        for child in stale {
            viewer.remove_child(parent, child)?;
            viewer.dispose_part(child)?;
            report.removed.push(child);
        }

        for (index, content) in contents.iter().enumerate() {
            let existing = match Self::find_child(viewer, parent, content)? {
                Some(child) => Some(child),
                None => viewer.content_part(content),
            };
            let len = viewer.children(parent)?.len();
            match existing {
                Some(part) if viewer.parent(part)? == Some(parent) => {
                    let target = index.min(len.saturating_sub(1));
                    let position = viewer.part(parent).and_then(|p| p.child_index(part));
                    if position != Some(target) {
                        viewer.reorder_child(parent, part, target)?;
                        report.moved.push(part);
                    }
                }
                Some(part) => {
                    viewer.insert_child(parent, part, index.min(len))?;
                    report.moved.push(part);
                }
                None => {
                    let part = viewer.create_content_part(content)?;
                    viewer.insert_child(parent, part, index.min(len))?;
                    report.added.push(part);
                }
            }
        }

        debug!(
            %parent,
            added = report.added.len(),
            removed = report.removed.len(),
            moved = report.moved.len(),
            "content synchronized"
        );
        Ok(report)
    }
}
