#![forbid(unsafe_code)]

//! Part tree operations.
//!
//! # Design
//!
//! Containment is stored as `parent` on the child plus an ordered
//! `children` list on the parent. Only the operations here touch either
//! side, and they always touch both.
//!
//! Attaching a subtree to a part reachable from the root registers it in
//! the identity indices and, if the new parent is active, activates it
//! pre-order. Detaching runs the reverse: post-order deactivation first,
//! then unlinking and unregistering. Events are queued in that order, so
//! deactivation notifications precede the removal notification.
//!
//! # Invariants
//!
//! 1. `p.children` contains `c` exactly once iff `c.parent == Some(p)`.
//! 2. The root never has a parent and no part is its own ancestor.
//! 3. A part is active iff its parent is active (the root follows the
//!    viewer).
//!
//! # Failure Modes
//!
//! Every operation validates all of its arguments (including index
//! conflicts for the whole subtree being attached) before changing
//! anything; batch forms validate the whole batch first.

use tracing::{debug, debug_span, trace};

use crate::adapter::AdapterHost;
use crate::error::{Result, SceneError};
use crate::notify::SceneEvent;
use crate::part::PartId;
use crate::viewer::Viewer;

/// Subtree traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Parent before children.
    PreOrder,
    /// Children before parent.
    PostOrder,
}

impl Viewer {
    // ========================================================================
    // Queries
    // ========================================================================

    pub fn parent(&self, part: PartId) -> Result<Option<PartId>> {
        Ok(self.require(part)?.parent)
    }

    pub fn children(&self, part: PartId) -> Result<&[PartId]> {
        Ok(&self.require(part)?.children)
    }

    /// Whether `part` is reachable from the root.
    #[must_use]
    pub fn is_attached(&self, part: PartId) -> bool {
        let mut cursor = Some(part);
        while let Some(id) = cursor {
            if id == self.root() {
                return true;
            }
            cursor = self.parts.get(&id).and_then(|p| p.parent);
        }
        false
    }

    /// Ancestors of `part`, nearest first.
    pub fn ancestors(&self, part: PartId) -> Result<Vec<PartId>> {
        let mut out = Vec::new();
        let mut cursor = self.require(part)?.parent;
        while let Some(id) = cursor {
            out.push(id);
            cursor = self.parts.get(&id).and_then(|p| p.parent);
        }
        Ok(out)
    }

    /// `top` and all of its descendants.
    pub fn subtree(&self, top: PartId, order: Traversal) -> Result<Vec<PartId>> {
        self.require(top)?;
        Ok(self.collect_subtree(top, order))
    }

    pub(crate) fn collect_subtree(&self, top: PartId, order: Traversal) -> Vec<PartId> {
        let mut out = Vec::new();
        if !self.parts.contains_key(&top) {
            return out;
        }
        match order {
            Traversal::PreOrder => {
                let mut stack = vec![top];
                while let Some(id) = stack.pop() {
                    out.push(id);
                    if let Some(part) = self.parts.get(&id) {
                        stack.extend(part.children.iter().rev().copied());
                    }
                }
            }
            Traversal::PostOrder => {
                // (part, children already pushed)
                let mut stack = vec![(top, false)];
                while let Some((id, expanded)) = stack.pop() {
                    if expanded {
                        out.push(id);
                        continue;
                    }
                    stack.push((id, true));
                    if let Some(part) = self.parts.get(&id) {
                        stack.extend(part.children.iter().rev().map(|&c| (c, false)));
                    }
                }
            }
        }
        out
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append `child` to `parent.children`, detaching it from its previous
    /// parent first.
    pub fn add_child(&mut self, parent: PartId, child: PartId) -> Result<()> {
        self.ensure_mutable("add_child")?;
        let index = self.require(parent)?.children.len();
        self.insert_child(parent, child, index)
    }

    /// Insert `child` at `index` in `parent.children`.
    pub fn insert_child(&mut self, parent: PartId, child: PartId, index: usize) -> Result<()> {
        self.ensure_mutable("insert_child")?;
        self.validate_attach(parent, &[child], index)?;
        self.attach(parent, child, index);
        self.finish()
    }

    /// Insert `children` in list order starting at `index` (end of list when
    /// `None`).
    pub fn add_children(
        &mut self,
        parent: PartId,
        children: &[PartId],
        index: Option<usize>,
    ) -> Result<()> {
        self.ensure_mutable("add_children")?;
        let index = match index {
            Some(index) => index,
            None => self.require(parent)?.children.len(),
        };
        let children = Self::dedup(children)?;
        self.validate_attach(parent, &children, index)?;
        for (offset, &child) in children.iter().enumerate() {
            self.attach(parent, child, index + offset);
        }
        self.finish()
    }

    pub fn remove_child(&mut self, parent: PartId, child: PartId) -> Result<()> {
        self.ensure_mutable("remove_child")?;
        self.validate_detach(parent, &[child])?;
        self.detach(parent, child);
        self.finish()
    }

    pub fn remove_children(&mut self, parent: PartId, children: &[PartId]) -> Result<()> {
        self.ensure_mutable("remove_children")?;
        let children = Self::dedup(children)?;
        self.validate_detach(parent, &children)?;
        for child in children {
            self.detach(parent, child);
        }
        self.finish()
    }

    /// Move `child` to `index` within `parent.children`. No attach or
    /// detach happens; a move to the current position fires nothing.
    pub fn reorder_child(&mut self, parent: PartId, child: PartId, index: usize) -> Result<()> {
        self.ensure_mutable("reorder_child")?;
        self.validate_detach(parent, &[child])?;
        let node = self.require_mut(parent)?;
        let len = node.children.len();
        if index >= len {
            return Err(SceneError::IndexOutOfRange { index, len });
        }
        let Some(from) = node.child_index(child) else {
            return Err(SceneError::NotAChild { parent, child });
        };
        if from == index {
            return Ok(());
        }
        node.children.remove(from);
        node.children.insert(index, child);
        debug!(%parent, %child, from, to = index, "child reordered");
        self.emit(SceneEvent::ChildReordered {
            parent,
            child,
            from,
            to: index,
        });
        self.finish()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn validate_attach(&self, parent: PartId, children: &[PartId], index: usize) -> Result<()> {
        let node = self.require(parent)?;
        let len = node.children.len();
        if index > len {
            return Err(SceneError::IndexOutOfRange { index, len });
        }
        let ancestors = self.ancestors(parent)?;
        let mut incoming = Vec::new();
        for &child in children {
            let part = self.require(child)?;
            if child == parent {
                return Err(SceneError::SelfChild { part: child });
            }
            if child == self.root() {
                return Err(SceneError::RootNotMovable { root: child });
            }
            if ancestors.contains(&child) {
                return Err(SceneError::CycleDetected { parent, child });
            }
            if part.parent == Some(parent) {
                return Err(SceneError::AlreadyChild { parent, child });
            }
            if !self.is_attached(child) {
                for id in self.collect_subtree(child, Traversal::PreOrder) {
                    if !incoming.contains(&id) {
                        incoming.push(id);
                    }
                }
            }
        }
        if self.is_attached(parent) {
            self.check_index_conflicts(&incoming)?;
        }
        Ok(())
    }

    fn validate_detach(&self, parent: PartId, children: &[PartId]) -> Result<()> {
        let node = self.require(parent)?;
        for &child in children {
            self.require(child)?;
            if node.child_index(child).is_none() {
                return Err(SceneError::NotAChild { parent, child });
            }
        }
        Ok(())
    }

    /// Link a validated child under `parent`, detaching it from its old
    /// parent first.
    fn attach(&mut self, parent: PartId, child: PartId, index: usize) {
        let old_parent = self.parts.get(&child).and_then(|p| p.parent);
        let was_attached = self.is_attached(child);
        if let Some(old) = old_parent {
            self.detach(old, child);
        }

        let Some(node) = self.parts.get_mut(&parent) else {
            return;
        };
        let index = index.min(node.children.len());
        node.children.insert(index, child);
        if let Some(part) = self.parts.get_mut(&child) {
            part.parent = Some(parent);
        }
        if self.is_attached(parent) {
            let members = self.collect_subtree(child, Traversal::PreOrder);
            self.register(&members);
        }
        debug!(
            %parent,
            %child,
            index,
            reparented = old_parent.is_some(),
            was_attached,
            "child added"
        );

        if self.parts.get(&parent).is_some_and(|p| p.is_active()) {
            self.activate_subtree(child);
        }
        if self.config().refresh_on_attach {
            self.refresh_part(child);
        }
        self.emit(SceneEvent::ChildAdded {
            parent,
            child,
            index,
        });
    }

    /// Unlink a validated child: deactivate its subtree, remove it, drop it
    /// from the indices.
    fn detach(&mut self, parent: PartId, child: PartId) {
        if self.parts.get(&child).is_some_and(|p| p.is_active()) {
            self.deactivate_subtree(child);
        }
        let attached = self.is_attached(parent);
        if attached {
            let members = self.collect_subtree(child, Traversal::PreOrder);
            self.unregister(&members);
        }
        let Some(node) = self.parts.get_mut(&parent) else {
            return;
        };
        let Some(index) = node.child_index(child) else {
            return;
        };
        node.children.remove(index);
        if let Some(part) = self.parts.get_mut(&child) {
            part.parent = None;
        }
        debug!(%parent, %child, index, "child removed");
        self.emit(SceneEvent::ChildRemoved {
            parent,
            child,
            index,
        });
    }

    /// Activate `top` and its descendants, parents first.
    pub(crate) fn activate_subtree(&mut self, top: PartId) {
        let span = debug_span!("activate_subtree", part = %top);
        let _guard = span.enter();
        for id in self.collect_subtree(top, Traversal::PreOrder) {
            if let Some(part) = self.parts.get_mut(&id)
                && part.adapters.activate()
            {
                trace!(part = %id, "activated");
                self.emit(SceneEvent::Activated {
                    host: AdapterHost::Part(id),
                });
            }
        }
    }

    /// Deactivate `top` and its descendants, children first.
    pub(crate) fn deactivate_subtree(&mut self, top: PartId) {
        let span = debug_span!("deactivate_subtree", part = %top);
        let _guard = span.enter();
        for id in self.collect_subtree(top, Traversal::PostOrder) {
            if let Some(part) = self.parts.get_mut(&id)
                && part.adapters.deactivate()
            {
                trace!(part = %id, "deactivated");
                self.emit(SceneEvent::Deactivated {
                    host: AdapterHost::Part(id),
                });
            }
        }
    }
}
