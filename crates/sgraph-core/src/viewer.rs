#![forbid(unsafe_code)]

//! The viewer: part arena, identity indices and lifecycle.
//!
//! # Design
//!
//! A [`Viewer`] owns every part in an arena keyed by [`PartId`], exactly one
//! of which is the root. Parts created through [`Viewer::insert_part`] start
//! detached; tree operations ([`crate::tree`]) attach them under the root.
//! Two identity indices follow tree membership:
//!
//! - content object -> content part
//! - visual handle -> part
//!
//! A part is indexed iff it is reachable from the root. Indices track
//! membership, not activation: deactivating the viewer leaves them intact.
//!
//! # Mutation protocol
//!
//! Every public mutation runs the same steps:
//!
//! 1. [`ensure_mutable`](Viewer::ensure_mutable): refuse on a disposed
//!    viewer or when listener deliveries are nested too deeply.
//! 2. Validate every argument. Nothing has changed if this fails.
//! 3. Apply the change, queueing [`SceneEvent`]s.
//! 4. [`finish`](Viewer::finish): optionally audit, then deliver the queued
//!    events to listeners.
//!
//! # Failure Modes
//!
//! - Index conflicts (two attached parts sharing a content object or a
//!   visual) are rejected before the tree changes and reported as
//!   `Invariant` errors at error level.
//! - After [`Viewer::dispose`] every mutation fails with
//!   [`SceneError::Disposed`] and queries see an empty scene.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error, trace, warn};

use crate::adapter::{Adapter, AdapterHost, AdapterKey, AdapterStore, DynAdapter};
use crate::config::{ViewerConfig, ViewerConfigError};
use crate::domain::{Domain, Operation};
use crate::error::{Result, SceneError};
use crate::factory::{ContentPartFactory, FeedbackPartFactory, HandlePartFactory};
use crate::identity::{ContentRef, VisualRef};
use crate::notify::{ListenerList, SceneEvent, Subscription};
use crate::part::{Part, PartBlueprint, PartId, PartIdAllocator, PartKind};
use crate::role::Role;
use crate::tree::Traversal;

/// Owner of one rooted part tree plus its identity indices.
pub struct Viewer {
    root: PartId,
    pub(crate) parts: BTreeMap<PartId, Part>,
    ids: PartIdAllocator,
    pub(crate) content_index: FxHashMap<ContentRef, PartId>,
    pub(crate) visual_index: FxHashMap<VisualRef, PartId>,
    pub(crate) adapters: AdapterStore,
    domain: Option<Rc<dyn Domain>>,
    content_factory: Option<Box<dyn ContentPartFactory>>,
    feedback_factory: Option<Box<dyn FeedbackPartFactory>>,
    handle_factory: Option<Box<dyn HandlePartFactory>>,
    listeners: ListenerList,
    pending: Vec<SceneEvent>,
    config: ViewerConfig,
    disposed: bool,
    dispatch_depth: usize,
}

impl Viewer {
    /// Create an inactive viewer whose root part controls `root_visual`.
    #[must_use]
    pub fn new(root_visual: VisualRef) -> Self {
        let (root, ids) = PartIdAllocator::with_root();
        let mut parts = BTreeMap::new();
        parts.insert(root, Part::new(root, PartKind::Root, root_visual.clone(), None));
        let mut visual_index = FxHashMap::default();
        visual_index.insert(root_visual, root);
        Self {
            root,
            parts,
            ids,
            content_index: FxHashMap::default(),
            visual_index,
            adapters: AdapterStore::new(),
            domain: None,
            content_factory: None,
            feedback_factory: None,
            handle_factory: None,
            listeners: ListenerList::default(),
            pending: Vec::new(),
            config: ViewerConfig::default(),
            disposed: false,
            dispatch_depth: 0,
        }
    }

    /// Create a viewer with a validated configuration.
    pub fn with_config(
        root_visual: VisualRef,
        config: ViewerConfig,
    ) -> std::result::Result<Self, ViewerConfigError> {
        let mut viewer = Self::new(root_visual);
        viewer.config = config.checked()?;
        Ok(viewer)
    }

    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[must_use]
    pub fn root(&self) -> PartId {
        self.root
    }

    #[must_use]
    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(&id)
    }

    /// All parts, attached or not, in id order.
    pub fn parts(&self) -> impl Iterator<Item = &Part> + '_ {
        self.parts.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.adapters.is_active()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Content part registered for `content`.
    #[must_use]
    pub fn content_part(&self, content: &ContentRef) -> Option<PartId> {
        self.content_index.get(content).copied()
    }

    /// Part owning `visual`.
    #[must_use]
    pub fn visual_part(&self, visual: &VisualRef) -> Option<PartId> {
        self.visual_index.get(visual).copied()
    }

    /// Snapshot of the content index, in part order.
    #[must_use]
    pub fn content_index(&self) -> Vec<(ContentRef, PartId)> {
        let mut entries: Vec<_> = self
            .content_index
            .iter()
            .map(|(content, &part)| (content.clone(), part))
            .collect();
        entries.sort_by_key(|(_, part)| *part);
        entries
    }

    #[must_use]
    pub fn visual_index_len(&self) -> usize {
        self.visual_index.len()
    }

    // ========================================================================
    // Domain and lifecycle
    // ========================================================================

    #[must_use]
    pub fn domain(&self) -> Option<&Rc<dyn Domain>> {
        self.domain.as_ref()
    }

    /// Set the execution domain. Only allowed while inactive; setting the
    /// current domain again is a no-op.
    pub fn set_domain(&mut self, domain: Rc<dyn Domain>) -> Result<()> {
        self.ensure_usable("set_domain")?;
        if let Some(current) = &self.domain
            && Rc::ptr_eq(current, &domain)
        {
            return Ok(());
        }
        if self.is_active() {
            return Err(SceneError::DomainLocked);
        }
        debug!(domain = domain.name(), "domain set");
        self.domain = Some(domain);
        Ok(())
    }

    pub fn clear_domain(&mut self) -> Result<()> {
        self.ensure_usable("clear_domain")?;
        if self.is_active() {
            return Err(SceneError::DomainLocked);
        }
        self.domain = None;
        Ok(())
    }

    /// Activate the viewer's adapters, then the root subtree pre-order.
    pub fn activate(&mut self) -> Result<()> {
        self.ensure_mutable("activate")?;
        if self.domain.is_none() {
            return Err(SceneError::NoDomain);
        }
        if !self.adapters.activate() {
            return Ok(());
        }
        trace!(host = "viewer", "activated");
        self.emit(SceneEvent::Activated {
            host: AdapterHost::Viewer,
        });
        self.activate_subtree(self.root);
        self.finish()
    }

    /// Deactivate the root subtree post-order, then the viewer's adapters in
    /// reverse registration order. Idempotent.
    pub fn deactivate(&mut self) -> Result<()> {
        self.ensure_mutable("deactivate")?;
        if !self.is_active() {
            return Ok(());
        }
        self.deactivate_subtree(self.root);
        if self.adapters.deactivate() {
            trace!(host = "viewer", "deactivated");
            self.emit(SceneEvent::Deactivated {
                host: AdapterHost::Viewer,
            });
        }
        self.finish()
    }

    /// Deactivate, dispose every adapter store and drop all parts.
    ///
    /// Deactivation events are still delivered; afterwards the viewer
    /// refuses every mutation.
    pub fn dispose(&mut self) -> Result<()> {
        self.ensure_usable("dispose")?;
        if self.is_active() {
            self.deactivate()?;
        }
        let mut order = Vec::new();
        for top in self.detached_parts() {
            order.extend(self.collect_subtree(top, Traversal::PostOrder));
        }
        order.extend(self.collect_subtree(self.root, Traversal::PostOrder));
        for id in &order {
            if let Some(part) = self.parts.get_mut(id) {
                part.adapters.dispose();
                part.listeners.clear();
            }
        }
        let viewer_adapters = self.adapters.dispose();
        debug!(
            parts = order.len(),
            viewer_adapters = viewer_adapters.len(),
            "viewer disposed"
        );
        self.parts.clear();
        self.content_index.clear();
        self.visual_index.clear();
        self.listeners.clear();
        self.pending.clear();
        self.content_factory = None;
        self.feedback_factory = None;
        self.handle_factory = None;
        self.domain = None;
        self.disposed = true;
        Ok(())
    }

    /// Run `operation` through the domain.
    pub fn execute(&mut self, operation: &mut dyn Operation) -> Result<()> {
        self.ensure_usable("execute")?;
        let Some(domain) = self.domain.clone() else {
            return Err(SceneError::NoDomain);
        };
        domain.execute(self, operation)
    }

    // ========================================================================
    // Parts
    // ========================================================================

    /// Materialize `blueprint` as a detached, inactive part.
    pub fn insert_part(&mut self, blueprint: PartBlueprint) -> Result<PartId> {
        self.ensure_mutable("insert_part")?;
        check_blueprint(&blueprint)?;

        let id = self.ids.allocate()?;
        let PartBlueprint {
            kind,
            visual,
            content,
            adapters,
        } = blueprint;
        let mut part = Part::new(id, kind, visual, content);
        for (key, adapter) in adapters {
            part.adapters.set(AdapterHost::Part(id), key, adapter)?;
        }
        debug!(part = %id, kind = ?kind, adapters = part.adapters.len(), "part inserted");
        self.parts.insert(id, part);
        self.finish()?;
        Ok(id)
    }

    /// Dispose a detached part together with its subtree.
    ///
    /// Anchorage links touching any disposed part are removed first (with
    /// events), then adapters are disposed and the parts dropped.
    pub fn dispose_part(&mut self, id: PartId) -> Result<()> {
        self.ensure_mutable("dispose_part")?;
        if id == self.root {
            return Err(SceneError::RootNotDisposable { root: id });
        }
        if self.require(id)?.parent.is_some() {
            return Err(SceneError::PartAttached { part: id });
        }

        let order = self.collect_subtree(id, Traversal::PostOrder);
        for &part in &order {
            self.unlink_all_anchorages(part);
        }
        for part in order {
            if let Some(mut node) = self.parts.remove(&part) {
                let removed = node.adapters.dispose();
                debug!(%part, adapters = removed.len(), "part disposed");
                self.emit(SceneEvent::PartDisposed { part });
            }
        }
        self.finish()
    }

    /// Refresh a part's visual through its adapters.
    ///
    /// Returns `false` without doing anything while refresh is suppressed.
    pub fn refresh(&mut self, id: PartId) -> Result<bool> {
        self.ensure_mutable("refresh")?;
        self.require(id)?;
        let refreshed = self.refresh_part(id);
        self.finish()?;
        Ok(refreshed)
    }

    pub fn set_refresh_suppressed(&mut self, id: PartId, suppressed: bool) -> Result<()> {
        self.ensure_mutable("set_refresh_suppressed")?;
        self.require_mut(id)?.refresh_suppressed = suppressed;
        trace!(part = %id, suppressed, "refresh suppression");
        Ok(())
    }

    pub(crate) fn refresh_part(&mut self, id: PartId) -> bool {
        let Some(part) = self.parts.get_mut(&id) else {
            return false;
        };
        if part.refresh_suppressed {
            trace!(part = %id, "refresh suppressed");
            return false;
        }
        let visual = part.visual().clone();
        part.adapters.refresh_visual(&visual);
        part.refresh_count += 1;
        trace!(part = %id, "refreshed");
        self.emit(SceneEvent::Refreshed { part: id });
        true
    }

    // ========================================================================
    // Adapters
    // ========================================================================

    /// Adapter store of `host`.
    pub fn adapters(&self, host: AdapterHost) -> Result<&AdapterStore> {
        match host {
            AdapterHost::Viewer => Ok(&self.adapters),
            AdapterHost::Part(id) => Ok(&self.require(id)?.adapters),
        }
    }

    /// Typed adapter lookup on `host`.
    #[must_use]
    pub fn adapter<T: Adapter>(&self, host: AdapterHost, role: &Role) -> Option<&T> {
        self.adapters(host).ok()?.get_typed::<T>(role)
    }

    pub fn adapter_mut<T: Adapter>(&mut self, host: AdapterHost, role: &Role) -> Option<&mut T> {
        self.store_mut(host).ok()?.get_typed_mut::<T>(role)
    }

    /// Install `adapter` under `key`, returning the adapter it replaced.
    pub fn set_adapter(
        &mut self,
        host: AdapterHost,
        key: AdapterKey,
        adapter: Box<DynAdapter>,
    ) -> Result<Option<Box<DynAdapter>>> {
        self.ensure_mutable("set_adapter")?;
        self.store_mut(host)?;
        AdapterStore::check(&key, adapter.as_ref())?;
        let replaced = self.install_adapter(host, key, adapter)?;
        self.finish()?;
        Ok(replaced)
    }

    /// Install several adapters at once. All entries are validated first.
    ///
    /// With `overwrite == false` existing keys are kept. Returns the
    /// adapters that did not end up installed: replaced ones when
    /// overwriting, the offered ones otherwise.
    pub fn set_adapters(
        &mut self,
        host: AdapterHost,
        entries: Vec<(AdapterKey, Box<DynAdapter>)>,
        overwrite: bool,
    ) -> Result<Vec<Box<DynAdapter>>> {
        self.ensure_mutable("set_adapters")?;
        self.store_mut(host)?;
        let mut seen: Vec<&AdapterKey> = Vec::with_capacity(entries.len());
        for (key, adapter) in &entries {
            if seen.contains(&key) {
                return Err(SceneError::InvalidBlueprint {
                    reason: "duplicate adapter key",
                });
            }
            AdapterStore::check(key, adapter.as_ref())?;
            seen.push(key);
        }

        let mut displaced = Vec::new();
        for (key, adapter) in entries {
            if !overwrite && self.store_mut(host)?.contains(&key) {
                displaced.push(adapter);
                continue;
            }
            if let Some(old) = self.install_adapter(host, key, adapter)? {
                displaced.push(old);
            }
        }
        self.finish()?;
        Ok(displaced)
    }

    /// Remove the adapter under `key`. Absence is not an error.
    pub fn unset_adapter(
        &mut self,
        host: AdapterHost,
        key: &AdapterKey,
    ) -> Result<Option<Box<DynAdapter>>> {
        self.ensure_mutable("unset_adapter")?;
        let removed = self.store_mut(host)?.unset(key);
        if removed.is_some() {
            debug!(host = ?host, %key, "adapter unset");
            self.emit(SceneEvent::AdapterUnset {
                host,
                key: key.clone(),
            });
        }
        self.finish()?;
        Ok(removed)
    }

    fn install_adapter(
        &mut self,
        host: AdapterHost,
        key: AdapterKey,
        adapter: Box<DynAdapter>,
    ) -> Result<Option<Box<DynAdapter>>> {
        let replaced = self.store_mut(host)?.set(host, key.clone(), adapter)?;
        debug!(host = ?host, %key, replaced = replaced.is_some(), "adapter set");
        self.emit(SceneEvent::AdapterSet {
            host,
            key,
            replaced: replaced.is_some(),
        });
        Ok(replaced)
    }

    fn store_mut(&mut self, host: AdapterHost) -> Result<&mut AdapterStore> {
        match host {
            AdapterHost::Viewer => Ok(&mut self.adapters),
            AdapterHost::Part(id) => Ok(&mut self.require_mut(id)?.adapters),
        }
    }

    // ========================================================================
    // Factories
    // ========================================================================

    pub fn set_content_part_factory(&mut self, factory: impl ContentPartFactory + 'static) {
        self.content_factory = Some(Box::new(factory));
    }

    pub fn set_feedback_part_factory(&mut self, factory: impl FeedbackPartFactory + 'static) {
        self.feedback_factory = Some(Box::new(factory));
    }

    pub fn set_handle_part_factory(&mut self, factory: impl HandlePartFactory + 'static) {
        self.handle_factory = Some(Box::new(factory));
    }

    /// Create a detached content part for `content`.
    pub fn create_content_part(&mut self, content: &ContentRef) -> Result<PartId> {
        self.ensure_mutable("create_content_part")?;
        let Some(mut factory) = self.content_factory.take() else {
            return Err(SceneError::MissingFactory { factory: "content" });
        };
        let blueprint = factory.create_content_part(self, content);
        self.content_factory = Some(factory);

        let Some(blueprint) = blueprint else {
            return Err(SceneError::FactoryDeclined { factory: "content" });
        };
        if blueprint.content.as_ref() != Some(content) {
            return Err(SceneError::InvalidBlueprint {
                reason: "content factory returned a part for another object",
            });
        }
        self.insert_part(blueprint)
    }

    /// Create detached feedback parts for `targets`.
    pub fn create_feedback_parts(&mut self, targets: &[PartId]) -> Result<Vec<PartId>> {
        self.ensure_mutable("create_feedback_parts")?;
        for &target in targets {
            self.require(target)?;
        }
        let Some(mut factory) = self.feedback_factory.take() else {
            return Err(SceneError::MissingFactory { factory: "feedback" });
        };
        let blueprints = factory.create_feedback_parts(self, targets);
        self.feedback_factory = Some(factory);
        self.insert_blueprints(blueprints)
    }

    /// Create detached handle parts for `targets`.
    pub fn create_handle_parts(&mut self, targets: &[PartId]) -> Result<Vec<PartId>> {
        self.ensure_mutable("create_handle_parts")?;
        for &target in targets {
            self.require(target)?;
        }
        let Some(mut factory) = self.handle_factory.take() else {
            return Err(SceneError::MissingFactory { factory: "handle" });
        };
        let blueprints = factory.create_handle_parts(self, targets);
        self.handle_factory = Some(factory);
        self.insert_blueprints(blueprints)
    }

    fn insert_blueprints(&mut self, blueprints: Vec<PartBlueprint>) -> Result<Vec<PartId>> {
        // Checked as a batch so a bad blueprint inserts nothing.
        for blueprint in &blueprints {
            check_blueprint(blueprint)?;
        }
        blueprints
            .into_iter()
            .map(|blueprint| self.insert_part(blueprint))
            .collect()
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Listen to every event of this viewer.
    pub fn subscribe(
        &mut self,
        listener: impl Fn(&mut Viewer, &SceneEvent) + 'static,
    ) -> Result<Subscription> {
        self.ensure_usable("subscribe")?;
        Ok(self.listeners.subscribe(listener))
    }

    /// Listen to events whose subjects include `part`.
    pub fn subscribe_part(
        &mut self,
        part: PartId,
        listener: impl Fn(&mut Viewer, &SceneEvent) + 'static,
    ) -> Result<Subscription> {
        self.ensure_usable("subscribe_part")?;
        Ok(self.require_mut(part)?.listeners.subscribe(listener))
    }

    /// Registered viewer-level listeners, including dropped ones not yet
    /// pruned.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ========================================================================
    // Identity indices
    // ========================================================================

    /// Check that attaching `parts` would not collide in either index.
    pub(crate) fn check_index_conflicts(&self, parts: &[PartId]) -> Result<()> {
        let mut contents: FxHashMap<&ContentRef, PartId> = FxHashMap::default();
        let mut visuals: FxHashMap<&VisualRef, PartId> = FxHashMap::default();
        for &id in parts {
            let part = self.require(id)?;
            if let Some(content) = part.content() {
                let existing = self
                    .content_index
                    .get(content)
                    .copied()
                    .filter(|&other| other != id)
                    .or_else(|| contents.insert(content, id));
                if let Some(existing) = existing {
                    return Err(self.invariant(SceneError::ContentConflict {
                        existing,
                        incoming: id,
                    }));
                }
            }
            let visual = part.visual();
            let existing = self
                .visual_index
                .get(visual)
                .copied()
                .filter(|&other| other != id)
                .or_else(|| visuals.insert(visual, id));
            if let Some(existing) = existing {
                return Err(self.invariant(SceneError::VisualConflict {
                    existing,
                    incoming: id,
                }));
            }
        }
        Ok(())
    }

    /// Register `parts` in both indices. Conflicts must have been checked.
    pub(crate) fn register(&mut self, parts: &[PartId]) {
        for &id in parts {
            let Some(part) = self.parts.get(&id) else {
                continue;
            };
            if let Some(content) = part.content() {
                self.content_index.insert(content.clone(), id);
            }
            self.visual_index.insert(part.visual().clone(), id);
            trace!(part = %id, "indexed");
        }
    }

    pub(crate) fn unregister(&mut self, parts: &[PartId]) {
        for &id in parts {
            let Some(part) = self.parts.get(&id) else {
                continue;
            };
            if let Some(content) = part.content()
                && self.content_index.get(content) == Some(&id)
            {
                self.content_index.remove(content);
            }
            if self.visual_index.get(part.visual()) == Some(&id) {
                self.visual_index.remove(part.visual());
            }
            trace!(part = %id, "unindexed");
        }
    }

    // ========================================================================
    // Mutation protocol
    // ========================================================================

    pub(crate) fn require(&self, id: PartId) -> Result<&Part> {
        self.parts.get(&id).ok_or(SceneError::UnknownPart { part: id })
    }

    pub(crate) fn require_mut(&mut self, id: PartId) -> Result<&mut Part> {
        self.parts
            .get_mut(&id)
            .ok_or(SceneError::UnknownPart { part: id })
    }

    fn ensure_usable(&self, op: &'static str) -> Result<()> {
        if self.disposed {
            warn!(op, "refused: viewer disposed");
            return Err(SceneError::Disposed);
        }
        Ok(())
    }

    /// Refuse mutations on a disposed viewer or beyond the dispatch depth.
    pub(crate) fn ensure_mutable(&self, op: &'static str) -> Result<()> {
        self.ensure_usable(op)?;
        if self.dispatch_depth >= self.config.max_dispatch_depth {
            warn!(op, depth = self.dispatch_depth, "refused: dispatch depth exceeded");
            return Err(SceneError::DispatchDepthExceeded {
                depth: self.dispatch_depth,
            });
        }
        Ok(())
    }

    pub(crate) fn emit(&mut self, event: SceneEvent) {
        self.pending.push(event);
    }

    /// Log an invariant failure and hand it back.
    pub(crate) fn invariant(&self, err: SceneError) -> SceneError {
        error!(error = %err, "scene invariant violated");
        err
    }

    /// Audit if configured, then deliver the events queued by the current
    /// mutation.
    pub(crate) fn finish(&mut self) -> Result<()> {
        let audit = if self.config.verify_invariants {
            let report = self.audit();
            if report.is_clean() {
                Ok(())
            } else {
                Err(self.invariant(SceneError::AuditFailed {
                    issues: report.issues.iter().map(ToString::to_string).collect(),
                }))
            }
        } else {
            Ok(())
        };
        let events = std::mem::take(&mut self.pending);
        for event in events {
            self.deliver(&event);
        }
        audit
    }

    fn deliver(&mut self, event: &SceneEvent) {
        let mut targets = self.listeners.snapshot();
        for subject in event.subjects() {
            if let Some(part) = self.parts.get_mut(&subject) {
                targets.extend(part.listeners.snapshot());
            }
        }
        trace!(
            event = event.label(),
            listeners = targets.len(),
            depth = self.dispatch_depth,
            "dispatch"
        );
        if targets.is_empty() {
            return;
        }
        self.dispatch_depth += 1;
        for listener in &targets {
            listener(&mut *self, event);
        }
        self.dispatch_depth -= 1;
    }

    /// Tops of detached subtrees (parts without a parent, other than the
    /// root), in id order.
    #[must_use]
    pub fn detached_parts(&self) -> Vec<PartId> {
        self.parts
            .values()
            .filter(|part| part.id() != self.root && part.parent.is_none())
            .map(Part::id)
            .collect()
    }

    pub(crate) fn dedup(parts: &[PartId]) -> Result<Vec<PartId>> {
        let mut seen = FxHashSet::default();
        for &part in parts {
            if !seen.insert(part) {
                return Err(SceneError::DuplicateInBatch { part });
            }
        }
        Ok(parts.to_vec())
    }
}

/// Validate a blueprint and its adapters without touching the scene.
fn check_blueprint(blueprint: &PartBlueprint) -> Result<()> {
    blueprint.validate()?;
    let mut seen: Vec<&AdapterKey> = Vec::with_capacity(blueprint.adapters.len());
    for (key, adapter) in &blueprint.adapters {
        if seen.contains(&key) {
            return Err(SceneError::InvalidBlueprint {
                reason: "duplicate adapter key",
            });
        }
        AdapterStore::check(key, adapter.as_ref())?;
        seen.push(key);
    }
    Ok(())
}

impl fmt::Debug for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewer")
            .field("root", &self.root)
            .field("parts", &self.parts.len())
            .field("content_index", &self.content_index.len())
            .field("visual_index", &self.visual_index.len())
            .field("active", &self.is_active())
            .field("disposed", &self.disposed)
            .field("domain", &self.domain.as_ref().map(|d| d.name().to_owned()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImmediateDomain;
    use crate::error::ErrorKind;
    use std::cell::RefCell;

    fn content_blueprint(name: &'static str) -> (ContentRef, PartBlueprint) {
        let content = ContentRef::new(name);
        let blueprint = PartBlueprint::content(content.clone(), VisualRef::new(name));
        (content, blueprint)
    }

    #[test]
    fn new_viewer_indexes_root_visual() {
        let visual = VisualRef::new("canvas");
        let viewer = Viewer::new(visual.clone());
        assert_eq!(viewer.visual_part(&visual), Some(viewer.root()));
        assert_eq!(viewer.len(), 1);
        assert!(!viewer.is_active());
    }

    #[test]
    fn activation_requires_domain() {
        let mut viewer = Viewer::new(VisualRef::new(()));
        assert_eq!(viewer.activate().unwrap_err(), SceneError::NoDomain);
        viewer.set_domain(Rc::new(ImmediateDomain::default())).unwrap();
        viewer.activate().unwrap();
        assert!(viewer.is_active());
        assert!(viewer.part(viewer.root()).unwrap().is_active());
        viewer.activate().unwrap();
    }

    #[test]
    fn domain_locked_while_active() {
        let domain: Rc<dyn Domain> = Rc::new(ImmediateDomain::default());
        let mut viewer = Viewer::new(VisualRef::new(()));
        viewer.set_domain(domain.clone()).unwrap();
        viewer.activate().unwrap();
        viewer.set_domain(domain).unwrap();
        let other = Rc::new(ImmediateDomain::new("other"));
        assert_eq!(viewer.set_domain(other).unwrap_err(), SceneError::DomainLocked);
        assert_eq!(viewer.clear_domain().unwrap_err(), SceneError::DomainLocked);
        viewer.deactivate().unwrap();
        viewer.clear_domain().unwrap();
        assert!(viewer.domain().is_none());
    }

    #[test]
    fn dispose_fails_fast_afterwards() {
        let mut viewer = Viewer::new(VisualRef::new(()));
        viewer.set_domain(Rc::new(ImmediateDomain::default())).unwrap();
        viewer.activate().unwrap();
        viewer.dispose().unwrap();
        assert!(viewer.is_disposed());
        assert!(!viewer.is_active());
        assert!(viewer.is_empty());
        let err = viewer
            .insert_part(PartBlueprint::feedback(VisualRef::new(())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert_eq!(viewer.activate().unwrap_err(), SceneError::Disposed);
        assert_eq!(viewer.dispose().unwrap_err(), SceneError::Disposed);
    }

    #[test]
    fn content_conflict_is_rejected_before_attach() {
        let mut viewer = Viewer::new(VisualRef::new(()));
        let (content, first) = content_blueprint("obj");
        let a = viewer.insert_part(first).unwrap();
        let b = viewer
            .insert_part(PartBlueprint::content(content.clone(), VisualRef::new("other")))
            .unwrap();
        let root = viewer.root();
        viewer.add_child(root, a).unwrap();
        let err = viewer.add_child(root, b).unwrap_err();
        assert_eq!(
            err,
            SceneError::ContentConflict {
                existing: a,
                incoming: b
            }
        );
        assert_eq!(err.kind(), ErrorKind::Invariant);
        assert_eq!(viewer.content_part(&content), Some(a));
        assert_eq!(viewer.parent(b).unwrap(), None);
    }

    #[test]
    fn insert_rejects_mismatched_adapter() {
        struct Plain;
        impl Adapter for Plain {}
        struct Other;
        impl Adapter for Other {}

        let mut viewer = Viewer::new(VisualRef::new(()));
        let blueprint = PartBlueprint::feedback(VisualRef::new(()))
            .with_adapter(AdapterKey::of::<Other>(), Box::new(Plain));
        let err = viewer.insert_part(blueprint).unwrap_err();
        assert!(matches!(err, SceneError::CapabilityMismatch { .. }));
        assert_eq!(viewer.len(), 1);
    }

    #[test]
    fn dispose_part_requires_detached() {
        let mut viewer = Viewer::new(VisualRef::new(()));
        let root = viewer.root();
        let (_, blueprint) = content_blueprint("obj");
        let a = viewer.insert_part(blueprint).unwrap();
        viewer.add_child(root, a).unwrap();
        assert_eq!(
            viewer.dispose_part(a).unwrap_err(),
            SceneError::PartAttached { part: a }
        );
        assert_eq!(
            viewer.dispose_part(root).unwrap_err(),
            SceneError::RootNotDisposable { root }
        );
        viewer.remove_child(root, a).unwrap();
        viewer.dispose_part(a).unwrap();
        assert!(viewer.part(a).is_none());
    }

    #[test]
    fn refresh_respects_suppression() {
        let mut viewer = Viewer::new(VisualRef::new(()));
        let part = viewer
            .insert_part(PartBlueprint::feedback(VisualRef::new(())))
            .unwrap();
        assert!(viewer.refresh(part).unwrap());
        viewer.set_refresh_suppressed(part, true).unwrap();
        assert!(!viewer.refresh(part).unwrap());
        assert_eq!(viewer.part(part).unwrap().refresh_count(), 1);
    }

    #[test]
    fn missing_factory_is_illegal_state() {
        let mut viewer = Viewer::new(VisualRef::new(()));
        let err = viewer.create_content_part(&ContentRef::new(1)).unwrap_err();
        assert_eq!(err, SceneError::MissingFactory { factory: "content" });
        assert!(viewer.create_handle_parts(&[]).is_err());
    }

    #[test]
    fn factories_create_detached_inactive_parts() {
        let mut viewer = Viewer::new(VisualRef::new(()));
        viewer.set_domain(Rc::new(ImmediateDomain::default())).unwrap();
        viewer.activate().unwrap();
        let root = viewer.root();
        viewer.set_feedback_part_factory(|_: &Viewer, targets: &[PartId]| -> Vec<PartBlueprint> {
            targets
                .iter()
                .map(|_| PartBlueprint::feedback(VisualRef::new(())))
                .collect()
        });
        viewer.set_handle_part_factory(|_: &Viewer, targets: &[PartId]| -> Vec<PartBlueprint> {
            targets
                .iter()
                .flat_map(|_| {
                    [
                        PartBlueprint::handle(VisualRef::new(())),
                        PartBlueprint::handle(VisualRef::new(())),
                    ]
                })
                .collect()
        });

        let feedback = viewer.create_feedback_parts(&[root]).unwrap();
        let handles = viewer.create_handle_parts(&[root]).unwrap();
        assert_eq!(feedback.len(), 1);
        assert_eq!(handles.len(), 2);
        assert_eq!(viewer.len(), 4);
        for (ids, kind) in [(&feedback, PartKind::Feedback), (&handles, PartKind::Handle)] {
            for &id in ids {
                let part = viewer.part(id).unwrap();
                assert_eq!(part.kind(), kind);
                assert_eq!(part.parent(), None);
                assert!(!part.is_active());
            }
        }
        assert!(viewer.children(root).unwrap().is_empty());
    }

    #[test]
    fn failed_feedback_batch_inserts_nothing() {
        struct Plain;
        impl Adapter for Plain {}
        struct Other;
        impl Adapter for Other {}

        let mut viewer = Viewer::new(VisualRef::new(()));
        let root = viewer.root();
        viewer.set_feedback_part_factory(|_: &Viewer, _: &[PartId]| {
            vec![
                PartBlueprint::feedback(VisualRef::new(())),
                PartBlueprint::feedback(VisualRef::new(()))
                    .with_adapter(AdapterKey::of::<Other>(), Box::new(Plain)),
            ]
        });
        let err = viewer.create_feedback_parts(&[root]).unwrap_err();
        assert!(matches!(err, SceneError::CapabilityMismatch { .. }));
        assert_eq!(viewer.len(), 1);

        viewer.set_handle_part_factory(|_: &Viewer, _: &[PartId]| {
            vec![
                PartBlueprint::handle(VisualRef::new(())),
                PartBlueprint::handle(VisualRef::new(()))
                    .with_adapter(AdapterKey::of::<Plain>(), Box::new(Plain))
                    .with_adapter(AdapterKey::of::<Plain>(), Box::new(Plain)),
            ]
        });
        let err = viewer.create_handle_parts(&[root]).unwrap_err();
        assert!(matches!(err, SceneError::InvalidBlueprint { .. }));
        assert_eq!(viewer.len(), 1);
    }

    #[test]
    fn content_factory_must_bind_requested_object() {
        let mut viewer = Viewer::new(VisualRef::new(()));
        viewer.set_content_part_factory(|_: &Viewer, _: &ContentRef| {
            Some(PartBlueprint::content(ContentRef::new("stray"), VisualRef::new(())))
        });
        let err = viewer.create_content_part(&ContentRef::new("wanted")).unwrap_err();
        assert!(matches!(err, SceneError::InvalidBlueprint { .. }));
    }

    #[test]
    fn viewer_listener_sees_final_state() {
        let mut viewer = Viewer::new(VisualRef::new(()));
        let root = viewer.root();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = viewer
            .subscribe(move |viewer, event| {
                if let SceneEvent::ChildAdded { parent, child, .. } = event {
                    sink.borrow_mut().push(viewer.parent(*child).ok().flatten() == Some(*parent));
                }
            })
            .unwrap();
        let (_, blueprint) = content_blueprint("obj");
        let a = viewer.insert_part(blueprint).unwrap();
        viewer.add_child(root, a).unwrap();
        assert_eq!(*seen.borrow(), vec![true]);
    }
}
