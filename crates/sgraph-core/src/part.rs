#![forbid(unsafe_code)]

//! Part nodes.
//!
//! A [`Part`] combines an [`AdapterStore`] (which also carries its
//! activation state) with its tree links (`parent` / `children`), its
//! anchorage links (`anchorages` / `anchoreds`) and the visual it controls.
//!
//! Parts live in the viewer's arena and are addressed by [`PartId`]. All
//! mutation goes through the viewer so that both sides of every
//! bidirectional relation and the identity indices move together; this
//! module only exposes read access plus the crate-internal link helpers.

use std::collections::BTreeMap;
use std::fmt;

use crate::adapter::{AdapterKey, AdapterStore, DynAdapter};
use crate::anchorage::RoleCounts;
use crate::error::{PartIdError, Result};
use crate::identity::{ContentRef, VisualRef};
use crate::notify::ListenerList;
use crate::role::Role;

/// Stable identifier for parts.
///
/// `0` is reserved so ids are always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartId(u64);

impl PartId {
    /// Lowest valid part id.
    pub const MIN: Self = Self(1);

    /// Create a part id, rejecting 0.
    pub fn new(raw: u64) -> std::result::Result<Self, PartIdError> {
        if raw == 0 {
            return Err(PartIdError);
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Monotonic allocator; ids are never reused within a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartIdAllocator {
    next: PartId,
}

impl PartIdAllocator {
    /// Allocator whose first id is reserved for the viewer's root.
    pub(crate) fn with_root() -> (PartId, Self) {
        (PartId::MIN, Self { next: PartId(2) })
    }

    pub(crate) fn allocate(&mut self) -> Result<PartId> {
        let current = self.next;
        let Some(next) = current.0.checked_add(1) else {
            return Err(crate::error::SceneError::IdsExhausted { current });
        };
        self.next = PartId(next);
        Ok(current)
    }
}

/// Role a part plays in the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    /// The single root of a viewer.
    Root,
    /// Bound to a model object.
    Content,
    /// Transient visual feedback (e.g. a selection outline).
    Feedback,
    /// Interaction handle (e.g. a resize grip).
    Handle,
}

/// Factory output: everything needed to materialize a detached part.
pub struct PartBlueprint {
    pub kind: PartKind,
    pub visual: VisualRef,
    pub content: Option<ContentRef>,
    pub adapters: Vec<(AdapterKey, Box<DynAdapter>)>,
}

impl PartBlueprint {
    /// Blueprint for a content part.
    #[must_use]
    pub fn content(content: ContentRef, visual: VisualRef) -> Self {
        Self {
            kind: PartKind::Content,
            visual,
            content: Some(content),
            adapters: Vec::new(),
        }
    }

    #[must_use]
    pub fn feedback(visual: VisualRef) -> Self {
        Self {
            kind: PartKind::Feedback,
            visual,
            content: None,
            adapters: Vec::new(),
        }
    }

    #[must_use]
    pub fn handle(visual: VisualRef) -> Self {
        Self {
            kind: PartKind::Handle,
            visual,
            content: None,
            adapters: Vec::new(),
        }
    }

    /// Add an initial adapter.
    #[must_use]
    pub fn with_adapter(mut self, key: AdapterKey, adapter: Box<DynAdapter>) -> Self {
        self.adapters.push((key, adapter));
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        use crate::error::SceneError;
        match (self.kind, self.content.is_some()) {
            (PartKind::Root, _) => Err(SceneError::InvalidBlueprint {
                reason: "a viewer has exactly one root part",
            }),
            (PartKind::Content, false) => Err(SceneError::InvalidBlueprint {
                reason: "content parts need a content object",
            }),
            (PartKind::Feedback | PartKind::Handle, true) => Err(SceneError::InvalidBlueprint {
                reason: "only content parts carry content",
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for PartBlueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartBlueprint")
            .field("kind", &self.kind)
            .field("visual", &self.visual)
            .field("content", &self.content)
            .field("adapters", &self.adapters.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

/// A controller node in the scene.
pub struct Part {
    id: PartId,
    kind: PartKind,
    visual: VisualRef,
    content: Option<ContentRef>,
    pub(crate) parent: Option<PartId>,
    pub(crate) children: Vec<PartId>,
    pub(crate) anchorages: BTreeMap<PartId, RoleCounts>,
    pub(crate) anchoreds: BTreeMap<PartId, RoleCounts>,
    pub(crate) adapters: AdapterStore,
    pub(crate) refresh_suppressed: bool,
    pub(crate) refresh_count: u64,
    pub(crate) listeners: ListenerList,
}

impl Part {
    pub(crate) fn new(
        id: PartId,
        kind: PartKind,
        visual: VisualRef,
        content: Option<ContentRef>,
    ) -> Self {
        Self {
            id,
            kind,
            visual,
            content,
            parent: None,
            children: Vec::new(),
            anchorages: BTreeMap::new(),
            anchoreds: BTreeMap::new(),
            adapters: AdapterStore::new(),
            refresh_suppressed: false,
            refresh_count: 0,
            listeners: ListenerList::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> PartId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> PartKind {
        self.kind
    }

    /// The visual this part controls. Fixed at construction.
    #[must_use]
    pub fn visual(&self) -> &VisualRef {
        &self.visual
    }

    #[must_use]
    pub fn content(&self) -> Option<&ContentRef> {
        self.content.as_ref()
    }

    #[must_use]
    pub fn parent(&self) -> Option<PartId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[PartId] {
        &self.children
    }

    /// Parts this part is anchored on, with role counts.
    #[must_use]
    pub fn anchorages(&self) -> &BTreeMap<PartId, RoleCounts> {
        &self.anchorages
    }

    /// Parts anchored on this part, with role counts.
    #[must_use]
    pub fn anchoreds(&self) -> &BTreeMap<PartId, RoleCounts> {
        &self.anchoreds
    }

    #[must_use]
    pub fn adapters(&self) -> &AdapterStore {
        &self.adapters
    }

    /// Typed adapter lookup, see [`AdapterStore::get_typed`].
    #[must_use]
    pub fn adapter<T: crate::adapter::Adapter>(&self, role: &Role) -> Option<&T> {
        self.adapters.get_typed::<T>(role)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.adapters.is_active()
    }

    #[must_use]
    pub fn is_refresh_suppressed(&self) -> bool {
        self.refresh_suppressed
    }

    /// Number of effective refreshes performed so far.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    pub(crate) fn child_index(&self, child: PartId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("anchorages", &self.anchorages)
            .field("anchoreds", &self.anchoreds)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
