#![forbid(unsafe_code)]

//! Scene change notifications.
//!
//! # Design
//!
//! Every structural mutation records one or more [`SceneEvent`]s while it
//! runs. Events are delivered only after the mutation has updated both
//! sides of every relation and the identity indices, so listeners always
//! observe a consistent scene.
//!
//! Listeners are registered on the viewer (all events) or on a single part
//! (events whose [`SceneEvent::subjects`] include that part). Registration
//! hands back a [`Subscription`]; the list itself only keeps a `Weak`
//! reference, so dropping the guard unsubscribes.
//!
//! # Re-entrancy
//!
//! Listeners receive `&mut Viewer` and may mutate the scene. Each delivery
//! iterates a snapshot of the listener list, so listeners added or dropped
//! during delivery take effect from the next event on. Nested mutations
//! deliver their own events before control returns to the outer delivery.
//!
//! # Failure Modes
//!
//! - **Unbounded recursion**: a listener that mutates in response to its own
//!   events would recurse forever. The viewer refuses mutations once the
//!   delivery depth reaches `ViewerConfig::max_dispatch_depth`.
//! - **Subscriber leak**: dead entries are pruned lazily on each snapshot.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::adapter::{AdapterHost, AdapterKey};
use crate::part::PartId;
use crate::role::Role;
use crate::viewer::Viewer;

/// Listener callback signature.
pub type Listener = dyn Fn(&mut Viewer, &SceneEvent);

type ListenerRc = Rc<Listener>;
type ListenerWeak = Weak<Listener>;

/// A structural or lifecycle change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    /// `child` was inserted into `parent.children` at `index`.
    ChildAdded {
        parent: PartId,
        child: PartId,
        index: usize,
    },
    /// `child` was removed from `parent.children`; `index` is the position
    /// it occupied before removal.
    ChildRemoved {
        parent: PartId,
        child: PartId,
        index: usize,
    },
    ChildReordered {
        parent: PartId,
        child: PartId,
        from: usize,
        to: usize,
    },
    /// `count` is the role count after the increment.
    AnchorageAdded {
        anchored: PartId,
        anchorage: PartId,
        role: Role,
        count: usize,
    },
    /// `count` is the role count left after the decrement.
    AnchorageRemoved {
        anchored: PartId,
        anchorage: PartId,
        role: Role,
        count: usize,
    },
    AdapterSet {
        host: AdapterHost,
        key: AdapterKey,
        replaced: bool,
    },
    AdapterUnset {
        host: AdapterHost,
        key: AdapterKey,
    },
    Activated {
        host: AdapterHost,
    },
    Deactivated {
        host: AdapterHost,
    },
    Refreshed {
        part: PartId,
    },
    /// The part and its adapters are gone; only viewer listeners see this.
    PartDisposed {
        part: PartId,
    },
}

impl SceneEvent {
    /// Parts whose listeners receive this event, in delivery order.
    pub fn subjects(&self) -> impl Iterator<Item = PartId> + '_ {
        let pair = match self {
            Self::ChildAdded { parent, child, .. }
            | Self::ChildRemoved { parent, child, .. } => [Some(*parent), Some(*child)],
            Self::ChildReordered { parent, .. } => [Some(*parent), None],
            Self::AnchorageAdded {
                anchored,
                anchorage,
                ..
            }
            | Self::AnchorageRemoved {
                anchored,
                anchorage,
                ..
            } => [Some(*anchored), Some(*anchorage)],
            Self::AdapterSet { host, .. }
            | Self::AdapterUnset { host, .. }
            | Self::Activated { host }
            | Self::Deactivated { host } => match host {
                AdapterHost::Part(part) => [Some(*part), None],
                AdapterHost::Viewer => [None, None],
            },
            Self::Refreshed { part } => [Some(*part), None],
            Self::PartDisposed { .. } => [None, None],
        };
        pair.into_iter().flatten()
    }

    /// Short static label, used as a tracing field.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ChildAdded { .. } => "child-added",
            Self::ChildRemoved { .. } => "child-removed",
            Self::ChildReordered { .. } => "child-reordered",
            Self::AnchorageAdded { .. } => "anchorage-added",
            Self::AnchorageRemoved { .. } => "anchorage-removed",
            Self::AdapterSet { .. } => "adapter-set",
            Self::AdapterUnset { .. } => "adapter-unset",
            Self::Activated { .. } => "activated",
            Self::Deactivated { .. } => "deactivated",
            Self::Refreshed { .. } => "refreshed",
            Self::PartDisposed { .. } => "part-disposed",
        }
    }
}

impl fmt::Display for SceneEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChildAdded {
                parent,
                child,
                index,
            } => write!(f, "child-added {parent}[{index}] <- {child}"),
            Self::ChildRemoved {
                parent,
                child,
                index,
            } => write!(f, "child-removed {parent}[{index}] -> {child}"),
            Self::ChildReordered {
                parent,
                child,
                from,
                to,
            } => write!(f, "child-reordered {parent}: {child} {from} -> {to}"),
            Self::AnchorageAdded {
                anchored,
                anchorage,
                role,
                count,
            } => write!(f, "anchorage-added {anchored} -> {anchorage} ({role} x{count})"),
            Self::AnchorageRemoved {
                anchored,
                anchorage,
                role,
                count,
            } => write!(f, "anchorage-removed {anchored} -> {anchorage} ({role} x{count})"),
            Self::AdapterSet {
                host,
                key,
                replaced,
            } => write!(f, "adapter-set {host:?} {key} replaced={replaced}"),
            Self::AdapterUnset { host, key } => write!(f, "adapter-unset {host:?} {key}"),
            Self::Activated { host } => write!(f, "activated {host:?}"),
            Self::Deactivated { host } => write!(f, "deactivated {host:?}"),
            Self::Refreshed { part } => write!(f, "refreshed {part}"),
            Self::PartDisposed { part } => write!(f, "part-disposed {part}"),
        }
    }
}

/// Weak listener registry owned by the viewer and by each part.
#[derive(Default)]
pub(crate) struct ListenerList {
    entries: Vec<ListenerWeak>,
}

impl ListenerList {
    pub(crate) fn subscribe(
        &mut self,
        callback: impl Fn(&mut Viewer, &SceneEvent) + 'static,
    ) -> Subscription {
        let strong: ListenerRc = Rc::new(callback);
        self.entries.push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Prune dead entries and return the live callbacks in registration
    /// order.
    pub(crate) fn snapshot(&mut self) -> Vec<ListenerRc> {
        self.entries.retain(|w| w.strong_count() > 0);
        self.entries.iter().filter_map(Weak::upgrade).collect()
    }

    /// Registered entries, including dead ones not yet pruned.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// RAII guard for a listener.
///
/// Dropping the guard drops the only strong reference to the callback, so
/// it will not be called again.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
