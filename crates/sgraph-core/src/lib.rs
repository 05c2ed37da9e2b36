#![forbid(unsafe_code)]

//! sgraph core
//!
//! Controller-side scene graph for interactive graphical editors: parts
//! arranged in a tree, a role-qualified anchorage graph beside it, typed
//! adapters per part, and a viewer that keeps content and visual identity
//! indices in step with tree membership.
//!
//! # Key Components
//!
//! - [`Viewer`] - Part arena, root, identity indices, lifecycle and listeners
//! - [`Part`] - A controller node: tree links, anchorage links, adapters
//! - [`AdapterStore`] - Registration-ordered adapters keyed by capability and role
//! - [`SceneEvent`] / [`Subscription`] - Change notifications
//! - [`ChildContentSynchronizer`] - Reconciles content children with a model list
//! - [`Domain`] / [`Operation`] - Execution context required before activation
//! - [`InvariantReport`] - Structural audit of a scene
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use sgraph_core::{ContentRef, ImmediateDomain, PartBlueprint, Viewer, VisualRef};
//!
//! let mut viewer = Viewer::new(VisualRef::new("canvas"));
//! viewer.set_domain(Rc::new(ImmediateDomain::default()))?;
//! viewer.activate()?;
//!
//! let shape = ContentRef::new("shape-1");
//! let part = viewer.insert_part(PartBlueprint::content(shape.clone(), VisualRef::new(())))?;
//! viewer.add_child(viewer.root(), part)?;
//!
//! assert_eq!(viewer.content_part(&shape), Some(part));
//! assert!(viewer.part(part).is_some_and(|p| p.is_active()));
//! # Ok::<(), sgraph_core::SceneError>(())
//! ```

pub mod activation;
pub mod adapter;
pub mod anchorage;
pub mod audit;
pub mod config;
pub mod domain;
pub mod error;
pub mod factory;
pub mod identity;
pub mod notify;
pub mod part;
pub mod role;
pub mod sync;
pub mod tree;
pub mod viewer;

pub use activation::{Activatable, Activation};
pub use adapter::{Adapter, AdapterHost, AdapterKey, AdapterStore, Capability, DynAdapter};
pub use anchorage::RoleCounts;
pub use audit::{InvariantCode, InvariantIssue, InvariantReport};
pub use config::{ViewerConfig, ViewerConfigError};
pub use domain::{Domain, FnOperation, ImmediateDomain, Operation};
pub use error::{ErrorKind, PartIdError, Result, SceneError};
pub use factory::{ContentPartFactory, FeedbackPartFactory, HandlePartFactory};
pub use identity::{ContentRef, Identity, VisualRef};
pub use notify::{Listener, SceneEvent, Subscription};
pub use part::{Part, PartBlueprint, PartId, PartKind};
pub use role::Role;
pub use sync::{ChildContentSynchronizer, ContentSynchronizer, SyncReport};
pub use tree::Traversal;
pub use viewer::Viewer;
