#![forbid(unsafe_code)]

//! Execution domain.
//!
//! A viewer needs a [`Domain`] before it can be activated. The domain is the
//! entry point through which policy code runs [`Operation`]s against the
//! scene; undo/redo and transaction handling live in domain implementations,
//! not in the scene itself.

use std::cell::Cell;
use std::fmt;

use tracing::debug;

use crate::error::Result;
use crate::viewer::Viewer;

/// A unit of work run against a viewer.
pub trait Operation {
    /// Human-readable label, used for logging and history.
    fn label(&self) -> &str;

    fn run(&mut self, viewer: &mut Viewer) -> Result<()>;
}

/// Owning execution context of a viewer.
pub trait Domain {
    fn name(&self) -> &str;

    /// Run `operation` against `viewer`.
    fn execute(&self, viewer: &mut Viewer, operation: &mut dyn Operation) -> Result<()>;
}

/// Operation built from a closure.
pub struct FnOperation<F> {
    label: String,
    run: F,
}

impl<F> FnOperation<F>
where
    F: FnMut(&mut Viewer) -> Result<()>,
{
    pub fn new(label: impl Into<String>, run: F) -> Self {
        Self {
            label: label.into(),
            run,
        }
    }
}

impl<F> Operation for FnOperation<F>
where
    F: FnMut(&mut Viewer) -> Result<()>,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn run(&mut self, viewer: &mut Viewer) -> Result<()> {
        (self.run)(viewer)
    }
}

impl<F> fmt::Debug for FnOperation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Domain that runs every operation immediately and counts them.
#[derive(Debug)]
pub struct ImmediateDomain {
    name: String,
    executed: Cell<u64>,
}

impl ImmediateDomain {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executed: Cell::new(0),
        }
    }

    /// Operations run so far, successful or not.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.executed.get()
    }
}

impl Default for ImmediateDomain {
    fn default() -> Self {
        Self::new("immediate")
    }
}

impl Domain for ImmediateDomain {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, viewer: &mut Viewer, operation: &mut dyn Operation) -> Result<()> {
        self.executed.set(self.executed.get() + 1);
        debug!(domain = %self.name, operation = operation.label(), "execute");
        operation.run(viewer)
    }
}
