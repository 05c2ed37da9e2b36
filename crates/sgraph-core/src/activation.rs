#![forbid(unsafe_code)]

//! Two-state activation lifecycle.

/// Object with an active / inactive lifecycle.
///
/// Adapters that need to hook into their host's lifecycle return themselves
/// from [`Adapter::as_activatable`](crate::adapter::Adapter::as_activatable).
/// Calls are only made on real transitions; implementors never see two
/// `activate` calls in a row.
pub trait Activatable {
    fn activate(&mut self);
    fn deactivate(&mut self);
}

/// Idempotent activation flag.
///
/// Transition methods return `true` only when the state actually changed,
/// so callers can skip cascades on no-op transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Activation {
    active: bool,
}

impl Activation {
    #[must_use]
    pub const fn new() -> Self {
        Self { active: false }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        self.active
    }

    /// Enter the active state. Returns whether a transition happened.
    pub fn activate(&mut self) -> bool {
        !std::mem::replace(&mut self.active, true)
    }

    /// Enter the inactive state. Returns whether a transition happened.
    pub fn deactivate(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_idempotent() {
        let mut state = Activation::new();
        assert!(!state.is_active());
        assert!(state.activate());
        assert!(!state.activate());
        assert!(state.is_active());
        assert!(state.deactivate());
        assert!(!state.deactivate());
        assert!(!state.is_active());
    }
}
