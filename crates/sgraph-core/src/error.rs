#![forbid(unsafe_code)]

//! Error taxonomy for scene mutations.
//!
//! Every fallible operation returns [`SceneError`]. Each variant maps onto
//! one [`ErrorKind`] so callers can branch on the category without matching
//! every concrete failure.
//!
//! # Failure Modes
//!
//! - `InvalidArgument`, `NotFound`, `OutOfRange` and `IllegalState` are
//!   local: the operation that raised them changed nothing.
//! - `Invariant` reports a bug in collaborator code (or in this crate, when
//!   raised by the audit). It is always logged at error level.

use std::fmt;

use crate::adapter::AdapterKey;
use crate::part::PartId;
use crate::role::Role;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SceneError>;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Self-reference, cycle-forming reparent, mismatched adapter.
    InvalidArgument,
    /// A child, anchorage or part that the caller expected is absent.
    NotFound,
    /// Bad insertion or reorder index.
    OutOfRange,
    /// Activation-order violations and use of a disposed viewer.
    IllegalState,
    /// Defensive check failure; indicates a bug in collaborator code.
    Invariant,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidArgument => "invalid argument",
            Self::NotFound => "not found",
            Self::OutOfRange => "out of range",
            Self::IllegalState => "illegal state",
            Self::Invariant => "invariant violation",
        };
        f.write_str(label)
    }
}

/// Concrete failure raised by a scene operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    // --- InvalidArgument ---------------------------------------------------
    SelfChild {
        part: PartId,
    },
    CycleDetected {
        parent: PartId,
        child: PartId,
    },
    AlreadyChild {
        parent: PartId,
        child: PartId,
    },
    RootNotMovable {
        root: PartId,
    },
    DuplicateInBatch {
        part: PartId,
    },
    SelfAnchorage {
        part: PartId,
    },
    CapabilityMismatch {
        key: AdapterKey,
        adapter: &'static str,
    },
    InvalidBlueprint {
        reason: &'static str,
    },
    DuplicateContent {
        position: usize,
    },
    RootNotDisposable {
        root: PartId,
    },
    FactoryDeclined {
        factory: &'static str,
    },

    // --- NotFound ----------------------------------------------------------
    UnknownPart {
        part: PartId,
    },
    NotAChild {
        parent: PartId,
        child: PartId,
    },
    AnchorageNotFound {
        anchored: PartId,
        anchorage: PartId,
        role: Role,
    },

    // --- OutOfRange --------------------------------------------------------
    IndexOutOfRange {
        index: usize,
        len: usize,
    },

    // --- IllegalState ------------------------------------------------------
    NoDomain,
    DomainLocked,
    Disposed,
    PartAttached {
        part: PartId,
    },
    MissingFactory {
        factory: &'static str,
    },
    DispatchDepthExceeded {
        depth: usize,
    },
    IdsExhausted {
        current: PartId,
    },

    // --- Invariant ---------------------------------------------------------
    ContentConflict {
        existing: PartId,
        incoming: PartId,
    },
    VisualConflict {
        existing: PartId,
        incoming: PartId,
    },
    AuditFailed {
        issues: Vec<String>,
    },
}

impl SceneError {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SelfChild { .. }
            | Self::CycleDetected { .. }
            | Self::AlreadyChild { .. }
            | Self::RootNotMovable { .. }
            | Self::DuplicateInBatch { .. }
            | Self::SelfAnchorage { .. }
            | Self::CapabilityMismatch { .. }
            | Self::InvalidBlueprint { .. }
            | Self::DuplicateContent { .. }
            | Self::RootNotDisposable { .. }
            | Self::FactoryDeclined { .. } => ErrorKind::InvalidArgument,
            Self::UnknownPart { .. } | Self::NotAChild { .. } | Self::AnchorageNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::IndexOutOfRange { .. } => ErrorKind::OutOfRange,
            Self::NoDomain
            | Self::DomainLocked
            | Self::Disposed
            | Self::PartAttached { .. }
            | Self::MissingFactory { .. }
            | Self::DispatchDepthExceeded { .. }
            | Self::IdsExhausted { .. } => ErrorKind::IllegalState,
            Self::ContentConflict { .. }
            | Self::VisualConflict { .. }
            | Self::AuditFailed { .. } => ErrorKind::Invariant,
        }
    }
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfChild { part } => write!(f, "part {part} cannot be its own child"),
            Self::CycleDetected { parent, child } => write!(
                f,
                "adding {child} under {parent} would create a cycle: {child} is an ancestor of {parent}"
            ),
            Self::AlreadyChild { parent, child } => {
                write!(f, "{child} is already a child of {parent}")
            }
            Self::RootNotMovable { root } => write!(f, "root part {root} cannot have a parent"),
            Self::DuplicateInBatch { part } => write!(f, "part {part} appears twice in batch"),
            Self::SelfAnchorage { part } => write!(f, "part {part} cannot anchor itself"),
            Self::CapabilityMismatch { key, adapter } => {
                write!(f, "adapter {adapter} does not provide capability of key {key}")
            }
            Self::InvalidBlueprint { reason } => write!(f, "invalid part blueprint: {reason}"),
            Self::DuplicateContent { position } => {
                write!(f, "content at position {position} appears more than once")
            }
            Self::RootNotDisposable { root } => write!(f, "root part {root} cannot be disposed"),
            Self::FactoryDeclined { factory } => {
                write!(f, "{factory} factory produced no part")
            }
            Self::UnknownPart { part } => write!(f, "part {part} not found"),
            Self::NotAChild { parent, child } => write!(f, "{child} is not a child of {parent}"),
            Self::AnchorageNotFound {
                anchored,
                anchorage,
                role,
            } => write!(
                f,
                "{anchored} is not anchored on {anchorage} with role {role}"
            ),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range (len {len})")
            }
            Self::NoDomain => write!(f, "domain has to be set before activation"),
            Self::DomainLocked => write!(f, "domain cannot change while the viewer is active"),
            Self::Disposed => write!(f, "viewer has been disposed"),
            Self::PartAttached { part } => {
                write!(f, "part {part} is still attached to a parent")
            }
            Self::MissingFactory { factory } => write!(f, "no {factory} part factory installed"),
            Self::DispatchDepthExceeded { depth } => {
                write!(f, "notification re-entrancy depth {depth} exceeded")
            }
            Self::IdsExhausted { current } => write!(f, "part id space exhausted after {current}"),
            Self::ContentConflict { existing, incoming } => write!(
                f,
                "content already bound to {existing}; cannot register {incoming}"
            ),
            Self::VisualConflict { existing, incoming } => write!(
                f,
                "visual already owned by {existing}; cannot register {incoming}"
            ),
            Self::AuditFailed { issues } => {
                write!(f, "scene audit failed: {}", issues.join("; "))
            }
        }
    }
}

impl std::error::Error for SceneError {}

/// Returned by [`PartId::new`] for the reserved id `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartIdError;

impl fmt::Display for PartIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part id 0 is invalid")
    }
}

impl std::error::Error for PartIdError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let p = PartId::MIN;
        assert_eq!(SceneError::SelfChild { part: p }.kind(), ErrorKind::InvalidArgument);
        assert_eq!(SceneError::UnknownPart { part: p }.kind(), ErrorKind::NotFound);
        assert_eq!(
            SceneError::IndexOutOfRange { index: 3, len: 1 }.kind(),
            ErrorKind::OutOfRange
        );
        assert_eq!(SceneError::NoDomain.kind(), ErrorKind::IllegalState);
        assert_eq!(
            SceneError::ContentConflict {
                existing: p,
                incoming: p
            }
            .kind(),
            ErrorKind::Invariant
        );
    }

    #[test]
    fn display_names_parts() {
        let msg = SceneError::NotAChild {
            parent: PartId::MIN,
            child: PartId::MIN,
        }
        .to_string();
        assert!(msg.contains("P1"), "{msg}");
    }
}
