#![forbid(unsafe_code)]

//! Anchorage graph.
//!
//! # Design
//!
//! Anchorage is a directed, role-qualified multigraph orthogonal to the
//! part tree. Each link is stored twice: `anchored.anchorages[anchorage]`
//! and `anchorage.anchoreds[anchored]`, both as [`RoleCounts`]. The two
//! maps are updated in lockstep by [`Viewer::add_anchorage`] and
//! [`Viewer::remove_anchorage`]; neither is derived from the other.
//!
//! # Invariants
//!
//! 1. For every role `r`: `anchored.anchorages[a].count(r) ==
//!    a.anchoreds[anchored].count(r)`.
//! 2. Counts are strictly positive; a role whose count reaches zero is
//!    dropped, and so is a link whose last role is dropped.
//! 3. No part anchors itself.
//!
//! Anchorage never propagates activation and imposes no cycle restriction;
//! either endpoint may be detached.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::error::{Result, SceneError};
use crate::notify::SceneEvent;
use crate::part::PartId;
use crate::role::Role;
use crate::viewer::Viewer;

/// Multiset of roles with strictly positive counts.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RoleCounts(BTreeMap<Role, usize>);

impl RoleCounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for `role`; `0` when absent.
    #[must_use]
    pub fn count(&self, role: &Role) -> usize {
        self.0.get(role).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn contains(&self, role: &Role) -> bool {
        self.0.contains_key(role)
    }

    /// Roles with their counts, in role order.
    pub fn roles(&self) -> impl Iterator<Item = (&Role, usize)> + '_ {
        self.0.iter().map(|(role, &count)| (role, count))
    }

    /// Sum of all role counts.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Number of distinct roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the new count.
    pub(crate) fn increment(&mut self, role: &Role) -> usize {
        let count = self.0.entry(role.clone()).or_insert(0);
        *count += 1;
        *count
    }

    /// Returns the remaining count, or `None` if `role` was absent.
    pub(crate) fn decrement(&mut self, role: &Role) -> Option<usize> {
        let count = self.0.get_mut(role)?;
        *count -= 1;
        let left = *count;
        if left == 0 {
            self.0.remove(role);
        }
        Some(left)
    }

    /// Roles whose stored count is zero. Always empty unless the
    /// bookkeeping is broken; used by the audit.
    pub(crate) fn zero_roles(&self) -> impl Iterator<Item = &Role> + '_ {
        self.0
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(role, _)| role)
    }
}

impl fmt::Debug for RoleCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(role, count)| (role.to_string(), count)))
            .finish()
    }
}

impl<R: Into<Role>> FromIterator<(R, usize)> for RoleCounts {
    fn from_iter<I: IntoIterator<Item = (R, usize)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (role, count) in iter {
            if count > 0 {
                *counts.0.entry(role.into()).or_insert(0) += count;
            }
        }
        counts
    }
}

// ============================================================================
// Viewer operations
// ============================================================================

impl Viewer {
    /// Anchor `anchored` on `anchorage` under `role`.
    ///
    /// Adds are cumulative: the role count on both sides grows by one.
    pub fn add_anchorage(
        &mut self,
        anchored: PartId,
        anchorage: PartId,
        role: impl Into<Role>,
    ) -> Result<()> {
        self.ensure_mutable("add_anchorage")?;
        let role = role.into();
        if anchored == anchorage {
            return Err(SceneError::SelfAnchorage { part: anchored });
        }
        self.require(anchored)?;
        self.require(anchorage)?;

        let count = self.link_anchorage(anchored, anchorage, &role);
        debug!(%anchored, %anchorage, %role, count, "anchorage added");
        self.emit(SceneEvent::AnchorageAdded {
            anchored,
            anchorage,
            role,
            count,
        });
        self.finish()
    }

    /// Remove one occurrence of the `(anchored, anchorage, role)` link.
    pub fn remove_anchorage(
        &mut self,
        anchored: PartId,
        anchorage: PartId,
        role: impl Into<Role>,
    ) -> Result<()> {
        self.ensure_mutable("remove_anchorage")?;
        let role = role.into();
        if self.anchorage_count(anchored, anchorage, &role)? == 0 {
            return Err(SceneError::AnchorageNotFound {
                anchored,
                anchorage,
                role,
            });
        }
        self.unlink_anchorage(anchored, anchorage, &role);
        self.finish()
    }

    /// How many times `anchored` is anchored on `anchorage` under `role`.
    pub fn anchorage_count(
        &self,
        anchored: PartId,
        anchorage: PartId,
        role: &Role,
    ) -> Result<usize> {
        self.require(anchorage)?;
        let part = self.require(anchored)?;
        Ok(part
            .anchorages
            .get(&anchorage)
            .map_or(0, |counts| counts.count(role)))
    }

    /// Parts `part` is anchored on.
    pub fn anchorages(&self, part: PartId) -> Result<&BTreeMap<PartId, RoleCounts>> {
        Ok(&self.require(part)?.anchorages)
    }

    /// Parts anchored on `part`.
    pub fn anchoreds(&self, part: PartId) -> Result<&BTreeMap<PartId, RoleCounts>> {
        Ok(&self.require(part)?.anchoreds)
    }

    fn link_anchorage(&mut self, anchored: PartId, anchorage: PartId, role: &Role) -> usize {
        let mut count = 0;
        if let Some(part) = self.parts.get_mut(&anchored) {
            count = part.anchorages.entry(anchorage).or_default().increment(role);
        }
        if let Some(part) = self.parts.get_mut(&anchorage) {
            part.anchoreds.entry(anchored).or_default().increment(role);
        }
        count
    }

    /// Decrement both sides of an existing link and queue the event.
    fn unlink_anchorage(&mut self, anchored: PartId, anchorage: PartId, role: &Role) {
        let mut left = 0;
        if let Some(part) = self.parts.get_mut(&anchored)
            && let Some(counts) = part.anchorages.get_mut(&anchorage)
        {
            left = counts.decrement(role).unwrap_or(0);
            if counts.is_empty() {
                part.anchorages.remove(&anchorage);
            }
        }
        if let Some(part) = self.parts.get_mut(&anchorage)
            && let Some(counts) = part.anchoreds.get_mut(&anchored)
        {
            counts.decrement(role);
            if counts.is_empty() {
                part.anchoreds.remove(&anchored);
            }
        }
        debug!(%anchored, %anchorage, %role, count = left, "anchorage removed");
        self.emit(SceneEvent::AnchorageRemoved {
            anchored,
            anchorage,
            role: role.clone(),
            count: left,
        });
    }

    /// Remove every anchorage link touching `part`, one occurrence at a
    /// time so each event carries the real remaining count.
    pub(crate) fn unlink_all_anchorages(&mut self, part: PartId) {
        let Some(node) = self.parts.get(&part) else {
            return;
        };
        let mut links: Vec<(PartId, PartId, Role, usize)> = Vec::new();
        for (&anchorage, counts) in &node.anchorages {
            for (role, count) in counts.roles() {
                links.push((part, anchorage, role.clone(), count));
            }
        }
        for (&anchored, counts) in &node.anchoreds {
            for (role, count) in counts.roles() {
                links.push((anchored, part, role.clone(), count));
            }
        }
        for (anchored, anchorage, role, count) in links {
            for _ in 0..count {
                self.unlink_anchorage(anchored, anchorage, &role);
            }
        }
    }
}
