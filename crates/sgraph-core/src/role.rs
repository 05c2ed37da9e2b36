#![forbid(unsafe_code)]

//! Role names shared by adapter keys and anchorage links.

use std::fmt;
use std::sync::Arc;

/// Optional role qualifier.
///
/// [`Role::DEFAULT`] is the distinguished "none" role. Adapter lookups treat
/// it specially (type-compatible fallback); anchorage links count it like any
/// other role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Role(Option<Arc<str>>);

impl Role {
    /// The default / unnamed role.
    pub const DEFAULT: Self = Self(None);

    /// A named role. The empty string is normalized to [`Role::DEFAULT`].
    #[must_use]
    pub fn named(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        if name.is_empty() {
            return Self::DEFAULT;
        }
        Self(Some(Arc::from(name)))
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0.is_none()
    }

    /// The role name, `None` for the default role.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

impl From<Option<&str>> for Role {
    fn from(name: Option<&str>) -> Self {
        name.map_or(Self::DEFAULT, Self::named)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => f.write_str(name),
            None => f.write_str("<default>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_default() {
        assert_eq!(Role::named(""), Role::DEFAULT);
        assert!(Role::from(None).is_default());
    }

    #[test]
    fn default_sorts_first() {
        let mut roles = vec![Role::named("b"), Role::DEFAULT, Role::named("a")];
        roles.sort();
        assert_eq!(roles, vec![Role::DEFAULT, Role::named("a"), Role::named("b")]);
    }
}
