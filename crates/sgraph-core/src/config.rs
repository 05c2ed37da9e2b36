#![forbid(unsafe_code)]

//! Viewer configuration.
//!
//! [`ViewerConfig`] collects the few tunables of a [`Viewer`](crate::Viewer).
//! With the `viewer-config` feature it can be loaded from TOML or JSON.
//!
//! ```toml
//! verify_invariants = true
//! refresh_on_attach = false
//! max_dispatch_depth = 16
//! ```
//!
//! ```rust,ignore
//! let config = ViewerConfig::from_toml_file("sgraph.toml")?;
//! let viewer = Viewer::with_config(root_visual, config)?;
//! ```

#[cfg(feature = "viewer-config")]
use std::path::Path;

#[cfg(feature = "viewer-config")]
use serde::{Deserialize, Serialize};

/// Default bound on nested listener deliveries.
pub const DEFAULT_MAX_DISPATCH_DEPTH: usize = 32;

/// Tunables for a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "viewer-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "viewer-config", serde(default))]
pub struct ViewerConfig {
    /// Run the invariant audit after every mutation.
    pub verify_invariants: bool,

    /// Refresh a part's visual when it is attached to a parent.
    pub refresh_on_attach: bool,

    /// Mutations are refused once this many listener deliveries are nested.
    pub max_dispatch_depth: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            verify_invariants: false,
            refresh_on_attach: true,
            max_dispatch_depth: DEFAULT_MAX_DISPATCH_DEPTH,
        }
    }
}

impl ViewerConfig {
    #[must_use]
    pub fn with_verify_invariants(mut self, on: bool) -> Self {
        self.verify_invariants = on;
        self
    }

    #[must_use]
    pub fn with_refresh_on_attach(mut self, on: bool) -> Self {
        self.refresh_on_attach = on;
        self
    }

    #[must_use]
    pub fn with_max_dispatch_depth(mut self, depth: usize) -> Self {
        self.max_dispatch_depth = depth;
        self
    }

    /// Load from a TOML string.
    #[cfg(feature = "viewer-config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ViewerConfigError> {
        let config: Self = toml::from_str(s).map_err(ViewerConfigError::Toml)?;
        config.checked()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "viewer-config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ViewerConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ViewerConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "viewer-config")]
    pub fn from_json_str(s: &str) -> Result<Self, ViewerConfigError> {
        let config: Self = serde_json::from_str(s).map_err(ViewerConfigError::Json)?;
        config.checked()
    }

    /// Serialize to a TOML string.
    #[cfg(feature = "viewer-config")]
    pub fn to_toml_string(&self) -> Result<String, ViewerConfigError> {
        toml::to_string(self).map_err(ViewerConfigError::TomlSer)
    }

    /// Validate all parameters. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_dispatch_depth == 0 {
            errors.push("max_dispatch_depth must be > 0".into());
        }
        errors
    }

    pub(crate) fn checked(self) -> Result<Self, ViewerConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ViewerConfigError::Validation(errors))
        }
    }
}

/// Errors from loading or validating a [`ViewerConfig`].
#[derive(Debug)]
pub enum ViewerConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "viewer-config")]
    Toml(toml::de::Error),
    /// TOML serialization error.
    #[cfg(feature = "viewer-config")]
    TomlSer(toml::ser::Error),
    /// JSON parse error.
    #[cfg(feature = "viewer-config")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ViewerConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "viewer-config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "viewer-config")]
            Self::TomlSer(e) => write!(f, "TOML serialization error: {e}"),
            #[cfg(feature = "viewer-config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ViewerConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "viewer-config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "viewer-config")]
            Self::TomlSer(e) => Some(e),
            #[cfg(feature = "viewer-config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
