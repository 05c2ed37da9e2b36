#![forbid(unsafe_code)]

//! Scene fixtures and deterministic streams.

use std::rc::Rc;

use sgraph_core::{
    ContentRef, ImmediateDomain, PartBlueprint, PartId, Result, Viewer, ViewerConfig, VisualRef,
};

/// Content factory producing a plain content part with a fresh visual.
pub fn content_factory() -> impl FnMut(&Viewer, &ContentRef) -> Option<PartBlueprint> {
    |_: &Viewer, content: &ContentRef| {
        Some(PartBlueprint::content(content.clone(), VisualRef::new(content.type_name())))
    }
}

/// Error type of fixture constructors (config or scene failures).
pub type FixtureError = Box<dyn std::error::Error>;

/// A viewer wired to an [`ImmediateDomain`] and the default content factory.
pub struct SceneFixture {
    pub viewer: Viewer,
    pub domain: Rc<ImmediateDomain>,
}

impl SceneFixture {
    /// Inactive viewer with default configuration.
    pub fn new() -> std::result::Result<Self, FixtureError> {
        Self::with_config(ViewerConfig::default())
    }

    /// Inactive viewer with `config`.
    pub fn with_config(config: ViewerConfig) -> std::result::Result<Self, FixtureError> {
        let mut viewer = Viewer::with_config(VisualRef::new("root"), config)?;
        let domain = Rc::new(ImmediateDomain::new("fixture"));
        viewer.set_domain(domain.clone())?;
        viewer.set_content_part_factory(content_factory());
        Ok(Self { viewer, domain })
    }

    /// Active viewer that audits after every mutation.
    pub fn active() -> std::result::Result<Self, FixtureError> {
        let mut fixture = Self::with_config(ViewerConfig::default().with_verify_invariants(true))?;
        fixture.viewer.activate()?;
        Ok(fixture)
    }

    #[must_use]
    pub fn root(&self) -> PartId {
        self.viewer.root()
    }

    /// Create a detached content part for a fresh content object `name`.
    pub fn content(&mut self, name: &'static str) -> Result<(ContentRef, PartId)> {
        let content = ContentRef::new(name);
        let part = self.viewer.create_content_part(&content)?;
        Ok((content, part))
    }

    /// Create a content part for `name` and append it to `parent`.
    pub fn attach_content(
        &mut self,
        parent: PartId,
        name: &'static str,
    ) -> Result<(ContentRef, PartId)> {
        let (content, part) = self.content(name)?;
        self.viewer.add_child(parent, part)?;
        Ok((content, part))
    }

    /// Create a detached feedback part.
    pub fn feedback(&mut self) -> Result<PartId> {
        self.viewer
            .insert_part(PartBlueprint::feedback(VisualRef::new("feedback")))
    }
}

impl std::fmt::Debug for SceneFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneFixture")
            .field("viewer", &self.viewer)
            .field("executed", &self.domain.executed())
            .finish()
    }
}

/// Choose a seed from the environment or use the provided default.
#[must_use]
pub fn fixture_seed(default_seed: u64) -> u64 {
    env_u64("SGRAPH_TEST_SEED")
        .or_else(|| env_u64("SGRAPH_SEED"))
        .unwrap_or(default_seed)
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Small deterministic generator for operation streams.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        self.state
    }

    /// Uniform index in `0..len`; `0` when `len == 0`.
    pub fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((self.next_u64() >> 16) % len as u64) as usize
    }

    /// True with probability `percent / 100`.
    pub fn chance(&mut self, percent: u64) -> bool {
        (self.next_u64() >> 33) % 100 < percent
    }
}
