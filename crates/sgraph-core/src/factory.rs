#![forbid(unsafe_code)]

//! Part factories.
//!
//! Factories turn model objects (content) or existing parts (targets of
//! feedback and handles) into [`PartBlueprint`]s. The viewer materializes
//! blueprints as detached, inactive parts; attaching them is up to the
//! caller.

use crate::identity::ContentRef;
use crate::part::{PartBlueprint, PartId};
use crate::viewer::Viewer;

/// Produces the content part for a model object.
pub trait ContentPartFactory {
    /// Return `None` to decline the content object.
    ///
    /// The returned blueprint must carry `content` itself.
    fn create_content_part(&mut self, viewer: &Viewer, content: &ContentRef)
    -> Option<PartBlueprint>;
}

/// Produces feedback parts (selection outlines, hover highlights, ...).
pub trait FeedbackPartFactory {
    fn create_feedback_parts(&mut self, viewer: &Viewer, targets: &[PartId]) -> Vec<PartBlueprint>;
}

/// Produces handle parts (resize grips, bend points, ...).
pub trait HandlePartFactory {
    fn create_handle_parts(&mut self, viewer: &Viewer, targets: &[PartId]) -> Vec<PartBlueprint>;
}

impl<F> ContentPartFactory for F
where
    F: FnMut(&Viewer, &ContentRef) -> Option<PartBlueprint>,
{
    fn create_content_part(
        &mut self,
        viewer: &Viewer,
        content: &ContentRef,
    ) -> Option<PartBlueprint> {
        self(viewer, content)
    }
}

impl<F> FeedbackPartFactory for F
where
    F: FnMut(&Viewer, &[PartId]) -> Vec<PartBlueprint>,
{
    fn create_feedback_parts(&mut self, viewer: &Viewer, targets: &[PartId]) -> Vec<PartBlueprint> {
        self(viewer, targets)
    }
}

impl<F> HandlePartFactory for F
where
    F: FnMut(&Viewer, &[PartId]) -> Vec<PartBlueprint>,
{
    fn create_handle_parts(&mut self, viewer: &Viewer, targets: &[PartId]) -> Vec<PartBlueprint> {
        self(viewer, targets)
    }
}
