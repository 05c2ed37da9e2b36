#![forbid(unsafe_code)]

//! Event recording through a viewer subscription.

use std::cell::RefCell;
use std::rc::Rc;

use sgraph_core::{PartId, Result, SceneEvent, Subscription, Viewer};

/// Collects every event delivered to one listener. Dropping the recorder
/// unsubscribes.
#[derive(Debug)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<SceneEvent>>>,
    _subscription: Subscription,
}

impl EventRecorder {
    /// Record all events of `viewer`.
    pub fn attach(viewer: &mut Viewer) -> Result<Self> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let subscription = viewer.subscribe(move |_, event| {
            sink.borrow_mut().push(event.clone());
        })?;
        Ok(Self {
            events,
            _subscription: subscription,
        })
    }

    /// Record events whose subjects include `part`.
    pub fn attach_part(viewer: &mut Viewer, part: PartId) -> Result<Self> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let subscription = viewer.subscribe_part(part, move |_, event| {
            sink.borrow_mut().push(event.clone());
        })?;
        Ok(Self {
            events,
            _subscription: subscription,
        })
    }

    #[must_use]
    pub fn events(&self) -> Vec<SceneEvent> {
        self.events.borrow().clone()
    }

    /// Labels of the recorded events, in delivery order.
    #[must_use]
    pub fn labels(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(SceneEvent::label).collect()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<SceneEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}
