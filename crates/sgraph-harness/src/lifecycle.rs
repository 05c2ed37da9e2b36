#![forbid(unsafe_code)]

//! Adapters that record their lifecycle calls.

use std::cell::RefCell;
use std::rc::Rc;

use sgraph_core::{Activatable, Adapter, AdapterHost, Capability, DynAdapter, VisualRef};

/// Shared, ordered log of `name:call` entries.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Entries ending in `:call`, with the suffix stripped.
    #[must_use]
    pub fn names_for(&self, call: &str) -> Vec<String> {
        let suffix = format!(":{call}");
        self.0
            .borrow()
            .iter()
            .filter_map(|entry| entry.strip_suffix(suffix.as_str()).map(str::to_owned))
            .collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, entry: String) {
        self.0.borrow_mut().push(entry);
    }
}

/// Activatable adapter logging `activate`, `deactivate`, `bind`, `unbind`
/// and `refresh` calls.
#[derive(Debug)]
pub struct LoggingAdapter {
    name: String,
    log: CallLog,
    extra: Vec<Capability>,
    active: bool,
}

impl LoggingAdapter {
    #[must_use]
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            extra: Vec::new(),
            active: false,
        }
    }

    /// Boxed adapter ready for `set_adapter`.
    #[must_use]
    pub fn boxed(name: impl Into<String>, log: &CallLog) -> Box<DynAdapter> {
        Box::new(Self::new(name, log))
    }

    /// Also advertise `capability`.
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.extra.push(capability);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn record(&self, call: &str) {
        self.log.push(format!("{}:{call}", self.name));
    }
}

impl Activatable for LoggingAdapter {
    fn activate(&mut self) {
        self.active = true;
        self.record("activate");
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.record("deactivate");
    }
}

impl Adapter for LoggingAdapter {
    fn capabilities(&self) -> Vec<Capability> {
        self.extra.clone()
    }

    fn as_activatable(&mut self) -> Option<&mut dyn Activatable> {
        Some(self)
    }

    fn bind(&mut self, host: Option<AdapterHost>) {
        self.record(if host.is_some() { "bind" } else { "unbind" });
    }

    fn refresh_visual(&mut self, _visual: &VisualRef) {
        self.record("refresh");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let log = CallLog::new();
        let mut adapter = LoggingAdapter::new("p", &log);
        adapter.bind(Some(AdapterHost::Viewer));
        adapter.activate();
        adapter.deactivate();
        adapter.bind(None);
        assert_eq!(
            log.entries(),
            vec!["p:bind", "p:activate", "p:deactivate", "p:unbind"]
        );
        assert_eq!(log.names_for("activate"), vec!["p"]);
        log.clear();
        assert!(log.entries().is_empty());
    }
}
