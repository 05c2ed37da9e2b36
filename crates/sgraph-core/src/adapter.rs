#![forbid(unsafe_code)]

//! Typed adapter store.
//!
//! # Design
//!
//! Parts and viewers carry behavior objects ("adapters") under an
//! [`AdapterKey`]: a [`Capability`] plus a [`Role`]. The store keeps entries
//! in registration order, which is the order used for activation, for
//! type-compatible fallback lookups, and (reversed) for deactivation.
//!
//! Every adapter provides the capability of its own concrete type. Further
//! capabilities (marker types or trait-object types such as `dyn MyPolicy`)
//! are declared explicitly through [`Adapter::capabilities`]; there is no
//! runtime reflection over trait hierarchies.
//!
//! # Lookup
//!
//! 1. An entry registered under exactly `(capability, role)` wins.
//! 2. Otherwise, if the requested role is [`Role::DEFAULT`], the first entry
//!    in registration order whose adapter provides `capability` is returned,
//!    whatever role it was registered under.
//! 3. Named roles never fall back.
//!
//! Replacing an adapter keeps the slot of the replaced key, so a key's
//! position in the registration order is fixed by its first registration.
//!
//! # Invariants
//!
//! 1. Keys are unique within a store.
//! 2. While the store is active, every installed activatable adapter has
//!    received exactly one more `activate` than `deactivate` call.
//! 3. Installed adapters are bound to the store's host; removed adapters are
//!    unbound before they are handed back.

use std::any::{Any, TypeId, type_name};
use std::fmt;

use crate::activation::{Activatable, Activation};
use crate::error::{Result, SceneError};
use crate::identity::VisualRef;
use crate::part::PartId;
use crate::role::Role;

/// Type-level capability tag.
#[derive(Clone, Copy)]
pub struct Capability {
    id: TypeId,
    name: &'static str,
}

impl Capability {
    /// Capability identified by `T`, which may be a concrete type, a marker
    /// type or a trait-object type.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Capability {}

impl std::hash::Hash for Capability {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Key under which an adapter is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdapterKey {
    pub capability: Capability,
    pub role: Role,
}

impl AdapterKey {
    #[must_use]
    pub fn new(capability: Capability, role: impl Into<Role>) -> Self {
        Self {
            capability,
            role: role.into(),
        }
    }

    /// Key for `T` under the default role.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(Capability::of::<T>(), Role::DEFAULT)
    }

    /// Key for `T` under a named role.
    #[must_use]
    pub fn with_role<T: ?Sized + 'static>(role: impl Into<Role>) -> Self {
        Self::new(Capability::of::<T>(), role)
    }
}

impl fmt::Display for AdapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.capability.name, self.role)
    }
}

/// Adapter trait object with a `'static` bound, so it can be downcast.
pub type DynAdapter = dyn Adapter + 'static;

/// Owner of an adapter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterHost {
    Viewer,
    Part(PartId),
}

/// A behavior or policy object attached to a host.
pub trait Adapter: Any {
    /// Capabilities provided in addition to the adapter's own type.
    fn capabilities(&self) -> Vec<Capability> {
        Vec::new()
    }

    /// Lifecycle hook; adapters without one are skipped by activation.
    fn as_activatable(&mut self) -> Option<&mut dyn Activatable> {
        None
    }

    /// Called with `Some(host)` when installed and `None` when removed.
    fn bind(&mut self, host: Option<AdapterHost>) {
        let _ = host;
    }

    /// Called when the host part refreshes its visual.
    fn refresh_visual(&mut self, visual: &VisualRef) {
        let _ = visual;
    }

    fn adapter_name(&self) -> &'static str {
        type_name::<Self>()
    }
}

struct AdapterEntry {
    key: AdapterKey,
    provided: Vec<Capability>,
    adapter: Box<dyn Adapter>,
}

impl AdapterEntry {
    fn provides(&self, capability: &Capability) -> bool {
        self.provided.contains(capability)
    }
}

fn provided_capabilities(adapter: &DynAdapter) -> Vec<Capability> {
    let any: &(dyn Any + 'static) = adapter;
    let own = Capability {
        id: any.type_id(),
        name: adapter.adapter_name(),
    };
    let mut provided = vec![own];
    for capability in adapter.capabilities() {
        if !provided.contains(&capability) {
            provided.push(capability);
        }
    }
    provided
}

/// Registration-ordered map from [`AdapterKey`] to adapter.
#[derive(Default)]
pub struct AdapterStore {
    entries: Vec<AdapterEntry>,
    activation: Activation,
}

impl fmt::Debug for AdapterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterStore")
            .field("keys", &self.entries.iter().map(|e| &e.key).collect::<Vec<_>>())
            .field("active", &self.activation.is_active())
            .finish()
    }
}

impl AdapterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.activation.is_active()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &AdapterKey) -> bool {
        self.position(key).is_some()
    }

    /// Keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &AdapterKey> + '_ {
        self.entries.iter().map(|e| &e.key)
    }

    fn position(&self, key: &AdapterKey) -> Option<usize> {
        self.entries.iter().position(|e| &e.key == key)
    }

    /// Check that `adapter` may be registered under `key`.
    pub fn check(key: &AdapterKey, adapter: &DynAdapter) -> Result<Vec<Capability>> {
        let provided = provided_capabilities(adapter);
        if !provided.contains(&key.capability) {
            return Err(SceneError::CapabilityMismatch {
                key: key.clone(),
                adapter: adapter.adapter_name(),
            });
        }
        Ok(provided)
    }

    /// Install `adapter` under `key`, returning the adapter it replaced.
    ///
    /// The replaced adapter is deactivated (if the store is active) and
    /// unbound before the new one is bound and, if the store is active,
    /// activated.
    pub fn set(
        &mut self,
        host: AdapterHost,
        key: AdapterKey,
        mut adapter: Box<dyn Adapter>,
    ) -> Result<Option<Box<dyn Adapter>>> {
        let provided = Self::check(&key, adapter.as_ref())?;
        let active = self.is_active();

        let replaced = match self.position(&key) {
            Some(pos) => {
                let entry = &mut self.entries[pos];
                if active && let Some(old) = entry.adapter.as_activatable() {
                    old.deactivate();
                }
                entry.adapter.bind(None);
                adapter.bind(Some(host));
                entry.provided = provided;
                let old = std::mem::replace(&mut entry.adapter, adapter);
                if active && let Some(new) = entry.adapter.as_activatable() {
                    new.activate();
                }
                Some(old)
            }
            None => {
                adapter.bind(Some(host));
                self.entries.push(AdapterEntry {
                    key,
                    provided,
                    adapter,
                });
                if active
                    && let Some(entry) = self.entries.last_mut()
                    && let Some(new) = entry.adapter.as_activatable()
                {
                    new.activate();
                }
                None
            }
        };
        Ok(replaced)
    }

    /// Remove the adapter under `key`. Absence is not an error.
    pub fn unset(&mut self, key: &AdapterKey) -> Option<Box<dyn Adapter>> {
        let pos = self.position(key)?;
        let mut entry = self.entries.remove(pos);
        if self.is_active()
            && let Some(adapter) = entry.adapter.as_activatable()
        {
            adapter.deactivate();
        }
        entry.adapter.bind(None);
        Some(entry.adapter)
    }

    /// Look up an adapter; see the module docs for the fallback rule.
    #[must_use]
    pub fn get(&self, capability: &Capability, role: &Role) -> Option<&DynAdapter> {
        self.resolve(capability, role)
            .map(|pos| self.entries[pos].adapter.as_ref())
    }

    pub fn get_mut(&mut self, capability: &Capability, role: &Role) -> Option<&mut DynAdapter> {
        let pos = self.resolve(capability, role)?;
        let adapter: &mut DynAdapter = self.entries[pos].adapter.as_mut();
        Some(adapter)
    }

    /// Typed lookup for a concrete adapter type.
    #[must_use]
    pub fn get_typed<T: Adapter>(&self, role: &Role) -> Option<&T> {
        let adapter = self.get(&Capability::of::<T>(), role)?;
        let any: &(dyn Any + 'static) = adapter;
        any.downcast_ref::<T>()
    }

    pub fn get_typed_mut<T: Adapter>(&mut self, role: &Role) -> Option<&mut T> {
        let adapter = self.get_mut(&Capability::of::<T>(), role)?;
        let any: &mut (dyn Any + 'static) = adapter;
        any.downcast_mut::<T>()
    }

    /// All adapters providing `capability`, in registration order.
    #[must_use]
    pub fn get_all(&self, capability: &Capability) -> Vec<(&AdapterKey, &DynAdapter)> {
        self.entries
            .iter()
            .filter(|e| e.provides(capability))
            .map(|e| (&e.key, e.adapter.as_ref()))
            .collect()
    }

    fn resolve(&self, capability: &Capability, role: &Role) -> Option<usize> {
        let exact = self
            .entries
            .iter()
            .position(|e| &e.key.capability == capability && &e.key.role == role);
        if exact.is_some() || !role.is_default() {
            return exact;
        }
        self.entries.iter().position(|e| e.provides(capability))
    }

    /// Activate every activatable adapter in registration order.
    ///
    /// Returns `false` (and calls nothing) if the store was already active.
    pub fn activate(&mut self) -> bool {
        if !self.activation.activate() {
            return false;
        }
        for entry in &mut self.entries {
            if let Some(adapter) = entry.adapter.as_activatable() {
                adapter.activate();
            }
        }
        true
    }

    /// Deactivate every activatable adapter in reverse registration order.
    pub fn deactivate(&mut self) -> bool {
        if !self.activation.deactivate() {
            return false;
        }
        for entry in self.entries.iter_mut().rev() {
            if let Some(adapter) = entry.adapter.as_activatable() {
                adapter.deactivate();
            }
        }
        true
    }

    /// Run every adapter's visual refresh hook in registration order.
    pub fn refresh_visual(&mut self, visual: &VisualRef) {
        for entry in &mut self.entries {
            entry.adapter.refresh_visual(visual);
        }
    }

    /// Deactivate, unbind and drop every adapter. Returns the removed keys in
    /// removal order (reverse registration order).
    pub fn dispose(&mut self) -> Vec<AdapterKey> {
        self.deactivate();
        let mut removed = Vec::with_capacity(self.entries.len());
        while let Some(mut entry) = self.entries.pop() {
            entry.adapter.bind(None);
            removed.push(entry.key);
        }
        removed
    }
}
