//! Process-wide component registry.
//!
//! Management-plane calls are serialized by one process-wide lock. The
//! [`RegistryGuard`] returned by [`Registry::lock`] is that lock: holding it
//! is the only way to reach the named components and the window table.
//! Data-plane code (probe handlers, element chain functions) never touches
//! the registry.
//!
//! ```rust
//! use bintr::bintr::Bintr;
//! use bintr::registry::Registry;
//!
//! Registry::init();
//! {
//!     let mut registry = Registry::lock().unwrap();
//!     assert!(registry.insert(Bintr::pipeline("doc-pipeline")));
//!     assert!(registry.get("doc-pipeline").is_some());
//!     registry.remove("doc-pipeline");
//! }
//! ```

use crate::bintr::Bintr;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Native window handle.
pub type WindowHandle = u64;

struct RegistryState {
    initialized: bool,
    components: BTreeMap<String, Bintr>,
    windows: BTreeMap<WindowHandle, String>,
}

static REGISTRY: Mutex<RegistryState> = Mutex::new(RegistryState {
    initialized: false,
    components: BTreeMap::new(),
    windows: BTreeMap::new(),
});

fn acquire() -> MutexGuard<'static, RegistryState> {
    // a panic under the lock leaves the maps intact
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Entry points of the process-wide registry.
pub struct Registry;

impl Registry {
    /// Initialize the registry. Returns false if already initialized.
    pub fn init() -> bool {
        let mut state = acquire();
        if state.initialized {
            return false;
        }
        state.initialized = true;
        tracing::info!("component registry initialized");
        true
    }

    /// Drop every registered component and window and mark the registry
    /// uninitialized. Returns false if it was not initialized.
    pub fn teardown() -> bool {
        let mut state = acquire();
        if !state.initialized {
            return false;
        }
        let components = std::mem::take(&mut state.components);
        state.windows.clear();
        state.initialized = false;
        drop(state);

        for (name, component) in components {
            if component.kind().is_pipeline() && component.is_linked() {
                component.stop();
            }
            tracing::debug!(component = %name, "component released");
        }
        tracing::info!("component registry torn down");
        true
    }

    /// Whether [`init`](Self::init) has run without a later teardown.
    pub fn is_initialized() -> bool {
        acquire().initialized
    }

    /// Take the process-wide lock.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the registry is not initialized.
    pub fn lock() -> Result<RegistryGuard> {
        let state = acquire();
        if !state.initialized {
            return Err(Error::Config("component registry is not initialized".into()));
        }
        Ok(RegistryGuard { state })
    }
}

/// Exclusive access to the registry.
pub struct RegistryGuard {
    state: MutexGuard<'static, RegistryState>,
}

impl RegistryGuard {
    /// Register `component` under its name. Names are unique.
    pub fn insert(&mut self, component: Bintr) -> bool {
        let name = component.name().to_string();
        if self.state.components.contains_key(&name) {
            tracing::error!(component = %name, "component name is not unique");
            return false;
        }
        self.state.components.insert(name, component);
        true
    }

    /// Look up a component by name.
    pub fn get(&self, name: &str) -> Option<Bintr> {
        self.state.components.get(name).cloned()
    }

    /// Whether a component is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.state.components.contains_key(name)
    }

    /// Unregister a component. Windows pointing at it are forgotten too.
    ///
    /// Components still attached to a parent are not removed.
    pub fn remove(&mut self, name: &str) -> Option<Bintr> {
        let component = self.state.components.get(name)?;
        if component.is_in_use() {
            tracing::error!(component = %name, "component is in use");
            return None;
        }
        self.state.windows.retain(|_, sink| sink != name);
        self.state.components.remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.state.components.keys().cloned().collect()
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.state.components.len()
    }

    /// Whether no components are registered.
    pub fn is_empty(&self) -> bool {
        self.state.components.is_empty()
    }

    /// Associate `window` with the registered sink `sink`.
    ///
    /// Fails if the sink is unknown or the window is already taken.
    pub fn register_window(&mut self, window: WindowHandle, sink: &str) -> bool {
        if !self.state.components.contains_key(sink) {
            tracing::error!(window, component = %sink, "window sink is not registered");
            return false;
        }
        if let Some(owner) = self.state.windows.get(&window) {
            tracing::error!(window, owner = %owner, "window is already registered");
            return false;
        }
        self.state.windows.insert(window, sink.to_string());
        true
    }

    /// The sink rendering into `window`.
    pub fn window_sink(&self, window: WindowHandle) -> Option<Bintr> {
        let name = self.state.windows.get(&window)?;
        self.state.components.get(name).cloned()
    }

    /// Forget `window`.
    pub fn unregister_window(&mut self, window: WindowHandle) -> bool {
        self.state.windows.remove(&window).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // the registry is process-wide; keep every assertion in one test
    #[test]
    fn test_registry_lifecycle() {
        Registry::init();
        assert!(!Registry::init());
        {
            let mut registry = Registry::lock().unwrap();
            assert!(registry.insert(Bintr::fake_sink("registry-sink").unwrap()));
            assert!(!registry.insert(Bintr::queue("registry-sink").unwrap()));
            assert!(registry.contains("registry-sink"));

            assert!(registry.register_window(42, "registry-sink"));
            assert!(!registry.register_window(42, "registry-sink"));
            assert!(!registry.register_window(43, "missing"));
            assert_eq!(registry.window_sink(42).unwrap().name(), "registry-sink");

            let pipeline = Bintr::pipeline("registry-pipeline");
            let sink = registry.get("registry-sink").unwrap();
            assert!(sink.add_to_parent(&pipeline));
            assert!(registry.remove("registry-sink").is_none());
            assert!(sink.remove_from_parent(&pipeline));

            assert!(registry.remove("registry-sink").is_some());
            assert!(registry.window_sink(42).is_none());
            assert!(!registry.unregister_window(42));
        }
        assert!(Registry::teardown());
        assert!(!Registry::is_initialized());
        assert!(Registry::lock().is_err());
        assert!(!Registry::teardown());
    }
}
