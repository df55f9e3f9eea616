//! Virtual platform state
//!
//! A virtual platform groups modules that should be aligned to the same
//! version. Forcing the platform caps the version of every member.

use indexmap::IndexSet;
use parking_lot::RwLock;

use depot_core::{ModuleIdentifier, Version};

/// Ownership state of one virtual platform
#[derive(Debug)]
pub struct VirtualPlatformState {
    platform: ModuleIdentifier,
    participating_modules: RwLock<IndexSet<ModuleIdentifier>>,
    forced_version: RwLock<Option<String>>,
}

impl VirtualPlatformState {
    pub fn new(platform: ModuleIdentifier) -> Self {
        Self {
            platform,
            participating_modules: RwLock::new(IndexSet::new()),
            forced_version: RwLock::new(None),
        }
    }

    /// Module of the platform itself
    pub fn platform(&self) -> &ModuleIdentifier {
        &self.platform
    }

    /// Register a member module
    pub fn add_participating_module(&self, module: ModuleIdentifier) {
        self.participating_modules.write().insert(module);
    }

    /// Member modules in registration order
    pub fn participating_modules(&self) -> Vec<ModuleIdentifier> {
        self.participating_modules.read().iter().cloned().collect()
    }

    /// Check if the module belongs to this platform
    pub fn is_participating(&self, module: &ModuleIdentifier) -> bool {
        self.participating_modules.read().contains(module)
    }

    /// Cap member versions at `version`
    pub fn force_version(&self, version: impl Into<String>) {
        *self.forced_version.write() = Some(version.into());
    }

    pub fn clear_forced_version(&self) {
        *self.forced_version.write() = None;
    }

    pub fn forced_version(&self) -> Option<String> {
        self.forced_version.read().clone()
    }

    /// Check if `version` exceeds the forced version. Always false when
    /// the platform is not forced.
    pub fn is_greater_than_forced_version(&self, version: &str) -> bool {
        match self.forced_version.read().as_deref() {
            Some(forced) => Version::parse(version) > Version::parse(forced),
            None => false,
        }
    }
}
