//! Registry owning every live control, site and filter of a session.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      Registry                        │
//! │  factories: family -> Box<dyn ControlFactory>        │
//! │  filters:   tag -> SharedFilter                      │
//! │  controls:  tag -> SharedControl                     │
//! │  sites:     tag -> SharedSite  (each owns a copy of  │
//! │                                 a registered control)│
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The registry is the sole long-term owner of what is added to it. Dropping
//! it (or calling [`Registry::clear`]) drops sites before controls, so each
//! physical link is terminated once, after the last copy using it is gone.

use crate::definition::{ControlDefinition, Definitions, FilterDefinition, SiteDefinition};
use crate::local_site::{self, LocalSite};
use crate::store::TaggedStore;
use hsim_control::{SimFeAdapterFactory, XpcTargetFactory};
use hsim_core::{
    ControlFactory, ExperimentalControl, ExperimentalSite, Namespace, RegistryError, SharedFilter, Tag,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A registered control. Lock it to drive it.
pub type SharedControl = Arc<Mutex<Box<dyn ExperimentalControl>>>;

/// A registered site. Lock it to drive it.
pub type SharedSite = Arc<Mutex<Box<dyn ExperimentalSite>>>;

/// Tag-indexed owner of controls, sites and filters.
pub struct Registry {
    factories: HashMap<&'static str, Box<dyn ControlFactory>>,
    filters: TaggedStore<SharedFilter>,
    controls: TaggedStore<SharedControl>,
    sites: TaggedStore<SharedSite>,
}

impl Registry {
    /// Empty registry with no control factories.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            filters: TaggedStore::new(Namespace::Filters),
            controls: TaggedStore::new(Namespace::Controls),
            sites: TaggedStore::new(Namespace::Sites),
        }
    }

    /// Registry with the `SimFEAdapter` and `xPCtarget` factories.
    #[must_use]
    pub fn with_builtin_factories() -> Self {
        let mut registry = Self::new();
        registry.register_factory(Box::new(SimFeAdapterFactory));
        registry.register_factory(Box::new(XpcTargetFactory::new()));
        registry
    }

    // =========================================================================
    // Factory Management
    // =========================================================================

    /// Register a control factory, returning the one it replaces.
    pub fn register_factory(&mut self, factory: Box<dyn ControlFactory>) -> Option<Box<dyn ControlFactory>> {
        let family = factory.family();
        info!(family, description = factory.description(), "registering control factory");
        self.factories.insert(family, factory)
    }

    /// Registered family names, sorted.
    #[must_use]
    pub fn families(&self) -> Vec<&'static str> {
        let mut families: Vec<_> = self.factories.keys().copied().collect();
        families.sort_unstable();
        families
    }

    fn factory(&self, family: &str) -> Result<&dyn ControlFactory, RegistryError> {
        self.factories
            .get(family)
            .map(|factory| &**factory)
            .ok_or_else(|| RegistryError::UnknownFamily {
                namespace: Namespace::Controls,
                family: family.to_string(),
            })
    }

    // =========================================================================
    // Filters
    // =========================================================================

    /// Add a filter under `tag`.
    pub fn add_filter(&self, tag: Tag, filter: SharedFilter) -> Result<(), RegistryError> {
        self.filters.add(tag, filter)
    }

    /// Filter under `tag`.
    #[must_use]
    pub fn filter(&self, tag: Tag) -> Option<SharedFilter> {
        self.filters.get(tag)
    }

    /// Build and add a filter from its definition.
    pub fn create_filter(&self, def: &FilterDefinition) -> Result<(), RegistryError> {
        let filter = def
            .spec
            .build()
            .map_err(|message| RegistryError::invalid_config(format!("filter {}", def.tag), message))?;
        debug!(tag = def.tag, %filter, "filter created");
        self.add_filter(def.tag, filter)
    }

    // =========================================================================
    // Controls
    // =========================================================================

    /// Add a constructed control under `tag`.
    ///
    /// On a duplicate tag the control is dropped, which runs its family's
    /// termination protocol.
    pub fn add_control(&self, tag: Tag, control: Box<dyn ExperimentalControl>) -> Result<(), RegistryError> {
        self.controls.add(tag, Arc::new(Mutex::new(control)))
    }

    /// Control under `tag`.
    #[must_use]
    pub fn control(&self, tag: Tag) -> Option<SharedControl> {
        self.controls.get(tag)
    }

    /// Check a control definition without opening its link.
    pub fn validate_control(&self, def: &ControlDefinition) -> Result<(), RegistryError> {
        self.factory(&def.family)?.validate(&def.config)
    }

    /// Build a control through its family factory and add it.
    ///
    /// Referenced filters must already be registered.
    pub fn create_control(&self, def: &ControlDefinition) -> Result<(), RegistryError> {
        if self.controls.contains(def.tag) {
            return Err(RegistryError::DuplicateTag {
                namespace: Namespace::Controls,
                tag: def.tag,
            });
        }
        let factory = self.factory(&def.family)?;
        factory.validate(&def.config)?;
        let control = factory.build(def.tag, def.config.clone(), &self.filters)?;
        info!(tag = def.tag, family = %def.family, "control created");
        self.add_control(def.tag, control)
    }

    // =========================================================================
    // Sites
    // =========================================================================

    /// Add a constructed site under `tag`.
    pub fn add_site(&self, tag: Tag, site: Box<dyn ExperimentalSite>) -> Result<(), RegistryError> {
        self.sites.add(tag, Arc::new(Mutex::new(site)))
    }

    /// Site under `tag`.
    #[must_use]
    pub fn site(&self, tag: Tag) -> Option<SharedSite> {
        self.sites.get(tag)
    }

    /// Build a site over a copy of its control, negotiate its sizes, and add
    /// it. The site's `setup` is left to the caller.
    pub fn create_site(&self, def: &SiteDefinition) -> Result<(), RegistryError> {
        if def.family != local_site::FAMILY {
            return Err(RegistryError::UnknownFamily {
                namespace: Namespace::Sites,
                family: def.family.clone(),
            });
        }
        if self.sites.contains(def.tag) {
            return Err(RegistryError::DuplicateTag {
                namespace: Namespace::Sites,
                tag: def.tag,
            });
        }
        let control = self.control(def.control).ok_or(RegistryError::NotFound {
            namespace: Namespace::Controls,
            tag: def.control,
        })?;
        let copy = control.lock().get_copy();
        let mut site = LocalSite::new(def.tag, copy);
        site.set_size(def.trial, def.daq)?;
        info!(tag = def.tag, control = def.control, trial = %def.trial, daq = %def.daq, "site created");
        self.add_site(def.tag, Box::new(site))
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Check every definition without opening any link.
    pub fn check(&self, defs: &Definitions) -> Result<(), RegistryError> {
        defs.validate()?;
        for control in &defs.controls {
            self.validate_control(control)?;
        }
        for site in &defs.sites {
            if site.family != local_site::FAMILY {
                return Err(RegistryError::UnknownFamily {
                    namespace: Namespace::Sites,
                    family: site.family.clone(),
                });
            }
        }
        Ok(())
    }

    /// Create every definition: filters, then controls, then sites.
    ///
    /// Stops at the first failure; entries created before it stay registered.
    pub fn load(&self, defs: &Definitions) -> Result<(), RegistryError> {
        self.check(defs)?;
        for filter in &defs.filters {
            self.create_filter(filter)?;
        }
        for control in &defs.controls {
            self.create_control(control)?;
        }
        for site in &defs.sites {
            self.create_site(site)?;
        }
        info!(
            filters = self.filters.len(),
            controls = self.controls.len(),
            sites = self.sites.len(),
            "session loaded"
        );
        Ok(())
    }

    /// Drop every site, then every control, then every filter.
    pub fn clear(&self) {
        self.sites.clear();
        self.controls.clear();
        self.filters.clear();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("families", &self.families())
            .field("filters", &self.filters)
            .field("controls", &self.controls)
            .field("sites", &self.sites)
            .finish()
    }
}
