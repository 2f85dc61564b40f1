//! Tag-indexed registry of experimental controls, sites and filters.
//!
//! A session is described by [`Definitions`] and created with
//! [`Registry::load`]. Lookups by tag return `None` on a miss; adding a
//! duplicate tag fails and keeps the existing entry.

pub mod definition;
pub mod local_site;
pub mod registry;
pub mod store;

pub use definition::{ControlDefinition, Definitions, FilterDefinition, SiteDefinition};
pub use local_site::LocalSite;
pub use registry::{Registry, SharedControl, SharedSite};
pub use store::TaggedStore;
