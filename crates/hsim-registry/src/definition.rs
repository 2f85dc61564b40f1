//! Configuration records for registry entries.
//!
//! ```toml
//! [[filters]]
//! tag = 1
//! type = "linear"
//! gain = 2.0
//!
//! [[controls]]
//! tag = 1
//! type = "SimFEAdapter"
//! [controls.config]
//! mock = true
//!
//! [[sites]]
//! tag = 1
//! control = 1
//! trial = { disp = 1 }
//! daq = { disp = 1, force = 1 }
//! ```

use crate::local_site;
use hsim_core::{FilterSpec, Namespace, RegistryError, SizeSpec, Tag};
use serde::Deserialize;
use std::collections::BTreeSet;

/// A filter entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterDefinition {
    /// Filter tag.
    pub tag: Tag,
    /// Filter kind and parameters.
    #[serde(flatten)]
    pub spec: FilterSpec,
}

/// A control entry, built by the factory registered for `family`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlDefinition {
    /// Control tag.
    pub tag: Tag,
    /// Family name, e.g. `SimFEAdapter` or `xPCtarget`.
    #[serde(rename = "type")]
    pub family: String,
    /// Family-specific configuration table.
    #[serde(default = "empty_table")]
    pub config: toml::Value,
}

fn empty_table() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

/// A site entry driving a registered control.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteDefinition {
    /// Site tag.
    pub tag: Tag,
    /// Site family; only `LocalSite` is built in.
    #[serde(rename = "type", default = "default_site_family")]
    pub family: String,
    /// Tag of the control the site drives.
    pub control: Tag,
    /// Trial channel counts.
    #[serde(default)]
    pub trial: SizeSpec,
    /// Daq channel counts.
    #[serde(default)]
    pub daq: SizeSpec,
}

fn default_site_family() -> String {
    local_site::FAMILY.to_string()
}

/// Every entry of a session, in creation order: filters, controls, sites.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Definitions {
    /// Filter entries.
    #[serde(default)]
    pub filters: Vec<FilterDefinition>,
    /// Control entries.
    #[serde(default)]
    pub controls: Vec<ControlDefinition>,
    /// Site entries.
    #[serde(default)]
    pub sites: Vec<SiteDefinition>,
}

impl Definitions {
    /// Structural checks that need no factory: unique tags per namespace and
    /// sites referring to defined controls.
    pub fn validate(&self) -> Result<(), RegistryError> {
        unique(Namespace::Filters, self.filters.iter().map(|f| f.tag))?;
        unique(Namespace::Controls, self.controls.iter().map(|c| c.tag))?;
        unique(Namespace::Sites, self.sites.iter().map(|s| s.tag))?;

        for filter in &self.filters {
            filter
                .spec
                .validate()
                .map_err(|message| RegistryError::invalid_config(format!("filter {}", filter.tag), message))?;
        }

        let controls: BTreeSet<Tag> = self.controls.iter().map(|c| c.tag).collect();
        for site in &self.sites {
            if !controls.contains(&site.control) {
                return Err(RegistryError::NotFound {
                    namespace: Namespace::Controls,
                    tag: site.control,
                });
            }
        }
        Ok(())
    }
}

fn unique(namespace: Namespace, tags: impl Iterator<Item = Tag>) -> Result<(), RegistryError> {
    let mut seen = BTreeSet::new();
    for tag in tags {
        if !seen.insert(tag) {
            return Err(RegistryError::DuplicateTag { namespace, tag });
        }
    }
    Ok(())
}
