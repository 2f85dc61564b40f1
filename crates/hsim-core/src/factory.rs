//! Controller factories.
//!
//! Controller families are registered with the registry at startup through
//! [`ControlFactory`]. The registry hands each factory the family's TOML
//! configuration table:
//!
//! ```toml
//! [[controls]]
//! tag = 1
//! type = "SimFEAdapter"
//!
//! [controls.config]
//! ip_address = "127.0.0.1"
//! ip_port = 44000
//! ctrl_filters = { disp = 2 }
//! ```

use crate::control::ExperimentalControl;
use crate::error::{Namespace, RegistryError};
use crate::filter::{FilterTable, SharedFilter};
use crate::response::KindMap;
use crate::Tag;

/// Resolves filter tags while a controller is being built.
pub trait FilterLookup {
    /// Filter registered under `tag`.
    fn filter(&self, tag: Tag) -> Option<SharedFilter>;
}

/// Builds controllers of one family from configuration.
pub trait ControlFactory: Send + Sync {
    /// Family name used in configuration (`type = "..."`).
    fn family(&self) -> &'static str;

    /// Human readable description.
    fn description(&self) -> &'static str;

    /// Check the configuration without touching the network or hardware.
    fn validate(&self, config: &toml::Value) -> Result<(), RegistryError>;

    /// Open the link and construct the controller.
    fn build(
        &self,
        tag: Tag,
        config: toml::Value,
        filters: &dyn FilterLookup,
    ) -> Result<Box<dyn ExperimentalControl>, RegistryError>;
}

/// Resolve a table of filter tags into a [`FilterTable`].
pub fn resolve_filters(
    tags: &KindMap<Option<Tag>>,
    filters: &dyn FilterLookup,
) -> Result<FilterTable, RegistryError> {
    let mut table = FilterTable::default();
    for (kind, tag) in tags.iter() {
        if let Some(tag) = *tag {
            let filter = filters.filter(tag).ok_or(RegistryError::NotFound {
                namespace: Namespace::Filters,
                tag,
            })?;
            table[kind] = Some(filter);
        }
    }
    Ok(table)
}

/// Deserialize a factory configuration, mapping failures to
/// [`RegistryError::InvalidConfig`].
pub fn parse_config<T: serde::de::DeserializeOwned>(
    family: &str,
    config: toml::Value,
) -> Result<T, RegistryError> {
    config
        .try_into()
        .map_err(|e: toml::de::Error| RegistryError::invalid_config(family, e.to_string().trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Identity;
    use crate::response::ResponseKind;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct Filters(HashMap<Tag, SharedFilter>);

    impl FilterLookup for Filters {
        fn filter(&self, tag: Tag) -> Option<SharedFilter> {
            self.0.get(&tag).cloned()
        }
    }

    #[test]
    fn resolves_known_tags() {
        let filters = Filters(HashMap::from([(7, Arc::new(Identity) as SharedFilter)]));
        let mut tags = KindMap::<Option<Tag>>::default();
        tags[ResponseKind::Force] = Some(7);
        let table = resolve_filters(&tags, &filters).unwrap();
        assert!(table[ResponseKind::Force].is_some());
        assert!(table[ResponseKind::Displacement].is_none());
    }

    #[test]
    fn missing_filter_tag_is_not_found() {
        let filters = Filters(HashMap::new());
        let mut tags = KindMap::<Option<Tag>>::default();
        tags[ResponseKind::Displacement] = Some(4);
        let err = resolve_filters(&tags, &filters).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::NotFound {
                namespace: Namespace::Filters,
                tag: 4
            }
        ));
    }

    #[test]
    fn parse_config_reports_family() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Cfg {
            port: u16,
        }
        let value: toml::Value = toml::from_str("port = \"x\"").unwrap();
        let err = parse_config::<Cfg>("Demo", value).unwrap_err();
        assert!(err.to_string().contains("Demo"));
    }
}
