//! Static component registry
//!
//! Maps component names to the route and readiness selector used when
//! capturing them. Populated once from configuration at startup.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::Viewport;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$").expect("component name pattern"));

/// A registry entry as written in `figdiff.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    pub name: String,

    /// Route override; defaults to `/component/{name}`
    #[serde(default)]
    pub route: Option<String>,

    /// Readiness selector override
    #[serde(default)]
    pub selector: Option<String>,

    #[serde(default)]
    pub viewport: Option<Viewport>,
}

/// A component resolved for capture
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedComponent {
    pub name: String,
    pub route: String,
    pub selector: Option<String>,
    pub viewport: Option<Viewport>,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    entries: BTreeMap<String, ComponentEntry>,
}

impl ComponentRegistry {
    pub fn from_entries(entries: &[ComponentEntry]) -> Result<Self> {
        let mut map = BTreeMap::new();
        for entry in entries {
            validate_name(&entry.name)?;
            if let Some(route) = &entry.route {
                if !route.starts_with('/') {
                    return Err(Error::Config(format!(
                        "route of component '{}' must start with '/'",
                        entry.name
                    )));
                }
            }
            if map.insert(entry.name.clone(), entry.clone()).is_some() {
                return Err(Error::Config(format!("component '{}' registered twice", entry.name)));
            }
        }
        Ok(Self { entries: map })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolve a component by name.
    ///
    /// An empty registry accepts any well-formed name with the default route.
    pub fn resolve(&self, name: &str) -> Result<ResolvedComponent> {
        validate_name(name)?;
        if self.entries.is_empty() {
            return Ok(ResolvedComponent {
                name: name.to_string(),
                route: default_route(name),
                selector: None,
                viewport: None,
            });
        }
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::UnknownComponent(name.to_string()))?;
        Ok(ResolvedComponent {
            name: entry.name.clone(),
            route: entry.route.clone().unwrap_or_else(|| default_route(name)),
            selector: entry.selector.clone(),
            viewport: entry.viewport,
        })
    }
}

pub fn default_route(name: &str) -> String {
    format!("/component/{}", name)
}

/// Component names end up in URLs and directory names
pub fn validate_name(name: &str) -> Result<()> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "invalid component name {:?}: use letters, digits, '-' and '_'",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> ComponentEntry {
        ComponentEntry {
            name: name.to_string(),
            route: None,
            selector: None,
            viewport: None,
        }
    }

    #[test]
    fn test_empty_registry_resolves_default_route() {
        let registry = ComponentRegistry::default();
        let resolved = registry.resolve("PrimaryButton").unwrap();
        assert_eq!(resolved.route, "/component/PrimaryButton");
        assert!(resolved.selector.is_none());
    }

    #[test]
    fn test_strict_registry() {
        let mut card = entry("Card");
        card.route = Some("/preview/card".to_string());
        card.selector = Some("#card".to_string());
        let registry = ComponentRegistry::from_entries(&[entry("Button"), card]).unwrap();

        assert_eq!(registry.resolve("Button").unwrap().route, "/component/Button");
        let resolved = registry.resolve("Card").unwrap();
        assert_eq!(resolved.route, "/preview/card");
        assert_eq!(resolved.selector.as_deref(), Some("#card"));
        assert!(matches!(registry.resolve("Modal"), Err(Error::UnknownComponent(_))));
    }

    #[test]
    fn test_rejects_bad_names() {
        let registry = ComponentRegistry::default();
        for name in ["", "../etc", "a b", "name/child", "-leading"] {
            assert!(matches!(registry.resolve(name), Err(Error::Validation(_))), "{name}");
        }
    }

    #[test]
    fn test_rejects_duplicates() {
        let result = ComponentRegistry::from_entries(&[entry("Button"), entry("Button")]);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
