//! Locator tables: named locators for one page.
//!
//! A table only stores queries. Nothing is looked up when it is built; each
//! wait or read re-issues the query against whatever the page shows then.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::locator::Locator;
use crate::result::{EsperarError, EsperarResult};

/// Named locators plus the page URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorTable {
    #[serde(default)]
    url: String,
    #[serde(default)]
    locators: BTreeMap<String, Locator>,
}

impl LocatorTable {
    /// Start a builder
    #[must_use]
    pub fn builder() -> LocatorTableBuilder {
        LocatorTableBuilder::default()
    }

    /// Parse a table from YAML
    ///
    /// ```yaml
    /// url: https://www.demoblaze.com/
    /// locators:
    ///   next_button:
    ///     selector: { by: id, value: next2 }
    /// ```
    pub fn from_yaml_str(yaml: &str) -> EsperarResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Page URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Locator registered under `name`
    pub fn locator(&self, name: &str) -> EsperarResult<&Locator> {
        self.locators
            .get(name)
            .ok_or_else(|| EsperarError::UnknownLocator {
                name: name.to_string(),
            })
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.locators.keys().map(String::as_str).collect()
    }
}

/// Builder for [`LocatorTable`]
#[derive(Debug, Clone, Default)]
pub struct LocatorTableBuilder {
    table: LocatorTable,
}

impl LocatorTableBuilder {
    /// Set the page URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.table.url = url.into();
        self
    }

    /// Register a locator under a logical name
    #[must_use]
    pub fn with_locator(mut self, name: impl Into<String>, locator: Locator) -> Self {
        let _ = self.table.locators.insert(name.into(), locator);
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> LocatorTable {
        self.table
    }
}
