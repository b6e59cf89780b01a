use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::Catalog;

/// A dataset found in a catalog: its location and descriptive attributes (e.g. `experiment`,
/// `variable`, `member`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handle {
    pub location: String,
    pub attributes: BTreeMap<String, String>,
}

impl Handle {
    #[must_use]
    pub fn new(location: impl Into<String>) -> Handle {
        Handle {
            location: location.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Handle {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A condition on one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Equals(String),
    Contains(String),
    OneOf(Vec<String>),
}

impl Filter {
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Filter::Equals(v) => value == v,
            Filter::Contains(v) => value.contains(v.as_str()),
            Filter::OneOf(vs) => vs.iter().any(|v| v == value),
        }
    }
}

/// Conditions that must all hold. A handle without a filtered attribute does not match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    filters: BTreeMap<String, Filter>,
}

impl Criteria {
    #[must_use]
    pub fn new() -> Criteria {
        Criteria::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, filter: Filter) -> Criteria {
        self.filters.insert(key.into(), filter);
        self
    }

    #[must_use]
    pub fn equals(self, key: impl Into<String>, value: impl Into<String>) -> Criteria {
        self.with(key, Filter::Equals(value.into()))
    }

    #[must_use]
    pub fn contains(self, key: impl Into<String>, value: impl Into<String>) -> Criteria {
        self.with(key, Filter::Contains(value.into()))
    }

    #[must_use]
    pub fn one_of<I, S>(self, key: impl Into<String>, values: I) -> Criteria
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(key, Filter::OneOf(values.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn matches(&self, handle: &Handle) -> bool {
        self.filters
            .iter()
            .all(|(k, f)| handle.get(k).is_some_and(|v| f.matches(v)))
    }
}

/// A catalog of handles held in memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    handles: RwLock<Vec<Handle>>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new(handles: Vec<Handle>) -> MemoryCatalog {
        MemoryCatalog {
            handles: RwLock::new(handles),
        }
    }

    pub fn insert(&self, handle: Handle) {
        self.handles
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(handle);
    }
}

impl Catalog for MemoryCatalog {
    fn search(&self, criteria: &Criteria) -> anyhow::Result<Vec<Handle>> {
        let handles = self
            .handles
            .read()
            .map_err(|_| anyhow!("catalog lock poisoned"))?;

        Ok(handles
            .iter()
            .filter(|h| criteria.matches(h))
            .cloned()
            .collect())
    }
}
