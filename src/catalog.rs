//! # Catalog Module
//!
//! Versioned catalog data: which platforms and categories the bot offers,
//! which panel service ids belong to each category, and the minimum order
//! quantity per service. Loaded once at startup, either from the copy embedded
//! in the binary or from a JSON file.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::commerce::ServiceId;
use crate::dialogue::ButtonAction;

/// Telegram rejects inline buttons whose callback data exceeds this many bytes
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

fn check_button(action: ButtonAction) -> Result<(), CatalogError> {
    let data = action.data();
    if data.len() > MAX_CALLBACK_DATA_LEN {
        return Err(CatalogError::Invalid(format!(
            "button data '{data}' is longer than {MAX_CALLBACK_DATA_LEN} bytes"
        )));
    }
    Ok(())
}

/// Catalog shipped with the binary
pub const EMBEDDED_CATALOG: &str = include_str!("../config/catalog.json");

/// Errors raised while loading or validating a catalog
#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io(e) => write!(f, "Failed to read catalog: {e}"),
            CatalogError::Parse(e) => write!(f, "Failed to parse catalog: {e}"),
            CatalogError::Invalid(msg) => write!(f, "Invalid catalog: {msg}"),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io(e) => Some(e),
            CatalogError::Parse(e) => Some(e),
            CatalogError::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub label: String,
    /// Panel service ids offered in this category, in display order
    pub services: Vec<ServiceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    pub label: String,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub version: u32,
    /// Minimum used for services missing from `minimums`
    pub default_minimum: u64,
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub minimums: HashMap<ServiceId, u64>,
}

impl Catalog {
    /// Parse and validate a catalog from JSON text
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(text).map_err(CatalogError::Parse)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load the catalog from `path`, or the embedded copy when `path` is `None`
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(CatalogError::Io)?;
                Self::from_json(&text)
            }
            None => Self::from_json(EMBEDDED_CATALOG),
        }
    }

    /// Check the structural invariants the flow controller relies on
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.default_minimum == 0 {
            return Err(CatalogError::Invalid("default_minimum must be at least 1".into()));
        }
        if let Some((id, _)) = self.minimums.iter().find(|(_, min)| **min == 0) {
            return Err(CatalogError::Invalid(format!("minimum for service {id} must be at least 1")));
        }
        if self.platforms.is_empty() {
            return Err(CatalogError::Invalid("no platforms defined".into()));
        }

        let mut platform_ids = HashSet::new();
        for platform in &self.platforms {
            if !platform_ids.insert(platform.id.as_str()) {
                return Err(CatalogError::Invalid(format!("duplicate platform '{}'", platform.id)));
            }
            check_button(ButtonAction::Platform(platform.id.clone()))?;
            if platform.categories.is_empty() {
                return Err(CatalogError::Invalid(format!("platform '{}' has no categories", platform.id)));
            }
            let mut category_ids = HashSet::new();
            for category in &platform.categories {
                if !category_ids.insert(category.id.as_str()) {
                    return Err(CatalogError::Invalid(format!(
                        "duplicate category '{}' on platform '{}'",
                        category.id, platform.id
                    )));
                }
                check_button(ButtonAction::Category(category.id.clone()))?;
                if category.services.is_empty() {
                    return Err(CatalogError::Invalid(format!(
                        "category '{}' on platform '{}' has no services",
                        category.id, platform.id
                    )));
                }
                let mut service_ids = HashSet::new();
                if let Some(id) = category.services.iter().find(|id| !service_ids.insert(**id)) {
                    return Err(CatalogError::Invalid(format!(
                        "service {id} listed twice in category '{}' on platform '{}'",
                        category.id, platform.id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn platform(&self, id: &str) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.id == id)
    }

    pub fn category(&self, platform: &str, category: &str) -> Option<&Category> {
        self.platform(platform)?
            .categories
            .iter()
            .find(|c| c.id == category)
    }

    /// Minimum order quantity for a service. Always at least 1.
    pub fn minimum_for(&self, service: ServiceId) -> u64 {
        self.minimums
            .get(&service)
            .copied()
            .unwrap_or(self.default_minimum)
            .max(1)
    }
}
