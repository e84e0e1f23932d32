//! The locally cached catalog of selectable model ids.
//!
//! `load` never fails: problems are reported alongside an empty
//! catalog so the caller can render a placeholder. `refresh` is the
//! out-of-band tool that rewrites the cache from the provider.
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;

use crate::openai::list_models;
use crate::openai::models::ModelList;

pub const NO_MODELS_PLACEHOLDER: &str = "No models available";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Models file not found. Please run `ragchat refresh-models` first.")]
    Missing,

    #[error("Error reading models file. Please check the file format: {0}")]
    Format(String),

    #[error("Error reading models file: {0}")]
    Unreadable(String),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogLoad {
    pub models: Vec<String>,
    #[serde(serialize_with = "serialize_problem")]
    pub problem: Option<CatalogError>,
}

fn serialize_problem<S>(problem: &Option<CatalogError>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match problem {
        Some(p) => s.serialize_some(&p.to_string()),
        None => s.serialize_none(),
    }
}

impl CatalogLoad {
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// Entries to show in a model selector, falling back to a single
    /// disabled placeholder.
    pub fn choices(&self) -> Vec<&str> {
        if self.models.is_empty() {
            vec![NO_MODELS_PLACEHOLDER]
        } else {
            self.models.iter().map(String::as_str).collect()
        }
    }

    /// Whether `model` can be selected. Without a catalog there is
    /// nothing to check against so any explicit choice is accepted.
    pub fn accepts(&self, model: &str) -> bool {
        self.models.is_empty() || self.contains(model)
    }

    /// Picks the preferred model when it is accepted, otherwise the
    /// first entry of the catalog.
    pub fn select(&self, preferred: Option<&str>) -> Option<String> {
        match preferred {
            Some(m) if self.accepts(m) => Some(m.to_string()),
            _ => self.models.first().cloned(),
        }
    }
}

pub fn load(path: impl AsRef<Path>) -> CatalogLoad {
    let path = path.as_ref();
    let result = fs::read_to_string(path)
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => CatalogError::Missing,
            _ => CatalogError::Unreadable(e.to_string()),
        })
        .and_then(|contents| {
            serde_json::from_str::<ModelList>(&contents)
                .map_err(|e| CatalogError::Format(e.to_string()))
        });

    match result {
        Ok(list) => {
            tracing::debug!("Loaded {} models from {}", list.data.len(), path.display());
            CatalogLoad {
                models: list.ids(),
                problem: None,
            }
        }
        Err(problem) => {
            tracing::warn!("Model catalog {} unavailable: {}", path.display(), problem);
            CatalogLoad {
                models: Vec::new(),
                problem: Some(problem),
            }
        }
    }
}

/// Fetches the model listing and overwrites the cache file with the
/// response body. Returns the number of models found. The cache is
/// left untouched when the fetch fails.
pub async fn refresh(
    api_hostname: &str,
    api_key: &str,
    path: impl AsRef<Path>,
    timeout: Duration,
) -> Result<usize> {
    let path = path.as_ref();
    let listing = list_models(api_hostname, api_key, timeout).await?;

    tokio::fs::write(path, listing.body.as_bytes())
        .await
        .with_context(|| format!("Failed to write models file {}", path.display()))?;

    tracing::info!("Saved {} models to {}", listing.models.len(), path.display());
    Ok(listing.models.len())
}
