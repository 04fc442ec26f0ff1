//! Flow catalog and flow file loading
//!
//! The catalog holds an immutable map of flow definitions behind a lock.
//! Reloading builds and validates a complete new map first, then swaps the
//! `Arc` in one step, so readers see either the old set or the new one.

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use contact_center_config::load_document;
use contact_center_core::FlowDefinition;

use super::builtin::builtin_flows;
use crate::ScenarioError;

type FlowMap = HashMap<String, Arc<FlowDefinition>>;

/// Flow file format
#[derive(Debug, Serialize, Deserialize)]
pub struct FlowFile {
    #[serde(default)]
    pub version: Option<String>,
    pub flows: Vec<FlowDefinition>,
}

/// Reads flow definitions from YAML, TOML or JSON files
pub struct FlowLoader;

impl FlowLoader {
    pub fn load_file(path: &Path) -> Result<Vec<FlowDefinition>, ScenarioError> {
        let file: FlowFile = load_document(path)?;
        Ok(file.flows)
    }

    /// Load a file, or every flow file in a directory.
    ///
    /// Directory entries that fail to parse are logged and skipped.
    pub fn load_path(path: &Path) -> Result<Vec<FlowDefinition>, ScenarioError> {
        if !path.exists() {
            return Err(ScenarioError::Load(format!(
                "flow path {} does not exist",
                path.display()
            )));
        }
        if path.is_file() {
            return Self::load_file(path);
        }

        let mut files: Vec<_> = std::fs::read_dir(path)
            .map_err(|e| ScenarioError::Load(format!("Failed to read directory: {}", e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml" | "yml" | "toml" | "json")
                )
            })
            .collect();
        files.sort();

        let mut flows = Vec::new();
        for file in files {
            match Self::load_file(&file) {
                Ok(mut loaded) => {
                    tracing::info!(file = %file.display(), flows = loaded.len(), "Loaded flow file");
                    flows.append(&mut loaded);
                },
                Err(e) => {
                    tracing::error!(file = %file.display(), error = %e, "Failed to load flow file");
                },
            }
        }
        Ok(flows)
    }
}

/// Structural checks plus pattern compilation
fn check_flow(flow: &FlowDefinition) -> Result<(), ScenarioError> {
    flow.validate().map_err(ScenarioError::InvalidDefinition)?;
    for step in &flow.steps {
        if let Some(pattern) = &step.validation_rules.pattern {
            Regex::new(pattern).map_err(|e| {
                ScenarioError::InvalidDefinition(format!(
                    "flow {} step {} pattern: {}",
                    flow.flow_id, step.step_id, e
                ))
            })?;
        }
    }
    Ok(())
}

fn build_map(flows: Vec<FlowDefinition>) -> Result<FlowMap, ScenarioError> {
    let mut map = FlowMap::with_capacity(flows.len());
    for flow in flows {
        check_flow(&flow)?;
        map.insert(flow.flow_id.clone(), Arc::new(flow));
    }
    Ok(map)
}

/// Read-mostly set of flow definitions
pub struct FlowCatalog {
    flows: RwLock<Arc<FlowMap>>,
}

impl FlowCatalog {
    /// Catalog of validated flows; later definitions win on duplicate ids
    pub fn new(flows: Vec<FlowDefinition>) -> Result<Self, ScenarioError> {
        Ok(Self {
            flows: RwLock::new(Arc::new(build_map(flows)?)),
        })
    }

    pub fn with_builtins() -> Result<Self, ScenarioError> {
        Self::new(builtin_flows())
    }

    pub fn get(&self, flow_id: &str) -> Option<Arc<FlowDefinition>> {
        self.flows.read().get(flow_id).cloned()
    }

    pub fn contains(&self, flow_id: &str) -> bool {
        self.flows.read().contains_key(flow_id)
    }

    pub fn flow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.flows.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.flows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.read().is_empty()
    }

    /// Swap in a new set. Nothing changes when any definition is invalid.
    pub fn replace(&self, flows: Vec<FlowDefinition>) -> Result<usize, ScenarioError> {
        let map = build_map(flows)?;
        let count = map.len();
        *self.flows.write() = Arc::new(map);
        tracing::info!(flows = count, "Flow catalog replaced");
        Ok(count)
    }

    /// Built-in flows overlaid with the flows found at `path`
    pub fn reload_from(&self, path: &Path) -> Result<usize, ScenarioError> {
        let mut flows = builtin_flows();
        flows.extend(FlowLoader::load_path(path)?);
        self.replace(flows)
    }
}
