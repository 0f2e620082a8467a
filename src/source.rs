//! Data sources the engines read from.
//!
//! The engines never write. A source hands over a snapshot of the entities in
//! scope; its own failures are passed back to the caller unchanged.

use crate::error::SourceError;
use crate::model::{PathDataMaster, ProductInstanceIteration, Revision};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub trait RevisionSource {
    /// Every revision of the workspace, with iterations and attributes.
    fn revisions(&self, workspace_id: &str) -> Result<Vec<Revision>, SourceError>;
}

pub trait PathDataSource {
    /// The path-data masters with the given ids. Unknown ids are skipped.
    fn path_data(&self, ids: &[i64]) -> Result<Vec<PathDataMaster>, SourceError>;
}

/// A dataset held in memory, loadable from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InMemorySource {
    #[serde(default)]
    pub revisions: Vec<Revision>,
    #[serde(default)]
    pub path_data: Vec<PathDataMaster>,
    #[serde(default)]
    pub product_instances: Vec<ProductInstanceIteration>,
}

impl InMemorySource {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// The latest iteration of the product instance with `serial_number`.
    pub fn product_instance(&self, serial_number: &str) -> Option<&ProductInstanceIteration> {
        self.product_instances
            .iter()
            .filter(|pi| pi.serial_number == serial_number)
            .max_by_key(|pi| pi.iteration)
    }
}

impl RevisionSource for InMemorySource {
    fn revisions(&self, workspace_id: &str) -> Result<Vec<Revision>, SourceError> {
        Ok(self
            .revisions
            .iter()
            .filter(|r| r.master.workspace_id == workspace_id)
            .cloned()
            .collect())
    }
}

impl PathDataSource for InMemorySource {
    fn path_data(&self, ids: &[i64]) -> Result<Vec<PathDataMaster>, SourceError> {
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        Ok(self
            .path_data
            .iter()
            .filter(|pd| wanted.contains(&pd.id))
            .cloned()
            .collect())
    }
}
