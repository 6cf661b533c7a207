use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::domain::dataset::{Dataset, DatasetSummary};
use crate::domain::error::{AppError, Result};

/// Datasets currently loaded in the application and the one being viewed.
#[derive(Debug, Default)]
pub struct Workspace {
    state: RwLock<WorkspaceState>,
}

#[derive(Debug, Default)]
struct WorkspaceState {
    datasets: BTreeMap<String, Arc<Dataset>>,
    active: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceListing {
    pub datasets: Vec<DatasetSummary>,
    pub active: Option<String>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any dataset with the same name and makes it active.
    pub fn install_upload(&self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        let mut state = self.write();
        state.active = Some(dataset.name.clone());
        state
            .datasets
            .insert(dataset.name.clone(), Arc::clone(&dataset));
        dataset
    }

    /// Installs datasets read back from the store; `active` is applied when
    /// given.
    pub fn install_recovered(&self, datasets: BTreeMap<String, Dataset>, active: Option<String>) {
        let mut state = self.write();
        for (name, dataset) in datasets {
            state.datasets.insert(name, Arc::new(dataset));
        }
        if active.is_some() {
            state.active = active;
        }
    }

    pub fn activate(&self, name: &str) -> Result<()> {
        let mut state = self.write();
        if !state.datasets.contains_key(name) {
            return Err(AppError::NotFound(format!("Dataset {} is not loaded", name)));
        }
        state.active = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Dataset>> {
        self.read().datasets.get(name).cloned()
    }

    pub fn active(&self) -> Option<String> {
        self.read().active.clone()
    }

    pub fn listing(&self) -> WorkspaceListing {
        let state = self.read();
        WorkspaceListing {
            datasets: state.datasets.values().map(|d| d.summary()).collect(),
            active: state.active.clone(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, WorkspaceState> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorkspaceState> {
        self.state.write().unwrap_or_else(|p| p.into_inner())
    }
}
