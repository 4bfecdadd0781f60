//! Worker backends the Distribute stage hands to each dispatched job.

use std::path::PathBuf;

use layercast_worker::{
    ArtifactStore, FsRegionConnector, LocalArtifactStore, MockState, RegionConnector,
};

use crate::config::Settings;

/// Builds fresh worker backends for one dispatched job.
///
/// Called once per action, on the thread running it.
pub trait WorkerBackends: Sync {
    fn artifact_store(&self) -> Box<dyn ArtifactStore>;

    fn region_connector(&self) -> Box<dyn RegionConnector>;
}

/// The on-disk artifact store and regional registry.
#[derive(Debug, Clone)]
pub struct OnDiskBackends {
    pub artifact_root: PathBuf,
    pub registry_root: PathBuf,
    pub account_id: String,
}

impl OnDiskBackends {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            artifact_root: settings.artifact.store_root.clone(),
            registry_root: settings.registry.root.clone(),
            account_id: settings.registry.account_id.clone(),
        }
    }
}

impl WorkerBackends for OnDiskBackends {
    fn artifact_store(&self) -> Box<dyn ArtifactStore> {
        Box::new(LocalArtifactStore::new(&self.artifact_root))
    }

    fn region_connector(&self) -> Box<dyn RegionConnector> {
        Box::new(FsRegionConnector::new(&self.registry_root).with_account_id(&self.account_id))
    }
}

/// Every job sees the same mock services, so tests can inspect them.
impl WorkerBackends for MockState {
    fn artifact_store(&self) -> Box<dyn ArtifactStore> {
        Box::new(self.clone())
    }

    fn region_connector(&self) -> Box<dyn RegionConnector> {
        Box::new(self.clone())
    }
}
