use chrono::Utc;
use shared::domain::Package;
use tracing::{debug, error, info, warn};

use super::PackageController;
use crate::{error::ControllerError, OutdatedQuery};

impl PackageController {
    /// Repopulates the store from the package service. A no-op while another
    /// load or bulk update holds the loading flag.
    pub(crate) async fn load(&mut self) -> Result<(), ControllerError> {
        let Some(_guard) = self.loading.try_acquire() else {
            debug!("package load requested while busy; ignoring");
            return Ok(());
        };

        let result = self.populate().await;
        self.recompute_view();

        match result {
            Ok(()) => {
                self.last_refreshed = Some(Utc::now());
                info!(
                    installed = self.store.len(),
                    visible = self.view.len(),
                    "loaded installed packages"
                );
                Ok(())
            }
            Err(err) if err.is_recoverable() => {
                warn!(
                    error = %err,
                    installed = self.store.len(),
                    "package service disconnected during load; keeping partial state"
                );
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to load installed packages");
                Err(err)
            }
        }
    }

    async fn populate(&mut self) -> Result<(), ControllerError> {
        self.store.clear();
        self.view.clear();

        let records = self.service.installed_packages().await?;
        for record in records {
            let package = Package::from(record);
            let id = package.id.clone();
            if !self.store.add(package) {
                warn!(package = %id, "package service reported a duplicate id; keeping the first");
            }
        }
        self.first_load_incomplete = false;

        let outdated = self.service.outdated_packages(OutdatedQuery::all()).await?;
        debug!(outdated = outdated.len(), "fetched outdated packages");
        self.publish_update_notices(outdated);
        Ok(())
    }
}
