use shared::{
    domain::PackageId,
    protocol::{PackageChangeType, PackageChanged},
};
use tracing::{debug, error};

use super::PackageController;
use crate::{error::ControllerError, OutdatedQuery};

impl PackageController {
    /// Applies a single-package change without a full reload where the change
    /// kind allows it; anything else falls back to a reload.
    pub(crate) async fn apply_change(
        &mut self,
        change: &PackageChanged,
    ) -> Result<(), ControllerError> {
        debug!(package = %change.id, change = ?change.change_type, "applying package change");

        let result = match change.change_type {
            PackageChangeType::Pinned => {
                self.on_pinned(&change.id);
                Ok(())
            }
            PackageChangeType::Unpinned => self.on_unpinned(&change.id).await,
            PackageChangeType::Uninstalled => self.on_uninstalled(&change.id),
            PackageChangeType::Installed
            | PackageChangeType::Updated
            | PackageChangeType::Other => self.load().await,
        };

        if let Err(ControllerError::UnknownPackage(id)) = &result {
            error!(package = %id, change = ?change.change_type, "change notification for package not in store");
        }
        result
    }

    fn on_pinned(&mut self, id: &PackageId) {
        if let Some(package) = self.store.find_mut(id) {
            package.is_pinned = true;
        }
        self.recompute_view();
    }

    async fn on_unpinned(&mut self, id: &PackageId) -> Result<(), ControllerError> {
        let query = {
            let package = self
                .store
                .find_mut(id)
                .ok_or_else(|| ControllerError::UnknownPackage(id.clone()))?;
            package.is_pinned = false;
            (!package.can_update()).then(|| OutdatedQuery::for_package(package))
        };

        if let Some(query) = query {
            let outdated = self.service.outdated_packages(query).await?;
            self.publish_update_notices(outdated);
        }
        self.recompute_view();
        Ok(())
    }

    fn on_uninstalled(&mut self, id: &PackageId) -> Result<(), ControllerError> {
        self.store
            .remove(id)
            .ok_or_else(|| ControllerError::UnknownPackage(id.clone()))?;
        self.recompute_view();
        Ok(())
    }
}
