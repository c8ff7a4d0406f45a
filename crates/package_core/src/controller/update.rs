use shared::domain::{Package, PackageId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::PackageController;
use crate::{error::ControllerError, view::ListViewMode};

const BULK_UPDATE_TITLE: &str = "Updating all packages";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BulkUpdateOutcome {
    Completed { updated: usize },
    Cancelled { updated: usize },
}

impl PackageController {
    /// Updates every updatable, unpinned package, whether or not the filter
    /// currently shows it, in the order the view lists them. Cancellation is
    /// checked before each package; packages already updated stay updated.
    pub(crate) async fn update_all(&mut self) -> Result<(), ControllerError> {
        let outcome = {
            let Some(_guard) = self.loading.try_acquire() else {
                debug!("bulk update requested while busy; ignoring");
                return Ok(());
            };
            self.run_bulk_update().await
        };

        match outcome {
            Ok(BulkUpdateOutcome::Completed { updated }) => {
                info!(updated, "bulk update finished; reloading packages");
                self.set_show_only_packages_with_update(false);
                self.load().await
            }
            Ok(BulkUpdateOutcome::Cancelled { updated }) => {
                info!(updated, "bulk update cancelled");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "bulk update failed");
                Err(err)
            }
        }
    }

    async fn run_bulk_update(&self) -> Result<BulkUpdateOutcome, ControllerError> {
        self.progress
            .start_loading(BULK_UPDATE_TITLE, true)
            .await
            .map_err(ControllerError::Progress)?;
        let token = self.progress.cancellation_token();

        let result = self.update_candidates(&token).await;

        if let Err(err) = self.progress.stop_loading().await {
            if result.is_ok() {
                return Err(ControllerError::Progress(err));
            }
            warn!(error = %err, "failed to close progress after bulk update error");
        }
        result
    }

    async fn update_candidates(
        &self,
        token: &CancellationToken,
    ) -> Result<BulkUpdateOutcome, ControllerError> {
        let mut candidates: Vec<&Package> = self
            .store
            .iter()
            .filter(|pkg| pkg.is_update_candidate())
            .collect();
        if let (Some(sort), ListViewMode::Standard) = (self.sort.as_ref(), self.list_view_mode) {
            candidates.sort_by(|a, b| sort.compare(a, b));
        }
        let targets: Vec<(PackageId, String)> = candidates
            .into_iter()
            .map(|pkg| (pkg.id.clone(), pkg.display_name().to_string()))
            .collect();
        let total = targets.len();

        for (completed, (id, name)) in targets.iter().enumerate() {
            if token.is_cancelled() {
                return Ok(BulkUpdateOutcome::Cancelled { updated: completed });
            }

            let fraction = (completed as f64 / total as f64).min(1.0);
            self.progress.report(fraction).await;
            self.progress.write_message(&format!("Updating {name}")).await;
            debug!(package = %id, completed, total, "updating package");
            self.service.update_package(id).await?;
        }

        Ok(BulkUpdateOutcome::Completed { updated: total })
    }
}
