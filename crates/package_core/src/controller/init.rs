use std::sync::Arc;

use futures::StreamExt;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};

use super::PackageController;
use crate::{error::ControllerError, handle::ControllerCommand, view::ListViewMode};

impl PackageController {
    /// One-time startup: view mode from settings, live settings watch, first
    /// load, then the controller's own change reactions.
    pub(crate) async fn initialize(&mut self) -> Result<(), ControllerError> {
        if self.has_loaded {
            debug!("controller already initialized");
            return Ok(());
        }

        let settings = self.settings.settings();
        self.set_list_view_mode(ListViewMode::from_settings(&settings));
        self.watch_settings();

        let loaded = self.load().await;

        // the view must track the criteria even when the first load failed
        self.reactions.filter = true;
        self.reactions.view_mode = true;
        loaded?;

        self.has_loaded = true;
        info!(installed = self.store.len(), "package controller initialized");

        self.announce_bootstrap_update();
        Ok(())
    }

    fn watch_settings(&mut self) {
        if self.settings_watch.is_some() {
            return;
        }

        let provider = Arc::clone(&self.settings);
        let mut changes = BroadcastStream::new(provider.subscribe());
        let commands = self.commands.clone();
        self.settings_watch = Some(tokio::spawn(async move {
            while let Some(item) = changes.next().await {
                let settings = match item {
                    Ok(settings) => settings,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "settings watcher lagged; using current settings");
                        provider.settings()
                    }
                };
                let Some(commands) = commands.upgrade() else {
                    break;
                };
                if commands
                    .send(ControllerCommand::SettingsChanged(settings))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));
    }

    /// Tells the user once when the host's own package has an update. Runs
    /// detached; failures are logged and dropped.
    fn announce_bootstrap_update(&self) {
        let Some(package) = self
            .store
            .iter()
            .find(|pkg| pkg.id.matches(&self.config.bootstrap_package_id) && pkg.can_update())
        else {
            return;
        };

        let name = package.display_name().to_string();
        let latest = package
            .latest_version
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let title = format!("{name} update available");
        let body = format!("Version {latest} of {name} is available. Update it to get the latest fixes.");
        let progress = Arc::clone(&self.progress);

        tokio::spawn(async move {
            if let Err(err) = progress.show_message(&title, &body).await {
                debug!(error = %err, "bootstrap update notice failed");
            }
        });
    }
}
