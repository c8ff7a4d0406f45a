use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{OutdatedPackage, Package, PackageId, PackageRecord},
    error::ServiceError,
    settings::AppSettings,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub mod bus;
mod controller;
pub mod error;
pub mod export;
mod handle;
mod store;
pub mod view;

pub use bus::NotificationBus;
pub use controller::{ControllerEvent, ControllerSnapshot};
pub use error::ControllerError;
pub use handle::ControllerHandle;
pub use store::PackageStore;
pub use view::{FilterCriteria, ListViewMode, SortColumn, SortSpec};

/// Package the host application itself ships as; an available update for it is
/// announced once after the first load.
pub const DEFAULT_BOOTSTRAP_PACKAGE_ID: &str = "pkgdeck";

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub bootstrap_package_id: String,
    pub command_queue_capacity: usize,
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bootstrap_package_id: DEFAULT_BOOTSTRAP_PACKAGE_ID.into(),
            command_queue_capacity: 256,
            event_capacity: 1024,
        }
    }
}

/// Scope of an outdated-set lookup. The default value asks about every installed package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutdatedQuery {
    pub include_prerelease: bool,
    pub id: Option<PackageId>,
}

impl OutdatedQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_package(package: &Package) -> Self {
        Self {
            include_prerelease: package.is_prerelease,
            id: Some(package.id.clone()),
        }
    }
}

#[async_trait]
pub trait PackageService: Send + Sync {
    async fn installed_packages(&self) -> Result<Vec<PackageRecord>, ServiceError>;
    async fn outdated_packages(
        &self,
        query: OutdatedQuery,
    ) -> Result<Vec<OutdatedPackage>, ServiceError>;
    async fn update_package(&self, id: &PackageId) -> Result<(), ServiceError>;
}

/// Progress scope owner. `report` takes a completion fraction in `0.0..=1.0`.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn start_loading(&self, title: &str, cancellable: bool) -> Result<()>;
    async fn write_message(&self, text: &str);
    fn cancellation_token(&self) -> CancellationToken;
    async fn report(&self, fraction: f64);
    async fn stop_loading(&self) -> Result<()>;
    async fn show_message(&self, title: &str, body: &str) -> Result<()>;
}

pub trait SettingsProvider: Send + Sync {
    fn settings(&self) -> AppSettings;
    fn subscribe(&self) -> broadcast::Receiver<AppSettings>;
}

/// Progress reporter that swallows everything. Its token is never cancelled.
#[derive(Default)]
pub struct SilentProgress {
    token: CancellationToken,
}

#[async_trait]
impl ProgressReporter for SilentProgress {
    async fn start_loading(&self, _title: &str, _cancellable: bool) -> Result<()> {
        Ok(())
    }

    async fn write_message(&self, _text: &str) {}

    fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    async fn report(&self, _fraction: f64) {}

    async fn stop_loading(&self) -> Result<()> {
        Ok(())
    }

    async fn show_message(&self, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

/// Settings that never change after construction unless pushed through [`StaticSettings::replace`].
pub struct StaticSettings {
    current: std::sync::Mutex<AppSettings>,
    changes: broadcast::Sender<AppSettings>,
}

impl StaticSettings {
    pub fn new(settings: AppSettings) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            current: std::sync::Mutex::new(settings),
            changes,
        }
    }

    pub fn replace(&self, settings: AppSettings) {
        if let Ok(mut current) = self.current.lock() {
            *current = settings.clone();
        }
        let _ = self.changes.send(settings);
    }
}

impl SettingsProvider for StaticSettings {
    fn settings(&self) -> AppSettings {
        self.current
            .lock()
            .map(|settings| settings.clone())
            .unwrap_or_default()
    }

    fn subscribe(&self) -> broadcast::Receiver<AppSettings> {
        self.changes.subscribe()
    }
}
