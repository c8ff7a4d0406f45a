use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use package_core::{
    ControllerConfig, ControllerHandle, ListViewMode, NotificationBus, OutdatedQuery,
    PackageService, SilentProgress, StaticSettings,
};
use shared::{
    domain::{OutdatedPackage, PackageId, PackageRecord, PackageVersion},
    error::ServiceError,
    protocol::{PackageChangeType, PackageChanged},
    settings::AppSettings,
};
use tokio::sync::Mutex;

/// In-memory package manager where updating a package moves it to its latest version.
struct Catalog {
    installed: Mutex<Vec<(PackageRecord, Option<&'static str>)>>,
}

impl Catalog {
    fn new(entries: Vec<(&str, &str, Option<&'static str>)>) -> Self {
        let installed = entries
            .into_iter()
            .map(|(id, version, latest)| {
                (
                    PackageRecord {
                        id: PackageId::new(id),
                        title: None,
                        version: version.parse().expect("version"),
                        is_pinned: false,
                        is_prerelease: false,
                    },
                    latest,
                )
            })
            .collect();
        Self {
            installed: Mutex::new(installed),
        }
    }
}

#[async_trait]
impl PackageService for Catalog {
    async fn installed_packages(&self) -> Result<Vec<PackageRecord>, ServiceError> {
        Ok(self
            .installed
            .lock()
            .await
            .iter()
            .map(|(record, _)| record.clone())
            .collect())
    }

    async fn outdated_packages(
        &self,
        query: OutdatedQuery,
    ) -> Result<Vec<OutdatedPackage>, ServiceError> {
        let installed = self.installed.lock().await;
        let mut outdated = Vec::new();
        for (record, latest) in installed.iter() {
            let Some(latest) = latest else { continue };
            if query.id.as_ref().is_some_and(|id| id != &record.id) {
                continue;
            }
            let latest: PackageVersion = latest.parse().map_err(anyhow::Error::from)?;
            if record.version < latest {
                outdated.push(OutdatedPackage {
                    id: record.id.clone(),
                    latest_version: latest,
                });
            }
        }
        Ok(outdated)
    }

    async fn update_package(&self, id: &PackageId) -> Result<(), ServiceError> {
        let mut installed = self.installed.lock().await;
        let entry = installed
            .iter_mut()
            .find(|(record, _)| &record.id == id)
            .ok_or_else(|| ServiceError::Failed(anyhow::anyhow!("{id} is not installed")))?;
        if let Some(latest) = entry.1 {
            entry.0.version = latest.parse().map_err(anyhow::Error::from)?;
        }
        Ok(())
    }
}

fn start(catalog: &Arc<Catalog>) -> ControllerHandle {
    start_with(catalog, ControllerConfig::default())
}

fn start_with(catalog: &Arc<Catalog>, config: ControllerConfig) -> ControllerHandle {
    ControllerHandle::spawn(
        catalog.clone(),
        Arc::new(SilentProgress::default()),
        Arc::new(StaticSettings::new(AppSettings::default())),
        NotificationBus::default(),
        config,
    )
}

#[tokio::test]
async fn outdated_package_is_updated_and_reloaded() {
    let catalog = Arc::new(Catalog::new(vec![("git", "2.1", Some("2.2"))]));
    let handle = start(&catalog);

    handle.initialize().await.expect("initialize");
    let snapshot = handle.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.list_view_mode, ListViewMode::Standard);
    assert_eq!(snapshot.view.len(), 1);
    let git = &snapshot.view[0];
    assert_eq!(git.version.to_string(), "2.1");
    assert_eq!(
        git.latest_version.as_ref().map(ToString::to_string).as_deref(),
        Some("2.2")
    );
    assert!(git.can_update());

    handle
        .set_show_only_packages_with_update(true)
        .await
        .expect("filter");
    handle.update_all().await.expect("update all");

    let snapshot = handle.snapshot().await.expect("snapshot");
    assert!(!snapshot.is_loading);
    assert!(!snapshot.criteria.show_only_packages_with_update);
    let git = &snapshot.packages[0];
    assert_eq!(git.version.to_string(), "2.2");
    assert!(git.latest_version.is_none());
    assert!(!git.can_update());
}

#[tokio::test]
async fn host_change_notifications_keep_the_list_in_sync() {
    let catalog = Arc::new(Catalog::new(vec![
        ("git", "2.1", Some("2.2")),
        ("nodejs", "20.1.0", None),
    ]));
    let handle = start(&catalog);
    handle.initialize().await.expect("initialize");

    handle
        .apply_change(PackageChanged::new("nodejs", PackageChangeType::Uninstalled))
        .await
        .expect("uninstall");
    handle
        .apply_change(PackageChanged::new("git", PackageChangeType::Pinned))
        .await
        .expect("pin");
    handle
        .set_show_only_packages_with_update(true)
        .await
        .expect("filter");

    let snapshot = handle.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.packages.len(), 1);
    assert!(snapshot.packages[0].is_pinned);
    assert!(snapshot.view.is_empty());

    let xml = handle.export_xml().await.expect("export");
    assert!(xml.contains(r#"<package id="git" version="2.1"/>"#));
    assert!(!xml.contains("nodejs"));
}

#[tokio::test]
async fn late_update_notices_do_not_resurrect_updated_packages() {
    for (count, queue) in [(400, ControllerConfig::default().command_queue_capacity), (64, 1)] {
        let names: Vec<String> = (0..count).map(|i| format!("pkg{i}")).collect();
        let catalog = Arc::new(Catalog::new(
            names
                .iter()
                .map(|name| (name.as_str(), "1.0", Some("2.0")))
                .collect(),
        ));
        let handle = start_with(
            &catalog,
            ControllerConfig {
                command_queue_capacity: queue,
                ..ControllerConfig::default()
            },
        );

        handle.initialize().await.expect("initialize");
        handle.update_all().await.expect("update all");

        // give the bus forwarder time to hand back every notice from the first load
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let snapshot = handle.snapshot().await.expect("snapshot");
            assert_eq!(snapshot.packages.len(), count);
            let stale: Vec<String> = snapshot
                .packages
                .iter()
                .filter(|pkg| pkg.can_update())
                .map(|pkg| format!("{} v{}", pkg.id, pkg.version))
                .collect();
            assert!(stale.is_empty(), "{} of {count} still updatable: {stale:?}", stale.len());
            assert!(snapshot.packages.iter().all(|pkg| pkg.version.to_string() == "2.0"));
        }
    }
}
