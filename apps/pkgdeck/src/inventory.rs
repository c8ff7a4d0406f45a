//! JSON-file package inventory standing in for a real package manager.
//!
//! Each entry is an installed package plus, optionally, the newest version
//! the feed offers for it. Every mutation is written straight back to disk.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use package_core::{OutdatedQuery, PackageService};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{OutdatedPackage, PackageId, PackageRecord, PackageVersion},
    error::ServiceError,
    protocol::{PackageChangeType, PackageChanged},
};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEntry {
    #[serde(flatten)]
    pub record: PackageRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<PackageVersion>,
}

impl InventoryEntry {
    fn outdated(&self, include_prerelease: bool) -> Option<OutdatedPackage> {
        let available = self.available.as_ref()?;
        if available.is_prerelease() && !include_prerelease {
            return None;
        }
        (available > &self.record.version).then(|| OutdatedPackage {
            id: self.record.id.clone(),
            latest_version: available.clone(),
        })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    packages: Vec<InventoryEntry>,
}

pub struct Inventory {
    path: PathBuf,
    file: Mutex<InventoryFile>,
}

impl Inventory {
    /// Reads the inventory at `path`. A missing file is an empty inventory.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse inventory '{}'", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no inventory yet; starting empty");
                InventoryFile::default()
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read inventory '{}'", path.display()))
            }
        };

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn pin(&self, id: &PackageId) -> Result<PackageChanged> {
        self.set_pinned(id, true).await
    }

    pub async fn unpin(&self, id: &PackageId) -> Result<PackageChanged> {
        self.set_pinned(id, false).await
    }

    pub async fn uninstall(&self, id: &PackageId) -> Result<PackageChanged> {
        let mut file = self.file.lock().await;
        let index = file
            .packages
            .iter()
            .position(|entry| &entry.record.id == id)
            .ok_or_else(|| anyhow!("package '{id}' is not installed"))?;
        let removed = file.packages.remove(index);
        self.persist(&file).await?;

        info!(package = %removed.record.id, "package uninstalled");
        Ok(PackageChanged::new(
            removed.record.id,
            PackageChangeType::Uninstalled,
        ))
    }

    async fn set_pinned(&self, id: &PackageId, pinned: bool) -> Result<PackageChanged> {
        let mut file = self.file.lock().await;
        let entry = file
            .packages
            .iter_mut()
            .find(|entry| &entry.record.id == id)
            .ok_or_else(|| anyhow!("package '{id}' is not installed"))?;
        entry.record.is_pinned = pinned;
        let id = entry.record.id.clone();
        self.persist(&file).await?;

        let change_type = if pinned {
            PackageChangeType::Pinned
        } else {
            PackageChangeType::Unpinned
        };
        info!(package = %id, pinned, "pin state changed");
        Ok(PackageChanged::new(id, change_type))
    }

    async fn persist(&self, file: &InventoryFile) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create inventory directory '{}'", parent.display())
            })?;
        }
        let raw = serde_json::to_string_pretty(file)?;
        tokio::fs::write(&self.path, raw)
            .await
            .with_context(|| format!("failed to write inventory '{}'", self.path.display()))
    }
}

#[async_trait]
impl PackageService for Inventory {
    async fn installed_packages(&self) -> Result<Vec<PackageRecord>, ServiceError> {
        let file = self.file.lock().await;
        Ok(file
            .packages
            .iter()
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn outdated_packages(
        &self,
        query: OutdatedQuery,
    ) -> Result<Vec<OutdatedPackage>, ServiceError> {
        let file = self.file.lock().await;
        Ok(file
            .packages
            .iter()
            .filter(|entry| query.id.as_ref().map_or(true, |id| &entry.record.id == id))
            .filter_map(|entry| entry.outdated(query.include_prerelease))
            .collect())
    }

    async fn update_package(&self, id: &PackageId) -> Result<(), ServiceError> {
        let mut file = self.file.lock().await;
        let entry = file
            .packages
            .iter_mut()
            .find(|entry| &entry.record.id == id)
            .ok_or_else(|| anyhow!("package '{id}' is not installed"))?;
        let Some(available) = entry.available.take() else {
            debug!(package = %id, "nothing newer to install");
            return Ok(());
        };
        info!(package = %id, from = %entry.record.version, to = %available, "updating package");
        entry.record.is_prerelease = available.is_prerelease();
        entry.record.version = available;
        self.persist(&file).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "packages": [
            { "id": "git", "title": "Git", "version": "2.1", "available": "2.2" },
            { "id": "nodejs", "version": "20.1.0", "available": "21.0.0-rc.1" },
            { "id": "7zip", "version": "24.0", "is_pinned": true, "available": "24.1" },
            { "id": "jq", "version": "1.7" }
        ]
    }"#;

    async fn sample() -> (tempfile::TempDir, Inventory) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("inventory.json");
        tokio::fs::write(&path, SAMPLE).await.expect("seed");
        let inventory = Inventory::open(&path).await.expect("open");
        (dir, inventory)
    }

    fn ids(outdated: &[OutdatedPackage]) -> Vec<&str> {
        outdated.iter().map(|entry| entry.id.as_str()).collect()
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_inventory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let inventory = Inventory::open(dir.path().join("absent.json"))
            .await
            .expect("open");
        assert!(inventory.installed_packages().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn outdated_skips_prereleases_unless_asked() {
        let (_dir, inventory) = sample().await;

        let stable = inventory
            .outdated_packages(OutdatedQuery::all())
            .await
            .expect("outdated");
        assert_eq!(ids(&stable), ["git", "7zip"]);

        let scoped = inventory
            .outdated_packages(OutdatedQuery {
                include_prerelease: true,
                id: Some(PackageId::new("NodeJS")),
            })
            .await
            .expect("outdated");
        assert_eq!(ids(&scoped), ["nodejs"]);
    }

    #[tokio::test]
    async fn update_moves_to_available_version_and_persists() {
        let (_dir, inventory) = sample().await;

        inventory
            .update_package(&PackageId::new("git"))
            .await
            .expect("update");
        inventory
            .update_package(&PackageId::new("jq"))
            .await
            .expect("nothing to do");

        let reopened = Inventory::open(inventory.path()).await.expect("reopen");
        let installed = reopened.installed_packages().await.expect("list");
        assert_eq!(installed[0].version.to_string(), "2.2");
        assert_eq!(installed[3].version.to_string(), "1.7");
        let outdated = reopened
            .outdated_packages(OutdatedQuery::all())
            .await
            .expect("outdated");
        assert_eq!(ids(&outdated), ["7zip"]);
    }

    #[tokio::test]
    async fn host_actions_report_matching_changes() {
        let (_dir, inventory) = sample().await;

        let change = inventory.unpin(&PackageId::new("7zip")).await.expect("unpin");
        assert_eq!(change.change_type, PackageChangeType::Unpinned);
        let change = inventory.pin(&PackageId::new("git")).await.expect("pin");
        assert_eq!(change.change_type, PackageChangeType::Pinned);
        let change = inventory
            .uninstall(&PackageId::new("jq"))
            .await
            .expect("uninstall");
        assert_eq!(change.id, PackageId::new("jq"));
        assert_eq!(change.change_type, PackageChangeType::Uninstalled);

        let reopened = Inventory::open(inventory.path()).await.expect("reopen");
        let installed = reopened.installed_packages().await.expect("list");
        assert_eq!(installed.len(), 3);
        assert!(installed[0].is_pinned);
        assert!(!installed[2].is_pinned);

        let err = inventory
            .uninstall(&PackageId::new("jq"))
            .await
            .expect_err("already gone");
        assert!(err.to_string().contains("not installed"));
    }
}
