use serde::{Deserialize, Serialize};

use crate::domain::{PackageId, PackageVersion};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PackageChangeType {
    Pinned,
    Unpinned,
    Uninstalled,
    Installed,
    Updated,
    #[serde(other)]
    Other,
}

/// A single package changed outside of a full reload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageChanged {
    pub id: PackageId,
    pub change_type: PackageChangeType,
}

impl PackageChanged {
    pub fn new(id: impl Into<PackageId>, change_type: PackageChangeType) -> Self {
        Self {
            id: id.into(),
            change_type,
        }
    }
}

/// A newer version is known for an installed package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageHasUpdate {
    pub id: PackageId,
    pub latest_version: PackageVersion,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BusMessage {
    PackageChanged(PackageChanged),
    PackageHasUpdate(PackageHasUpdate),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_change_kinds_decode_as_other() {
        let raw = r#"{"type":"package_changed","payload":{"id":"git","change_type":"reinstalled"}}"#;
        let message: BusMessage = serde_json::from_str(raw).expect("decode");
        assert_eq!(
            message,
            BusMessage::PackageChanged(PackageChanged::new("git", PackageChangeType::Other))
        );
    }

    #[test]
    fn update_notice_carries_version_as_string() {
        let message = BusMessage::PackageHasUpdate(PackageHasUpdate {
            id: PackageId::new("git"),
            latest_version: "2.2".parse().expect("version"),
        });
        let encoded = serde_json::to_value(&message).expect("encode");
        assert_eq!(encoded["payload"]["latest_version"], "2.2");
    }
}
