//! Asset record model as seen by the opname client.
//!
//! An [`AssetRecord`] is always fetched from the remote inventory system;
//! the client never creates one. Field names follow the domain, not the
//! wire format; the snake_case mapping lives in `opname-client`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Owner id used by the remote system for "no owner assigned".
pub const UNASSIGNED_OWNER: DbId = 0;

// ---------------------------------------------------------------------------
// Asset status
// ---------------------------------------------------------------------------

/// Lifecycle status of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssetStatus {
    #[default]
    Deployed,
    #[serde(rename = "On Loan")]
    OnLoan,
    #[serde(rename = "In Inventory")]
    InInventory,
    #[serde(rename = "In Repair")]
    InRepair,
    Down,
    Disposed,
}

impl AssetStatus {
    /// Every status, in the order pickers present them.
    pub const ALL: [AssetStatus; 6] = [
        Self::Deployed,
        Self::OnLoan,
        Self::InInventory,
        Self::InRepair,
        Self::Down,
        Self::Disposed,
    ];

    /// Label used by the remote system and shown to users.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployed => "Deployed",
            Self::OnLoan => "On Loan",
            Self::InInventory => "In Inventory",
            Self::InRepair => "In Repair",
            Self::Down => "Down",
            Self::Disposed => "Disposed",
        }
    }

    /// Parse a status label. Matching ignores ASCII case and surrounding
    /// whitespace.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid asset status '{value}'. Must be one of: {}",
                    Self::ALL.map(|s| s.as_str()).join(", ")
                ))
            })
    }

    /// Statuses that take the asset out of normal service and therefore
    /// need a stated reason.
    pub fn requires_reason(&self) -> bool {
        matches!(self, Self::InRepair | Self::Down | Self::Disposed)
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Ownership block of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetOwner {
    /// Owner user id; [`UNASSIGNED_OWNER`] when nobody holds the asset.
    pub id: DbId,
    pub name: String,
    pub position: String,
    pub cost_center: String,
    pub department: String,
    pub division: String,
}

impl AssetOwner {
    pub fn is_assigned(&self) -> bool {
        self.id != UNASSIGNED_OWNER
    }
}

/// One asset as known to the inventory system.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub asset_tag: String,
    pub serial_number: String,
    pub asset_status: AssetStatus,
    /// Empty when no reason is recorded.
    #[serde(default)]
    pub status_reason: String,
    /// `true` when the asset is in good condition.
    pub condition: bool,
    #[serde(default)]
    pub condition_notes: String,
    /// Server-side reference of the uploaded condition photo.
    #[serde(default)]
    pub condition_photo: Option<String>,
    /// Sub-site name the asset sits in.
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub room: String,
    pub sub_site_id: Option<DbId>,
    /// Site of the owner; required before a change can be submitted.
    pub site_id: Option<DbId>,
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub region_name: String,
    pub owner: AssetOwner,
    /// Comma-joined equipment list, see [`crate::equipment`].
    #[serde(default)]
    pub equipments: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_category: String,
    /// Key for the equipment catalog lookup.
    #[serde(default)]
    pub product_variety: String,
}

impl AssetRecord {
    /// Whether `query` identifies this asset by tag or serial number.
    ///
    /// Asset tags and serial numbers are compared ignoring ASCII case and
    /// surrounding whitespace, as scanners and manual entry disagree on case.
    pub fn matches_identifier(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }
        self.asset_tag.trim().eq_ignore_ascii_case(query)
            || (!self.serial_number.trim().is_empty()
                && self.serial_number.trim().eq_ignore_ascii_case(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_labels_round_trip_through_parse() {
        for status in AssetStatus::ALL {
            assert_eq!(AssetStatus::parse(status.as_str()).unwrap(), status);
        }
        assert_eq!(AssetStatus::parse(" on loan ").unwrap(), AssetStatus::OnLoan);
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert_matches!(AssetStatus::parse("Lost"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn status_serializes_to_display_label() {
        let json = serde_json::to_string(&AssetStatus::InInventory).unwrap();
        assert_eq!(json, "\"In Inventory\"");
        let parsed: AssetStatus = serde_json::from_str("\"In Repair\"").unwrap();
        assert_eq!(parsed, AssetStatus::InRepair);
    }

    #[test]
    fn out_of_service_statuses_require_reason() {
        assert!(AssetStatus::Disposed.requires_reason());
        assert!(AssetStatus::Down.requires_reason());
        assert!(!AssetStatus::Deployed.requires_reason());
        assert!(!AssetStatus::OnLoan.requires_reason());
    }

    #[test]
    fn identifier_match_covers_tag_and_serial() {
        let record = AssetRecord {
            asset_tag: "IT-0001".into(),
            serial_number: "SN123".into(),
            ..Default::default()
        };
        assert!(record.matches_identifier("it-0001"));
        assert!(record.matches_identifier(" sn123 "));
        assert!(!record.matches_identifier("IT-0002"));
        assert!(!record.matches_identifier(""));
    }

    #[test]
    fn empty_serial_never_matches() {
        let record = AssetRecord {
            asset_tag: "IT-0001".into(),
            ..Default::default()
        };
        assert!(!record.matches_identifier("   "));
    }

    #[test]
    fn owner_zero_is_unassigned() {
        assert!(!AssetOwner::default().is_assigned());
        let owner = AssetOwner {
            id: 7,
            ..Default::default()
        };
        assert!(owner.is_assigned());
    }
}
