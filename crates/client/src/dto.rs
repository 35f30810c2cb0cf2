//! Wire types of the remote opname API.
//!
//! The API speaks snake_case JSON with its own field names. Each resource
//! has exactly one DTO here and one conversion into (or out of) the domain
//! type, so no call site maps fields by hand.

use opname_core::asset::{AssetOwner, AssetRecord, AssetStatus};
use opname_core::directory::{Site, SubSite, User};
use opname_core::reconciliation::{AssetChangeSet, ProcessingStatus};
use opname_core::session::{LocationKind, OpnameSession, ReviewSlot, SessionStatus};
use opname_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AssetDto {
    pub asset_tag: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    pub status: AssetStatus,
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Missing condition means the asset was never inspected; treat as good.
    #[serde(default)]
    pub condition: Option<bool>,
    #[serde(default)]
    pub condition_notes: Option<String>,
    #[serde(default)]
    pub condition_photo: Option<String>,
    #[serde(default)]
    pub sub_site_id: Option<DbId>,
    #[serde(default)]
    pub sub_site_name: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub site_id: Option<DbId>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<DbId>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub owner_position: Option<String>,
    #[serde(default)]
    pub owner_cost_center: Option<String>,
    #[serde(default)]
    pub owner_department: Option<String>,
    #[serde(default)]
    pub owner_division: Option<String>,
    #[serde(default)]
    pub equipments: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_category: Option<String>,
    #[serde(default)]
    pub product_variety: Option<String>,
}

impl From<AssetDto> for AssetRecord {
    fn from(dto: AssetDto) -> Self {
        Self {
            asset_tag: dto.asset_tag,
            serial_number: dto.serial_number.unwrap_or_default(),
            asset_status: dto.status,
            status_reason: dto.status_reason.unwrap_or_default(),
            condition: dto.condition.unwrap_or(true),
            condition_notes: dto.condition_notes.unwrap_or_default(),
            condition_photo: dto.condition_photo.filter(|p| !p.is_empty()),
            location: dto.sub_site_name.unwrap_or_default(),
            room: dto.room.unwrap_or_default(),
            sub_site_id: dto.sub_site_id,
            site_id: dto.site_id,
            site_name: dto.site_name.unwrap_or_default(),
            region_name: dto.region_name.unwrap_or_default(),
            owner: AssetOwner {
                id: dto.owner_id.unwrap_or(opname_core::asset::UNASSIGNED_OWNER),
                name: dto.owner_name.unwrap_or_default(),
                position: dto.owner_position.unwrap_or_default(),
                cost_center: dto.owner_cost_center.unwrap_or_default(),
                department: dto.owner_department.unwrap_or_default(),
                division: dto.owner_division.unwrap_or_default(),
            },
            equipments: dto.equipments.unwrap_or_default(),
            product_name: dto.product_name.unwrap_or_default(),
            product_category: dto.product_category.unwrap_or_default(),
            product_variety: dto.product_variety.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EquipmentDto {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoUploadResponse {
    /// Server-side reference stored in the asset's `condition_photo`.
    pub path: String,
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct UserDto {
    pub id: DbId,
    pub name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub cost_center: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub site_id: Option<DbId>,
}

impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            position: dto.position.unwrap_or_default(),
            cost_center: dto.cost_center.unwrap_or_default(),
            department: dto.department.unwrap_or_default(),
            division: dto.division.unwrap_or_default(),
            site_id: dto.site_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteDto {
    pub id: DbId,
    pub name: String,
    #[serde(default)]
    pub region_name: Option<String>,
}

impl From<SiteDto> for Site {
    fn from(dto: SiteDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            region_name: dto.region_name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubSiteDto {
    pub id: DbId,
    pub site_id: DbId,
    pub name: String,
}

impl From<SubSiteDto> for SubSite {
    fn from(dto: SubSiteDto) -> Self {
        Self {
            id: dto.id,
            site_id: dto.site_id,
            name: dto.name,
        }
    }
}

// ---------------------------------------------------------------------------
// Change-sets and saved progress
// ---------------------------------------------------------------------------

/// Change-set as submitted to, and returned by, the session endpoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeSetPayload {
    pub asset_tag: String,
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub change_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<AssetStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_condition: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_condition_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_condition_photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_sub_site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_equipments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_owner_id: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_owner_position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_owner_cost_center: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_owner_department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_owner_division: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_site_id: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_sub_site_id: Option<DbId>,
}

impl From<&AssetChangeSet> for ChangeSetPayload {
    fn from(set: &AssetChangeSet) -> Self {
        Self {
            asset_tag: set.asset_tag.clone(),
            processing_status: set.processing_status,
            change_reason: set.change_reason.clone(),
            new_status: set.new_status,
            new_serial_number: set.new_serial_number.clone(),
            new_status_reason: set.new_status_reason.clone(),
            new_condition: set.new_condition,
            new_condition_notes: set.new_condition_notes.clone(),
            new_condition_photo: set.new_condition_photo.clone(),
            new_sub_site_name: set.new_location.clone(),
            new_room: set.new_room.clone(),
            new_equipments: set.new_equipments.clone(),
            new_owner_id: set.new_owner,
            new_owner_position: set.new_owner_position.clone(),
            new_owner_cost_center: set.new_owner_cost_center.clone(),
            new_owner_department: set.new_owner_department.clone(),
            new_owner_division: set.new_owner_division.clone(),
            new_site_id: set.new_site_id,
            new_sub_site_id: set.new_sub_site_id,
        }
    }
}

impl From<ChangeSetPayload> for AssetChangeSet {
    fn from(p: ChangeSetPayload) -> Self {
        Self {
            asset_tag: p.asset_tag,
            processing_status: p.processing_status,
            change_reason: p.change_reason,
            new_status: p.new_status,
            new_serial_number: p.new_serial_number,
            new_status_reason: p.new_status_reason,
            new_condition: p.new_condition,
            new_condition_notes: p.new_condition_notes,
            new_condition_photo: p.new_condition_photo,
            new_location: p.new_sub_site_name,
            new_room: p.new_room,
            new_equipments: p.new_equipments,
            new_owner: p.new_owner_id,
            new_owner_position: p.new_owner_position,
            new_owner_cost_center: p.new_owner_cost_center,
            new_owner_department: p.new_owner_department,
            new_owner_division: p.new_owner_division,
            new_site_id: p.new_site_id,
            new_sub_site_id: p.new_sub_site_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SessionDto {
    pub id: DbId,
    pub status: SessionStatus,
    pub user_id: DbId,
    pub location_id: DbId,
    pub location_kind: LocationKind,
    pub started_at: Timestamp,
    #[serde(default)]
    pub first_reviewer_id: Option<DbId>,
    #[serde(default)]
    pub first_reviewed_at: Option<Timestamp>,
    #[serde(default)]
    pub manager_reviewer_id: Option<DbId>,
    #[serde(default)]
    pub manager_reviewed_at: Option<Timestamp>,
}

impl From<SessionDto> for OpnameSession {
    fn from(dto: SessionDto) -> Self {
        Self {
            id: dto.id,
            status: dto.status,
            user_id: dto.user_id,
            location_id: dto.location_id,
            location_kind: dto.location_kind,
            started_at: dto.started_at,
            first_review: ReviewSlot {
                reviewer_id: dto.first_reviewer_id,
                reviewed_at: dto.first_reviewed_at,
            },
            manager_review: ReviewSlot {
                reviewer_id: dto.manager_reviewer_id,
                reviewed_at: dto.manager_reviewed_at,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartSessionRequest {
    pub user_id: DbId,
    pub location_id: DbId,
    pub location_kind: LocationKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewRequest<'a> {
    pub reviewer_id: DbId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn asset_dto_maps_to_record() {
        let dto: AssetDto = serde_json::from_value(json!({
            "asset_tag": "IT-0042",
            "serial_number": "5CG1234XYZ",
            "status": "On Loan",
            "condition": false,
            "condition_notes": "Scratched lid",
            "condition_photo": "",
            "sub_site_name": "Tower A",
            "room": "12A",
            "sub_site_id": 3,
            "site_id": 1,
            "owner_id": 17,
            "owner_name": "Dewi",
            "owner_department": "Finance",
            "equipments": "Mouse, Adaptor (s/n: abc)",
            "product_variety": "Laptop"
        }))
        .unwrap();

        let record = AssetRecord::from(dto);
        assert_eq!(record.asset_status, AssetStatus::OnLoan);
        assert!(!record.condition);
        assert_eq!(record.condition_photo, None);
        assert_eq!(record.location, "Tower A");
        assert_eq!(record.owner.id, 17);
        assert_eq!(record.owner.department, "Finance");
        assert_eq!(record.product_variety, "Laptop");
        assert_eq!(record.status_reason, "");
    }

    #[test]
    fn missing_owner_maps_to_unassigned() {
        let dto: AssetDto = serde_json::from_value(json!({
            "asset_tag": "IT-1",
            "status": "In Inventory"
        }))
        .unwrap();
        let record = AssetRecord::from(dto);
        assert!(!record.owner.is_assigned());
        assert!(record.condition);
    }

    #[test]
    fn change_set_payload_uses_snake_case_and_omits_unchanged() {
        let mut set = AssetChangeSet::new("IT-1", ProcessingStatus::Edited, "Moved");
        set.new_location = Some("Tower B".into());
        set.new_owner = Some(21);

        let json = serde_json::to_value(ChangeSetPayload::from(&set)).unwrap();
        assert_eq!(
            json,
            json!({
                "asset_tag": "IT-1",
                "processing_status": "edited",
                "change_reason": "Moved",
                "new_sub_site_name": "Tower B",
                "new_owner_id": 21
            })
        );
    }

    #[test]
    fn progress_payload_converts_back_to_change_set() {
        let payload: ChangeSetPayload = serde_json::from_value(json!({
            "asset_tag": "IT-2",
            "processing_status": "all_good",
            "change_reason": "ok",
            "new_room": "3"
        }))
        .unwrap();
        let set = AssetChangeSet::from(payload);
        assert_eq!(set.processing_status, ProcessingStatus::AllGood);
        assert_eq!(set.new_room.as_deref(), Some("3"));
        assert!(set.new_status.is_none());
    }

    #[test]
    fn session_dto_maps_review_slots() {
        let dto: SessionDto = serde_json::from_value(json!({
            "id": 9,
            "status": "escalated",
            "user_id": 1,
            "location_id": 4,
            "location_kind": "department",
            "started_at": "2024-03-05T08:00:00Z",
            "first_reviewer_id": 2,
            "first_reviewed_at": "2024-03-06T10:00:00Z"
        }))
        .unwrap();
        let session = OpnameSession::from(dto);
        assert_eq!(session.status, SessionStatus::Escalated);
        assert_eq!(session.location_kind, LocationKind::Department);
        assert_eq!(session.first_review.reviewer_id, Some(2));
        assert!(!session.manager_review.is_filled());
    }

    #[test]
    fn review_request_omits_missing_reason() {
        let json = serde_json::to_value(ReviewRequest {
            reviewer_id: 3,
            reason: None,
        })
        .unwrap();
        assert_eq!(json, json!({ "reviewer_id": 3 }));
    }
}
