//! Reconciliation of a scanned asset against its server record.
//!
//! A [`ReconciliationEntry`] pairs the record as fetched at scan time
//! (`existing`, never mutated) with a working copy (`pending`) that the
//! user edits. The entry decides whether the two differ and builds the
//! sparse [`AssetChangeSet`] that is sent to the server.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::asset::{AssetRecord, AssetStatus};
use crate::equipment;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Processing status
// ---------------------------------------------------------------------------

/// Per-asset state within an opname session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Scanned, not yet confirmed.
    #[default]
    Pending,
    /// Confirmed unchanged.
    AllGood,
    /// Confirmed with changes.
    Edited,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AllGood => "all_good",
            Self::Edited => "edited",
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tracked fields
// ---------------------------------------------------------------------------

/// The fields compared between `existing` and `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Status,
    SerialNumber,
    StatusReason,
    Condition,
    ConditionNotes,
    ConditionPhoto,
    Location,
    Room,
    Equipments,
    Owner,
    OwnerPosition,
    OwnerCostCenter,
    OwnerDepartment,
    OwnerDivision,
    SiteId,
    SubSiteId,
}

impl TrackedField {
    pub const ALL: [TrackedField; 16] = [
        Self::Status,
        Self::SerialNumber,
        Self::StatusReason,
        Self::Condition,
        Self::ConditionNotes,
        Self::ConditionPhoto,
        Self::Location,
        Self::Room,
        Self::Equipments,
        Self::Owner,
        Self::OwnerPosition,
        Self::OwnerCostCenter,
        Self::OwnerDepartment,
        Self::OwnerDivision,
        Self::SiteId,
        Self::SubSiteId,
    ];

    /// Human-readable label for previews and error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Status => "Status",
            Self::SerialNumber => "Serial Number",
            Self::StatusReason => "Status Reason",
            Self::Condition => "Condition",
            Self::ConditionNotes => "Condition Notes",
            Self::ConditionPhoto => "Condition Photo",
            Self::Location => "Location",
            Self::Room => "Room",
            Self::Equipments => "Equipments",
            Self::Owner => "Owner",
            Self::OwnerPosition => "Owner Position",
            Self::OwnerCostCenter => "Owner Cost Center",
            Self::OwnerDepartment => "Owner Department",
            Self::OwnerDivision => "Owner Division",
            Self::SiteId => "Site",
            Self::SubSiteId => "Sub-site",
        }
    }

    /// Whether this field differs between the two records.
    ///
    /// Equipment strings compare by their normalized form.
    pub fn differs(self, existing: &AssetRecord, pending: &AssetRecord) -> bool {
        let (e, p) = (existing, pending);
        match self {
            Self::Status => e.asset_status != p.asset_status,
            Self::SerialNumber => e.serial_number != p.serial_number,
            Self::StatusReason => e.status_reason != p.status_reason,
            Self::Condition => e.condition != p.condition,
            Self::ConditionNotes => e.condition_notes != p.condition_notes,
            Self::ConditionPhoto => e.condition_photo != p.condition_photo,
            Self::Location => e.location != p.location,
            Self::Room => e.room != p.room,
            Self::Equipments => !equipment::equipments_equal(&e.equipments, &p.equipments),
            Self::Owner => e.owner.id != p.owner.id,
            Self::OwnerPosition => e.owner.position != p.owner.position,
            Self::OwnerCostCenter => e.owner.cost_center != p.owner.cost_center,
            Self::OwnerDepartment => e.owner.department != p.owner.department,
            Self::OwnerDivision => e.owner.division != p.owner.division,
            Self::SiteId => e.site_id != p.site_id,
            Self::SubSiteId => e.sub_site_id != p.sub_site_id,
        }
    }

    /// Display value of this field on a record.
    pub fn display_value(self, record: &AssetRecord) -> String {
        fn text_or_dash(s: &str) -> String {
            if s.trim().is_empty() {
                "-".to_string()
            } else {
                s.to_string()
            }
        }
        fn id_or_dash(id: Option<DbId>) -> String {
            id.map_or_else(|| "-".to_string(), |id| id.to_string())
        }

        match self {
            Self::Status => record.asset_status.to_string(),
            Self::SerialNumber => text_or_dash(&record.serial_number),
            Self::StatusReason => text_or_dash(&record.status_reason),
            Self::Condition => (if record.condition { "Good" } else { "Bad" }).to_string(),
            Self::ConditionNotes => text_or_dash(&record.condition_notes),
            Self::ConditionPhoto => text_or_dash(record.condition_photo.as_deref().unwrap_or("")),
            Self::Location => text_or_dash(&record.location),
            Self::Room => text_or_dash(&record.room),
            Self::Equipments => text_or_dash(&equipment::normalize_equipments(&record.equipments)),
            Self::Owner if record.owner.is_assigned() => {
                format!("{} ({})", record.owner.name, record.owner.id)
            }
            Self::Owner => "-".to_string(),
            Self::OwnerPosition => text_or_dash(&record.owner.position),
            Self::OwnerCostCenter => text_or_dash(&record.owner.cost_center),
            Self::OwnerDepartment => text_or_dash(&record.owner.department),
            Self::OwnerDivision => text_or_dash(&record.owner.division),
            Self::SiteId => id_or_dash(record.site_id),
            Self::SubSiteId => id_or_dash(record.sub_site_id),
        }
    }
}

/// One row of the side-by-side preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldComparison {
    pub field: TrackedField,
    pub label: &'static str,
    pub existing: String,
    pub pending: String,
    pub changed: bool,
}

// ---------------------------------------------------------------------------
// Change-set
// ---------------------------------------------------------------------------

/// Why a change-set could not be built. Each message is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangeSetError {
    #[error("No changes to submit")]
    NoChanges,

    #[error("Please provide a reason for the change")]
    MissingReason,

    #[error("Please select a valid asset owner")]
    InvalidOwner,

    #[error("Please select the owner's site")]
    InvalidSite,

    #[error("Please fix the following fields: {}", .0.join(", "))]
    FieldErrors(Vec<String>),
}

/// Sparse set of field changes for one asset.
///
/// Only fields whose `new_*` value is present are sent; absent fields are
/// unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetChangeSet {
    pub asset_tag: String,
    pub processing_status: ProcessingStatus,
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
    /// An empty string clears the photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_condition_photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_equipments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_owner: Option<DbId>,
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

impl AssetChangeSet {
    /// Empty change-set for `asset_tag`.
    pub fn new(
        asset_tag: impl Into<String>,
        processing_status: ProcessingStatus,
        change_reason: impl Into<String>,
    ) -> Self {
        Self {
            asset_tag: asset_tag.into(),
            processing_status,
            change_reason: change_reason.into(),
            ..Default::default()
        }
    }

    /// Copy `field` from `source` into this change-set.
    pub fn set_from(&mut self, field: TrackedField, source: &AssetRecord) {
        match field {
            TrackedField::Status => self.new_status = Some(source.asset_status),
            TrackedField::SerialNumber => self.new_serial_number = Some(source.serial_number.clone()),
            TrackedField::StatusReason => self.new_status_reason = Some(source.status_reason.clone()),
            TrackedField::Condition => self.new_condition = Some(source.condition),
            TrackedField::ConditionNotes => {
                self.new_condition_notes = Some(source.condition_notes.clone())
            }
            TrackedField::ConditionPhoto => {
                self.new_condition_photo = Some(source.condition_photo.clone().unwrap_or_default())
            }
            TrackedField::Location => self.new_location = Some(source.location.clone()),
            TrackedField::Room => self.new_room = Some(source.room.clone()),
            TrackedField::Equipments => self.new_equipments = Some(source.equipments.clone()),
            TrackedField::Owner => self.new_owner = Some(source.owner.id),
            TrackedField::OwnerPosition => {
                self.new_owner_position = Some(source.owner.position.clone())
            }
            TrackedField::OwnerCostCenter => {
                self.new_owner_cost_center = Some(source.owner.cost_center.clone())
            }
            TrackedField::OwnerDepartment => {
                self.new_owner_department = Some(source.owner.department.clone())
            }
            TrackedField::OwnerDivision => {
                self.new_owner_division = Some(source.owner.division.clone())
            }
            // A cleared id cannot be expressed in the sparse format.
            TrackedField::SiteId => self.new_site_id = source.site_id,
            TrackedField::SubSiteId => self.new_sub_site_id = source.sub_site_id,
        }
    }

    /// Fields present in this change-set, in [`TrackedField::ALL`] order.
    pub fn fields(&self) -> Vec<TrackedField> {
        TrackedField::ALL
            .into_iter()
            .filter(|f| self.contains(*f))
            .collect()
    }

    /// Whether `field` carries a new value.
    pub fn contains(&self, field: TrackedField) -> bool {
        match field {
            TrackedField::Status => self.new_status.is_some(),
            TrackedField::SerialNumber => self.new_serial_number.is_some(),
            TrackedField::StatusReason => self.new_status_reason.is_some(),
            TrackedField::Condition => self.new_condition.is_some(),
            TrackedField::ConditionNotes => self.new_condition_notes.is_some(),
            TrackedField::ConditionPhoto => self.new_condition_photo.is_some(),
            TrackedField::Location => self.new_location.is_some(),
            TrackedField::Room => self.new_room.is_some(),
            TrackedField::Equipments => self.new_equipments.is_some(),
            TrackedField::Owner => self.new_owner.is_some(),
            TrackedField::OwnerPosition => self.new_owner_position.is_some(),
            TrackedField::OwnerCostCenter => self.new_owner_cost_center.is_some(),
            TrackedField::OwnerDepartment => self.new_owner_department.is_some(),
            TrackedField::OwnerDivision => self.new_owner_division.is_some(),
            TrackedField::SiteId => self.new_site_id.is_some(),
            TrackedField::SubSiteId => self.new_sub_site_id.is_some(),
        }
    }

    /// Write every present value onto `record`.
    pub fn apply_to(&self, record: &mut AssetRecord) {
        if let Some(v) = self.new_status {
            record.asset_status = v;
        }
        if let Some(v) = &self.new_serial_number {
            record.serial_number = v.clone();
        }
        if let Some(v) = &self.new_status_reason {
            record.status_reason = v.clone();
        }
        if let Some(v) = self.new_condition {
            record.condition = v;
        }
        if let Some(v) = &self.new_condition_notes {
            record.condition_notes = v.clone();
        }
        if let Some(v) = &self.new_condition_photo {
            record.condition_photo = (!v.is_empty()).then(|| v.clone());
        }
        if let Some(v) = &self.new_location {
            record.location = v.clone();
        }
        if let Some(v) = &self.new_room {
            record.room = v.clone();
        }
        if let Some(v) = &self.new_equipments {
            record.equipments = v.clone();
        }
        if let Some(v) = self.new_owner {
            record.owner.id = v;
        }
        if let Some(v) = &self.new_owner_position {
            record.owner.position = v.clone();
        }
        if let Some(v) = &self.new_owner_cost_center {
            record.owner.cost_center = v.clone();
        }
        if let Some(v) = &self.new_owner_department {
            record.owner.department = v.clone();
        }
        if let Some(v) = &self.new_owner_division {
            record.owner.division = v.clone();
        }
        if let Some(v) = self.new_site_id {
            record.site_id = Some(v);
        }
        if let Some(v) = self.new_sub_site_id {
            record.sub_site_id = Some(v);
        }
    }
}

/// Reason attached to an all-good confirmation.
pub fn all_good_reason(session_started_at: Timestamp) -> String {
    format!(
        "No changes found during stock opname started {}",
        session_started_at.format("%d %B %Y")
    )
}

// ---------------------------------------------------------------------------
// Reconciliation entry
// ---------------------------------------------------------------------------

/// One scanned asset within a session.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationEntry {
    existing: AssetRecord,
    /// Working copy; form inputs write here directly.
    pub pending: AssetRecord,
    pub processing_status: ProcessingStatus,
    pub change_reason: String,
    /// Serial typed into the adaptor field, used when toggling the adaptor on.
    pub adaptor_serial: String,
    /// Valid equipment names for the asset's product variety.
    pub available_equipments: Vec<String>,
    /// Set once the server-side session holds a record for this asset.
    pub asset_processed: bool,
    /// Outstanding field-level validation errors.
    pub field_errors: BTreeMap<TrackedField, String>,
}

impl ReconciliationEntry {
    pub fn new(record: AssetRecord) -> Self {
        let adaptor_serial = equipment::adaptor_serial(&record.equipments).unwrap_or_default();
        Self {
            pending: record.clone(),
            existing: record,
            processing_status: ProcessingStatus::Pending,
            change_reason: String::new(),
            adaptor_serial,
            available_equipments: Vec::new(),
            asset_processed: false,
            field_errors: BTreeMap::new(),
        }
    }

    /// Rebuild an entry from progress saved in the server-side session.
    ///
    /// `changes` is re-applied onto `pending` so a previously submitted
    /// edit shows up as a difference again.
    pub fn restore(
        record: AssetRecord,
        processing_status: ProcessingStatus,
        change_reason: String,
        changes: Option<&AssetChangeSet>,
    ) -> Self {
        let mut entry = Self::new(record);
        if let Some(changes) = changes {
            changes.apply_to(&mut entry.pending);
        }
        entry.processing_status = processing_status;
        entry.change_reason = change_reason;
        entry.asset_processed = processing_status != ProcessingStatus::Pending;
        entry
    }

    pub fn with_available_equipments(mut self, names: Vec<String>) -> Self {
        self.available_equipments = names;
        self
    }

    /// The record as fetched at scan time.
    pub fn existing(&self) -> &AssetRecord {
        &self.existing
    }

    pub fn asset_tag(&self) -> &str {
        &self.existing.asset_tag
    }

    /// Tracked fields whose pending value differs from existing.
    pub fn changed_fields(&self) -> Vec<TrackedField> {
        TrackedField::ALL
            .into_iter()
            .filter(|f| f.differs(&self.existing, &self.pending))
            .collect()
    }

    /// Whether any tracked field differs, without side effects.
    pub fn differs(&self) -> bool {
        TrackedField::ALL
            .into_iter()
            .any(|f| f.differs(&self.existing, &self.pending))
    }

    /// Whether any tracked field differs.
    ///
    /// When nothing differs any previously entered change reason is
    /// cleared, so a reverted edit does not keep a stale justification.
    pub fn has_changes(&mut self) -> bool {
        let changed = self.differs();
        if !changed && !self.change_reason.is_empty() {
            self.change_reason.clear();
        }
        changed
    }

    pub fn has_equipment(&self, name: &str) -> bool {
        equipment::has_equipment(&self.pending.equipments, name)
    }

    pub fn toggle_equipment(&mut self, name: &str) {
        self.pending.equipments =
            equipment::toggle_equipment(&self.pending.equipments, name, &self.adaptor_serial);
    }

    /// Side-by-side comparison of every tracked field.
    pub fn field_comparison(&self) -> Vec<FieldComparison> {
        TrackedField::ALL
            .into_iter()
            .map(|field| FieldComparison {
                field,
                label: field.label(),
                existing: field.display_value(&self.existing),
                pending: field.display_value(&self.pending),
                changed: field.differs(&self.existing, &self.pending),
            })
            .collect()
    }

    /// Build the change-set for an edited asset.
    ///
    /// Checks, in order: something changed, a reason was given, the owner
    /// is set, the site is set, and no field errors remain.
    pub fn build_change_set(&self) -> Result<AssetChangeSet, ChangeSetError> {
        let changed = self.changed_fields();
        if changed.is_empty() {
            return Err(ChangeSetError::NoChanges);
        }
        if self.change_reason.trim().is_empty() {
            return Err(ChangeSetError::MissingReason);
        }
        if !self.pending.owner.is_assigned() {
            return Err(ChangeSetError::InvalidOwner);
        }
        if self.pending.site_id.is_none() {
            return Err(ChangeSetError::InvalidSite);
        }
        if !self.field_errors.is_empty() {
            return Err(ChangeSetError::FieldErrors(
                self.field_errors.keys().map(|f| f.label().to_string()).collect(),
            ));
        }

        let mut set = AssetChangeSet::new(
            self.asset_tag(),
            ProcessingStatus::Edited,
            self.change_reason.trim(),
        );
        for field in changed {
            set.set_from(field, &self.pending);
        }
        Ok(set)
    }

    /// Change-set confirming the asset as unchanged.
    ///
    /// Every tracked field is copied from `existing`, so applying it is a
    /// no-op on the server record.
    pub fn all_good_change_set(&self, session_started_at: Timestamp) -> AssetChangeSet {
        let mut set = AssetChangeSet::new(
            self.asset_tag(),
            ProcessingStatus::AllGood,
            all_good_reason(session_started_at),
        );
        for field in TrackedField::ALL {
            set.set_from(field, &self.existing);
        }
        set
    }

    /// Record a successful all-good confirmation.
    pub fn complete_all_good(&mut self) {
        self.revert();
        self.processing_status = ProcessingStatus::AllGood;
        self.asset_processed = true;
    }

    /// Record a successfully submitted edit.
    pub fn complete_edit(&mut self) {
        self.processing_status = ProcessingStatus::Edited;
        self.asset_processed = true;
    }

    /// Discard every pending edit.
    pub fn revert(&mut self) {
        self.pending = self.existing.clone();
        self.change_reason.clear();
        self.field_errors.clear();
        self.adaptor_serial = equipment::adaptor_serial(&self.existing.equipments).unwrap_or_default();
    }
}
