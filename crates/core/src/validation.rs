//! Field-level validation of the pending record.
//!
//! The reconciliation model itself accepts any edit. Front ends run these
//! checks as the user types and store the result on the entry, where
//! [`ReconciliationEntry::build_change_set`] refuses to proceed while any
//! error remains.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::reconciliation::{ReconciliationEntry, TrackedField};

/// Maximum length for a status reason.
pub const MAX_STATUS_REASON_LENGTH: usize = 500;

/// Maximum length for condition notes.
pub const MAX_CONDITION_NOTES_LENGTH: usize = 500;

/// Maximum length for a change reason.
pub const MAX_CHANGE_REASON_LENGTH: usize = 1_000;

fn check_length(
    errors: &mut BTreeMap<TrackedField, String>,
    field: TrackedField,
    value: &str,
    max: usize,
) {
    let len = value.chars().count();
    if len > max {
        errors.insert(
            field,
            format!("{} must be at most {max} characters (got {len})", field.label()),
        );
    }
}

/// Compute the field errors of an entry's pending record.
///
/// Rules tied to a field (a serial number when it is edited, a reason for
/// an out-of-service status, notes for a bad condition) only apply when
/// that field was changed, so legacy records do not block unrelated edits.
pub fn validate_entry(entry: &ReconciliationEntry) -> BTreeMap<TrackedField, String> {
    let existing = entry.existing();
    let pending = &entry.pending;
    let mut errors = BTreeMap::new();

    if TrackedField::SerialNumber.differs(existing, pending)
        && pending.serial_number.trim().is_empty()
    {
        errors.insert(
            TrackedField::SerialNumber,
            "Serial number is required".to_string(),
        );
    }

    if pending.asset_status.requires_reason()
        && TrackedField::Status.differs(existing, pending)
        && pending.status_reason.trim().is_empty()
    {
        errors.insert(
            TrackedField::StatusReason,
            format!("A reason is required for status '{}'", pending.asset_status),
        );
    }

    if !pending.condition
        && TrackedField::Condition.differs(existing, pending)
        && pending.condition_notes.trim().is_empty()
    {
        errors.insert(
            TrackedField::ConditionNotes,
            "Describe the problem when marking the condition as bad".to_string(),
        );
    }

    check_length(
        &mut errors,
        TrackedField::StatusReason,
        &pending.status_reason,
        MAX_STATUS_REASON_LENGTH,
    );
    check_length(
        &mut errors,
        TrackedField::ConditionNotes,
        &pending.condition_notes,
        MAX_CONDITION_NOTES_LENGTH,
    );

    errors
}

/// Recompute and store the entry's field errors. Returns whether it is clean.
pub fn refresh_field_errors(entry: &mut ReconciliationEntry) -> bool {
    entry.field_errors = validate_entry(entry);
    entry.field_errors.is_empty()
}

/// Validate a free-text change or review reason.
pub fn validate_reason(reason: &str) -> Result<(), CoreError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(CoreError::Validation("A reason is required".to_string()));
    }
    let len = reason.chars().count();
    if len > MAX_CHANGE_REASON_LENGTH {
        return Err(CoreError::Validation(format!(
            "Reason must be at most {MAX_CHANGE_REASON_LENGTH} characters (got {len})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetRecord, AssetStatus};
    use assert_matches::assert_matches;

    fn entry() -> ReconciliationEntry {
        ReconciliationEntry::new(AssetRecord {
            asset_tag: "IT-1".into(),
            serial_number: "SN1".into(),
            condition: true,
            ..Default::default()
        })
    }

    #[test]
    fn fresh_entry_is_valid() {
        assert!(validate_entry(&entry()).is_empty());
    }

    #[test]
    fn empty_serial_is_an_error() {
        let mut e = entry();
        e.pending.serial_number = "  ".into();
        let errors = validate_entry(&e);
        assert!(errors.contains_key(&TrackedField::SerialNumber));
    }

    #[test]
    fn record_without_serial_can_be_edited_elsewhere() {
        let mut e = ReconciliationEntry::new(AssetRecord {
            asset_tag: "IT-3".into(),
            condition: true,
            ..Default::default()
        });
        e.pending.room = "B2".into();
        assert!(validate_entry(&e).is_empty());
    }

    #[test]
    fn disposal_requires_status_reason() {
        let mut e = entry();
        e.pending.asset_status = AssetStatus::Disposed;
        assert!(validate_entry(&e).contains_key(&TrackedField::StatusReason));

        e.pending.status_reason = "End of life".into();
        assert!(validate_entry(&e).is_empty());
    }

    #[test]
    fn legacy_disposed_record_without_reason_is_not_blocked() {
        let mut e = ReconciliationEntry::new(AssetRecord {
            asset_tag: "IT-2".into(),
            serial_number: "SN2".into(),
            asset_status: AssetStatus::Disposed,
            condition: true,
            ..Default::default()
        });
        e.pending.room = "B1".into();
        assert!(validate_entry(&e).is_empty());
    }

    #[test]
    fn bad_condition_requires_notes() {
        let mut e = entry();
        e.pending.condition = false;
        assert!(validate_entry(&e).contains_key(&TrackedField::ConditionNotes));
        e.pending.condition_notes = "Cracked hinge".into();
        assert!(validate_entry(&e).is_empty());
    }

    #[test]
    fn overlong_notes_are_rejected() {
        let mut e = entry();
        e.pending.condition_notes = "x".repeat(MAX_CONDITION_NOTES_LENGTH + 1);
        let errors = validate_entry(&e);
        assert!(errors[&TrackedField::ConditionNotes].contains("at most 500"));
    }

    #[test]
    fn refresh_stores_errors_on_entry() {
        let mut e = entry();
        e.pending.serial_number.clear();
        assert!(!refresh_field_errors(&mut e));
        assert_eq!(e.field_errors.len(), 1);
        e.pending.serial_number = "SN1".into();
        assert!(refresh_field_errors(&mut e));
    }

    #[test]
    fn reason_validation() {
        assert!(validate_reason("Moved to branch").is_ok());
        assert_matches!(validate_reason("  "), Err(CoreError::Validation(_)));
        let long = "y".repeat(MAX_CHANGE_REASON_LENGTH + 1);
        assert_matches!(validate_reason(&long), Err(CoreError::Validation(_)));
    }
}
