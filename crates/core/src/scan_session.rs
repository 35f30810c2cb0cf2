//! The list of assets scanned during one opname session.
//!
//! Entries are kept most-recently-scanned first. Counters, the table view
//! and the preview selection are all derived from the list itself, so
//! they cannot drift from it.

use serde::Serialize;

use crate::asset::{AssetRecord, AssetStatus};
use crate::error::CoreError;
use crate::reconciliation::{ProcessingStatus, ReconciliationEntry};

/// Counts derived from the entry list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionCounts {
    pub scanned: usize,
    pub pending: usize,
    pub edited: usize,
    pub all_good: usize,
}

/// Filter applied to the table view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub processing_status: Option<ProcessingStatus>,
    /// Case-insensitive substring matched against tag, serial, owner name
    /// and location.
    pub query: Option<String>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &ReconciliationEntry) -> bool {
        if let Some(status) = self.processing_status {
            if entry.processing_status != status {
                return false;
            }
        }
        let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
            return true;
        };
        let query = query.to_lowercase();
        let record = &entry.pending;
        [
            record.asset_tag.as_str(),
            record.serial_number.as_str(),
            record.owner.name.as_str(),
            record.location.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&query))
    }
}

/// One row of the table view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub asset_tag: String,
    pub serial_number: String,
    pub asset_status: AssetStatus,
    pub owner_name: String,
    pub location: String,
    pub processing_status: ProcessingStatus,
    pub has_changes: bool,
}

impl From<&ReconciliationEntry> for TableRow {
    fn from(entry: &ReconciliationEntry) -> Self {
        Self {
            asset_tag: entry.asset_tag().to_string(),
            serial_number: entry.pending.serial_number.clone(),
            asset_status: entry.pending.asset_status,
            owner_name: entry.pending.owner.name.clone(),
            location: entry.pending.location.clone(),
            processing_status: entry.processing_status,
            has_changes: entry.differs(),
        }
    }
}

/// Entries of an in-progress session plus view state derived from them.
#[derive(Debug, Clone, Default)]
pub struct ScanSession {
    entries: Vec<ReconciliationEntry>,
    selected: Option<String>,
    pub filter: EntryFilter,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session rebuilt from saved progress, keeping the given order.
    pub fn from_entries(entries: Vec<ReconciliationEntry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &[ReconciliationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Asset tag of an entry whose tag or serial number matches `query`.
    pub fn find_duplicate(&self, query: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.existing().matches_identifier(query))
            .map(|e| e.asset_tag())
    }

    /// Whether `record` is already in the session, by tag or by serial.
    pub fn contains_record(&self, record: &AssetRecord) -> bool {
        self.find_duplicate(&record.asset_tag).is_some()
            || self.find_duplicate(&record.serial_number).is_some()
    }

    /// Insert a fetched asset at the head of the list.
    ///
    /// Fails with [`CoreError::Duplicate`] when the tag or serial number is
    /// already present; nothing is inserted in that case.
    pub fn add(&mut self, entry: ReconciliationEntry) -> Result<&mut ReconciliationEntry, CoreError> {
        if self.contains_record(entry.existing()) {
            return Err(CoreError::Duplicate(entry.asset_tag().to_string()));
        }
        self.entries.insert(0, entry);
        Ok(&mut self.entries[0])
    }

    fn position(&self, asset_tag: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.asset_tag() == asset_tag)
    }

    pub fn get(&self, asset_tag: &str) -> Option<&ReconciliationEntry> {
        self.entries.iter().find(|e| e.asset_tag() == asset_tag)
    }

    pub fn get_mut(&mut self, asset_tag: &str) -> Option<&mut ReconciliationEntry> {
        self.entries.iter_mut().find(|e| e.asset_tag() == asset_tag)
    }

    /// Like [`Self::get_mut`] but reports a missing tag as an error.
    pub fn entry_mut(&mut self, asset_tag: &str) -> Result<&mut ReconciliationEntry, CoreError> {
        self.get_mut(asset_tag).ok_or_else(|| CoreError::NotFound {
            entity: "Scanned asset",
            key: asset_tag.to_string(),
        })
    }

    /// Remove an entry. Clears the preview selection if it pointed at it.
    pub fn remove(&mut self, asset_tag: &str) -> Option<ReconciliationEntry> {
        let idx = self.position(asset_tag)?;
        if self.selected.as_deref() == Some(asset_tag) {
            self.selected = None;
        }
        Some(self.entries.remove(idx))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.selected = None;
    }

    pub fn counts(&self) -> SessionCounts {
        let mut counts = SessionCounts {
            scanned: self.entries.len(),
            ..SessionCounts::default()
        };
        for entry in &self.entries {
            match entry.processing_status {
                ProcessingStatus::Pending => counts.pending += 1,
                ProcessingStatus::Edited => counts.edited += 1,
                ProcessingStatus::AllGood => counts.all_good += 1,
            }
        }
        counts
    }

    /// Entries passing the current filter, in list order.
    pub fn filtered(&self) -> impl Iterator<Item = &ReconciliationEntry> {
        self.entries.iter().filter(|e| self.filter.matches(e))
    }

    pub fn table_rows(&self) -> Vec<TableRow> {
        self.filtered().map(TableRow::from).collect()
    }

    /// Select the entry shown in the side-by-side preview.
    pub fn select(&mut self, asset_tag: &str) -> Result<&ReconciliationEntry, CoreError> {
        let idx = self.position(asset_tag).ok_or_else(|| CoreError::NotFound {
            entity: "Scanned asset",
            key: asset_tag.to_string(),
        })?;
        self.selected = Some(asset_tag.to_string());
        Ok(&self.entries[idx])
    }

    pub fn selected(&self) -> Option<&ReconciliationEntry> {
        self.selected.as_deref().and_then(|tag| self.get(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn record(tag: &str, serial: &str) -> AssetRecord {
        AssetRecord {
            asset_tag: tag.into(),
            serial_number: serial.into(),
            condition: true,
            ..Default::default()
        }
    }

    fn entry(tag: &str, serial: &str) -> ReconciliationEntry {
        ReconciliationEntry::new(record(tag, serial))
    }

    #[test]
    fn newest_scan_is_first() {
        let mut session = ScanSession::new();
        session.add(entry("A", "1")).unwrap();
        session.add(entry("B", "2")).unwrap();
        let tags: Vec<&str> = session.entries().iter().map(|e| e.asset_tag()).collect();
        assert_eq!(tags, vec!["B", "A"]);
    }

    #[test]
    fn duplicate_tag_or_serial_is_rejected() {
        let mut session = ScanSession::new();
        session.add(entry("A", "1")).unwrap();
        assert_matches!(session.add(entry("A", "9")), Err(CoreError::Duplicate(tag)) if tag == "A");
        assert_matches!(session.add(entry("C", "1")), Err(CoreError::Duplicate(_)));
        assert_eq!(session.len(), 1);
        assert_eq!(session.find_duplicate("1"), Some("A"));
        assert_eq!(session.find_duplicate("a"), Some("A"));
        assert_eq!(session.find_duplicate("2"), None);
    }

    #[test]
    fn assets_without_serial_are_not_duplicates_of_each_other() {
        let mut session = ScanSession::new();
        session.add(entry("A", "")).unwrap();
        session.add(entry("B", "")).unwrap();
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn counts_follow_processing_status() {
        let mut session = ScanSession::new();
        session.add(entry("A", "1")).unwrap();
        session.add(entry("B", "2")).unwrap();
        session.add(entry("C", "3")).unwrap();
        session.get_mut("A").unwrap().complete_all_good();
        session.get_mut("B").unwrap().complete_edit();
        assert_eq!(
            session.counts(),
            SessionCounts {
                scanned: 3,
                pending: 1,
                edited: 1,
                all_good: 1
            }
        );
        session.remove("C");
        assert_eq!(session.counts().pending, 0);
    }

    #[test]
    fn removing_selected_entry_clears_preview() {
        let mut session = ScanSession::new();
        session.add(entry("A", "1")).unwrap();
        session.add(entry("B", "2")).unwrap();
        session.select("A").unwrap();
        assert_eq!(session.selected().unwrap().asset_tag(), "A");
        session.remove("B");
        assert!(session.selected().is_some());
        session.remove("A");
        assert!(session.selected().is_none());
    }

    #[test]
    fn selecting_unknown_tag_fails() {
        let mut session = ScanSession::new();
        assert_matches!(session.select("Z"), Err(CoreError::NotFound { .. }));
    }

    #[test]
    fn filter_by_status_and_query() {
        let mut session = ScanSession::new();
        let mut a = record("LAP-001", "SN-A");
        a.owner.name = "Budi Santoso".into();
        session.add(ReconciliationEntry::new(a)).unwrap();
        session.add(entry("MON-002", "SN-B")).unwrap();
        session.get_mut("MON-002").unwrap().complete_all_good();

        session.filter.query = Some("budi".into());
        let rows = session.table_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].asset_tag, "LAP-001");

        session.filter = EntryFilter {
            processing_status: Some(ProcessingStatus::AllGood),
            query: None,
        };
        let rows = session.table_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].asset_tag, "MON-002");
        assert!(!rows[0].has_changes);
    }

    #[test]
    fn table_row_reflects_pending_edits() {
        let mut session = ScanSession::new();
        session.add(entry("A", "1")).unwrap();
        session.get_mut("A").unwrap().pending.room = "7".into();
        assert!(session.table_rows()[0].has_changes);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Scan(u8),
        AllGood(u8),
        Edit(u8),
        Remove(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8).prop_map(Op::Scan),
            (0u8..8).prop_map(Op::AllGood),
            (0u8..8).prop_map(Op::Edit),
            (0u8..8).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn counts_always_match_entry_list(ops in prop::collection::vec(op(), 0..40)) {
            let mut session = ScanSession::new();
            for op in ops {
                match op {
                    Op::Scan(n) => {
                        let _ = session.add(entry(&format!("T{n}"), &format!("S{n}")));
                    }
                    Op::AllGood(n) => {
                        if let Some(e) = session.get_mut(&format!("T{n}")) {
                            e.complete_all_good();
                        }
                    }
                    Op::Edit(n) => {
                        if let Some(e) = session.get_mut(&format!("T{n}")) {
                            e.complete_edit();
                        }
                    }
                    Op::Remove(n) => {
                        session.remove(&format!("T{n}"));
                    }
                }
                let counts = session.counts();
                let pending = session
                    .entries()
                    .iter()
                    .filter(|e| e.processing_status == ProcessingStatus::Pending)
                    .count();
                prop_assert_eq!(counts.scanned, session.len());
                prop_assert_eq!(counts.pending, pending);
                prop_assert_eq!(counts.pending + counts.edited + counts.all_good, counts.scanned);
            }
        }
    }
}
