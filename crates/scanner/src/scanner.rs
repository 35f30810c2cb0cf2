//! The scan-and-verify workflow.
//!
//! [`Scanner`] owns the in-progress [`ScanSession`] and the
//! [`OpnameSession`] it belongs to. Every operation that talks to the
//! backend follows the same rules:
//!
//! - failures publish a [`Notice`] and return the error;
//! - local changes already made are kept (no rollback, no retry);
//! - entries are looked up by asset tag after each await, never by index.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use opname_client::{ApiError, OpnameBackend};
use opname_core::asset::AssetRecord;
use opname_core::directory::{Site, SubSite, User};
use opname_core::error::CoreError;
use opname_core::reconciliation::{AssetChangeSet, ProcessingStatus, ReconciliationEntry};
use opname_core::scan_session::ScanSession;
use opname_core::session::{LocationKind, OpnameSession, ReviewStage, SessionStatus};
use opname_core::types::DbId;
use opname_core::validation;
use opname_store::{LocalState, StateStore};
use tokio::sync::broadcast;

use crate::error::ScanError;
use crate::notice::{Notice, Notifier};

/// Result of removing an entry from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The entry was never persisted; only local state changed.
    LocalOnly,
    /// The entry was also removed from the server-side session.
    Remote,
    /// Removed locally; the server-side removal failed and was reported.
    RemoteFailed,
}

/// How an asset is looked up when scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Tag,
    Serial,
}

pub struct Scanner {
    backend: Arc<dyn OpnameBackend>,
    store: StateStore,
    state: LocalState,
    session: Option<OpnameSession>,
    scan: ScanSession,
    notifier: Notifier,
}

impl Scanner {
    pub fn new(backend: Arc<dyn OpnameBackend>, store: StateStore) -> Self {
        Self {
            backend,
            store,
            state: LocalState::default(),
            session: None,
            scan: ScanSession::new(),
            notifier: Notifier::new(),
        }
    }

    /// Subscribe to user-facing notices.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    pub fn session(&self) -> Option<&OpnameSession> {
        self.session.as_ref()
    }

    pub fn scan_session(&self) -> &ScanSession {
        &self.scan
    }

    /// Mutable access for form edits on pending records, filters and the
    /// preview selection.
    pub fn scan_session_mut(&mut self) -> &mut ScanSession {
        &mut self.scan
    }

    pub fn local_state(&self) -> &LocalState {
        &self.state
    }

    // ---- helpers ----

    /// Publish a notice for a failed operation and pass the error on.
    fn fail<E: Into<ScanError>>(&self, context: &str, err: E) -> ScanError {
        let err = err.into();
        let message = format!("{context}: {err}");
        if err.is_user_error() {
            tracing::info!(error = %err, "{context}");
            self.notifier.publish(Notice::warning(message));
        } else {
            tracing::warn!(error = %err, "{context}");
            self.notifier.publish(Notice::error(message));
        }
        err
    }

    fn active_session(&self) -> Result<&OpnameSession, ScanError> {
        self.session.as_ref().ok_or(ScanError::NoActiveSession)
    }

    fn active_session_id(&self) -> Result<DbId, ScanError> {
        self.active_session().map(|s| s.id)
    }

    /// Mirror derived counters into the local store.
    ///
    /// A failed write is reported but does not fail the calling operation;
    /// the counters are recomputed from the entry list on the next write.
    async fn sync_state(&mut self) {
        self.state.record_counts(self.scan.counts());
        if let Err(err) = self.store.save(&self.state).await {
            let _ = self.fail("Could not save local progress", err);
        }
    }

    async fn reset_local(&mut self) {
        self.session = None;
        self.scan.clear();
        self.state = LocalState::default();
        if let Err(err) = self.store.clear().await {
            let _ = self.fail("Could not clear local progress", err);
        }
    }

    async fn equipment_catalog(&self, product_variety: &str) -> Vec<String> {
        if product_variety.trim().is_empty() {
            return Vec::new();
        }
        match self.backend.equipment_catalog(product_variety).await {
            Ok(names) => names,
            Err(err) => {
                let _ = self.fail("Could not load the equipment list", err);
                Vec::new()
            }
        }
    }

    // ---- session lifecycle ----

    /// Resume the session recorded in the local store, if any.
    pub async fn resume(&mut self) -> Result<Option<&OpnameSession>, ScanError> {
        let state = self
            .store
            .load()
            .await
            .map_err(|e| self.fail("Could not read local progress", e))?;
        let Some(session_id) = state.session_id else {
            return Ok(None);
        };
        self.state = state;

        let session = match self.backend.session(session_id).await {
            Ok(session) => session,
            Err(ApiError::NotFound { .. }) => {
                tracing::info!(session_id, "Saved opname session no longer exists");
                self.reset_local().await;
                self.notifier
                    .publish(Notice::info("The saved opname session no longer exists"));
                return Ok(None);
            }
            Err(err) => return Err(self.fail("Could not load the opname session", err)),
        };
        // Finished or cancelled elsewhere; nothing left to scan into.
        if session.status != SessionStatus::Active {
            tracing::info!(session_id, status = %session.status, "Saved opname session is no longer active");
            self.reset_local().await;
            self.notifier.publish(Notice::info(format!(
                "Opname {session_id} is {} and can no longer be scanned",
                session.status
            )));
            return Ok(None);
        }
        tracing::info!(session_id, status = %session.status, "Resuming opname session");
        self.session = Some(session);
        self.load_progress().await?;
        Ok(self.session.as_ref())
    }

    /// Start a new opname for a site or department.
    pub async fn start_session(
        &mut self,
        user_id: DbId,
        location_id: DbId,
        location_kind: LocationKind,
    ) -> Result<&OpnameSession, ScanError> {
        if let Some(current) = &self.session {
            let err = CoreError::Validation(format!(
                "Opname session {} is still in progress",
                current.id
            ));
            return Err(self.fail("Could not start a new opname", err));
        }

        let session = self
            .backend
            .start_session(user_id, location_id, location_kind)
            .await
            .map_err(|e| self.fail("Could not start a new opname", e))?;
        tracing::info!(
            session_id = session.id,
            location_id,
            location_kind = %location_kind,
            "Opname session started",
        );

        self.scan.clear();
        self.state = LocalState::for_session(&session);
        self.session = Some(session);
        self.sync_state().await;
        self.notifier.publish(Notice::success("Opname started"));
        self.active_session()
    }

    /// Finish scanning and submit the session for review.
    pub async fn finish_session(&mut self) -> Result<OpnameSession, ScanError> {
        let session = self.active_session()?;
        let session_id = session.id;
        if let Err(err) = session.ensure_can_finish(self.scan.counts().pending) {
            return Err(self.fail("Could not finish the opname", err));
        }

        let finished = self
            .backend
            .finish_session(session_id)
            .await
            .map_err(|e| self.fail("Could not finish the opname", e))?;
        tracing::info!(session_id, status = %finished.status, "Opname session finished");

        self.reset_local().await;
        self.notifier
            .publish(Notice::success("Opname submitted for review"));
        Ok(finished)
    }

    /// Abandon the active session.
    pub async fn cancel_session(&mut self) -> Result<(), ScanError> {
        let session = self.active_session()?;
        let session_id = session.id;
        if let Err(err) = session.ensure_can_cancel() {
            return Err(self.fail("Could not cancel the opname", err));
        }

        self.backend
            .cancel_session(session_id)
            .await
            .map_err(|e| self.fail("Could not cancel the opname", e))?;
        tracing::info!(session_id, "Opname session cancelled");

        self.reset_local().await;
        self.notifier.publish(Notice::info("Opname cancelled"));
        Ok(())
    }

    /// Approve a submitted or escalated session as `reviewer_id`.
    pub async fn approve_session(
        &self,
        session_id: DbId,
        reviewer_id: DbId,
    ) -> Result<OpnameSession, ScanError> {
        let stage = self.reviewable(session_id, "approve").await?;
        let session = self
            .backend
            .approve_session(session_id, reviewer_id)
            .await
            .map_err(|e| self.fail("Could not approve the opname", e))?;
        self.check_review_order(&session);
        tracing::info!(session_id, reviewer_id, ?stage, status = %session.status, "Opname approved");
        let message = match stage {
            ReviewStage::FirstLine => "Opname escalated to manager review",
            ReviewStage::Manager => "Opname verified",
        };
        self.notifier.publish(Notice::success(message));
        Ok(session)
    }

    /// Reject a submitted or escalated session as `reviewer_id`.
    pub async fn reject_session(
        &self,
        session_id: DbId,
        reviewer_id: DbId,
        reason: &str,
    ) -> Result<OpnameSession, ScanError> {
        if let Err(err) = validation::validate_reason(reason) {
            return Err(self.fail("Could not reject the opname", err));
        }
        let stage = self.reviewable(session_id, "reject").await?;
        let session = self
            .backend
            .reject_session(session_id, reviewer_id, reason.trim())
            .await
            .map_err(|e| self.fail("Could not reject the opname", e))?;
        self.check_review_order(&session);
        tracing::info!(session_id, reviewer_id, ?stage, "Opname rejected");
        self.notifier.publish(Notice::info("Opname rejected"));
        Ok(session)
    }

    async fn reviewable(
        &self,
        session_id: DbId,
        action: &'static str,
    ) -> Result<ReviewStage, ScanError> {
        let context = format!("Could not {action} the opname");
        let session = self
            .backend
            .session(session_id)
            .await
            .map_err(|e| self.fail(&context, e))?;
        session
            .ensure_reviewable(action)
            .map_err(|e| self.fail(&context, e))
    }

    fn check_review_order(&self, session: &OpnameSession) {
        if let Err(err) = session.validate_review_order() {
            tracing::warn!(session_id = session.id, error = %err, "Inconsistent review slots");
        }
    }

    // ---- scanning ----

    /// Scan an asset by its tag.
    pub async fn scan_by_tag(&mut self, asset_tag: &str) -> Result<&ReconciliationEntry, ScanError> {
        self.scan_asset(asset_tag, Lookup::Tag).await
    }

    /// Scan an asset by its serial number.
    pub async fn scan_by_serial(
        &mut self,
        serial_number: &str,
    ) -> Result<&ReconciliationEntry, ScanError> {
        self.scan_asset(serial_number, Lookup::Serial).await
    }

    async fn scan_asset(
        &mut self,
        query: &str,
        lookup: Lookup,
    ) -> Result<&ReconciliationEntry, ScanError> {
        const CONTEXT: &str = "Could not add asset";
        self.active_session_id()
            .map_err(|e| self.fail(CONTEXT, e))?;

        let query = query.trim();
        if query.is_empty() {
            let err = CoreError::Validation("Enter an asset tag or serial number".to_string());
            return Err(self.fail(CONTEXT, err));
        }
        if let Some(existing) = self.scan.find_duplicate(query) {
            let err = CoreError::Duplicate(existing.to_string());
            return Err(self.fail(CONTEXT, err));
        }

        let fetched = match lookup {
            Lookup::Tag => self.backend.asset_by_tag(query).await,
            Lookup::Serial => self.backend.asset_by_serial(query).await,
        };
        let record = fetched.map_err(|e| self.fail(CONTEXT, e))?;
        let asset_tag = self.admit(record).await?;

        self.notifier
            .publish(Notice::success(format!("Asset {asset_tag} added")));
        self.scan
            .get(&asset_tag)
            .ok_or_else(|| ScanError::Core(CoreError::NotFound {
                entity: "Scanned asset",
                key: asset_tag,
            }))
    }

    /// Turn a fetched record into a session entry.
    async fn admit(&mut self, record: AssetRecord) -> Result<String, ScanError> {
        // A tag lookup can still return an asset whose serial is already in
        // the session, and two quick scans may both pass the query check.
        if self.scan.contains_record(&record) {
            let err = CoreError::Duplicate(record.asset_tag.clone());
            return Err(self.fail("Could not add asset", err));
        }

        let catalog = self.equipment_catalog(&record.product_variety).await;
        let entry = ReconciliationEntry::new(record).with_available_equipments(catalog);
        let asset_tag = entry.asset_tag().to_string();
        if let Err(err) = self.scan.add(entry).map(|_| ()) {
            return Err(self.fail("Could not add asset", err));
        }
        tracing::info!(asset_tag = %asset_tag, "Asset scanned");

        self.sync_state().await;
        Ok(asset_tag)
    }

    // ---- verification ----

    /// Submit the pending edits of an asset with its change reason.
    pub async fn submit_changes(&mut self, asset_tag: &str) -> Result<AssetChangeSet, ScanError> {
        const CONTEXT: &str = "Could not save changes";
        let session_id = self
            .active_session_id()
            .map_err(|e| self.fail(CONTEXT, e))?;

        let built = match self.scan.entry_mut(asset_tag) {
            Ok(entry) => {
                validation::refresh_field_errors(entry);
                entry.has_changes();
                entry.build_change_set().map_err(ScanError::from)
            }
            Err(err) => Err(err.into()),
        };
        let change = built.map_err(|e| self.fail(CONTEXT, e))?;

        self.backend
            .submit_asset_change(session_id, &change)
            .await
            .map_err(|e| self.fail(CONTEXT, e))?;

        if let Some(entry) = self.scan.get_mut(asset_tag) {
            entry.complete_edit();
        }
        tracing::info!(
            session_id,
            asset_tag,
            fields = ?change.fields(),
            "Asset changes submitted",
        );
        self.sync_state().await;
        self.notifier
            .publish(Notice::success(format!("Changes to {asset_tag} saved")));
        Ok(change)
    }

    /// Confirm an asset as unchanged.
    pub async fn mark_all_good(&mut self, asset_tag: &str) -> Result<AssetChangeSet, ScanError> {
        const CONTEXT: &str = "Could not confirm asset";
        let session = self.active_session().map_err(|e| self.fail(CONTEXT, e))?;
        let (session_id, started_at) = (session.id, session.started_at);

        let change = match self.scan.get(asset_tag) {
            Some(entry) => entry.all_good_change_set(started_at),
            None => {
                let err = CoreError::NotFound {
                    entity: "Scanned asset",
                    key: asset_tag.to_string(),
                };
                return Err(self.fail(CONTEXT, err));
            }
        };

        self.backend
            .submit_asset_change(session_id, &change)
            .await
            .map_err(|e| self.fail(CONTEXT, e))?;

        if let Some(entry) = self.scan.get_mut(asset_tag) {
            entry.complete_all_good();
        }
        tracing::info!(session_id, asset_tag, "Asset confirmed all good");
        self.sync_state().await;
        self.notifier
            .publish(Notice::success(format!("{asset_tag} confirmed")));
        Ok(change)
    }

    /// Upload a condition photo and attach it to the pending record.
    pub async fn upload_condition_photo(
        &mut self,
        asset_tag: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ScanError> {
        const CONTEXT: &str = "Could not upload photo";
        if self.scan.get(asset_tag).is_none() {
            let err = CoreError::NotFound {
                entity: "Scanned asset",
                key: asset_tag.to_string(),
            };
            return Err(self.fail(CONTEXT, err));
        }

        let path = self
            .backend
            .upload_condition_photo(file_name, bytes)
            .await
            .map_err(|e| self.fail(CONTEXT, e))?;

        // The entry may have been removed while the upload was in flight.
        if let Some(entry) = self.scan.get_mut(asset_tag) {
            entry.pending.condition_photo = Some(path.clone());
        }
        tracing::debug!(asset_tag, %path, "Condition photo uploaded");
        Ok(path)
    }

    /// Remove an asset from the session.
    ///
    /// Local removal always happens first. The server-side session is only
    /// asked to drop the asset if it was persisted there; a failure of that
    /// call is reported but does not bring the entry back.
    pub async fn remove(&mut self, asset_tag: &str) -> Result<RemovalOutcome, ScanError> {
        let Some(entry) = self.scan.remove(asset_tag) else {
            let err = CoreError::NotFound {
                entity: "Scanned asset",
                key: asset_tag.to_string(),
            };
            return Err(self.fail("Could not remove asset", err));
        };
        self.sync_state().await;
        tracing::info!(asset_tag, processed = entry.asset_processed, "Asset removed locally");

        if !entry.asset_processed {
            return Ok(RemovalOutcome::LocalOnly);
        }
        let Some(session_id) = self.session.as_ref().map(|s| s.id) else {
            return Ok(RemovalOutcome::LocalOnly);
        };

        match self.backend.remove_asset(session_id, asset_tag).await {
            Ok(()) => {
                self.notifier
                    .publish(Notice::info(format!("{asset_tag} removed from the opname")));
                Ok(RemovalOutcome::Remote)
            }
            Err(err) => {
                let _ = self.fail("Asset removed locally but not on the server", err);
                Ok(RemovalOutcome::RemoteFailed)
            }
        }
    }

    // ---- saved progress ----

    /// Rebuild the entry list from the progress saved in the active session.
    ///
    /// All assets are fetched concurrently; the list is assembled only once
    /// every fetch has finished, in the server's order. Assets that fail to
    /// load are skipped and reported together.
    pub async fn load_progress(&mut self) -> Result<usize, ScanError> {
        const CONTEXT: &str = "Could not load saved progress";
        let session_id = self
            .active_session_id()
            .map_err(|e| self.fail(CONTEXT, e))?;

        let progress = self
            .backend
            .session_progress(session_id)
            .await
            .map_err(|e| self.fail(CONTEXT, e))?;

        let backend = &self.backend;
        let fetched = join_all(
            progress
                .iter()
                .map(|item| backend.asset_by_tag(&item.asset_tag)),
        )
        .await;

        let varieties: HashSet<String> = fetched
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|record| record.product_variety.clone())
            .filter(|v| !v.trim().is_empty())
            .collect();
        let this = &*self;
        let catalogs: HashMap<String, Vec<String>> = join_all(varieties.into_iter().map(
            |variety| async move {
                let names = this.equipment_catalog(&variety).await;
                (variety, names)
            },
        ))
        .await
        .into_iter()
        .collect();

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(progress.len());
        let mut failed = 0usize;
        for (item, result) in progress.iter().zip(fetched) {
            let record = match result {
                Ok(record) => record,
                Err(err) => {
                    failed += 1;
                    tracing::warn!(session_id, asset_tag = %item.asset_tag, error = %err, "Saved asset failed to load");
                    continue;
                }
            };
            if !seen.insert(record.asset_tag.clone()) {
                continue;
            }
            let changes = (item.processing_status == ProcessingStatus::Edited).then_some(item);
            let catalog = catalogs
                .get(&record.product_variety)
                .cloned()
                .unwrap_or_default();
            entries.push(
                ReconciliationEntry::restore(
                    record,
                    item.processing_status,
                    item.change_reason.clone(),
                    changes,
                )
                .with_available_equipments(catalog),
            );
        }

        let loaded = entries.len();
        self.scan = ScanSession::from_entries(entries);
        self.sync_state().await;
        tracing::info!(session_id, loaded, failed, "Saved progress loaded");

        if failed > 0 {
            self.notifier.publish(Notice::error(format!(
                "{failed} saved asset(s) could not be loaded"
            )));
        }
        Ok(loaded)
    }

    // ---- pickers ----

    pub async fn users(&self) -> Result<Vec<User>, ScanError> {
        self.backend
            .users()
            .await
            .map_err(|e| self.fail("Could not load users", e))
    }

    pub async fn sites(&self) -> Result<Vec<Site>, ScanError> {
        self.backend
            .sites()
            .await
            .map_err(|e| self.fail("Could not load sites", e))
    }

    pub async fn sub_sites(&self, site_id: DbId) -> Result<Vec<SubSite>, ScanError> {
        self.backend
            .sub_sites(site_id)
            .await
            .map_err(|e| self.fail("Could not load sub-sites", e))
    }
}
