use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use opname_client::{ApiError, OpnameBackend};
use opname_core::asset::{AssetOwner, AssetRecord, AssetStatus};
use opname_core::directory::{Site, SubSite, User};
use opname_core::reconciliation::AssetChangeSet;
use opname_core::session::{LocationKind, OpnameSession, SessionStatus};
use opname_core::types::DbId;
use opname_scanner::Scanner;
use opname_store::StateStore;

pub const SESSION_ID: DbId = 7;

/// Mutable state behind [`FakeBackend`].
#[derive(Default)]
pub struct FakeState {
    pub assets: Vec<AssetRecord>,
    pub catalogs: HashMap<String, Vec<String>>,
    pub submitted: Vec<AssetChangeSet>,
    pub removed: Vec<String>,
    pub progress: Vec<AssetChangeSet>,
    pub session: Option<OpnameSession>,
    pub fail_submit: bool,
    pub fail_remove: bool,
    pub fail_catalog: bool,
    /// Tags whose lookup fails with a server error.
    pub broken_tags: Vec<String>,
}

/// In-memory backend recording every call.
#[derive(Default, Clone)]
pub struct FakeBackend {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn with_assets(assets: Vec<AssetRecord>) -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().assets = assets;
        backend
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

fn server_error() -> ApiError {
    ApiError::ApiError {
        status: 500,
        body: "internal error".to_string(),
    }
}

fn not_found(entity: &'static str, key: impl ToString) -> ApiError {
    ApiError::NotFound {
        entity,
        key: key.to_string(),
    }
}

#[async_trait]
impl OpnameBackend for FakeBackend {
    async fn asset_by_tag(&self, asset_tag: &str) -> Result<AssetRecord, ApiError> {
        let state = self.state.lock().unwrap();
        if state.broken_tags.iter().any(|t| t == asset_tag) {
            return Err(server_error());
        }
        state
            .assets
            .iter()
            .find(|a| a.asset_tag.eq_ignore_ascii_case(asset_tag))
            .cloned()
            .ok_or_else(|| not_found("Asset", asset_tag))
    }

    async fn asset_by_serial(&self, serial_number: &str) -> Result<AssetRecord, ApiError> {
        let state = self.state.lock().unwrap();
        state
            .assets
            .iter()
            .find(|a| a.serial_number.eq_ignore_ascii_case(serial_number))
            .cloned()
            .ok_or_else(|| not_found("Asset", serial_number))
    }

    async fn equipment_catalog(&self, product_variety: &str) -> Result<Vec<String>, ApiError> {
        let state = self.state.lock().unwrap();
        if state.fail_catalog {
            return Err(server_error());
        }
        Ok(state
            .catalogs
            .get(product_variety)
            .cloned()
            .unwrap_or_default())
    }

    async fn upload_condition_photo(
        &self,
        file_name: &str,
        _bytes: Vec<u8>,
    ) -> Result<String, ApiError> {
        Ok(format!("opname/photos/{file_name}"))
    }

    async fn users(&self) -> Result<Vec<User>, ApiError> {
        Ok(vec![user(42)])
    }

    async fn sites(&self) -> Result<Vec<Site>, ApiError> {
        Ok(vec![Site {
            id: 1,
            name: "Head Office".to_string(),
            region_name: "Jakarta".to_string(),
        }])
    }

    async fn sub_sites(&self, site_id: DbId) -> Result<Vec<SubSite>, ApiError> {
        Ok(vec![SubSite {
            id: 10,
            site_id,
            name: "Floor 3".to_string(),
        }])
    }

    async fn submit_asset_change(
        &self,
        _session_id: DbId,
        change: &AssetChangeSet,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_submit {
            return Err(server_error());
        }
        state.submitted.push(change.clone());
        Ok(())
    }

    async fn remove_asset(&self, _session_id: DbId, asset_tag: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_remove {
            return Err(server_error());
        }
        state.removed.push(asset_tag.to_string());
        Ok(())
    }

    async fn session_progress(&self, _session_id: DbId) -> Result<Vec<AssetChangeSet>, ApiError> {
        Ok(self.state.lock().unwrap().progress.clone())
    }

    async fn start_session(
        &self,
        user_id: DbId,
        location_id: DbId,
        location_kind: LocationKind,
    ) -> Result<OpnameSession, ApiError> {
        let session = OpnameSession::start(
            SESSION_ID,
            user_id,
            location_id,
            location_kind,
            started_at(),
        );
        self.state.lock().unwrap().session = Some(session.clone());
        Ok(session)
    }

    async fn session(&self, session_id: DbId) -> Result<OpnameSession, ApiError> {
        self.state
            .lock()
            .unwrap()
            .session
            .clone()
            .filter(|s| s.id == session_id)
            .ok_or_else(|| not_found("Opname session", session_id))
    }

    async fn finish_session(&self, session_id: DbId) -> Result<OpnameSession, ApiError> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .session
            .as_mut()
            .filter(|s| s.id == session_id)
            .ok_or_else(|| not_found("Opname session", session_id))?;
        session.status = SessionStatus::Submitted;
        Ok(session.clone())
    }

    async fn cancel_session(&self, session_id: DbId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        match state.session.take() {
            Some(s) if s.id == session_id => Ok(()),
            _ => Err(not_found("Opname session", session_id)),
        }
    }

    async fn approve_session(
        &self,
        session_id: DbId,
        reviewer_id: DbId,
    ) -> Result<OpnameSession, ApiError> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .session
            .as_mut()
            .filter(|s| s.id == session_id)
            .ok_or_else(|| not_found("Opname session", session_id))?;
        session
            .approve(reviewer_id, Utc::now())
            .map_err(|e| ApiError::ApiError {
                status: 409,
                body: e.to_string(),
            })?;
        Ok(session.clone())
    }

    async fn reject_session(
        &self,
        session_id: DbId,
        reviewer_id: DbId,
        _reason: &str,
    ) -> Result<OpnameSession, ApiError> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .session
            .as_mut()
            .filter(|s| s.id == session_id)
            .ok_or_else(|| not_found("Opname session", session_id))?;
        session
            .reject(reviewer_id, Utc::now())
            .map_err(|e| ApiError::ApiError {
                status: 409,
                body: e.to_string(),
            })?;
        Ok(session.clone())
    }
}

pub fn started_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

pub fn user(id: DbId) -> User {
    User {
        id,
        name: "Dewi Lestari".to_string(),
        position: "Analyst".to_string(),
        cost_center: "CC-100".to_string(),
        department: "Finance".to_string(),
        division: "Corporate".to_string(),
        site_id: Some(1),
    }
}

/// A fully valid asset record.
pub fn asset(tag: &str, serial: &str) -> AssetRecord {
    let owner = user(42);
    AssetRecord {
        asset_tag: tag.to_string(),
        serial_number: serial.to_string(),
        asset_status: AssetStatus::Deployed,
        condition: true,
        location: "Floor 3".to_string(),
        room: "301".to_string(),
        sub_site_id: Some(10),
        site_id: Some(1),
        site_name: "Head Office".to_string(),
        region_name: "Jakarta".to_string(),
        owner: AssetOwner {
            id: owner.id,
            name: owner.name,
            position: owner.position,
            cost_center: owner.cost_center,
            department: owner.department,
            division: owner.division,
        },
        equipments: "Mouse".to_string(),
        product_name: "Latitude 5440".to_string(),
        product_category: "Computer".to_string(),
        product_variety: "Laptop".to_string(),
        ..AssetRecord::default()
    }
}

/// A scanner over `backend` with its state file in `dir`.
pub fn scanner(backend: &FakeBackend, dir: &tempfile::TempDir) -> Scanner {
    Scanner::new(
        Arc::new(backend.clone()),
        StateStore::new(dir.path().join("state.json")),
    )
}

/// A scanner with a started session.
pub async fn started_scanner(backend: &FakeBackend, dir: &tempfile::TempDir) -> Scanner {
    let mut scanner = scanner(backend, dir);
    scanner
        .start_session(42, 1, LocationKind::Site)
        .await
        .unwrap();
    scanner
}
