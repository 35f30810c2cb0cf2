//! The remote operations the scanning workflow depends on.
//!
//! [`OpnameApi`] is the production implementation. Tests substitute an
//! in-memory backend.

use async_trait::async_trait;
use opname_core::asset::AssetRecord;
use opname_core::directory::{Site, SubSite, User};
use opname_core::reconciliation::AssetChangeSet;
use opname_core::session::{LocationKind, OpnameSession};
use opname_core::types::DbId;

use crate::api::{ApiError, OpnameApi};

#[async_trait]
pub trait OpnameBackend: Send + Sync {
    async fn asset_by_tag(&self, asset_tag: &str) -> Result<AssetRecord, ApiError>;
    async fn asset_by_serial(&self, serial_number: &str) -> Result<AssetRecord, ApiError>;
    async fn equipment_catalog(&self, product_variety: &str) -> Result<Vec<String>, ApiError>;
    async fn upload_condition_photo(&self, file_name: &str, bytes: Vec<u8>)
        -> Result<String, ApiError>;

    async fn users(&self) -> Result<Vec<User>, ApiError>;
    async fn sites(&self) -> Result<Vec<Site>, ApiError>;
    async fn sub_sites(&self, site_id: DbId) -> Result<Vec<SubSite>, ApiError>;

    async fn submit_asset_change(
        &self,
        session_id: DbId,
        change: &AssetChangeSet,
    ) -> Result<(), ApiError>;
    async fn remove_asset(&self, session_id: DbId, asset_tag: &str) -> Result<(), ApiError>;
    async fn session_progress(&self, session_id: DbId) -> Result<Vec<AssetChangeSet>, ApiError>;

    async fn start_session(
        &self,
        user_id: DbId,
        location_id: DbId,
        location_kind: LocationKind,
    ) -> Result<OpnameSession, ApiError>;
    async fn session(&self, session_id: DbId) -> Result<OpnameSession, ApiError>;
    async fn finish_session(&self, session_id: DbId) -> Result<OpnameSession, ApiError>;
    async fn cancel_session(&self, session_id: DbId) -> Result<(), ApiError>;
    async fn approve_session(
        &self,
        session_id: DbId,
        reviewer_id: DbId,
    ) -> Result<OpnameSession, ApiError>;
    async fn reject_session(
        &self,
        session_id: DbId,
        reviewer_id: DbId,
        reason: &str,
    ) -> Result<OpnameSession, ApiError>;
}

#[async_trait]
impl OpnameBackend for OpnameApi {
    async fn asset_by_tag(&self, asset_tag: &str) -> Result<AssetRecord, ApiError> {
        OpnameApi::asset_by_tag(self, asset_tag).await
    }

    async fn asset_by_serial(&self, serial_number: &str) -> Result<AssetRecord, ApiError> {
        OpnameApi::asset_by_serial(self, serial_number).await
    }

    async fn equipment_catalog(&self, product_variety: &str) -> Result<Vec<String>, ApiError> {
        OpnameApi::equipment_catalog(self, product_variety).await
    }

    async fn upload_condition_photo(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ApiError> {
        OpnameApi::upload_condition_photo(self, file_name, bytes).await
    }

    async fn users(&self) -> Result<Vec<User>, ApiError> {
        OpnameApi::users(self).await
    }

    async fn sites(&self) -> Result<Vec<Site>, ApiError> {
        OpnameApi::sites(self).await
    }

    async fn sub_sites(&self, site_id: DbId) -> Result<Vec<SubSite>, ApiError> {
        OpnameApi::sub_sites(self, site_id).await
    }

    async fn submit_asset_change(
        &self,
        session_id: DbId,
        change: &AssetChangeSet,
    ) -> Result<(), ApiError> {
        OpnameApi::submit_asset_change(self, session_id, change).await
    }

    async fn remove_asset(&self, session_id: DbId, asset_tag: &str) -> Result<(), ApiError> {
        OpnameApi::remove_asset(self, session_id, asset_tag).await
    }

    async fn session_progress(&self, session_id: DbId) -> Result<Vec<AssetChangeSet>, ApiError> {
        OpnameApi::session_progress(self, session_id).await
    }

    async fn start_session(
        &self,
        user_id: DbId,
        location_id: DbId,
        location_kind: LocationKind,
    ) -> Result<OpnameSession, ApiError> {
        OpnameApi::start_session(self, user_id, location_id, location_kind).await
    }

    async fn session(&self, session_id: DbId) -> Result<OpnameSession, ApiError> {
        OpnameApi::session(self, session_id).await
    }

    async fn finish_session(&self, session_id: DbId) -> Result<OpnameSession, ApiError> {
        OpnameApi::finish_session(self, session_id).await
    }

    async fn cancel_session(&self, session_id: DbId) -> Result<(), ApiError> {
        OpnameApi::cancel_session(self, session_id).await
    }

    async fn approve_session(
        &self,
        session_id: DbId,
        reviewer_id: DbId,
    ) -> Result<OpnameSession, ApiError> {
        OpnameApi::approve_session(self, session_id, reviewer_id).await
    }

    async fn reject_session(
        &self,
        session_id: DbId,
        reviewer_id: DbId,
        reason: &str,
    ) -> Result<OpnameSession, ApiError> {
        OpnameApi::reject_session(self, session_id, reviewer_id, reason).await
    }
}
