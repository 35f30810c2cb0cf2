//! REST API client for the opname HTTP endpoints.
//!
//! Wraps asset lookup, the user/site directory, the equipment catalog,
//! photo upload, and the opname session endpoints using [`reqwest`].

use std::time::Duration;

use opname_core::asset::AssetRecord;
use opname_core::directory::{Site, SubSite, User};
use opname_core::reconciliation::AssetChangeSet;
use opname_core::session::{LocationKind, OpnameSession};
use opname_core::types::DbId;
use serde::de::DeserializeOwned;

use crate::dto::{
    AssetDto, ChangeSetPayload, EquipmentDto, PhotoUploadResponse, ReviewRequest, SessionDto,
    SiteDto, StartSessionRequest, SubSiteDto, UserDto,
};

/// HTTP client for one opname API deployment.
#[derive(Debug, Clone)]
pub struct OpnameApi {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the opname REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The requested resource does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The API returned a non-2xx status code.
    #[error("Opname API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl OpnameApi {
    /// Create a client for the API at `api_url`, e.g. `http://host:8000/api`.
    ///
    /// `timeout` bounds each request; `None` keeps the transport default.
    pub fn new(api_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, api_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    // ---- assets ----

    /// Fetch an asset by its tag. `GET /assets/tag/{tag}`.
    pub async fn asset_by_tag(&self, asset_tag: &str) -> Result<AssetRecord, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/assets/tag/{}", encode_segment(asset_tag))))
            .send()
            .await?;
        let dto: AssetDto = Self::parse_found(response, "Asset", asset_tag).await?;
        Ok(dto.into())
    }

    /// Fetch an asset by its serial number. `GET /assets/serial/{serial}`.
    pub async fn asset_by_serial(&self, serial_number: &str) -> Result<AssetRecord, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/assets/serial/{}", encode_segment(serial_number))))
            .send()
            .await?;
        let dto: AssetDto = Self::parse_found(response, "Asset", serial_number).await?;
        Ok(dto.into())
    }

    /// Valid equipment names for a product variety.
    /// `GET /equipments?product_variety={variety}`.
    pub async fn equipment_catalog(&self, product_variety: &str) -> Result<Vec<String>, ApiError> {
        let response = self
            .client
            .get(self.url("/equipments"))
            .query(&[("product_variety", product_variety)])
            .send()
            .await?;
        let items: Vec<EquipmentDto> = Self::parse_response(response).await?;
        Ok(items.into_iter().map(|e| e.name).collect())
    }

    /// Upload a condition photo and return its server-side reference.
    /// `POST /opname/photos` (multipart field `photo`).
    pub async fn upload_condition_photo(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("photo", part);

        let response = self
            .client
            .post(self.url("/opname/photos"))
            .multipart(form)
            .send()
            .await?;
        let uploaded: PhotoUploadResponse = Self::parse_response(response).await?;
        Ok(uploaded.path)
    }

    // ---- directory ----

    /// `GET /users`.
    pub async fn users(&self) -> Result<Vec<User>, ApiError> {
        let response = self.client.get(self.url("/users")).send().await?;
        let users: Vec<UserDto> = Self::parse_response(response).await?;
        Ok(users.into_iter().map(User::from).collect())
    }

    /// `GET /sites`.
    pub async fn sites(&self) -> Result<Vec<Site>, ApiError> {
        let response = self.client.get(self.url("/sites")).send().await?;
        let sites: Vec<SiteDto> = Self::parse_response(response).await?;
        Ok(sites.into_iter().map(Site::from).collect())
    }

    /// `GET /sites/{id}/sub-sites`.
    pub async fn sub_sites(&self, site_id: DbId) -> Result<Vec<SubSite>, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/sites/{site_id}/sub-sites")))
            .send()
            .await?;
        let sub_sites: Vec<SubSiteDto> = Self::parse_response(response).await?;
        Ok(sub_sites.into_iter().map(SubSite::from).collect())
    }

    // ---- session assets ----

    /// Persist one asset's change-set into the session.
    /// `POST /opname/sessions/{id}/assets`.
    pub async fn submit_asset_change(
        &self,
        session_id: DbId,
        change: &AssetChangeSet,
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/opname/sessions/{session_id}/assets")))
            .json(&ChangeSetPayload::from(change))
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// `DELETE /opname/sessions/{id}/assets/{tag}`.
    pub async fn remove_asset(&self, session_id: DbId, asset_tag: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(&format!(
                "/opname/sessions/{session_id}/assets/{}",
                encode_segment(asset_tag)
            )))
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Change-sets already saved in the session, in server order.
    /// `GET /opname/sessions/{id}/assets`.
    pub async fn session_progress(&self, session_id: DbId) -> Result<Vec<AssetChangeSet>, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/opname/sessions/{session_id}/assets")))
            .send()
            .await?;
        let items: Vec<ChangeSetPayload> = Self::parse_response(response).await?;
        Ok(items.into_iter().map(AssetChangeSet::from).collect())
    }

    // ---- session lifecycle ----

    /// `POST /opname/sessions`.
    pub async fn start_session(
        &self,
        user_id: DbId,
        location_id: DbId,
        location_kind: LocationKind,
    ) -> Result<OpnameSession, ApiError> {
        let body = StartSessionRequest {
            user_id,
            location_id,
            location_kind,
        };
        let response = self
            .client
            .post(self.url("/opname/sessions"))
            .json(&body)
            .send()
            .await?;
        let dto: SessionDto = Self::parse_response(response).await?;
        Ok(dto.into())
    }

    /// `GET /opname/sessions/{id}`.
    pub async fn session(&self, session_id: DbId) -> Result<OpnameSession, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/opname/sessions/{session_id}")))
            .send()
            .await?;
        let dto: SessionDto =
            Self::parse_found(response, "Opname session", &session_id.to_string()).await?;
        Ok(dto.into())
    }

    /// `POST /opname/sessions/{id}/finish`.
    pub async fn finish_session(&self, session_id: DbId) -> Result<OpnameSession, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/opname/sessions/{session_id}/finish")))
            .send()
            .await?;
        let dto: SessionDto = Self::parse_response(response).await?;
        Ok(dto.into())
    }

    /// `DELETE /opname/sessions/{id}`.
    pub async fn cancel_session(&self, session_id: DbId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(&format!("/opname/sessions/{session_id}")))
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// `POST /opname/sessions/{id}/approve`.
    pub async fn approve_session(
        &self,
        session_id: DbId,
        reviewer_id: DbId,
    ) -> Result<OpnameSession, ApiError> {
        self.review(session_id, "approve", reviewer_id, None).await
    }

    /// `POST /opname/sessions/{id}/reject`.
    pub async fn reject_session(
        &self,
        session_id: DbId,
        reviewer_id: DbId,
        reason: &str,
    ) -> Result<OpnameSession, ApiError> {
        self.review(session_id, "reject", reviewer_id, Some(reason))
            .await
    }

    async fn review(
        &self,
        session_id: DbId,
        action: &str,
        reviewer_id: DbId,
        reason: Option<&str>,
    ) -> Result<OpnameSession, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/opname/sessions/{session_id}/{action}")))
            .json(&ReviewRequest {
                reviewer_id,
                reason,
            })
            .send()
            .await?;
        let dto: SessionDto = Self::parse_response(response).await?;
        Ok(dto.into())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::debug!(status = status.as_u16(), %body, "Opname API returned an error");
            return Err(ApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Like [`Self::parse_response`], mapping a 404 to [`ApiError::NotFound`].
    async fn parse_found<T: DeserializeOwned>(
        response: reqwest::Response,
        entity: &'static str,
        key: &str,
    ) -> Result<T, ApiError> {
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                entity,
                key: key.to_string(),
            });
        }
        Self::parse_response(response).await
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Percent-encode a value used as a single path segment.
///
/// Asset tags and serial numbers may contain `/`, spaces or `#`.
pub fn encode_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = OpnameApi::with_client(reqwest::Client::new(), "http://host/api/");
        assert_eq!(api.api_url(), "http://host/api");
        assert_eq!(api.url("/users"), "http://host/api/users");
    }

    #[test]
    fn path_segments_are_encoded() {
        assert_eq!(encode_segment("IT-0042"), "IT-0042");
        assert_eq!(encode_segment("A/B 1"), "A%2FB%201");
        assert_eq!(encode_segment("#9"), "%239");
    }

    #[test]
    fn api_error_message_includes_status_and_body() {
        let err = ApiError::ApiError {
            status: 422,
            body: "owner required".into(),
        };
        assert_eq!(err.to_string(), "Opname API error (422): owner required");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_request_error() {
        let api = OpnameApi::new("http://127.0.0.1:9", Some(Duration::from_millis(500))).unwrap();
        let err = api.users().await.unwrap_err();
        assert_matches!(err, ApiError::Request(_));
    }
}
