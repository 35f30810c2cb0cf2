//! Opname session lifecycle and review slots.
//!
//! A session covers one site or department. After the owner finishes it,
//! a first-line reviewer either rejects it or escalates it to a manager,
//! who then verifies or rejects it.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/* --------------------------------------------------------------------------
Status
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Superseded by a newer session for the same location.
    Outdated,
    Active,
    /// Finished by its owner, awaiting first-line review.
    Submitted,
    /// Approved by the first-line reviewer, awaiting the manager.
    Escalated,
    Verified,
    Rejected,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outdated => "outdated",
            Self::Active => "active",
            Self::Submitted => "submitted",
            Self::Escalated => "escalated",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }

    /// No further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Outdated | Self::Verified | Self::Rejected)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of location a session is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Site,
    Department,
}

impl LocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::Department => "department",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "site" => Ok(Self::Site),
            "department" | "dept" => Ok(Self::Department),
            other => Err(CoreError::Validation(format!(
                "Invalid location kind '{other}'. Must be one of: site, department"
            ))),
        }
    }
}

impl std::fmt::Display for LocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/* --------------------------------------------------------------------------
Review slots
-------------------------------------------------------------------------- */

/// One reviewer decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReviewSlot {
    pub reviewer_id: Option<DbId>,
    pub reviewed_at: Option<Timestamp>,
}

impl ReviewSlot {
    pub fn is_filled(&self) -> bool {
        self.reviewer_id.is_some()
    }

    fn fill(&mut self, reviewer_id: DbId, at: Timestamp) {
        self.reviewer_id = Some(reviewer_id);
        self.reviewed_at = Some(at);
    }
}

/// Which reviewer acts next on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStage {
    FirstLine,
    Manager,
}

/* --------------------------------------------------------------------------
Session
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpnameSession {
    pub id: DbId,
    pub status: SessionStatus,
    pub user_id: DbId,
    pub location_id: DbId,
    pub location_kind: LocationKind,
    pub started_at: Timestamp,
    #[serde(default)]
    pub first_review: ReviewSlot,
    #[serde(default)]
    pub manager_review: ReviewSlot,
}

impl OpnameSession {
    /// A newly started session.
    pub fn start(
        id: DbId,
        user_id: DbId,
        location_id: DbId,
        location_kind: LocationKind,
        started_at: Timestamp,
    ) -> Self {
        Self {
            id,
            status: SessionStatus::Active,
            user_id,
            location_id,
            location_kind,
            started_at,
            first_review: ReviewSlot::default(),
            manager_review: ReviewSlot::default(),
        }
    }

    fn transition_error(&self, action: &'static str) -> CoreError {
        CoreError::InvalidTransition {
            action,
            from: self.status,
        }
    }

    /// The reviewer stage that may act now, if any.
    pub fn review_stage(&self) -> Option<ReviewStage> {
        match self.status {
            SessionStatus::Submitted => Some(ReviewStage::FirstLine),
            SessionStatus::Escalated => Some(ReviewStage::Manager),
            _ => None,
        }
    }

    /// Check that the session can be finished with `pending_assets` still
    /// unconfirmed.
    pub fn ensure_can_finish(&self, pending_assets: usize) -> Result<(), CoreError> {
        if self.status != SessionStatus::Active {
            return Err(self.transition_error("finish"));
        }
        if pending_assets > 0 {
            return Err(CoreError::Validation(format!(
                "{pending_assets} scanned asset(s) are still pending; confirm or remove them first"
            )));
        }
        Ok(())
    }

    /// Owner finishes scanning: `Active` -> `Submitted`.
    pub fn finish(&mut self, pending_assets: usize) -> Result<(), CoreError> {
        self.ensure_can_finish(pending_assets)?;
        self.status = SessionStatus::Submitted;
        Ok(())
    }

    /// Check that the owner may cancel the session.
    pub fn ensure_can_cancel(&self) -> Result<(), CoreError> {
        if self.status != SessionStatus::Active {
            return Err(self.transition_error("cancel"));
        }
        Ok(())
    }

    /// Check that a reviewer may act on the session.
    pub fn ensure_reviewable(&self, action: &'static str) -> Result<ReviewStage, CoreError> {
        self.review_stage()
            .ok_or_else(|| self.transition_error(action))
    }

    /// Approve at the current stage.
    ///
    /// First-line approval escalates to the manager; manager approval
    /// verifies the session.
    pub fn approve(&mut self, reviewer_id: DbId, at: Timestamp) -> Result<ReviewStage, CoreError> {
        let stage = self.ensure_reviewable("approve")?;
        match stage {
            ReviewStage::FirstLine => {
                self.first_review.fill(reviewer_id, at);
                self.status = SessionStatus::Escalated;
            }
            ReviewStage::Manager => {
                self.manager_review.fill(reviewer_id, at);
                self.status = SessionStatus::Verified;
            }
        }
        Ok(stage)
    }

    /// Reject at the current stage.
    pub fn reject(&mut self, reviewer_id: DbId, at: Timestamp) -> Result<ReviewStage, CoreError> {
        let stage = self.ensure_reviewable("reject")?;
        match stage {
            ReviewStage::FirstLine => self.first_review.fill(reviewer_id, at),
            ReviewStage::Manager => self.manager_review.fill(reviewer_id, at),
        }
        self.status = SessionStatus::Rejected;
        Ok(stage)
    }

    /// The manager slot may only be filled after the first-line slot, and
    /// only on a session that went through escalation.
    pub fn validate_review_order(&self) -> Result<(), CoreError> {
        if self.manager_review.is_filled() {
            if !self.first_review.is_filled() {
                return Err(CoreError::Validation(
                    "Manager review recorded without a first-line review".to_string(),
                ));
            }
            if !matches!(
                self.status,
                SessionStatus::Verified | SessionStatus::Rejected | SessionStatus::Outdated
            ) {
                return Err(CoreError::Validation(format!(
                    "Manager review recorded on a {} session",
                    self.status
                )));
            }
            if let (Some(first), Some(manager)) =
                (self.first_review.reviewed_at, self.manager_review.reviewed_at)
            {
                if manager < first {
                    return Err(CoreError::Validation(
                        "Manager review predates the first-line review".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    fn active() -> OpnameSession {
        OpnameSession::start(9, 1, 4, LocationKind::Site, Utc::now())
    }

    #[test]
    fn finish_requires_no_pending_assets() {
        let mut session = active();
        assert_matches!(session.finish(2), Err(CoreError::Validation(_)));
        assert_eq!(session.status, SessionStatus::Active);
        session.finish(0).unwrap();
        assert_eq!(session.status, SessionStatus::Submitted);
    }

    #[test]
    fn finish_twice_is_invalid() {
        let mut session = active();
        session.finish(0).unwrap();
        assert_matches!(
            session.finish(0),
            Err(CoreError::InvalidTransition {
                action: "finish",
                from: SessionStatus::Submitted
            })
        );
    }

    #[test]
    fn two_stage_approval_verifies() {
        let mut session = active();
        session.finish(0).unwrap();
        let now = Utc::now();

        assert_eq!(session.approve(2, now).unwrap(), ReviewStage::FirstLine);
        assert_eq!(session.status, SessionStatus::Escalated);
        assert_eq!(session.first_review.reviewer_id, Some(2));

        let later = now + Duration::minutes(5);
        assert_eq!(session.approve(3, later).unwrap(), ReviewStage::Manager);
        assert_eq!(session.status, SessionStatus::Verified);
        assert_eq!(session.manager_review.reviewer_id, Some(3));
        session.validate_review_order().unwrap();
        assert!(session.status.is_terminal());
    }

    #[test]
    fn manager_can_reject_after_escalation() {
        let mut session = active();
        session.finish(0).unwrap();
        session.approve(2, Utc::now()).unwrap();
        assert_eq!(session.reject(3, Utc::now()).unwrap(), ReviewStage::Manager);
        assert_eq!(session.status, SessionStatus::Rejected);
        assert!(session.manager_review.is_filled());
    }

    #[test]
    fn first_line_reject_leaves_manager_slot_empty() {
        let mut session = active();
        session.finish(0).unwrap();
        session.reject(2, Utc::now()).unwrap();
        assert!(session.first_review.is_filled());
        assert!(!session.manager_review.is_filled());
    }

    #[test]
    fn active_session_cannot_be_reviewed() {
        let mut session = active();
        assert_matches!(
            session.approve(2, Utc::now()),
            Err(CoreError::InvalidTransition { action: "approve", .. })
        );
    }

    #[test]
    fn only_active_sessions_cancel() {
        let mut session = active();
        session.ensure_can_cancel().unwrap();
        session.finish(0).unwrap();
        assert!(session.ensure_can_cancel().is_err());
    }

    #[test]
    fn manager_review_without_first_line_is_invalid() {
        let mut session = active();
        session.status = SessionStatus::Verified;
        session.manager_review.reviewer_id = Some(3);
        assert_matches!(session.validate_review_order(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn location_kind_parsing() {
        assert_eq!(LocationKind::parse("Site").unwrap(), LocationKind::Site);
        assert_eq!(LocationKind::parse("dept").unwrap(), LocationKind::Department);
        assert!(LocationKind::parse("room").is_err());
    }
}
