//! Typed parameters for each service method.
//!
//! Every method receives a flat JSON object. It is deserialized into the
//! struct below and `validate()`d before anything reaches the core, so the
//! sync and conflict APIs only ever see well-typed arguments.

use crate::error::{Result, ServiceError};
use core_sync::{ConflictFilter, ConflictStatus, ConflictType, ResolutionStrategy, SyncType};
use serde::Deserialize;

fn required<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::missing_param(name));
    }
    Ok(value)
}

/// `sync_library`
#[derive(Debug, Clone, Deserialize)]
pub struct SyncLibraryParams {
    pub user_id: String,
    /// `full` or `incremental`, incremental when omitted
    #[serde(default)]
    pub sync_type: Option<String>,
}

impl SyncLibraryParams {
    pub fn validate(&self) -> Result<(&str, SyncType)> {
        let user_id = required("user_id", &self.user_id)?;
        let sync_type = match self.sync_type.as_deref() {
            None => SyncType::Incremental,
            Some(raw) => raw.parse()?,
        };
        Ok((user_id, sync_type))
    }
}

/// `get_sync_progress`, `get_sync_history` and `cancel_sync`
#[derive(Debug, Clone, Deserialize)]
pub struct UserParams {
    pub user_id: String,
}

impl UserParams {
    pub fn validate(&self) -> Result<&str> {
        required("user_id", &self.user_id)
    }
}

/// Methods that take no parameters. Extra keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoParams {}

/// `get_conflicts`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetConflictsParams {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conflict_type: Option<String>,
}

impl GetConflictsParams {
    pub fn validate(&self) -> Result<ConflictFilter> {
        let mut filter = ConflictFilter::default();
        if let Some(user_id) = &self.user_id {
            filter = filter.with_user(required("user_id", user_id)?);
        }
        if let Some(status) = &self.status {
            filter = filter.with_status(status.parse::<ConflictStatus>()?);
        }
        if let Some(conflict_type) = &self.conflict_type {
            filter = filter.with_type(conflict_type.parse::<ConflictType>()?);
        }
        Ok(filter)
    }
}

/// `resolve_conflict`
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveConflictParams {
    pub conflict_id: String,
    pub strategy: String,
    pub resolved_by: String,
}

impl ResolveConflictParams {
    pub fn validate(&self) -> Result<(&str, ResolutionStrategy, &str)> {
        let conflict_id = required("conflict_id", &self.conflict_id)?;
        let strategy = required("strategy", &self.strategy)?.parse()?;
        let resolved_by = required("resolved_by", &self.resolved_by)?;
        Ok((conflict_id, strategy, resolved_by))
    }
}

/// `ignore_conflict`
#[derive(Debug, Clone, Deserialize)]
pub struct IgnoreConflictParams {
    pub conflict_id: String,
    pub resolved_by: String,
}

impl IgnoreConflictParams {
    pub fn validate(&self) -> Result<(&str, &str)> {
        Ok((
            required("conflict_id", &self.conflict_id)?,
            required("resolved_by", &self.resolved_by)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use serde_json::json;

    #[test]
    fn test_sync_type_defaults_to_incremental() {
        let params: SyncLibraryParams = serde_json::from_value(json!({ "user_id": "u1" })).unwrap();
        let (user_id, sync_type) = params.validate().unwrap();
        assert_eq!(user_id, "u1");
        assert_eq!(sync_type, SyncType::Incremental);
    }

    #[test]
    fn test_unknown_sync_type_is_rejected() {
        let params: SyncLibraryParams =
            serde_json::from_value(json!({ "user_id": "u1", "sync_type": "Full" })).unwrap();
        let err = params.validate().unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert!(err.message.contains("Full"));
    }

    #[test]
    fn test_blank_user_id_is_missing() {
        let params = UserParams {
            user_id: "   ".to_string(),
        };
        let err = params.validate().unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert_eq!(err.message, "Missing required parameter: user_id");
    }

    #[test]
    fn test_conflict_filters() {
        let params: GetConflictsParams = serde_json::from_value(json!({
            "status": "open",
            "conflict_type": "deleted-remotely"
        }))
        .unwrap();
        let filter = params.validate().unwrap();
        assert_eq!(filter.user_id, None);
        assert_eq!(filter.status, Some(ConflictStatus::Open));
        assert_eq!(filter.conflict_type, Some(ConflictType::DeletedRemotely));

        let params = GetConflictsParams {
            status: Some("closed".to_string()),
            ..Default::default()
        };
        assert_eq!(params.validate().unwrap_err().code, codes::INVALID_PARAMS);
    }

    #[test]
    fn test_resolve_params() {
        let params: ResolveConflictParams = serde_json::from_value(json!({
            "conflict_id": "c1",
            "strategy": "keep-remote",
            "resolved_by": "alice"
        }))
        .unwrap();
        let (id, strategy, by) = params.validate().unwrap();
        assert_eq!(id, "c1");
        assert_eq!(strategy, ResolutionStrategy::KeepRemote);
        assert_eq!(by, "alice");

        let params = ResolveConflictParams {
            strategy: "newest".to_string(),
            ..params
        };
        assert_eq!(params.validate().unwrap_err().code, codes::INVALID_PARAMS);
    }
}
