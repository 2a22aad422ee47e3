//! Conflict records
//!
//! A conflict is one field of one game on which the local library and the
//! remote catalog disagree in a way the merge engine refuses to settle on
//! its own. Conflicts only move forward: `open → resolved` or
//! `open → ignored`.

use crate::{Result, SyncError};
use core_library::{FieldValue, GameField};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(Uuid);

impl ConflictId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a conflict ID; anything that is not a UUID cannot name a
    /// conflict, so it is reported as not found.
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SyncError::ConflictNotFound {
                conflict_id: s.to_string(),
            })
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of record a conflict points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum EntityType {
    Game,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    /// Both sides changed a field since the last sync
    ValueMismatch,
    /// A game seen at a previous sync is gone from the remote manifest
    DeletedRemotely,
    /// A game that exists only locally and was never seen remotely
    NewLocally,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::ValueMismatch => "value-mismatch",
            ConflictType::DeletedRemotely => "deleted-remotely",
            ConflictType::NewLocally => "new-locally",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "value-mismatch" => Ok(ConflictType::ValueMismatch),
            "deleted-remotely" => Ok(ConflictType::DeletedRemotely),
            "new-locally" => Ok(ConflictType::NewLocally),
            _ => Err(SyncError::InvalidInput {
                field: "type".to_string(),
                message: format!("unknown conflict type '{}'", s),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStatus {
    Open,
    Resolved,
    Ignored,
}

impl ConflictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::Open => "open",
            ConflictStatus::Resolved => "resolved",
            ConflictStatus::Ignored => "ignored",
        }
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(ConflictStatus::Open),
            "resolved" => Ok(ConflictStatus::Resolved),
            "ignored" => Ok(ConflictStatus::Ignored),
            _ => Err(SyncError::InvalidInput {
                field: "status".to_string(),
                message: format!("unknown conflict status '{}'", s),
            }),
        }
    }
}

/// How a conflict is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Local value stands
    KeepLocal,
    /// Local value is overwritten with the remote one
    KeepRemote,
    /// Numeric fields take the larger value, others take the remote one
    Merge,
}

impl ResolutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStrategy::KeepLocal => "keep-local",
            ResolutionStrategy::KeepRemote => "keep-remote",
            ResolutionStrategy::Merge => "merge",
        }
    }

    /// Strategy applied by automatic resolution
    pub fn default_for(conflict_type: ConflictType) -> Self {
        match conflict_type {
            ConflictType::ValueMismatch => ResolutionStrategy::KeepRemote,
            ConflictType::DeletedRemotely => ResolutionStrategy::KeepLocal,
            ConflictType::NewLocally => ResolutionStrategy::KeepLocal,
        }
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keep-local" => Ok(ResolutionStrategy::KeepLocal),
            "keep-remote" => Ok(ResolutionStrategy::KeepRemote),
            "merge" => Ok(ResolutionStrategy::Merge),
            _ => Err(SyncError::InvalidStrategy(s.to_string())),
        }
    }
}

/// Who closed a conflict, how and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// `None` for ignored conflicts
    pub strategy: Option<ResolutionStrategy>,
    pub resolved_by: String,
    pub resolved_at: i64,
}

/// A conflict as produced by the merge engine, before it is registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConflict {
    pub user_id: String,
    pub entity_id: String,
    pub app_id: i64,
    pub field: GameField,
    pub local_value: FieldValue,
    pub remote_value: FieldValue,
    pub conflict_type: ConflictType,
}

impl NewConflict {
    fn same_subject(&self, conflict: &Conflict) -> bool {
        conflict.user_id == self.user_id
            && conflict.entity_id == self.entity_id
            && conflict.field == self.field
            && conflict.conflict_type == self.conflict_type
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: ConflictId,
    pub user_id: String,
    pub entity_type: EntityType,
    /// Local game id
    pub entity_id: String,
    pub app_id: i64,
    pub field: GameField,
    pub local_value: FieldValue,
    pub remote_value: FieldValue,
    pub conflict_type: ConflictType,
    pub status: ConflictStatus,
    pub detected_at: i64,
    pub resolution: Option<Resolution>,
}

impl Conflict {
    pub fn open(new: NewConflict, detected_at: i64) -> Self {
        Self {
            id: ConflictId::new(),
            user_id: new.user_id,
            entity_type: EntityType::Game,
            entity_id: new.entity_id,
            app_id: new.app_id,
            field: new.field,
            local_value: new.local_value,
            remote_value: new.remote_value,
            conflict_type: new.conflict_type,
            status: ConflictStatus::Open,
            detected_at,
            resolution: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ConflictStatus::Open
    }

    /// Whether the user already settled this exact disagreement in favour of
    /// the local side, so raising it again would only repeat the question.
    pub(crate) fn settles(&self, new: &NewConflict) -> bool {
        if self.is_open() || !new.same_subject(self) || self.remote_value != new.remote_value {
            return false;
        }
        match &self.resolution {
            Some(resolution) => resolution.strategy != Some(ResolutionStrategy::KeepRemote),
            None => false,
        }
    }

    pub(crate) fn matches_open(&self, new: &NewConflict) -> bool {
        self.is_open() && new.same_subject(self)
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.is_open() {
            return Err(SyncError::AlreadyResolved {
                conflict_id: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    pub fn resolve(
        &mut self,
        strategy: ResolutionStrategy,
        resolved_by: impl Into<String>,
        now: i64,
    ) -> Result<()> {
        self.ensure_open()?;
        self.status = ConflictStatus::Resolved;
        self.resolution = Some(Resolution {
            strategy: Some(strategy),
            resolved_by: resolved_by.into(),
            resolved_at: now,
        });
        Ok(())
    }

    pub fn ignore(&mut self, resolved_by: impl Into<String>, now: i64) -> Result<()> {
        self.ensure_open()?;
        self.status = ConflictStatus::Ignored;
        self.resolution = Some(Resolution {
            strategy: None,
            resolved_by: resolved_by.into(),
            resolved_at: now,
        });
        Ok(())
    }
}
