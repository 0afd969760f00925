//! Course modules with scheduled lab sessions.

use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RelabError, Result};

/// Unique identifier for a course module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(pub Uuid);

impl ModuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ModuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl Deref for ModuleId {
    type Target = Uuid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Uuid> for ModuleId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A course module offering lab sessions students may ask to reschedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabModule {
    pub id: ModuleId,
    pub module_code: String,
    pub module_name: String,
    pub department: String,
    pub semester: i32,
    /// Display name of the coordinating staff member.
    pub coordinator: String,
    /// Human-readable session descriptions, e.g. "Week 4 - Circuits Lab".
    #[serde(default)]
    pub lab_sessions: Vec<String>,
    /// Inactive modules refuse new reschedule requests.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload for a module.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewModule {
    pub module_code: String,
    pub module_name: String,
    pub department: String,
    pub semester: i32,
    pub coordinator: String,
    #[serde(default)]
    pub lab_sessions: Vec<String>,
    /// New modules default to active.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewModule {
    pub fn into_module(self, now: DateTime<Utc>) -> Result<LabModule> {
        if self.module_code.trim().is_empty() {
            return Err(RelabError::Validation("moduleCode is required".to_string()));
        }
        if self.module_name.trim().is_empty() {
            return Err(RelabError::Validation("moduleName is required".to_string()));
        }
        Ok(LabModule {
            id: ModuleId::new(),
            module_code: self.module_code.trim().to_string(),
            module_name: self.module_name,
            department: self.department,
            semester: self.semester,
            coordinator: self.coordinator,
            lab_sessions: self.lab_sessions,
            active: self.active,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_module_defaults_to_active() {
        let payload: NewModule = serde_json::from_value(serde_json::json!({
            "moduleCode": "EE3350",
            "moduleName": "Electronics III",
            "department": "Electrical Engineering",
            "semester": 5,
            "coordinator": "Dr. Silva",
        }))
        .unwrap();
        let module = payload.into_module(Utc::now()).unwrap();
        assert!(module.active);
        assert!(module.lab_sessions.is_empty());
    }

    #[test]
    fn blank_code_is_rejected() {
        let payload = NewModule {
            module_code: " ".to_string(),
            module_name: "Electronics III".to_string(),
            department: "EE".to_string(),
            semester: 5,
            coordinator: "Dr. Silva".to_string(),
            lab_sessions: vec![],
            active: true,
        };
        assert!(payload.into_module(Utc::now()).is_err());
    }
}
