//! Security role records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Resource name -> allowed actions, persisted as JSON.
pub type Permissions = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    /// Built-in role seeded by the platform.
    System,
    Organization,
}

impl RoleType {
    pub fn as_db(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Organization => "organization",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "organization" => Some(Self::Organization),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSecurityRole {
    pub name: String,
    pub description: Option<String>,
    pub role_type: RoleType,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRole {
    pub uuid: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub role_type: RoleType,
    pub permissions: Permissions,
}

/// Full permission grid given to the seeded system roles.
pub fn full_permissions() -> Permissions {
    let crud = ["create", "read", "update", "delete"];
    let with = |extra: &[&str]| -> Vec<String> {
        crud.iter()
            .chain(extra.iter())
            .map(|action| action.to_string())
            .collect()
    };

    let mut permissions = Permissions::new();
    permissions.insert("agents".to_string(), with(&["execute"]));
    permissions.insert("llms".to_string(), with(&["configure"]));
    permissions.insert("mcp-tools".to_string(), with(&["configure"]));
    permissions.insert("rag".to_string(), with(&["configure"]));
    permissions.insert("workflows".to_string(), with(&["deploy"]));
    permissions.insert("rest-apis".to_string(), with(&[]));
    permissions.insert(
        "metrics".to_string(),
        vec!["read".to_string(), "configure".to_string()],
    );
    permissions.insert("roles".to_string(), with(&[]));
    permissions
}
