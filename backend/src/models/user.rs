use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::location::GeoPoint;

pub const UNNAMED: &str = "Unnamed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Parent,
    Child,
    Driver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Parent => "parent",
            Role::Child => "child",
            Role::Driver => "driver",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parent" => Ok(Role::Parent),
            "child" | "student" => Ok(Role::Child),
            "driver" => Ok(Role::Driver),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Authoritative user profile stored at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    pub uid: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_location: Option<GeoPoint>,
    /// Set on child profiles to the uid of the responsible parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uid: Option<String>,
    #[serde(default)]
    pub created_at_ms: i64,
    #[serde(default)]
    pub updated_at_ms: i64,
}

impl UserDoc {
    pub fn display_name(&self) -> String {
        resolve_display_name(
            self.full_name.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        )
    }

    pub fn is_parent_of(&self, parent_uid: &str) -> bool {
        self.parent_uid.as_deref() == Some(parent_uid)
    }
}

/// Resolves the name shown for a user: `fullName`, then `firstName lastName`
/// (either part alone is enough), then [`UNNAMED`]. Blank values count as
/// missing.
pub fn resolve_display_name(
    full_name: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> String {
    if let Some(full) = full_name.map(str::trim).filter(|s| !s.is_empty()) {
        return full.to_string();
    }
    let parts: Vec<&str> = [first_name, last_name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        UNNAMED.to_string()
    } else {
        parts.join(" ")
    }
}

/// Profile fields a user may set on their own document. Absent fields are
/// left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePayload {
    #[validate(length(max = 120))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[validate(length(max = 60))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[validate(length(max = 60))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[validate(email)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[validate(length(max = 300))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[validate(nested)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_location: Option<GeoPoint>,
    #[validate(nested)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uid: Option<String>,
}
