use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::LostFoundItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Lost,
    Found,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Open,
    Claimed,
    Resolved,
}

/// Lost or found item stored at `lostFound/{itemId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LostFoundItem {
    pub item_id: LostFoundItemId,
    pub kind: ItemKind,
    pub bus_id: String,
    pub reporter_uid: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub status: ItemStatus,
    #[serde(default)]
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub resolved_at_ms: Option<i64>,
    /// Set on resolution; the item disappears from listings afterwards.
    #[serde(default)]
    pub expires_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl LostFoundItem {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_some_and(|expires| expires <= now_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportItemPayload {
    pub kind: ItemKind,
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: Option<String>,
    #[validate(url)]
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(expires_at_ms: Option<i64>) -> LostFoundItem {
        LostFoundItem {
            item_id: LostFoundItemId::new(),
            kind: ItemKind::Found,
            bus_id: "B1".into(),
            reporter_uid: "D1".into(),
            title: "Blue backpack".into(),
            description: None,
            photo_url: None,
            status: ItemStatus::Resolved,
            claimed_by: None,
            resolved_at_ms: Some(1_000),
            expires_at_ms,
            created_at_ms: 0,
            updated_at_ms: 1_000,
        }
    }

    #[test]
    fn expiry_is_inclusive_of_deadline() {
        let item = item(Some(5_000));
        assert!(!item.is_expired(4_999));
        assert!(item.is_expired(5_000));
    }

    #[test]
    fn unresolved_items_never_expire() {
        assert!(!item(None).is_expired(i64::MAX));
    }
}
