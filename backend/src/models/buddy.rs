use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuddyStatus {
    Pending,
    Confirmed,
    Declined,
    Cancelled,
}

impl BuddyStatus {
    /// Pending and confirmed links block a new request for the same pair.
    pub fn is_active(self) -> bool {
        matches!(self, BuddyStatus::Pending | BuddyStatus::Confirmed)
    }
}

/// Pairing of two children on the same bus, stored at
/// `buddyLinks/{busId}_{childA}_{childB}` with `childA < childB`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuddyLink {
    pub link_id: String,
    pub bus_id: String,
    pub child_a: String,
    pub child_b: String,
    pub requester_child_uid: String,
    pub requested_by: String,
    pub status: BuddyStatus,
    #[serde(default)]
    pub responded_by: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl BuddyLink {
    /// The child that has to confirm a pending request.
    pub fn invited_child(&self) -> &str {
        if self.requester_child_uid == self.child_a {
            &self.child_b
        } else {
            &self.child_a
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuddyRequestPayload {
    pub child_uid: String,
    pub buddy_uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuddyRespondPayload {
    pub accept: bool,
}

/// Order-independent pair key so A→B and B→A resolve to one document.
pub fn buddy_link_key(bus_id: &str, first: &str, second: &str) -> String {
    let (a, b) = ordered_pair(first, second);
    format!("{bus_id}_{a}_{b}")
}

pub fn ordered_pair<'a>(first: &'a str, second: &'a str) -> (&'a str, &'a str) {
    if first <= second {
        (first, second)
    } else {
        (second, first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_key_ignores_argument_order() {
        assert_eq!(buddy_link_key("B1", "C2", "C1"), buddy_link_key("B1", "C1", "C2"));
        assert_eq!(buddy_link_key("B1", "C2", "C1"), "B1_C1_C2");
    }

    #[test]
    fn invited_child_is_the_non_requester() {
        let link = BuddyLink {
            link_id: "B1_C1_C2".into(),
            bus_id: "B1".into(),
            child_a: "C1".into(),
            child_b: "C2".into(),
            requester_child_uid: "C2".into(),
            requested_by: "P2".into(),
            status: BuddyStatus::Pending,
            responded_by: None,
            created_at_ms: 0,
            updated_at_ms: 0,
        };
        assert_eq!(link.invited_child(), "C1");
    }
}
