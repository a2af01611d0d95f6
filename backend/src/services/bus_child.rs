//! Bus membership requests.
//!
//! A child (or their parent) asks to join a bus; the driver decides. The
//! link document doubles as the lock: every transition is a transactional
//! read-modify-write on `busChildren/{busId}_{childUid}`.

use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        bus_child::{BusChild, BusChildStatus},
        Session,
    },
    repositories::bus_children,
    services::access,
    store::{DocumentStore, StoreError},
    utils::time::now_ms,
};

pub const REQUEST_PENDING: &str = "A request is already pending.";
pub const ALREADY_ON_BUS: &str = "Child is already on this bus.";
pub const LINK_NOT_FOUND: &str = "Join request not found";

/// Decides the record written by a join request given the current link.
pub fn next_join_request(
    current: Option<&BusChild>,
    bus_id: &str,
    child_uid: &str,
    requested_by: &str,
    now_ms: i64,
) -> Result<BusChild, StoreError> {
    match current.map(|link| link.status) {
        Some(BusChildStatus::Pending) => Err(StoreError::Aborted(REQUEST_PENDING.into())),
        Some(BusChildStatus::Approved) => Err(StoreError::Aborted(ALREADY_ON_BUS.into())),
        Some(BusChildStatus::Rejected) | Some(BusChildStatus::Removed) | None => {
            Ok(BusChild::pending(bus_id, child_uid, requested_by, now_ms))
        }
    }
}

/// Driver decision on an existing link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
    Remove,
}

impl Decision {
    fn required_status(self) -> BusChildStatus {
        match self {
            Decision::Approve | Decision::Reject => BusChildStatus::Pending,
            Decision::Remove => BusChildStatus::Approved,
        }
    }

    fn target_status(self) -> BusChildStatus {
        match self {
            Decision::Approve => BusChildStatus::Approved,
            Decision::Reject => BusChildStatus::Rejected,
            Decision::Remove => BusChildStatus::Removed,
        }
    }
}

pub fn apply_decision(
    mut link: BusChild,
    decision: Decision,
    driver_uid: &str,
    now_ms: i64,
) -> Result<BusChild, StoreError> {
    if link.status != decision.required_status() {
        return Err(StoreError::Aborted(format!(
            "Cannot {} a request that is {}.",
            match decision {
                Decision::Approve => "approve",
                Decision::Reject => "reject",
                Decision::Remove => "remove",
            },
            link.status.as_str()
        )));
    }
    link.status = decision.target_status();
    link.decided_at_ms = Some(now_ms);
    link.decided_by = Some(driver_uid.to_string());
    Ok(link)
}

#[derive(Clone)]
pub struct BusChildService {
    store: Arc<dyn DocumentStore>,
}

impl BusChildService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn request_join(
        &self,
        bus_id: &str,
        child_uid: &str,
        requested_by: &str,
        now_ms: i64,
    ) -> Result<BusChild, AppError> {
        let (bus, child, by) = (
            bus_id.to_string(),
            child_uid.to_string(),
            requested_by.to_string(),
        );
        let link = bus_children::update_link(self.store.as_ref(), bus_id, child_uid, move |current| {
            next_join_request(current.as_ref(), &bus, &child, &by, now_ms).map(Some)
        })
        .await?;
        tracing::info!(bus_id, child_uid, requested_by, "join request created");
        link.ok_or_else(|| AppError::NotFound(LINK_NOT_FOUND.into()))
    }

    pub async fn request_join_as(
        &self,
        caller: &Session,
        bus_id: &str,
        child_uid: &str,
    ) -> Result<BusChild, AppError> {
        let store = self.store.as_ref();
        access::load_bus(store, bus_id).await?;
        access::require_guardian_of(store, caller, child_uid).await?;
        self.request_join(bus_id, child_uid, &caller.uid, now_ms())
            .await
    }

    pub async fn decide(
        &self,
        bus_id: &str,
        child_uid: &str,
        decision: Decision,
        driver_uid: &str,
        now_ms: i64,
    ) -> Result<BusChild, AppError> {
        let driver = driver_uid.to_string();
        let link = bus_children::update_link(self.store.as_ref(), bus_id, child_uid, move |current| {
            let Some(link) = current else {
                return Ok(None);
            };
            apply_decision(link, decision, &driver, now_ms).map(Some)
        })
        .await?
        .ok_or_else(|| AppError::NotFound(LINK_NOT_FOUND.into()))?;
        tracing::info!(bus_id, child_uid, ?decision, "join request decided");
        Ok(link)
    }

    pub async fn decide_as(
        &self,
        caller: &Session,
        bus_id: &str,
        child_uid: &str,
        decision: Decision,
    ) -> Result<BusChild, AppError> {
        let bus = access::load_bus(self.store.as_ref(), bus_id).await?;
        access::require_driver_of(caller, &bus)?;
        self.decide(bus_id, child_uid, decision, &caller.uid, now_ms())
            .await
    }

    pub async fn list_for_bus_as(
        &self,
        caller: &Session,
        bus_id: &str,
        status: Option<BusChildStatus>,
    ) -> Result<Vec<BusChild>, AppError> {
        let store = self.store.as_ref();
        let bus = access::load_bus(store, bus_id).await?;
        access::require_driver_of(caller, &bus)?;
        Ok(bus_children::list_for_bus(store, bus_id, status).await?)
    }

    pub async fn list_for_child_as(
        &self,
        caller: &Session,
        child_uid: &str,
    ) -> Result<Vec<BusChild>, AppError> {
        let store = self.store.as_ref();
        access::require_guardian_of(store, caller, child_uid).await?;
        Ok(bus_children::list_for_child(store, child_uid).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(status: BusChildStatus) -> BusChild {
        let mut link = BusChild::pending("B1", "C1", "P1", 10);
        link.status = status;
        link
    }

    #[test]
    fn join_request_from_nothing_is_pending() {
        let next = next_join_request(None, "B1", "C1", "P1", 5).unwrap();
        assert_eq!(next.status, BusChildStatus::Pending);
        assert_eq!(next.requested_by, "P1");
        assert_eq!(next.requested_at_ms, 5);
    }

    #[test]
    fn join_request_rejects_pending_and_approved() {
        let err = next_join_request(Some(&link(BusChildStatus::Pending)), "B1", "C1", "P1", 5)
            .unwrap_err();
        assert!(matches!(err, StoreError::Aborted(msg) if msg == REQUEST_PENDING));

        let err = next_join_request(Some(&link(BusChildStatus::Approved)), "B1", "C1", "P1", 5)
            .unwrap_err();
        assert!(matches!(err, StoreError::Aborted(msg) if msg == ALREADY_ON_BUS));
    }

    #[test]
    fn join_request_reopens_rejected_and_removed_links() {
        for status in [BusChildStatus::Rejected, BusChildStatus::Removed] {
            let next = next_join_request(Some(&link(status)), "B1", "C1", "P2", 99).unwrap();
            assert_eq!(next.status, BusChildStatus::Pending);
            assert_eq!(next.requested_by, "P2");
            assert!(next.decided_at_ms.is_none());
        }
    }

    #[test]
    fn decisions_only_apply_from_their_source_status() {
        let approved =
            apply_decision(link(BusChildStatus::Pending), Decision::Approve, "D1", 20)
                .unwrap();
        assert_eq!(approved.status, BusChildStatus::Approved);
        assert_eq!(approved.decided_by.as_deref(), Some("D1"));

        assert!(
            apply_decision(link(BusChildStatus::Approved), Decision::Reject, "D1", 20)
                .is_err()
        );
        assert!(
            apply_decision(link(BusChildStatus::Pending), Decision::Remove, "D1", 20)
                .is_err()
        );
        let removed =
            apply_decision(approved, Decision::Remove, "D1", 30).unwrap();
        assert_eq!(removed.status, BusChildStatus::Removed);
    }

    #[tokio::test]
    async fn deciding_a_missing_link_is_not_found() {
        let service = BusChildService::new(Arc::new(crate::store::MemoryStore::new()));
        let err = service
            .decide("B1", "C9", Decision::Approve, "D1", 20)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == LINK_NOT_FOUND));
    }
}
