//! Buddy pairing between two children riding the same bus.

use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        buddy::{buddy_link_key, ordered_pair, BuddyLink, BuddyStatus},
        Session,
    },
    repositories::buddies,
    services::access,
    store::{DocumentStore, StoreError},
    utils::time::now_ms,
};

pub const SAME_CHILD: &str = "A child cannot be their own buddy.";
pub const NOT_ON_BUS: &str = "Both children must be approved on this bus.";
pub const LINK_EXISTS: &str = "These children already have an active buddy link.";
pub const LINK_NOT_FOUND: &str = "Buddy link not found";
pub const NOT_PENDING: &str = "Buddy request is no longer pending.";
pub const ALREADY_CLOSED: &str = "Buddy link is already closed.";

/// New pending link for the pair, unless an active one already exists.
pub fn next_buddy_request(
    current: Option<&BuddyLink>,
    bus_id: &str,
    child_uid: &str,
    buddy_uid: &str,
    requested_by: &str,
    now_ms: i64,
) -> Result<BuddyLink, StoreError> {
    if current.is_some_and(|link| link.status.is_active()) {
        return Err(StoreError::Aborted(LINK_EXISTS.into()));
    }
    let (child_a, child_b) = ordered_pair(child_uid, buddy_uid);
    Ok(BuddyLink {
        link_id: buddy_link_key(bus_id, child_uid, buddy_uid),
        bus_id: bus_id.to_string(),
        child_a: child_a.to_string(),
        child_b: child_b.to_string(),
        requester_child_uid: child_uid.to_string(),
        requested_by: requested_by.to_string(),
        status: BuddyStatus::Pending,
        responded_by: None,
        created_at_ms: current.map_or(now_ms, |link| link.created_at_ms),
        updated_at_ms: now_ms,
    })
}

#[derive(Clone)]
pub struct BuddyService {
    store: Arc<dyn DocumentStore>,
}

impl BuddyService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn request(
        &self,
        bus_id: &str,
        child_uid: &str,
        buddy_uid: &str,
        requested_by: &str,
        now_ms: i64,
    ) -> Result<BuddyLink, AppError> {
        if child_uid == buddy_uid {
            return Err(AppError::BadRequest(SAME_CHILD.into()));
        }
        let store = self.store.as_ref();
        let (own, other) = tokio::try_join!(
            access::approved_link(store, bus_id, child_uid),
            access::approved_link(store, bus_id, buddy_uid)
        )?;
        if own.is_none() || other.is_none() {
            return Err(AppError::BadRequest(NOT_ON_BUS.into()));
        }

        let link_id = buddy_link_key(bus_id, child_uid, buddy_uid);
        let (bus, child, buddy, by) = (
            bus_id.to_string(),
            child_uid.to_string(),
            buddy_uid.to_string(),
            requested_by.to_string(),
        );
        let link = buddies::update_link(store, &link_id, move |current| {
            next_buddy_request(current.as_ref(), &bus, &child, &buddy, &by, now_ms).map(Some)
        })
        .await?
        .ok_or_else(|| AppError::NotFound(LINK_NOT_FOUND.into()))?;
        tracing::info!(bus_id, link_id = %link.link_id, "buddy request created");
        Ok(link)
    }

    pub async fn request_as(
        &self,
        caller: &Session,
        bus_id: &str,
        child_uid: &str,
        buddy_uid: &str,
    ) -> Result<BuddyLink, AppError> {
        let store = self.store.as_ref();
        access::load_bus(store, bus_id).await?;
        access::require_guardian_of(store, caller, child_uid).await?;
        self.request(bus_id, child_uid, buddy_uid, &caller.uid, now_ms())
            .await
    }

    /// Confirms or declines a pending link. Only the invited side may answer.
    pub async fn respond_as(
        &self,
        caller: &Session,
        link_id: &str,
        accept: bool,
    ) -> Result<BuddyLink, AppError> {
        let store = self.store.as_ref();
        let link = self.load(link_id).await?;
        access::require_guardian_of(store, caller, link.invited_child()).await?;

        let responder = caller.uid.clone();
        let now = now_ms();
        let link = buddies::update_link(store, link_id, move |current| {
            let Some(mut link) = current else {
                return Ok(None);
            };
            if link.status != BuddyStatus::Pending {
                return Err(StoreError::Aborted(NOT_PENDING.into()));
            }
            link.status = if accept {
                BuddyStatus::Confirmed
            } else {
                BuddyStatus::Declined
            };
            link.responded_by = Some(responder);
            link.updated_at_ms = now;
            Ok(Some(link))
        })
        .await?
        .ok_or_else(|| AppError::NotFound(LINK_NOT_FOUND.into()))?;
        tracing::info!(link_id, status = ?link.status, "buddy request answered");
        Ok(link)
    }

    pub async fn cancel_as(&self, caller: &Session, link_id: &str) -> Result<BuddyLink, AppError> {
        let store = self.store.as_ref();
        let link = self.load(link_id).await?;
        let (a, b) = tokio::try_join!(
            access::is_guardian_of(store, caller, &link.child_a),
            access::is_guardian_of(store, caller, &link.child_b)
        )?;
        if !a && !b {
            return Err(AppError::Forbidden(access::NOT_GUARDIAN.into()));
        }

        let now = now_ms();
        let link = buddies::update_link(store, link_id, move |current| {
            let Some(mut link) = current else {
                return Ok(None);
            };
            if !link.status.is_active() {
                return Err(StoreError::Aborted(ALREADY_CLOSED.into()));
            }
            link.status = BuddyStatus::Cancelled;
            link.updated_at_ms = now;
            Ok(Some(link))
        })
        .await?
        .ok_or_else(|| AppError::NotFound(LINK_NOT_FOUND.into()))?;
        tracing::info!(link_id, "buddy link cancelled");
        Ok(link)
    }

    /// Pending and confirmed links involving the child.
    pub async fn list_for_child_as(
        &self,
        caller: &Session,
        child_uid: &str,
    ) -> Result<Vec<BuddyLink>, AppError> {
        let store = self.store.as_ref();
        access::require_guardian_of(store, caller, child_uid).await?;
        let links = buddies::list_for_child(store, child_uid).await?;
        Ok(links
            .into_iter()
            .filter(|link| link.status.is_active())
            .collect())
    }

    async fn load(&self, link_id: &str) -> Result<BuddyLink, AppError> {
        buddies::find_link(self.store.as_ref(), link_id)
            .await?
            .ok_or_else(|| AppError::NotFound(LINK_NOT_FOUND.into()))
    }
}
