//! Lost & found board per bus.
//!
//! Resolved items stay listed until `expiresAtMs` and are then removed by
//! [`LostFoundService::purge_expired`], which the `lost_found_cleanup`
//! binary runs on a schedule.

use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        lost_found::{ItemKind, ItemStatus, LostFoundItem, ReportItemPayload},
        Session,
    },
    repositories::lost_found,
    services::access,
    store::{DocumentStore, StoreError},
    types::LostFoundItemId,
    utils::time::now_ms,
};

pub const ITEM_NOT_FOUND: &str = "Item not found";
pub const FOUND_BY_DRIVER_ONLY: &str = "Only the bus driver can report found items.";
pub const LOST_BY_RIDERS_ONLY: &str = "Lost items are reported by parents or children.";
pub const NOT_OPEN: &str = "Item is not open.";
pub const ALREADY_RESOLVED: &str = "Item is already resolved.";
pub const NOT_REPORTER: &str = "Only the reporter or the driver can resolve this item.";

/// Listing for a bus at `now_ms`: expired items dropped, newest first.
pub fn visible_items(mut items: Vec<LostFoundItem>, now_ms: i64) -> Vec<LostFoundItem> {
    items.retain(|item| !item.is_expired(now_ms));
    items.sort_by(|a, b| {
        b.created_at_ms
            .cmp(&a.created_at_ms)
            .then_with(|| a.item_id.to_string().cmp(&b.item_id.to_string()))
    });
    items
}

#[derive(Clone)]
pub struct LostFoundService {
    store: Arc<dyn DocumentStore>,
    retention_ms: i64,
}

impl LostFoundService {
    pub fn new(store: Arc<dyn DocumentStore>, retention_ms: i64) -> Self {
        Self {
            store,
            retention_ms,
        }
    }

    pub async fn report(
        &self,
        bus_id: &str,
        reporter_uid: &str,
        payload: ReportItemPayload,
        now_ms: i64,
    ) -> Result<LostFoundItem, AppError> {
        let item = LostFoundItem {
            item_id: LostFoundItemId::new(),
            kind: payload.kind,
            bus_id: bus_id.to_string(),
            reporter_uid: reporter_uid.to_string(),
            title: payload.title.trim().to_string(),
            description: payload.description.filter(|d| !d.trim().is_empty()),
            photo_url: payload.photo_url,
            status: ItemStatus::Open,
            claimed_by: None,
            resolved_at_ms: None,
            expires_at_ms: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        };
        lost_found::insert_item(self.store.as_ref(), &item).await?;
        tracing::info!(bus_id, item_id = %item.item_id, kind = ?item.kind, "lost & found item reported");
        Ok(item)
    }

    pub async fn report_as(
        &self,
        caller: &Session,
        bus_id: &str,
        payload: ReportItemPayload,
    ) -> Result<LostFoundItem, AppError> {
        let store = self.store.as_ref();
        let bus = access::load_bus(store, bus_id).await?;
        match payload.kind {
            ItemKind::Found => access::require_driver_of(caller, &bus)
                .map_err(|_| AppError::Forbidden(FOUND_BY_DRIVER_ONLY.into()))?,
            ItemKind::Lost => {
                if caller.is_driver() {
                    return Err(AppError::Forbidden(LOST_BY_RIDERS_ONLY.into()));
                }
                access::require_member_of(store, caller, &bus).await?;
            }
        }
        self.report(bus_id, &caller.uid, payload, now_ms()).await
    }

    pub async fn claim_as(
        &self,
        caller: &Session,
        item_id: LostFoundItemId,
    ) -> Result<LostFoundItem, AppError> {
        let store = self.store.as_ref();
        let item = self.load(item_id).await?;
        let bus = access::load_bus(store, &item.bus_id).await?;
        access::require_member_of(store, caller, &bus).await?;

        let claimant = caller.uid.clone();
        let now = now_ms();
        let item = lost_found::update_item(store, item_id, move |current| {
            let Some(mut item) = current else {
                return Ok(None);
            };
            if item.status != ItemStatus::Open {
                return Err(StoreError::Aborted(NOT_OPEN.into()));
            }
            item.status = ItemStatus::Claimed;
            item.claimed_by = Some(claimant);
            item.updated_at_ms = now;
            Ok(Some(item))
        })
        .await?
        .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.into()))?;
        tracing::info!(item_id = %item.item_id, "lost & found item claimed");
        Ok(item)
    }

    pub async fn resolve(
        &self,
        item_id: LostFoundItemId,
        now_ms: i64,
    ) -> Result<LostFoundItem, AppError> {
        let retention_ms = self.retention_ms;
        let item = lost_found::update_item(self.store.as_ref(), item_id, move |current| {
            let Some(mut item) = current else {
                return Ok(None);
            };
            if item.status == ItemStatus::Resolved {
                return Err(StoreError::Aborted(ALREADY_RESOLVED.into()));
            }
            item.status = ItemStatus::Resolved;
            item.resolved_at_ms = Some(now_ms);
            item.expires_at_ms = Some(now_ms + retention_ms);
            item.updated_at_ms = now_ms;
            Ok(Some(item))
        })
        .await?
        .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.into()))?;
        tracing::info!(item_id = %item.item_id, expires_at_ms = ?item.expires_at_ms, "lost & found item resolved");
        Ok(item)
    }

    pub async fn resolve_as(
        &self,
        caller: &Session,
        item_id: LostFoundItemId,
    ) -> Result<LostFoundItem, AppError> {
        let item = self.load(item_id).await?;
        if item.reporter_uid != caller.uid {
            let bus = access::load_bus(self.store.as_ref(), &item.bus_id).await?;
            access::require_driver_of(caller, &bus)
                .map_err(|_| AppError::Forbidden(NOT_REPORTER.into()))?;
        }
        self.resolve(item_id, now_ms()).await
    }

    pub async fn list(&self, bus_id: &str, now_ms: i64) -> Result<Vec<LostFoundItem>, AppError> {
        let items = lost_found::list_for_bus(self.store.as_ref(), bus_id).await?;
        Ok(visible_items(items, now_ms))
    }

    pub async fn list_as(
        &self,
        caller: &Session,
        bus_id: &str,
    ) -> Result<Vec<LostFoundItem>, AppError> {
        let store = self.store.as_ref();
        let bus = access::load_bus(store, bus_id).await?;
        access::require_member_of(store, caller, &bus).await?;
        self.list(bus_id, now_ms()).await
    }

    /// Deletes every resolved item whose retention has passed.
    pub async fn purge_expired(&self, now_ms: i64) -> Result<usize, StoreError> {
        let store = self.store.as_ref();
        let expired = lost_found::list_expired(store, now_ms).await?;
        for item in &expired {
            lost_found::delete_item(store, item.item_id).await?;
        }
        if !expired.is_empty() {
            tracing::info!(deleted = expired.len(), "purged expired lost & found items");
        }
        Ok(expired.len())
    }

    async fn load(&self, item_id: LostFoundItemId) -> Result<LostFoundItem, AppError> {
        lost_found::find_item(self.store.as_ref(), item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.into()))
    }
}
