//! Live location merge and push subscriptions.
//!
//! A bus publishes two independent records: the last location ping and the
//! driver's sharing switch. Observers see one merged, freshness-qualified
//! view recomputed from the latest pair on every change.

use std::{sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use crate::{
    error::AppError,
    models::{
        location::{
            LiveLocationView, LocationPing, LocationSource, PublishLocationPayload,
            SharingStatus,
        },
        Session,
    },
    repositories::locations,
    services::access,
    store::{DocumentStore, SnapshotResult, StoreError, Subscription},
    utils::time::now_ms,
};

/// A ping is live while it is at most this old and sharing is on.
pub const LIVE_WINDOW_MS: i64 = 60_000;

/// How often a subscription re-checks freshness without new data, so a
/// `live` view turns `stale` even when the driver goes quiet.
pub const REEVALUATE_INTERVAL: Duration = Duration::from_secs(5);

/// Newer of the server and client timestamps, or whichever one exists.
pub fn resolve_updated_at(server_ms: Option<i64>, client_ms: Option<i64>) -> Option<i64> {
    match (server_ms, client_ms) {
        (Some(server), Some(client)) => Some(server.max(client)),
        (server, client) => server.or(client),
    }
}

/// Merges the latest ping and sharing status into the parent-facing view.
/// Returns `None` only when both records are absent.
pub fn merge_live_location(
    ping: Option<&LocationPing>,
    sharing: Option<&SharingStatus>,
    now_ms: i64,
) -> Option<LiveLocationView> {
    if ping.is_none() && sharing.is_none() {
        return None;
    }

    let is_sharing = sharing.is_some_and(|status| status.is_sharing);
    let updated_at_ms =
        ping.and_then(|p| resolve_updated_at(p.server_updated_at_ms, p.client_updated_at_ms));

    let (source, last_ago_ms) = match updated_at_ms {
        None if is_sharing => (LocationSource::Stale, None),
        None => (LocationSource::None, None),
        Some(updated) => {
            let ago = now_ms - updated;
            let source = if is_sharing && ago <= LIVE_WINDOW_MS {
                LocationSource::Live
            } else {
                LocationSource::Stale
            };
            (source, Some(ago))
        }
    };

    Some(LiveLocationView {
        lat: ping.map(|p| p.lat),
        lng: ping.map(|p| p.lng),
        accuracy: ping.and_then(|p| p.accuracy),
        heading: ping.and_then(|p| p.heading),
        speed: ping.and_then(|p| p.speed),
        updated_at_ms,
        is_sharing,
        source,
        last_ago_ms,
    })
}

/// Handle to a running live-location subscription. Dropping it stops the
/// background task and releases both store subscriptions.
pub struct LiveLocationSubscription {
    receiver: watch::Receiver<Option<LiveLocationView>>,
    task: JoinHandle<()>,
}

impl LiveLocationSubscription {
    /// Latest merged view.
    pub fn current(&self) -> Option<LiveLocationView> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next emission. Returns `None` once the feed has ended.
    pub async fn changed(&mut self) -> Option<Option<LiveLocationView>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

impl Drop for LiveLocationSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Clone)]
pub struct LiveLocationService {
    store: Arc<dyn DocumentStore>,
}

impl LiveLocationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Stores a ping for the bus, stamping the server time.
    pub async fn publish_ping(
        &self,
        bus_id: &str,
        driver_uid: &str,
        payload: &PublishLocationPayload,
        now_ms: i64,
    ) -> Result<LocationPing, AppError> {
        let ping = LocationPing {
            lat: payload.lat,
            lng: payload.lng,
            accuracy: payload.accuracy,
            heading: payload.heading,
            speed: payload.speed,
            server_updated_at_ms: Some(now_ms),
            client_updated_at_ms: payload.client_updated_at_ms,
            driver_uid: Some(driver_uid.to_string()),
        };
        locations::write_ping(self.store.as_ref(), bus_id, &ping).await?;
        tracing::debug!(bus_id, lat = ping.lat, lng = ping.lng, "location ping stored");
        Ok(ping)
    }

    pub async fn publish_ping_as(
        &self,
        caller: &Session,
        bus_id: &str,
        payload: &PublishLocationPayload,
    ) -> Result<LocationPing, AppError> {
        let bus = access::load_bus(self.store.as_ref(), bus_id).await?;
        access::require_driver_of(caller, &bus)?;
        self.publish_ping(bus_id, &caller.uid, payload, now_ms()).await
    }

    pub async fn set_sharing(
        &self,
        bus_id: &str,
        is_sharing: bool,
        now_ms: i64,
    ) -> Result<SharingStatus, AppError> {
        let status = SharingStatus {
            is_sharing,
            updated_at_ms: Some(now_ms),
        };
        locations::write_sharing(self.store.as_ref(), bus_id, &status).await?;
        tracing::info!(bus_id, is_sharing, "location sharing switched");
        Ok(status)
    }

    pub async fn set_sharing_as(
        &self,
        caller: &Session,
        bus_id: &str,
        is_sharing: bool,
    ) -> Result<SharingStatus, AppError> {
        let bus = access::load_bus(self.store.as_ref(), bus_id).await?;
        access::require_driver_of(caller, &bus)?;
        self.set_sharing(bus_id, is_sharing, now_ms()).await
    }

    /// One-shot merged view. A failed read of either record counts as absent.
    pub async fn snapshot(&self, bus_id: &str, now_ms: i64) -> Option<LiveLocationView> {
        let store = self.store.as_ref();
        let (ping, sharing) = tokio::join!(
            locations::find_ping(store, bus_id),
            locations::find_sharing(store, bus_id)
        );
        let ping = absent_on_error(ping, bus_id, "location ping");
        let sharing = absent_on_error(sharing, bus_id, "sharing status");
        merge_live_location(ping.as_ref(), sharing.as_ref(), now_ms)
    }

    pub async fn snapshot_as(
        &self,
        caller: &Session,
        bus_id: &str,
    ) -> Result<Option<LiveLocationView>, AppError> {
        let bus = access::load_bus(self.store.as_ref(), bus_id).await?;
        access::require_member_of(self.store.as_ref(), caller, &bus).await?;
        Ok(self.snapshot(bus_id, now_ms()).await)
    }

    /// Starts a push subscription for the bus. The handle's current value
    /// is already the merged view of both feeds' initial state.
    pub async fn subscribe(&self, bus_id: &str) -> LiveLocationSubscription {
        let store = self.store.as_ref();
        let (ping_feed, sharing_feed) = tokio::join!(
            locations::watch_ping(store, bus_id),
            locations::watch_sharing(store, bus_id)
        );
        let mut ping_feed = feed_or_absent(ping_feed, bus_id, "ping");
        let mut sharing_feed = feed_or_absent(sharing_feed, bus_id, "sharing");

        let (ping, sharing) = tokio::join!(
            initial_record::<LocationPing>(&mut ping_feed, bus_id, "location ping"),
            initial_record::<SharingStatus>(&mut sharing_feed, bus_id, "sharing status")
        );
        let (tx, receiver) = watch::channel(merge_live_location(
            ping.as_ref(),
            sharing.as_ref(),
            now_ms(),
        ));
        let task = tokio::spawn(run_merge_loop(
            bus_id.to_string(),
            ping_feed,
            sharing_feed,
            ping,
            sharing,
            tx,
        ));

        LiveLocationSubscription { receiver, task }
    }

    pub async fn subscribe_as(
        &self,
        caller: &Session,
        bus_id: &str,
    ) -> Result<LiveLocationSubscription, AppError> {
        let bus = access::load_bus(self.store.as_ref(), bus_id).await?;
        access::require_member_of(self.store.as_ref(), caller, &bus).await?;
        Ok(self.subscribe(bus_id).await)
    }
}

async fn run_merge_loop(
    bus_id: String,
    mut ping_feed: Option<Subscription>,
    mut sharing_feed: Option<Subscription>,
    mut ping: Option<LocationPing>,
    mut sharing: Option<SharingStatus>,
    tx: watch::Sender<Option<LiveLocationView>>,
) {
    let mut ticker = interval(REEVALUATE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = next_snapshot(&mut ping_feed) => match next {
                Some(result) => {
                    ping = decode_snapshot(result, &bus_id, "location ping");
                    publish(&tx, merge_live_location(ping.as_ref(), sharing.as_ref(), now_ms()));
                }
                None => ping_feed = None,
            },
            next = next_snapshot(&mut sharing_feed) => match next {
                Some(result) => {
                    sharing = decode_snapshot(result, &bus_id, "sharing status");
                    publish(&tx, merge_live_location(ping.as_ref(), sharing.as_ref(), now_ms()));
                }
                None => sharing_feed = None,
            },
            _ = ticker.tick() => {
                let view = merge_live_location(ping.as_ref(), sharing.as_ref(), now_ms());
                tx.send_if_modified(|current| {
                    let changed = current.as_ref().map(|v| v.source) != view.as_ref().map(|v| v.source);
                    if changed {
                        *current = view;
                    }
                    changed
                });
            }
            _ = tx.closed() => {
                tracing::debug!(%bus_id, "live location observers gone; stopping");
                return;
            }
        }
    }
}

fn publish(tx: &watch::Sender<Option<LiveLocationView>>, view: Option<LiveLocationView>) {
    tx.send_if_modified(|current| {
        if *current == view {
            false
        } else {
            *current = view;
            true
        }
    });
}

async fn next_snapshot(feed: &mut Option<Subscription>) -> Option<SnapshotResult> {
    match feed {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

/// Consumes the feed's first delivery. A feed that ends right away is dropped.
async fn initial_record<T: DeserializeOwned>(
    feed: &mut Option<Subscription>,
    bus_id: &str,
    what: &str,
) -> Option<T> {
    let subscription = feed.as_mut()?;
    match subscription.next().await {
        Some(result) => decode_snapshot(result, bus_id, what),
        None => {
            *feed = None;
            None
        }
    }
}

fn feed_or_absent(
    feed: Result<Subscription, StoreError>,
    bus_id: &str,
    what: &str,
) -> Option<Subscription> {
    match feed {
        Ok(subscription) => Some(subscription),
        Err(err) => {
            tracing::warn!(bus_id, what, error = %err, "could not open change feed; treating as absent");
            None
        }
    }
}

fn decode_snapshot<T: DeserializeOwned>(result: SnapshotResult, bus_id: &str, what: &str) -> Option<T> {
    match result {
        Ok(Some(doc)) => match doc.decode() {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(bus_id, what, error = %err, "malformed document; treating as absent");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(bus_id, what, error = %err, "change feed error; treating as absent");
            None
        }
    }
}

fn absent_on_error<T>(result: Result<Option<T>, StoreError>, bus_id: &str, what: &str) -> Option<T> {
    result.unwrap_or_else(|err| {
        tracing::warn!(bus_id, what, error = %err, "read failed; treating as absent");
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping(server: Option<i64>, client: Option<i64>) -> LocationPing {
        LocationPing {
            lat: 12.5,
            lng: -8.25,
            accuracy: Some(5.0),
            heading: Some(90.0),
            speed: Some(11.0),
            server_updated_at_ms: server,
            client_updated_at_ms: client,
            driver_uid: None,
        }
    }

    fn sharing(on: bool) -> SharingStatus {
        SharingStatus {
            is_sharing: on,
            updated_at_ms: None,
        }
    }

    #[test]
    fn updated_at_takes_newer_timestamp() {
        assert_eq!(resolve_updated_at(Some(10), Some(20)), Some(20));
        assert_eq!(resolve_updated_at(Some(30), Some(20)), Some(30));
        assert_eq!(resolve_updated_at(Some(30), None), Some(30));
        assert_eq!(resolve_updated_at(None, Some(7)), Some(7));
        assert_eq!(resolve_updated_at(None, None), None);
    }

    #[test]
    fn both_records_absent_yields_nothing() {
        assert_eq!(merge_live_location(None, None, 1_000), None);
    }

    #[test]
    fn fresh_ping_while_sharing_is_live() {
        let now = 1_000_000;
        let p = ping(Some(now - LIVE_WINDOW_MS), None);
        let view = merge_live_location(Some(&p), Some(&sharing(true)), now).unwrap();
        assert_eq!(view.source, LocationSource::Live);
        assert_eq!(view.last_ago_ms, Some(LIVE_WINDOW_MS));
        assert_eq!(view.lat, Some(12.5));
        assert_eq!(view.heading, Some(90.0));
        assert!(view.is_sharing);
    }

    #[test]
    fn old_ping_is_stale_even_when_sharing() {
        let now = 1_000_000;
        let p = ping(Some(now - LIVE_WINDOW_MS - 1), None);
        let view = merge_live_location(Some(&p), Some(&sharing(true)), now).unwrap();
        assert_eq!(view.source, LocationSource::Stale);
    }

    #[test]
    fn fresh_ping_without_sharing_is_stale() {
        let now = 1_000_000;
        let p = ping(Some(now), None);
        assert_eq!(
            merge_live_location(Some(&p), Some(&sharing(false)), now).unwrap().source,
            LocationSource::Stale
        );
        assert_eq!(
            merge_live_location(Some(&p), None, now).unwrap().source,
            LocationSource::Stale
        );
    }

    #[test]
    fn client_timestamp_can_make_ping_live() {
        let now = 1_000_000;
        let p = ping(Some(now - 120_000), Some(now - 1_000));
        let view = merge_live_location(Some(&p), Some(&sharing(true)), now).unwrap();
        assert_eq!(view.updated_at_ms, Some(now - 1_000));
        assert_eq!(view.source, LocationSource::Live);
    }

    #[test]
    fn missing_timestamp_depends_on_sharing_flag() {
        let p = ping(None, None);
        let on = merge_live_location(Some(&p), Some(&sharing(true)), 5).unwrap();
        assert_eq!(on.source, LocationSource::Stale);
        assert_eq!(on.last_ago_ms, None);

        let off = merge_live_location(Some(&p), Some(&sharing(false)), 5).unwrap();
        assert_eq!(off.source, LocationSource::None);
    }

    #[test]
    fn sharing_without_ping_has_no_coordinates() {
        let view = merge_live_location(None, Some(&sharing(true)), 5).unwrap();
        assert_eq!(view.source, LocationSource::Stale);
        assert_eq!(view.lat, None);
        assert_eq!(view.updated_at_ms, None);

        let idle = merge_live_location(None, Some(&sharing(false)), 5).unwrap();
        assert_eq!(idle.source, LocationSource::None);
    }

    #[test]
    fn view_serializes_camel_case_lowercase_source() {
        let p = ping(Some(100), None);
        let view = merge_live_location(Some(&p), Some(&sharing(true)), 200).unwrap();
        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["source"], "live");
        assert_eq!(json["updatedAtMs"], 100);
        assert_eq!(json["lastAgoMs"], 100);
        assert_eq!(json["isSharing"], true);
    }
}
