//! Shared authorization checks.
//!
//! A caller is a *guardian* of a child when they are the child or the
//! child's parent (`parentUid` on the child profile). A caller is a *member*
//! of a bus when they drive it or guard a child approved on it.

use crate::{
    error::AppError,
    models::{
        bus::BusProfile,
        bus_child::{BusChild, BusChildStatus},
        Session,
    },
    repositories::{bus_children, buses, users},
    store::DocumentStore,
};

pub const BUS_NOT_FOUND: &str = "Bus not found";
pub const DRIVER_ONLY: &str = "Only the bus driver can do this.";
pub const NOT_GUARDIAN: &str = "You are not allowed to act for this child.";
pub const NOT_A_MEMBER: &str = "You are not a member of this bus.";

pub async fn load_bus(store: &dyn DocumentStore, bus_id: &str) -> Result<BusProfile, AppError> {
    buses::find_bus(store, bus_id)
        .await?
        .ok_or_else(|| AppError::NotFound(BUS_NOT_FOUND.into()))
}

pub fn require_driver_of(caller: &Session, bus: &BusProfile) -> Result<(), AppError> {
    if caller.is_driver() && bus.is_driven_by(&caller.uid) {
        Ok(())
    } else {
        Err(AppError::Forbidden(DRIVER_ONLY.into()))
    }
}

pub async fn is_guardian_of(
    store: &dyn DocumentStore,
    caller: &Session,
    child_uid: &str,
) -> Result<bool, AppError> {
    if caller.uid == child_uid {
        return Ok(true);
    }
    if !caller.is_parent() {
        return Ok(false);
    }
    let child = users::find_user(store, child_uid).await?;
    Ok(child.is_some_and(|profile| profile.is_parent_of(&caller.uid)))
}

pub async fn require_guardian_of(
    store: &dyn DocumentStore,
    caller: &Session,
    child_uid: &str,
) -> Result<(), AppError> {
    if is_guardian_of(store, caller, child_uid).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden(NOT_GUARDIAN.into()))
    }
}

/// Approved link for the child on the bus, if any.
pub async fn approved_link(
    store: &dyn DocumentStore,
    bus_id: &str,
    child_uid: &str,
) -> Result<Option<BusChild>, AppError> {
    Ok(bus_children::find_link(store, bus_id, child_uid)
        .await?
        .filter(|link| link.status == BusChildStatus::Approved))
}

pub async fn is_member_of(
    store: &dyn DocumentStore,
    caller: &Session,
    bus: &BusProfile,
) -> Result<bool, AppError> {
    if caller.is_driver() {
        return Ok(bus.is_driven_by(&caller.uid));
    }
    if caller.is_child() {
        return Ok(approved_link(store, &bus.bus_id, &caller.uid)
            .await?
            .is_some());
    }
    let approved =
        bus_children::list_for_bus(store, &bus.bus_id, Some(BusChildStatus::Approved)).await?;
    for link in approved {
        if link.requested_by == caller.uid || is_guardian_of(store, caller, &link.child_uid).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

pub async fn require_member_of(
    store: &dyn DocumentStore,
    caller: &Session,
    bus: &BusProfile,
) -> Result<(), AppError> {
    if is_member_of(store, caller, bus).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden(NOT_A_MEMBER.into()))
    }
}
