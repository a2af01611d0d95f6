//! Document records and API payloads.
//!
//! Documents serialize with camelCase field names and epoch-millisecond
//! timestamps so they match what mobile clients read from the store.

pub mod bus;
pub mod bus_child;
pub mod buddy;
pub mod chat;
pub mod emergency;
pub mod location;
pub mod lost_found;
pub mod session;
pub mod tour;
pub mod user;

pub use location::GeoPoint;
pub use session::Session;
pub use user::Role;
