//! Typed access to the document store, one module per collection.

pub mod buddies;
pub mod bus_children;
pub mod buses;
pub mod emergencies;
pub mod locations;
pub mod lost_found;
pub mod repository;
pub mod tours;
pub mod users;

pub use repository::Record;
