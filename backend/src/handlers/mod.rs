pub mod buddies;
pub mod bus_children;
pub mod buses;
pub mod chat;
pub mod emergencies;
pub mod locations;
pub mod lost_found;
pub mod tours;
pub mod users;
