//! Input rules shared by SafeBus payloads: document ids chosen by drivers
//! and `YYYY-MM-DD` tour day keys. Payload structs derive
//! `validator::Validate` and point their `custom` checks here.

pub mod rules;
