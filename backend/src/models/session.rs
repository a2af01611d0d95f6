use serde::{Deserialize, Serialize};

use crate::models::user::Role;

/// Authenticated caller, resolved from the bearer token by the auth
/// middleware and handed to every operation explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub role: Role,
}

impl Session {
    pub fn new(uid: impl Into<String>, role: Role) -> Self {
        Self {
            uid: uid.into(),
            role,
        }
    }

    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }

    pub fn is_parent(&self) -> bool {
        self.role == Role::Parent
    }

    pub fn is_child(&self) -> bool {
        self.role == Role::Child
    }
}
