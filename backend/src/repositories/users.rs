//! `users/{uid}` profile documents.

use serde_json::json;

use crate::{
    models::{user::UpdateProfilePayload, user::UserDoc, Role},
    repositories::repository::{self, Record},
    store::{merge_json, to_document, DocumentStore, StoreError},
};

impl Record for UserDoc {
    const COLLECTION: &'static str = "users";
}

pub async fn find_user(store: &dyn DocumentStore, uid: &str) -> Result<Option<UserDoc>, StoreError> {
    repository::find(store, uid).await
}

/// Merges the provided profile fields into the user's document, creating it
/// on first write. `uid` and `role` always come from the session.
pub async fn upsert_profile(
    store: &dyn DocumentStore,
    uid: &str,
    role: Role,
    payload: &UpdateProfilePayload,
    now_ms: i64,
) -> Result<UserDoc, StoreError> {
    let mut patch = to_document(payload)?;
    merge_json(
        &mut patch,
        json!({"uid": uid, "role": role, "updatedAtMs": now_ms}),
    );

    let data = store
        .transact(
            UserDoc::COLLECTION,
            uid,
            Box::new(move |current| {
                let mut doc = current.unwrap_or_else(|| json!({"createdAtMs": now_ms}));
                merge_json(&mut doc, patch);
                Ok(Some(doc))
            }),
        )
        .await?
        .ok_or(StoreError::NotAnObject)?;
    Ok(serde_json::from_value(data)?)
}
