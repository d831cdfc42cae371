//! Buyer contact routes (`/user/contact`).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use market_core::validation::{parse_id, parse_line_ids, validate_contact, validate_contact_patch};
use market_core::{Contact, ContactInput, ContactPatch};
use serde_json::{json, Value};

use super::{Page, Payload};
use crate::auth::Caller;
use crate::error::ApiResult;
use crate::AppState;

/// `GET /user/contact`
pub async fn list(
    State(state): State<Arc<AppState>>,
    Caller(user): Caller,
) -> ApiResult<Json<Page<Contact>>> {
    Ok(Json(state.db.contacts().list(user.id).await?.into()))
}

/// `POST /user/contact`: a buyer keeps a single contact.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Caller(user): Caller,
    body: Payload,
) -> ApiResult<Json<Value>> {
    let input: ContactInput = body.parse()?;
    validate_contact(&input)?;

    let contact = state.db.contacts().create(user.id, &input).await?;
    Ok(Json(json!({ "Status": true, "id": contact.id })))
}

/// `PUT /user/contact` with `{"id": ..., <fields to change>}`.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Caller(user): Caller,
    body: Payload,
) -> ApiResult<Json<Value>> {
    let id = parse_id("id", body.field("id"))?;
    let patch: ContactPatch = body.parse()?;
    validate_contact_patch(&patch)?;

    state.db.contacts().update(user.id, id, &patch).await?;
    Ok(Json(json!({ "Status": true })))
}

/// `DELETE /user/contact` with `{"items": "1,2"}`.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Caller(user): Caller,
    body: Payload,
) -> ApiResult<Json<Value>> {
    let ids = parse_line_ids(body.field("items").and_then(Value::as_str))?;
    let deleted = state.db.contacts().delete(user.id, &ids).await?;
    Ok(Json(json!({ "Status": true, "deleted": deleted })))
}
