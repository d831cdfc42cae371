//! Basket routes.
//!
//! | Method | Body                                         | Effect              |
//! |--------|----------------------------------------------|---------------------|
//! | GET    |                                              | basket with totals  |
//! | POST   | `{"items": [{"product_info": 1, "quantity": 2}]}` | add lines      |
//! | PUT    | `{"items": [{"id": 5, "quantity": 3}]}`      | change quantities   |
//! | DELETE | `{"items": "5,6"}`                           | remove lines        |

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use market_core::validation::{parse_add_items, parse_line_ids, parse_quantity_updates};
use market_core::BasketView;
use serde_json::{json, Value};
use tracing::info;

use super::{Page, Payload};
use crate::auth::Caller;
use crate::error::ApiResult;
use crate::AppState;

/// `GET /basket`: zero or one basket.
pub async fn view(
    State(state): State<Arc<AppState>>,
    Caller(user): Caller,
) -> ApiResult<Json<Page<BasketView>>> {
    let basket = state.db.orders().get_basket(user.id).await?;
    Ok(Json(basket.into_iter().collect::<Vec<_>>().into()))
}

/// `POST /basket`: adds lines; rejected items are reported, not fatal.
pub async fn add(
    State(state): State<Arc<AppState>>,
    Caller(user): Caller,
    body: Payload,
) -> ApiResult<Json<Value>> {
    let request = parse_add_items(body.field("items"))?;
    let outcome = state.db.orders().add_items(user.id, &request.lines).await?;
    let outcome = request.merge(outcome);

    if !outcome.rejected.is_empty() {
        info!(user_id = user.id, rejected = outcome.rejected.len(), "Basket items rejected");
    }

    Ok(Json(json!({
        "Status": true,
        "created": outcome.created,
        "rejected": outcome.rejected,
    })))
}

/// `PUT /basket`: updates quantities of the caller's basket lines.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Caller(user): Caller,
    body: Payload,
) -> ApiResult<Json<Value>> {
    let updates = parse_quantity_updates(body.field("items"))?;
    let updated = state.db.orders().update_items(user.id, &updates).await?;
    Ok(Json(json!({ "Status": true, "updated": updated })))
}

/// `DELETE /basket`: removes lines by comma-separated ids.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Caller(user): Caller,
    body: Payload,
) -> ApiResult<Json<Value>> {
    let ids = parse_line_ids(body.field("items").and_then(Value::as_str))?;
    let deleted = state.db.orders().remove_items(user.id, &ids).await?;
    Ok(Json(json!({ "Status": true, "deleted": deleted })))
}
