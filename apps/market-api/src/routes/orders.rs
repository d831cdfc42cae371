//! Buyer order routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use market_core::validation::parse_id;
use market_core::{OrderDetail, OrderSummary};
use serde_json::{json, Value};

use super::{path_id, Page, Payload};
use crate::auth::Caller;
use crate::error::ApiResult;
use crate::AppState;

/// `GET /orders`: the caller's placed orders, totals include delivery.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Caller(user): Caller,
) -> ApiResult<Json<Page<OrderSummary>>> {
    Ok(Json(state.db.orders().list_orders(user.id).await?.into()))
}

/// `GET /orders/{id}`
pub async fn detail(
    State(state): State<Arc<AppState>>,
    Caller(user): Caller,
    Path(raw): Path<String>,
) -> ApiResult<Json<OrderDetail>> {
    let id = path_id("Order", &raw)?;
    Ok(Json(state.db.orders().get_order(user.id, id).await?))
}

/// `POST /orders` with `{"id": <basket id>, "contact": <contact id>}`.
pub async fn place(
    State(state): State<Arc<AppState>>,
    Caller(user): Caller,
    body: Payload,
) -> ApiResult<Json<Value>> {
    let order_id = parse_id("id", body.field("id"))?;
    let contact_id = parse_id("contact", body.field("contact"))?;

    state.db.orders().place_order(user.id, order_id, contact_id).await?;
    Ok(Json(json!({ "Status": true })))
}
