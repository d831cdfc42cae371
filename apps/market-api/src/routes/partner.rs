//! Supplier routes. Every handler requires a `shop` account.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use market_core::validation::{parse_flag, MISSING_ARGUMENTS};
use market_core::{CoreError, OrderDetail, OrderSummary, PriceList, Shop};
use serde_json::{json, Value};
use tracing::info;

use super::{path_id, Page, Payload};
use crate::auth::Supplier;
use crate::error::ApiResult;
use crate::fetch::validate_url;
use crate::AppState;

/// `POST /partner/update` with `{"url": ...}`: replaces the supplier's
/// listings with the downloaded price list.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Supplier(user): Supplier,
    body: Payload,
) -> ApiResult<Json<Value>> {
    let raw = body
        .field("url")
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::argument(MISSING_ARGUMENTS))?;
    let url = validate_url(raw)?;

    info!(supplier_id = user.id, %url, "Price list update requested");
    let document = state.fetcher.fetch(&url).await?;
    let list = PriceList::parse(&document)?;
    info!(
        shop = %list.shop,
        goods = list.goods.len(),
        parameters = list.parameter_count(),
        "Price list parsed"
    );

    let report = state
        .db
        .ingest()
        .replace_catalog(user.id, Some(url.as_str()), &list)
        .await?;

    Ok(Json(json!({
        "Status": true,
        "shop_id": report.shop_id,
        "categories": report.categories,
        "listings": report.listings,
        "parameters": report.parameters,
    })))
}

/// `GET /partner/state`: the supplier's shops with their state.
pub async fn state(
    State(state): State<Arc<AppState>>,
    Supplier(user): Supplier,
) -> ApiResult<Json<Page<Shop>>> {
    Ok(Json(state.db.shops().shops_of(user.id).await?.into()))
}

/// `POST /partner/state` with `{"state": "on" | "off" | true | ...}`.
pub async fn set_state(
    State(state): State<Arc<AppState>>,
    Supplier(user): Supplier,
    body: Payload,
) -> ApiResult<Json<Value>> {
    let active = match body.field("state") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(raw)) => parse_flag("state", raw)?,
        Some(Value::Number(n)) => parse_flag("state", &n.to_string())?,
        _ => return Err(CoreError::argument(MISSING_ARGUMENTS).into()),
    };

    let updated = state.db.shops().set_state(user.id, active).await?;
    Ok(Json(json!({ "Status": true, "updated": updated })))
}

/// `GET /partner/orders`: placed orders containing the supplier's listings.
pub async fn orders(
    State(state): State<Arc<AppState>>,
    Supplier(user): Supplier,
) -> ApiResult<Json<Page<OrderSummary>>> {
    Ok(Json(state.db.orders().supplier_orders(user.id).await?.into()))
}

/// `GET /partner/orders/{id}`: only the supplier's own lines are shown.
pub async fn order(
    State(state): State<Arc<AppState>>,
    Supplier(user): Supplier,
    Path(raw): Path<String>,
) -> ApiResult<Json<OrderDetail>> {
    let id = path_id("Order", &raw)?;
    Ok(Json(state.db.orders().supplier_order(user.id, id).await?))
}
