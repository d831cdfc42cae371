//! Catalog routes: listings, categories and shops. No authentication.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use market_core::{Category, CoreError, ListingFilter, ListingView, Shop, ValidationError};
use serde::Deserialize;

use super::{path_id, Page};
use crate::error::ApiResult;
use crate::AppState;

/// Query string of `GET /products`.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub shop_id: Option<String>,
    pub category_id: Option<String>,
}

fn filter_id(field: &str, raw: Option<&str>) -> Result<Option<i64>, ValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ValidationError::InvalidFormat {
                field: field.to_string(),
                reason: "must be an integer id".to_string(),
            }),
    }
}

impl ListingQuery {
    fn filter(&self) -> Result<ListingFilter, ValidationError> {
        Ok(ListingFilter {
            shop_id: filter_id("shop_id", self.shop_id.as_deref())?,
            category_id: filter_id("category_id", self.category_id.as_deref())?,
        })
    }
}

/// `GET /products?shop_id=&category_id=`: listings of active shops.
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Json<Page<ListingView>>> {
    let listings = state.db.catalog().list_listings(query.filter()?).await?;
    Ok(Json(listings.into()))
}

/// `GET /products/{id}`
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> ApiResult<Json<ListingView>> {
    let id = path_id("Listing", &raw)?;
    let listing = state
        .db
        .catalog()
        .get_listing(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Listing", id))?;
    Ok(Json(listing))
}

/// `GET /categories`
pub async fn list_categories(State(state): State<Arc<AppState>>) -> ApiResult<Json<Page<Category>>> {
    Ok(Json(state.db.catalog().list_categories().await?.into()))
}

/// `GET /shops`: active shops.
pub async fn list_shops(State(state): State<Arc<AppState>>) -> ApiResult<Json<Page<Shop>>> {
    Ok(Json(state.db.catalog().list_shops().await?.into()))
}
