//! HTTP routes.
//!
//! Mutations answer `{"Status": true, ...}`; lists answer
//! `{"count": n, "results": [...]}`; failures go through [`ApiError`].

pub mod basket;
pub mod catalog;
pub mod contact;
pub mod health;
pub mod orders;
pub mod partner;

use std::sync::Arc;

use axum::extract::{FromRequest, Request};
use axum::routing::{get, post};
use axum::{Json, Router};
use market_core::validation::INVALID_REQUEST;
use market_core::CoreError;
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health::health))
        .route("/products", get(catalog::list_products))
        .route("/products/{id}", get(catalog::get_product))
        .route("/categories", get(catalog::list_categories))
        .route("/shops", get(catalog::list_shops))
        .route(
            "/basket",
            get(basket::view)
                .post(basket::add)
                .put(basket::update)
                .delete(basket::remove),
        )
        .route("/orders", get(orders::list).post(orders::place))
        .route("/orders/{id}", get(orders::detail))
        .route("/partner/update", post(partner::update))
        .route("/partner/state", get(partner::state).post(partner::set_state))
        .route("/partner/orders", get(partner::orders))
        .route("/partner/orders/{id}", get(partner::order))
        .route(
            "/user/contact",
            get(contact::list)
                .post(contact::create)
                .put(contact::update)
                .delete(contact::delete),
        );

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// List response body.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub results: Vec<T>,
}

impl<T> From<Vec<T>> for Page<T> {
    fn from(results: Vec<T>) -> Self {
        Page {
            count: results.len(),
            results,
        }
    }
}

/// JSON request body. A body that is not JSON is an argument error.
pub struct Payload(pub Value);

impl Payload {
    /// Field of the body, if the body is an object holding it.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    /// Deserializes the whole body into `T`.
    pub fn parse<T: serde::de::DeserializeOwned>(self) -> ApiResult<T> {
        serde_json::from_value(self.0).map_err(|e| {
            debug!(error = %e, "Request body has wrong shape");
            CoreError::argument(INVALID_REQUEST).into()
        })
    }
}

impl<S: Send + Sync> FromRequest<S> for Payload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => {
                debug!(%rejection, "Rejected request body");
                Err(CoreError::argument(INVALID_REQUEST).into())
            }
        }
    }
}

/// Parses an id taken from the path; anything but digits is not found.
pub(crate) fn path_id(entity: &str, raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| CoreError::not_found(entity, raw).into())
}
