//! Administrative HTTP surface.
//!
//! # Routes
//! - `GET /admin/status`: version and uptime
//! - `GET /admin/health`: per-upstream queue and breaker state, overall status
//! - `POST /admin/cache/flush`: drop every cached value
//! - `DELETE /admin/cache/{key}`: drop both tiers of one key
//! - `GET /admin/last-refresh`: completion time of the last warm-up run
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::context::AppContext;

pub fn setup_admin_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/health", get(get_health))
        .route("/admin/cache/flush", post(flush_cache))
        .route("/admin/cache/{key}", delete(invalidate_key))
        .route("/admin/last-refresh", get(get_last_refresh))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), admin_auth_middleware))
        .with_state(ctx)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
