// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
        HeaderValue, Method, StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;

use crate::{
    auth::middleware::identity_middleware, config::CorsConfig, error::ErrorBody,
    models::UserInfoResponse, state::AppState,
};

pub mod auth;
pub mod cookies;
pub mod dropoff;
pub mod error_page;
pub mod health;
pub mod logout;
pub mod userinfo;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security.cors);

    let v1_routes = Router::new()
        .route("/auth", get(auth::start_auth))
        .route("/dropoff", get(dropoff::complete_auth))
        .route("/logout", get(logout::logout))
        .route("/userinfo", get(userinfo::userinfo))
        .route("/frontend-userinfo", get(userinfo::frontend_userinfo));

    Router::new()
        .route("/", get(health::liveness))
        .nest("/v1", v1_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(cors)
}

/// `302 Found` to `location`. `Redirect::to` would answer `303`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// Credentialed CORS for the configured origin when `security.cors.disable`
/// is set; otherwise no cross-origin access at all.
fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    if !cors.disable {
        return CorsLayer::new();
    }
    match HeaderValue::from_str(&cors.allow_origin) {
        Ok(origin) => {
            warn!(origin = %cors.allow_origin, "Cross-origin requests with credentials allowed");
            CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        }
        Err(e) => {
            warn!(origin = %cors.allow_origin, error = %e, "Invalid CORS origin, cross-origin access stays disabled");
            CorsLayer::new()
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        auth::start_auth,
        dropoff::complete_auth,
        logout::logout,
        userinfo::userinfo,
        userinfo::frontend_userinfo
    ),
    components(schemas(UserInfoResponse, ErrorBody, health::HealthResponse)),
    tags(
        (name = "Health", description = "Liveness probe"),
        (name = "Flow", description = "Browser login flow: start, completion and logout"),
        (name = "Identity", description = "Identity of the signed-in caller")
    )
)]
pub struct ApiDoc;
