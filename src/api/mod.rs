// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{middleware::from_fn_with_state, routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::auth::{access_token_middleware, Authenticated, AuthenticatedPrincipal};
use crate::state::AppState;

pub mod health;

/// Echo the authenticated caller.
pub async fn whoami(Authenticated(principal): Authenticated) -> Json<AuthenticatedPrincipal> {
    Json(principal)
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/whoami", get(whoami).post(whoami))
        .layer(from_fn_with_state(
            state.authenticator.clone(),
            access_token_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
