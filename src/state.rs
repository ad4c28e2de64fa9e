// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::AccessTokenAuthenticator;

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<AccessTokenAuthenticator>,
}

impl AppState {
    pub fn new(authenticator: AccessTokenAuthenticator) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
        }
    }
}
