// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational OIDC RP - Access Token Authentication Engine
//!
//! Authenticates inbound HTTP requests that carry OpenID Connect access
//! tokens, for resource servers sitting behind one or more OpenID providers.
//!
//! ## Modules
//!
//! - `api` - HTTP routes: health probes and the authenticated `/whoami`
//! - `auth` - Client selection, token validation, result cache (Axum middleware)
//! - `config` - Runtime configuration and the clients file
//! - `state` - Shared application state for the server binary

pub mod api;
pub mod auth;
pub mod config;
pub mod state;
