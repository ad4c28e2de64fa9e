// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registry of configured OIDC clients and auth filters.
//!
//! Readers take an `Arc` snapshot and keep it for the whole request, so a
//! concurrent [`ClientRegistry::replace`] never changes configuration under
//! an authentication in progress.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::filter::AuthFilter;
use super::ClientConfig;

/// Immutable set of clients and filters.
#[derive(Default)]
pub struct RegistrySnapshot {
    clients: Vec<Arc<ClientConfig>>,
    filters: HashMap<String, Arc<dyn AuthFilter>>,
}

impl RegistrySnapshot {
    /// Clients in configured order (used as rank on ties).
    pub fn clients(&self) -> &[Arc<ClientConfig>] {
        &self.clients
    }

    pub fn client(&self, id: &str) -> Option<&Arc<ClientConfig>> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn filter(&self, id: &str) -> Option<&Arc<dyn AuthFilter>> {
        self.filters.get(id)
    }
}

/// Shared, swappable client registry.
#[derive(Default)]
pub struct ClientRegistry {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl ClientRegistry {
    pub fn new(clients: Vec<ClientConfig>, filters: Vec<Arc<dyn AuthFilter>>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(build_snapshot(clients, filters))),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Publish a new set of clients and filters.
    pub fn replace(&self, clients: Vec<ClientConfig>, filters: Vec<Arc<dyn AuthFilter>>) {
        let next = Arc::new(build_snapshot(clients, filters));
        let count = next.clients.len();
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
        tracing::info!(clients = count, "OIDC client configuration replaced");
    }
}

fn build_snapshot(clients: Vec<ClientConfig>, filters: Vec<Arc<dyn AuthFilter>>) -> RegistrySnapshot {
    RegistrySnapshot {
        clients: clients.into_iter().map(Arc::new).collect(),
        filters: filters
            .into_iter()
            .map(|f| (f.id().to_string(), f))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::filter::ConditionFilter;

    #[test]
    fn snapshot_survives_replace() {
        let registry = ClientRegistry::new(vec![ClientConfig::new("a")], Vec::new());
        let before = registry.snapshot();

        registry.replace(vec![ClientConfig::new("b"), ClientConfig::new("c")], Vec::new());

        assert_eq!(before.clients().len(), 1);
        assert!(before.client("a").is_some());
        let after = registry.snapshot();
        assert_eq!(after.clients().len(), 2);
        assert!(after.client("a").is_none());
    }

    #[test]
    fn filters_are_indexed_by_id() {
        let filter: Arc<dyn AuthFilter> = Arc::new(ConditionFilter {
            id: "mobile".into(),
            conditions: Vec::new(),
        });
        let registry = ClientRegistry::new(Vec::new(), vec![filter]);
        assert!(registry.snapshot().filter("mobile").is_some());
        assert!(registry.snapshot().filter("web").is_none());
    }
}
