//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use server_config::core::{CACHE_SLOT, ConfigCache, SourceConfig};
use server_config::error::TransportError;
use server_config::sources::{HttpTransport, MemoryStore, TransportRequest, TransportResponse};
use std::collections::VecDeque;
use std::sync::Arc;

pub type Reply = Result<TransportResponse, TransportError>;

/// Transport that replays scripted replies and records every request.
///
/// Once the script runs out, it keeps returning the fallback reply.
pub struct MockTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new(script: Vec<Reply>, fallback: Reply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always answers with `status` and `body`.
    pub fn always(status: u16, body: &str) -> Arc<Self> {
        Self::new(Vec::new(), Ok(TransportResponse::new(status, body)))
    }

    /// Always fails with a connection error.
    pub fn unreachable() -> Arc<Self> {
        Self::new(
            Vec::new(),
            Err(TransportError::Connect("connection refused".to_string())),
        )
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, request: TransportRequest) -> Reply {
        self.requests.lock().push(request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}

/// A control-plane response body with the given destinations.
pub fn document(destinations: serde_json::Value) -> String {
    json!({
        "isHosted": true,
        "source": {
            "id": "2Jn0iY6cJmvfvbxMOlTEPmUhwNI",
            "name": "ios-dev",
            "enabled": true,
            "writeKey": "redacted",
            "workspaceId": "ws-1",
            "destinations": destinations
        }
    })
    .to_string()
}

/// Document with destination A → T1 and B without a transformation.
pub fn routing_document() -> String {
    document(json!([
        {
            "id": "A",
            "name": "Amplitude",
            "enabled": true,
            "destinationDefinition": {"name": "AM", "displayName": "Amplitude"},
            "transformationId": "T1"
        },
        {
            "id": "B",
            "name": "Firebase",
            "enabled": true,
            "destinationDefinition": {"name": "FIREBASE", "displayName": "Firebase"},
            "transformationId": ""
        }
    ]))
}

/// A store already holding `config` in the cache slot.
pub fn store_with_cached(config: &SourceConfig) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    ConfigCache::new(store.clone())
        .store(config, chrono::Utc::now())
        .unwrap();
    store
}

/// A store whose cache slot holds garbage.
pub fn store_with_corrupt_cache() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_entry(CACHE_SLOT, "\u{0}\u{1}not-json"))
}

pub fn cached_config() -> SourceConfig {
    SourceConfig::from_document(&document(json!([
        {"id": "C", "name": "Braze", "enabled": true, "transformationId": "T-cached"}
    ])))
    .unwrap()
}
