//! Common test utilities and fixtures.

pub mod resp_server;
pub mod stores;

#[allow(unused_imports)]
pub use resp_server::*;
#[allow(unused_imports)]
pub use stores::*;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use webstore::{create_router, AppState};

/// SHA-256 of the empty input.
#[allow(dead_code)]
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Every route prefix with its key length.
#[allow(dead_code)]
pub const ROUTES: [(&str, usize); 6] = [
    ("md5", 32),
    ("sha1", 40),
    ("sha224", 56),
    ("sha256", 64),
    ("sha384", 96),
    ("sha512", 128),
];

/// A router wired to a counting in-memory store.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub store: Arc<CountingStore>,
    pub state: AppState,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Self {
        Self::with(|state| state)
    }

    /// Builds the app after letting `configure` adjust the state.
    pub fn with(configure: impl FnOnce(AppState) -> AppState) -> Self {
        let store = Arc::new(CountingStore::default());
        let state = configure(AppState::new(store.clone()));
        let router = create_router(state.clone())
            .layer(MockConnectInfo(SocketAddr::from(([192, 0, 2, 10], 50000))));
        Self {
            router,
            store,
            state,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Bytes) {
        self.send(Method::GET, uri, Bytes::new()).await
    }

    pub async fn post(&self, uri: &str, body: impl Into<Bytes>) -> (StatusCode, Bytes) {
        self.send(Method::POST, uri, body.into()).await
    }

    pub async fn send(&self, method: Method, uri: &str, body: Bytes) -> (StatusCode, Bytes) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body)
    }
}

/// A key of `len` hex characters derived from `seed`.
#[allow(dead_code)]
pub fn hex_key(seed: u8, len: usize) -> String {
    (0..len)
        .map(|i| char::from(b"0123456789abcdef"[(i + seed as usize) % 16]))
        .collect()
}
