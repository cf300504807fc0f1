//! Route table.
//!
//! Six prefixes, one handler. Each prefix is registered twice so that an
//! empty key (`/store/md5/`) reaches the handler and gets a 400 rather
//! than the router's 404.

use crate::codec::Algorithm;
use crate::handlers::{self, StoreRequest};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, Uri};
use axum::routing::any;
use axum::Router;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

/// A URL prefix bound to one digest algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmRoute {
    algorithm: Algorithm,
}

impl AlgorithmRoute {
    pub const fn new(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn prefix(&self) -> &'static str {
        self.algorithm.route_prefix()
    }

    pub fn key_len(&self) -> usize {
        self.algorithm.key_len()
    }
}

/// Every served route, immutable for the life of the process.
pub static ROUTES: [AlgorithmRoute; 6] = [
    AlgorithmRoute::new(Algorithm::Md5),
    AlgorithmRoute::new(Algorithm::Sha1),
    AlgorithmRoute::new(Algorithm::Sha224),
    AlgorithmRoute::new(Algorithm::Sha256),
    AlgorithmRoute::new(Algorithm::Sha384),
    AlgorithmRoute::new(Algorithm::Sha512),
];

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.max_payload_bytes;

    let mut router = Router::new();
    for route in ROUTES.iter() {
        let handler = move |State(state): State<AppState>,
                            ConnectInfo(peer): ConnectInfo<SocketAddr>,
                            method: Method,
                            uri: Uri,
                            body: Result<Bytes, BytesRejection>| async move {
            let path = uri.path();
            let segment = path.strip_prefix(route.prefix()).unwrap_or_default();
            let request = StoreRequest {
                client: peer.ip().to_canonical(),
                method: &method,
                path,
                segment,
                body,
            };
            handlers::handle(&state, route, request).await
        };

        router = router
            .route(route.prefix(), any(handler))
            .route(&format!("{}*key", route.prefix()), any(handler));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table() {
        let prefixes: Vec<&str> = ROUTES.iter().map(|r| r.prefix()).collect();
        assert_eq!(
            prefixes,
            vec![
                "/store/md5/",
                "/store/sha1/",
                "/store/sha224/",
                "/store/sha256/",
                "/store/sha384/",
                "/store/sha512/",
            ]
        );
        assert_eq!(ROUTES[3].key_len(), 64);
        assert_eq!(ROUTES[5].algorithm(), Algorithm::Sha512);
    }
}
