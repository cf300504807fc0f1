//! The store route handler.
//!
//! One algorithm-agnostic handler serves all six `/store/{alg}/` prefixes;
//! the route table injects which [`AlgorithmRoute`] it is serving. Every
//! check that can fail without the store runs before the store is touched.

use crate::codec::{canonicalize, is_valid_payload, MIN_PAYLOAD_LEN};
use crate::error::{ApiError, ApiResult};
use crate::routes::AlgorithmRoute;
use crate::state::AppState;
use crate::storage::StoreError;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::IpAddr;
use tracing::{debug, error, info, warn};

/// A successful reply: status plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Reply {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.body,
        )
            .into_response()
    }
}

/// Everything the handler needs from one HTTP request.
#[derive(Debug)]
pub struct StoreRequest<'a> {
    pub client: IpAddr,
    pub method: &'a Method,
    /// Full request path, for logging.
    pub path: &'a str,
    /// Path with the route prefix removed.
    pub segment: &'a str,
    pub body: Result<Bytes, BytesRejection>,
}

/// Serves one request against `route`.
pub async fn handle(state: &AppState, route: &AlgorithmRoute, request: StoreRequest<'_>) -> Response {
    match dispatch(state, route, request).await {
        Ok(reply) => reply.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn dispatch(
    state: &AppState,
    route: &AlgorithmRoute,
    request: StoreRequest<'_>,
) -> ApiResult<Reply> {
    if state.shutdown.is_triggered() {
        return Err(ApiError::ShuttingDown);
    }

    if *request.method == Method::GET {
        get(state, route, &request).await
    } else if *request.method == Method::POST {
        post(state, route, &request).await
    } else {
        warn!(
            client = %request.client,
            status = StatusCode::METHOD_NOT_ALLOWED.as_u16(),
            method = %request.method,
            path = request.path,
            "Method not allowed"
        );
        Err(ApiError::MethodNotAllowed)
    }
}

async fn get(state: &AppState, route: &AlgorithmRoute, request: &StoreRequest<'_>) -> ApiResult<Reply> {
    let key = match canonicalize(request.segment, route.key_len()) {
        Ok(key) => key,
        Err(e) => return Err(malformed(request, ApiError::MALFORMED, &e)),
    };

    match state.store.get(&key).await {
        Ok(Some(value)) => {
            log_served(request, StatusCode::OK);
            Ok(Reply::ok(value))
        }
        Ok(None) => {
            log_served(request, StatusCode::NOT_FOUND);
            Err(ApiError::NotFound)
        }
        Err(e) if e.is_unavailable() => {
            error!(client = %request.client, path = request.path, error = %e, "Store lookup failed");
            Err(ApiError::StoreUnavailable)
        }
        // The store answered, just not with a string: nothing servable here.
        Err(e) => {
            warn!(client = %request.client, path = request.path, error = %e, "Store lookup returned no string, treating as absent");
            log_served(request, StatusCode::NOT_FOUND);
            Err(ApiError::NotFound)
        }
    }
}

async fn post(state: &AppState, route: &AlgorithmRoute, request: &StoreRequest<'_>) -> ApiResult<Reply> {
    if request.segment.len() != route.key_len() {
        return Err(malformed(request, ApiError::BAD_URL, &"wrong key length"));
    }

    let body = match &request.body {
        Ok(body) => body.clone(),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            debug!(client = %request.client, path = request.path, "Payload too large");
            return Err(ApiError::PayloadTooLarge);
        }
        Err(rejection) => return Err(malformed(request, ApiError::MALFORMED, rejection)),
    };

    if body.len() < MIN_PAYLOAD_LEN {
        return Err(malformed(request, ApiError::INVALID_LENGTH, &body.len()));
    }
    if !is_valid_payload(&body) {
        return Err(malformed(request, ApiError::DID_NOT_VALIDATE, &"outside alphabet"));
    }
    let key = match canonicalize(request.segment, route.key_len()) {
        Ok(key) => key,
        Err(e) => return Err(malformed(request, ApiError::BAD_URL, &e)),
    };

    match state.store.set(&key, body, state.expiration).await {
        Ok(()) => {
            log_served(request, StatusCode::OK);
            Ok(Reply::ok("ok"))
        }
        Err(e @ StoreError::Unavailable(_)) => {
            error!(client = %request.client, path = request.path, error = %e, "Store write failed");
            Err(ApiError::StoreUnavailable)
        }
        Err(e) => {
            error!(client = %request.client, path = request.path, error = %e, "Store refused write");
            Err(ApiError::StoreRejected)
        }
    }
}

fn log_served(request: &StoreRequest<'_>, status: StatusCode) {
    info!(
        client = %request.client,
        status = status.as_u16(),
        method = %request.method,
        path = request.path,
        "Request served"
    );
}

fn malformed(request: &StoreRequest<'_>, error: ApiError, reason: &dyn std::fmt::Display) -> ApiError {
    debug!(
        client = %request.client,
        method = %request.method,
        path = request.path,
        reason = %reason,
        "Malformed request"
    );
    error
}
