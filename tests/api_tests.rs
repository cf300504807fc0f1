//! Integration tests for the store routes.

mod common;

use axum::http::{Method, StatusCode};
use bytes::Bytes;
use common::{hex_key, Mode, TestApp, EMPTY_SHA256, ROUTES};
use std::time::Duration;
use webstore::codec::{z85, Algorithm};

#[tokio::test]
async fn empty_sha256_scenario() {
    let app = TestApp::new();
    let uri = format!("/store/sha256/{}", EMPTY_SHA256);

    let (status, body) = app.post(&uri, "00000").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let (status, body) = app.get(&uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "00000");
}

#[tokio::test]
async fn round_trip_every_algorithm() {
    let app = TestApp::new();

    for (i, (alg, len)) in ROUTES.iter().enumerate() {
        let key = hex_key(i as u8, *len);
        let payload = format!("{}.payload-{}", alg, i);
        let uri = format!("/store/{}/{}", alg, key);

        let (status, _) = app.post(&uri, payload.clone()).await;
        assert_eq!(status, StatusCode::OK, "{}", alg);

        let (status, body) = app.get(&uri).await;
        assert_eq!(status, StatusCode::OK, "{}", alg);
        assert_eq!(body, Bytes::from(payload), "{}", alg);
    }
}

#[tokio::test]
async fn payload_is_returned_byte_for_byte() {
    let app = TestApp::new();
    let raw: Vec<u8> = (0..=255u8).collect();
    let encoded = z85::encode_padded(&raw);
    let key = Algorithm::Sha512.digest_hex(&raw);
    let uri = format!("/store/sha512/{}", key);

    assert_eq!(app.post(&uri, encoded.clone()).await.0, StatusCode::OK);

    let (_, body) = app.get(&uri).await;
    assert_eq!(body, Bytes::from(encoded));
    assert_eq!(z85::decode_padded(&body).unwrap(), raw);
}

#[tokio::test]
async fn get_with_wrong_length_never_touches_store() {
    let app = TestApp::new();

    for (alg, len) in ROUTES {
        for bad_len in [0, 1, len - 1, len + 1, len * 2] {
            let uri = format!("/store/{}/{}", alg, "a".repeat(bad_len));
            let (status, body) = app.get(&uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{} len {}", alg, bad_len);
            assert_eq!(body, "malformed request");
        }
    }
    assert_eq!(app.store.operations(), 0);
}

#[tokio::test]
async fn empty_key_is_malformed() {
    let app = TestApp::new();
    let (status, _) = app.get("/store/md5/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post("/store/md5/", "00000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "malformed request - bad url");
}

#[tokio::test]
async fn key_case_is_normalized() {
    let app = TestApp::new();
    let lower = "abcdef0123456789abcdef0123456789";
    let upper = lower.to_ascii_uppercase();
    let mixed = "AbCdEf0123456789aBcDeF0123456789";

    let (status, _) = app.post(&format!("/store/md5/{}", upper), "Hello").await;
    assert_eq!(status, StatusCode::OK);

    for key in [lower, mixed, upper.as_str()] {
        let (status, body) = app.get(&format!("/store/md5/{}", key)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Hello");
    }
    assert_eq!(app.store.inner.get_value(lower), Some(Bytes::from("Hello")));
}

#[tokio::test]
async fn non_hex_keys_are_rejected() {
    let app = TestApp::new();

    for (alg, len) in ROUTES {
        let mut key = "0".repeat(len - 1);
        key.push('g');
        let uri = format!("/store/{}/{}", alg, key);

        let (status, body) = app.get(&uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "malformed request");

        let (status, body) = app.post(&uri, "00000").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "malformed request - bad url");
    }
    assert_eq!(app.store.operations(), 0);
}

#[tokio::test]
async fn post_with_wrong_length_is_bad_url() {
    let app = TestApp::new();
    let (status, body) = app.post("/store/sha1/abc", "00000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "malformed request - bad url");
}

#[tokio::test]
async fn short_bodies_are_rejected() {
    let app = TestApp::new();
    let uri = format!("/store/sha256/{}", EMPTY_SHA256);

    for body in ["", "0", "abcd", "`;`;"] {
        let (status, reply) = app.post(&uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply, "malformed request - invalid length");
    }
    assert_eq!(app.store.sets(), 0);
}

#[tokio::test]
async fn bodies_outside_alphabet_are_rejected() {
    let app = TestApp::new();
    let uri = format!("/store/sha256/{}", EMPTY_SHA256);

    for body in ["abcd`", "abc;d", "hello world", "quote\"d", "back\\slash", "tab\tbed"] {
        let (status, reply) = app.post(&uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{:?}", body);
        assert_eq!(reply, "malformed request - data did not validate");
    }
    assert_eq!(app.store.sets(), 0);
    assert_eq!(app.get(&uri).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_key_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app.get(&format!("/store/sha224/{}", hex_key(3, 56))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "not found");
}

#[tokio::test]
async fn expired_record_is_not_found() {
    let app = TestApp::with(|state| state.with_expiration(Some(Duration::from_secs(1))));
    let uri = format!("/store/sha256/{}", EMPTY_SHA256);

    assert_eq!(app.post(&uri, "00000").await.0, StatusCode::OK);
    assert_eq!(app.get(&uri).await.0, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(app.get(&uri).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn last_write_wins() {
    let app = TestApp::new();
    let uri = format!("/store/sha256/{}", EMPTY_SHA256);

    app.post(&uri, "first").await;
    app.post(&uri, "second").await;
    assert_eq!(app.get(&uri).await.1, "second");
}

#[tokio::test]
async fn other_methods_not_allowed() {
    let app = TestApp::new();
    let uri = format!("/store/sha256/{}", EMPTY_SHA256);

    for method in [Method::PUT, Method::DELETE, Method::PATCH, Method::OPTIONS] {
        let (status, body) = app.send(method.clone(), &uri, Bytes::new()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        assert_eq!(body, "method not allowed");
    }
    assert_eq!(app.store.operations(), 0);
}

#[tokio::test]
async fn shutdown_rejects_everything_without_store_traffic() {
    let app = TestApp::new();
    let uri = format!("/store/sha256/{}", EMPTY_SHA256);
    assert_eq!(app.post(&uri, "00000").await.0, StatusCode::OK);
    let before = app.store.operations();

    app.state.shutdown.trigger();

    let requests = [
        (Method::GET, uri.clone(), ""),
        (Method::POST, uri.clone(), "00000"),
        (Method::GET, "/store/md5/short".to_string(), ""),
        (Method::POST, "/store/sha1/zz".to_string(), "`"),
        (Method::DELETE, uri.clone(), ""),
    ];
    for (method, uri, body) in requests {
        let (status, reply) = app.send(method, &uri, Bytes::from(body)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(reply, "service unavailable: shutting down");
    }
    assert_eq!(app.store.operations(), before);
}

#[tokio::test]
async fn store_failure_is_unavailable() {
    let app = TestApp::new();
    let uri = format!("/store/sha256/{}", EMPTY_SHA256);
    app.store.set_mode(Mode::Unavailable);

    let (status, body) = app.get(&uri).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "service unavailable");

    let (status, body) = app.post(&uri, "00000").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "service unavailable");
}

#[tokio::test]
async fn rejected_write_is_internal_error() {
    let app = TestApp::new();
    let uri = format!("/store/sha256/{}", EMPTY_SHA256);
    app.store.set_mode(Mode::Rejecting);

    let (status, body) = app.post(&uri, "00000").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "internal server error");
}

#[tokio::test]
async fn store_error_reply_to_get_is_not_found() {
    let app = TestApp::new();
    let uri = format!("/store/sha256/{}", EMPTY_SHA256);
    app.store.set_mode(Mode::Rejecting);

    let (status, body) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "not found");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = TestApp::with(|state| state.with_max_payload_bytes(16));
    let uri = format!("/store/sha256/{}", EMPTY_SHA256);

    let (status, body) = app.post(&uri, "0".repeat(17)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, "payload too large");
    assert_eq!(app.store.sets(), 0);

    assert_eq!(app.post(&uri, "0".repeat(16)).await.0, StatusCode::OK);
}

#[tokio::test]
async fn unknown_algorithm_is_not_routed() {
    let app = TestApp::new();
    let (status, _) = app.get(&format!("/store/blake3/{}", EMPTY_SHA256)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.operations(), 0);
}
