//! Client side of the service, used by `webstore-post`.
//!
//! The key of a posted payload is the digest of the *raw* bytes, while the
//! body is their padded Z85 encoding. A caller may instead supply a token of
//! any supported width; the algorithm then follows from its length.

use crate::codec::{canonicalize, z85, Algorithm, KeyError, Z85Error};
use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status code: {status} ({body})")]
    Status { status: u16, body: String },

    #[error("invalid token: {0}")]
    Token(#[from] KeyError),

    #[error("token length {0} matches no supported algorithm")]
    TokenLength(usize),

    #[error("token is for {token}, not {requested}")]
    AlgorithmMismatch {
        token: Algorithm,
        requested: Algorithm,
    },

    #[error("stored payload is not padded Z85: {0}")]
    Decode(#[from] Z85Error),
}

/// An encoded payload and the key it will be stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPost {
    pub algorithm: Algorithm,
    pub token: String,
    pub encoded: String,
}

/// Works out the key for `raw` and encodes it.
///
/// With no token the digest of `raw` under `algorithm` (default sha256) is
/// used. A supplied token picks its algorithm by length.
pub fn prepare(
    raw: &[u8],
    algorithm: Option<Algorithm>,
    token: Option<&str>,
) -> Result<PreparedPost, ClientError> {
    let (algorithm, token) = match token {
        Some(token) => {
            let token_alg = Algorithm::from_key_len(token.len())
                .ok_or(ClientError::TokenLength(token.len()))?;
            if let Some(requested) = algorithm {
                if requested != token_alg {
                    return Err(ClientError::AlgorithmMismatch {
                        token: token_alg,
                        requested,
                    });
                }
            }
            (token_alg, canonicalize(token, token_alg.key_len())?)
        }
        None => {
            let algorithm = algorithm.unwrap_or(Algorithm::Sha256);
            (algorithm, algorithm.digest_hex(raw))
        }
    };

    Ok(PreparedPost {
        algorithm,
        token,
        encoded: z85::encode_padded(raw),
    })
}

/// HTTP client for one webstore server.
#[derive(Debug, Clone)]
pub struct StoreClient {
    base_url: String,
    http: reqwest::Client,
}

impl StoreClient {
    pub fn new(host: &str, port: u16, https: bool) -> Result<Self, ClientError> {
        let scheme = if https { "https" } else { "http" };
        let http = reqwest::Client::builder()
            .user_agent(concat!("webstore-post/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: format!("{}://{}:{}", scheme, host, port),
            http,
        })
    }

    /// `{base}/store/{alg}/{token}`
    pub fn url(&self, algorithm: Algorithm, token: &str) -> String {
        format!("{}{}{}", self.base_url, algorithm.route_prefix(), token)
    }

    /// POSTs a prepared payload. Anything but 200 is an error.
    pub async fn post(&self, prepared: &PreparedPost) -> Result<(), ClientError> {
        let url = self.url(prepared.algorithm, &prepared.token);
        debug!(%url, bytes = prepared.encoded.len(), "Posting payload");

        let response = self.http.post(&url).body(prepared.encoded.clone()).send().await?;
        check_status(response).await.map(|_| ())
    }

    /// GETs the stored (still encoded) payload.
    pub async fn fetch(&self, algorithm: Algorithm, token: &str) -> Result<Bytes, ClientError> {
        let token = canonicalize(token, algorithm.key_len())?;
        let url = self.url(algorithm, &token);
        debug!(%url, "Fetching payload");

        let response = self.http.get(&url).send().await?;
        check_status(response).await
    }

    /// GETs and decodes a payload posted by [`StoreClient::post`].
    pub async fn fetch_decoded(&self, algorithm: Algorithm, token: &str) -> Result<Vec<u8>, ClientError> {
        let encoded = self.fetch(algorithm, token).await?;
        Ok(z85::decode_padded(&encoded)?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<Bytes, ClientError> {
    let status = response.status();
    let body = response.bytes().await?;
    if status != StatusCode::OK {
        return Err(ClientError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    Ok(body)
}
