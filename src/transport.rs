use async_trait::async_trait;
use isahc::http::{HeaderMap, StatusCode};
use isahc::AsyncReadResponseExt;

use crate::error::TransportError;
use crate::request::AssembledRequest;

/// The bytes, status, and headers of a response, independent of transport.
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Abstraction over the HTTP client, per §4.H. The production
/// implementation ([`IsahcTransport`]) wraps a single process-wide
/// keep-alive connection pool; tests substitute a scripted fake so the
/// bucket/manager state machine can be exercised without real network
/// calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: AssembledRequest) -> Result<RawResponse, TransportError>;
}

/// Wraps a single `isahc::HttpClient` as one process-wide connection pool,
/// rather than building an ad hoc `isahc::Request` per call through the bare
/// `isahc::send_async` function, so connection reuse is under the
/// `Manager`'s control instead of isahc's implicit default client.
pub struct IsahcTransport {
    client: isahc::HttpClient,
}

impl IsahcTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = isahc::HttpClient::new().map_err(|e| TransportError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for IsahcTransport {
    async fn send(&self, request: AssembledRequest) -> Result<RawResponse, TransportError> {
        let mut builder = isahc::Request::builder()
            .method(request.method)
            .uri(request.url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name.clone(), value.clone());
        }
        let http_request = builder
            .body(isahc::Body::from(request.body))
            .map_err(|e| TransportError(e.to_string()))?;

        let mut response = self
            .client
            .send_async(http_request)
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use std::sync::Mutex;

    use super::*;

    /// A scripted response, or a forced transport-level failure, for one
    /// call to [`FakeTransport::send`].
    pub enum Scripted {
        Response(RawResponse),
        Fail(String),
    }

    impl Scripted {
        pub fn json(status: StatusCode, headers: HeaderMap, body: &serde_json::Value) -> Self {
            Scripted::Response(RawResponse {
                status,
                headers,
                body: serde_json::to_vec(body).unwrap(),
            })
        }

        pub fn status(status: StatusCode, headers: HeaderMap) -> Self {
            Scripted::Response(RawResponse {
                status,
                headers,
                body: Vec::new(),
            })
        }
    }

    /// A transport whose responses are scripted in advance, for
    /// deterministic tests of the bucket/manager retry and rate-limit
    /// logic without touching the network.
    pub struct FakeTransport {
        scripted: Mutex<std::collections::VecDeque<Scripted>>,
        pub requests: Mutex<Vec<AssembledRequest>>,
    }

    impl FakeTransport {
        pub fn new(scripted: Vec<Scripted>) -> Self {
            Self {
                scripted: Mutex::new(scripted.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: AssembledRequest) -> Result<RawResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            match self.scripted.lock().unwrap().pop_front() {
                Some(Scripted::Response(r)) => Ok(r),
                Some(Scripted::Fail(e)) => Err(TransportError(e)),
                None => Err(TransportError("fake transport exhausted".to_string())),
            }
        }
    }
}
