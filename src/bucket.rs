use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::error::DispatchError;
use crate::events::{self, DispatchEvent};
use crate::headers::RateLimitHeaders;
use crate::manager::ManagerInner;
use crate::request::{AssembledRequest, RouteIdentifier};
use crate::response::{self, Decoded};
use crate::transport::RawResponse;

/// Local rate-limit state for one bucket, per §3 `BucketHandler`.
#[derive(Debug, Clone, Default)]
pub struct BucketState {
    pub limit: Option<u32>,
    pub remaining: i64,
    pub reset: Option<Instant>,
}

impl BucketState {
    fn is_limited(&self, now: Instant) -> bool {
        self.remaining <= 0 && self.reset.map_or(false, |reset| now < reset)
    }
}

/// Owns the serial FIFO queue for one `bucketHash:majorParameter` pair.
///
/// Serialization is a `tokio::sync::Semaphore` of capacity 1: Tokio's
/// semaphore wakes waiters in the order they called `acquire`, and the
/// permit it hands out releases the head of the line on every exit path
/// (return, `?`, or future cancellation) purely through RAII, with no
/// separate "release" bookkeeping to get wrong.
pub struct BucketHandler {
    pub id: String,
    pub hash: String,
    pub major_parameter: String,
    gate: Semaphore,
    inflight: AtomicUsize,
    state: Mutex<BucketState>,
}

impl BucketHandler {
    pub fn new(id: String, hash: String, major_parameter: String) -> Self {
        Self {
            id,
            hash,
            major_parameter,
            gate: Semaphore::new(1),
            inflight: AtomicUsize::new(0),
            state: Mutex::new(BucketState::default()),
        }
    }

    pub async fn snapshot(&self) -> BucketState {
        self.state.lock().await.clone()
    }

    /// Whether this handler can be swept: nothing queued or in flight, and
    /// not presently within a known local reset window. Sweep cadence
    /// itself is a tunable on `ManagerOptions`, not a contractual
    /// guarantee (§9 design notes).
    pub async fn is_inactive(&self, now: Instant) -> bool {
        self.inflight.load(Ordering::SeqCst) == 0 && !self.state.lock().await.is_limited(now)
    }

    /// Enters the FIFO queue, waits for any known local/global rate limit
    /// to clear, sends, and retries per §4.D. Returns once a definitive
    /// outcome (decoded success, or a terminal error) is reached.
    pub async fn push(
        &self,
        inner: &ManagerInner,
        assembled: AssembledRequest,
        route: &RouteIdentifier,
        method_label: &str,
        bound_to_global: bool,
    ) -> Result<Decoded, DispatchError> {
        self.inflight.fetch_add(1, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .expect("bucket semaphore is never closed");
        let result = self
            .make_request(inner, assembled, route, method_label, bound_to_global)
            .await;
        self.inflight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn make_request(
        &self,
        inner: &ManagerInner,
        assembled: AssembledRequest,
        route: &RouteIdentifier,
        method_label: &str,
        bound_to_global: bool,
    ) -> Result<Decoded, DispatchError> {
        let mut retries = 0u32;
        loop {
            self.wait_if_locally_limited(inner, route, assembled.method.clone())
                .await;
            if bound_to_global {
                inner.wait_for_global().await;
            }

            trace!(bucket = %self.id, url = %assembled.url, "sending request");
            let attempt = with_timeout(
                inner.clock(),
                inner.options().timeout,
                inner.transport().send(assembled.clone()),
            )
            .await;

            let raw = match attempt {
                None => {
                    if retries < inner.options().retries {
                        retries += 1;
                        trace!(bucket = %self.id, retries, "request timed out, retrying");
                        continue;
                    }
                    return Err(DispatchError::Timeout(assembled.url.clone()));
                }
                Some(Err(transport_err)) => return Err(transport_err.into()),
                Some(Ok(raw)) => raw,
            };

            self.apply_headers(inner, &raw, method_label).await;

            if raw.status == isahc::http::StatusCode::TOO_MANY_REQUESTS {
                let headers = RateLimitHeaders::parse(&raw.headers);
                let retry_after = headers.retry_after.unwrap_or_default() + inner.options().offset;
                // §4.D Classify/429: this is a `Debug` observation, not a
                // `Ratelimited` one — `Ratelimited` is reserved for the
                // local-wait step where a *previously learned* bucket state
                // makes us wait before ever sending (see seed scenario 2).
                events::emit(
                    inner.events(),
                    DispatchEvent::Debug(format!(
                        "bucket {} hit 429, retrying after {retry_after:?} (global={})",
                        self.id, headers.global
                    )),
                );
                warn!(bucket = %self.id, ?retry_after, global = headers.global, "hit 429");
                inner.clock().sleep(retry_after).await;
                // a 429 does not consume a retry attempt (§4.D).
                continue;
            }

            if raw.status.is_success() {
                let content_type = raw
                    .headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok());
                return response::decode_success(content_type, raw.body);
            }

            if raw.status.is_server_error() {
                if retries < inner.options().retries {
                    retries += 1;
                    trace!(bucket = %self.id, retries, status = %raw.status, "server error, retrying");
                    continue;
                }
                warn!(bucket = %self.id, status = %raw.status, "retries exhausted after server error");
                return Err(response::decode_http_error(
                    assembled.method.clone(),
                    assembled.url.clone(),
                    raw.status,
                )
                .into());
            }

            if raw.status.is_client_error() {
                return Err(response::decode_api_error(
                    assembled.method.clone(),
                    assembled.url.clone(),
                    raw.status,
                    &raw.body,
                )
                .into());
            }

            return Ok(Decoded::Empty);
        }
    }

    /// §4.D step 3, "Local wait": if a previously-learned response already
    /// put this bucket in a limited state, emit `Ratelimited` and sleep
    /// until the known reset before ever sending.
    async fn wait_if_locally_limited(
        &self,
        inner: &ManagerInner,
        route: &RouteIdentifier,
        method: isahc::http::Method,
    ) {
        let now = inner.clock().now();
        let limited = {
            let state = self.state.lock().await;
            if state.is_limited(now) {
                Some((state.reset, state.limit))
            } else {
                None
            }
        };
        let Some((Some(deadline), limit)) = limited else {
            return;
        };
        // `is_limited` already established `now < deadline` under the same
        // lock, so this subtraction cannot underflow.
        let time_to_reset = deadline - now;
        events::emit(
            inner.events(),
            DispatchEvent::Ratelimited {
                route: route.clone(),
                bucket_hash: Some(self.hash.clone()),
                limit,
                method,
                time_to_reset,
            },
        );
        inner.clock().sleep_until(deadline).await;
    }

    async fn apply_headers(&self, inner: &ManagerInner, raw: &RawResponse, method_label: &str) {
        let parsed = RateLimitHeaders::parse(&raw.headers);
        let now = inner.clock().now();

        {
            let mut state = self.state.lock().await;
            if let Some(limit) = parsed.limit {
                state.limit = Some(limit);
            }
            if let Some(remaining) = parsed.remaining {
                state.remaining = remaining;
                // §9 open question, resolved: when Reset-After is absent,
                // reset = now (no offset), preserving the upstream quirk
                // that a remaining=0 bucket with no Reset-After is treated
                // as not-limited from the moment it's first observed.
                state.reset = Some(match parsed.reset_after {
                    Some(reset_after) => now + reset_after + inner.options().offset,
                    None => now,
                });
            }
        }

        if let Some(new_hash) = &parsed.bucket {
            if *new_hash != self.hash {
                debug!(old = %self.hash, new = %new_hash, "bucket hash migrated");
                events::emit(
                    inner.events(),
                    DispatchEvent::Debug(format!(
                        "bucket hash for {method_label} migrated from {} to {new_hash}",
                        self.hash
                    )),
                );
                inner.update_hash(method_label, new_hash.clone()).await;
            }
        }

        if parsed.global {
            if let Some(retry_after) = parsed.retry_after {
                let deadline = now + retry_after + inner.options().offset;
                inner.set_global_timeout(deadline).await;
                events::emit(
                    inner.events(),
                    DispatchEvent::Debug("global rate limit activated".to_string()),
                );
            }
        }
    }
}

/// Races a future against a clock-driven timeout. Returns `None` on
/// timeout rather than a `Result`, since the caller already distinguishes
/// timeout from transport failure by match arm.
async fn with_timeout<F, T>(clock: &dyn Clock, timeout: Duration, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        result = fut => Some(result),
        _ = clock.sleep(timeout) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_when_remaining_zero_and_reset_in_future() {
        let state = BucketState {
            limit: Some(5),
            remaining: 0,
            reset: Some(Instant::now() + Duration::from_secs(5)),
        };
        assert!(state.is_limited(Instant::now()));
    }

    #[test]
    fn not_limited_once_reset_has_passed() {
        let now = Instant::now();
        let state = BucketState {
            limit: Some(5),
            remaining: 0,
            reset: Some(now),
        };
        assert!(!state.is_limited(now));
    }

    #[test]
    fn not_limited_with_remaining_quota() {
        let state = BucketState {
            limit: Some(5),
            remaining: 3,
            reset: Some(Instant::now() + Duration::from_secs(5)),
        };
        assert!(!state.is_limited(Instant::now()));
    }
}
