use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::bucket::BucketHandler;
use crate::clock::{Clock, TokioClock};
use crate::error::DispatchError;
use crate::events::{self, DispatchEvent, EventSender};
use crate::request::{assemble, Request, RouteIdentifier};
use crate::response::Decoded;
use crate::transport::{IsahcTransport, Transport};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for a [`Manager`], per §3 `Manager.options` / §6 External
/// interfaces. Every field has a documented default; `offset` is modeled
/// as a [`Duration`], which cannot be negative, so the "clamp to ≥ 0 at
/// construction" rule is satisfied by the type rather than a runtime
/// check.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub api_base: String,
    pub cdn_base: String,
    pub version: u8,
    pub user_agent_appendix: String,
    pub offset: Duration,
    pub retries: u32,
    pub timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            api_base: "https://discord.com/api".to_string(),
            cdn_base: "https://cdn.discordapp.com".to_string(),
            version: 7,
            user_agent_appendix: format!("rust/{VERSION}"),
            offset: Duration::from_millis(100),
            retries: 1,
            timeout: Duration::from_secs(15),
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl ManagerOptions {
    /// Builds the default options. `DISCORD_TOKEN` (§6 Environment) is
    /// applied separately by [`Manager::new`], since the bearer token is
    /// part of `Manager`'s own state (§3), not its options.
    pub fn from_env() -> Self {
        Self::default()
    }
}

/// The state shared between a [`Manager`] handle and every
/// [`BucketHandler`] it owns. Bucket handlers borrow this for the
/// duration of a single `push` call rather than holding an owned `Arc` to
/// it, so there is no reference cycle between `queues` and the handlers it
/// stores.
pub struct ManagerInner {
    hashes: Mutex<HashMap<String, String>>,
    queues: Mutex<HashMap<String, Arc<BucketHandler>>>,
    global_timeout: Mutex<Option<Instant>>,
    token: Mutex<Option<String>>,
    options: ManagerOptions,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn Transport>,
    events: EventSender,
}

impl ManagerInner {
    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub(crate) fn events(&self) -> &EventSender {
        &self.events
    }

    pub(crate) async fn update_hash(&self, key: &str, hash: String) {
        self.hashes.lock().await.insert(key.to_string(), hash);
    }

    /// "Extends-only" coalescing (§9 design notes): a new global deadline
    /// only replaces the stored one if it resolves later, so a
    /// short-lived 429 can't shorten a longer global cooldown already in
    /// effect.
    pub(crate) async fn set_global_timeout(&self, deadline: Instant) {
        let mut guard = self.global_timeout.lock().await;
        if guard.map_or(true, |current| deadline > current) {
            *guard = Some(deadline);
        }
    }

    /// §3 Manager.globalTimeout: "optional delay-in-progress... Cleared on
    /// completion." Once the observed deadline has passed, clear it back to
    /// `None` — but only if nobody installed a longer-lived extension while
    /// we were sleeping, so a concurrently-observed global header can't be
    /// dropped by a waiter that started on the earlier deadline.
    pub(crate) async fn wait_for_global(&self) {
        loop {
            let deadline = *self.global_timeout.lock().await;
            match deadline {
                Some(deadline) if self.clock.now() < deadline => {
                    self.clock.sleep_until(deadline).await;
                }
                Some(deadline) => {
                    let mut guard = self.global_timeout.lock().await;
                    if *guard == Some(deadline) {
                        *guard = None;
                    }
                    break;
                }
                None => break,
            }
        }
    }
}

/// Coordinates rate-limit-aware dispatch of requests to the Discord REST
/// API, per §3/§4.E. Owns the bucket-hash table, the per-bucket handler
/// queues, the global rate-limit latch, and the bearer token; learns
/// bucket hashes from response headers and migrates requests onto them
/// lazily.
pub struct Manager {
    inner: Arc<ManagerInner>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Manager {
    pub fn new(options: ManagerOptions) -> Self {
        Self::with_transport_and_clock(options, Arc::new(TokioClock), None)
    }

    pub fn with_transport(options: ManagerOptions, transport: Arc<dyn Transport>) -> Self {
        Self::with_transport_and_clock(options, Arc::new(TokioClock), Some(transport))
    }

    /// Primarily for tests: substitute both the clock and the transport.
    pub fn with_clock_and_transport(
        options: ManagerOptions,
        clock: Arc<dyn Clock>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_transport_and_clock(options, clock, Some(transport))
    }

    fn with_transport_and_clock(
        options: ManagerOptions,
        clock: Arc<dyn Clock>,
        transport: Option<Arc<dyn Transport>>,
    ) -> Self {
        let transport = match transport {
            Some(t) => t,
            None => Arc::new(
                IsahcTransport::new().expect("isahc client construction never fails for defaults"),
            ),
        };
        let sweep_interval = options.sweep_interval;
        let inner = Arc::new(ManagerInner {
            hashes: Mutex::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            global_timeout: Mutex::new(None),
            token: Mutex::new(std::env::var("DISCORD_TOKEN").ok()),
            options,
            clock,
            transport,
            events: events::channel(64),
        });

        let sweeper = spawn_sweeper(Arc::downgrade(&inner), sweep_interval);

        Self {
            inner,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    pub async fn set_token(&self, token: impl Into<String>) {
        *self.inner.token.lock().await = Some(token.into());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.inner.events.subscribe()
    }

    /// Dispatches a request, waiting on whatever rate limits currently
    /// apply, retrying per policy, and returning the decoded body or a
    /// terminal [`DispatchError`], per §4.E.
    pub async fn queue_request(
        &self,
        route: RouteIdentifier,
        request: Request,
    ) -> Result<Decoded, DispatchError> {
        let method_label = format!("{}-{}", request.method, route.route);

        let hash = {
            let hashes = self.inner.hashes.lock().await;
            hashes.get(&method_label).cloned()
        }
        .unwrap_or_else(|| format!("unknown:{}", route.route));

        let bucket_id = format!("{hash}:{}", route.major_parameter);

        let handler = {
            let mut queues = self.inner.queues.lock().await;
            queues
                .entry(bucket_id.clone())
                .or_insert_with(|| {
                    Arc::new(BucketHandler::new(
                        bucket_id.clone(),
                        hash.clone(),
                        route.major_parameter.clone(),
                    ))
                })
                .clone()
        };

        let token = self.inner.token.lock().await.clone();
        let bound_to_global = request.bound_to_global;
        let assembled = assemble(&request, &self.inner.options, token.as_deref())?;

        trace!(bucket = %bucket_id, "queued request");
        handler
            .push(&self.inner, assembled, &route, &method_label, bound_to_global)
            .await
    }

    /// Stops the sweeper and waits for every currently-tracked bucket's
    /// FIFO to drain (supplemental feature #4 — §4.E leaves the exact
    /// shutdown API to the implementer).
    pub async fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.abort();
        }
        loop {
            let handlers: Vec<Arc<BucketHandler>> = {
                let queues = self.inner.queues.lock().await;
                queues.values().cloned().collect()
            };
            let now = self.inner.clock.now();
            let mut all_idle = true;
            for handler in &handlers {
                if !handler.is_inactive(now).await {
                    all_idle = false;
                    break;
                }
            }
            if all_idle {
                break;
            }
            self.inner.clock.sleep(Duration::from_millis(25)).await;
        }
    }

    /// Test-only: whether a handler for this `hash:majorParameter` bucket
    /// id is currently tracked, without reaching into private state. Used
    /// to assert the sweeper's §8 invariant 4 ("never drops a handler
    /// whose queue is non-empty or that is limited").
    #[cfg(any(test, feature = "test-support"))]
    pub async fn contains_bucket(&self, bucket_id: &str) -> bool {
        self.inner.queues.lock().await.contains_key(bucket_id)
    }
}

fn spawn_sweeper(weak_inner: std::sync::Weak<ManagerInner>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(inner) = weak_inner.upgrade() else {
                break;
            };
            inner.clock.sleep(interval).await;

            let now = inner.clock.now();
            let mut queues = inner.queues.lock().await;
            let mut removed = 0;
            let mut keep = HashMap::new();
            for (id, handler) in queues.drain() {
                if handler.is_inactive(now).await {
                    removed += 1;
                } else {
                    keep.insert(id, handler);
                }
            }
            *queues = keep;
            drop(queues);
            if removed > 0 {
                debug!(removed, "swept inactive buckets");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::{FakeTransport, Scripted};
    use isahc::http::{HeaderMap, HeaderValue, StatusCode};

    #[tokio::test(start_paused = true)]
    async fn queue_request_decodes_successful_json_response() {
        let mut headers = HeaderMap::new();
        headers.insert(
            isahc::http::HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        );
        let transport = Arc::new(FakeTransport::new(vec![Scripted::json(
            StatusCode::OK,
            headers,
            &serde_json::json!({"id": "1"}),
        )]));

        let manager = Manager::with_transport_and_clock(
            ManagerOptions::default(),
            Arc::new(crate::clock::TokioClock),
            Some(transport),
        );
        manager.set_token("tok").await;

        let route = RouteIdentifier::new("/channels/{channel.id}/messages", "1");
        let result = manager
            .queue_request(route, Request::get("/channels/1/messages"))
            .await
            .unwrap();
        match result {
            Decoded::Json(v) => assert_eq!(v["id"], "1"),
            _ => panic!("expected json"),
        }
    }
}
