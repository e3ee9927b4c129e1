use std::time::Duration;

use isahc::http::Method;
use tokio::sync::broadcast;

use crate::request::RouteIdentifier;

/// Observational events emitted alongside (not instead of) `tracing` logs,
/// per §4.F. Emission is a synchronous `broadcast::Sender::send`, which
/// never awaits and drops silently when nobody is subscribed — the request
/// path can never be backpressured by a slow or absent listener.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// §4.D step 3, "Local wait": a request was made to wait because its
    /// bucket was already known to be locally exhausted from a previous
    /// response. Carries the fields §4.D names: `{ timeToReset, limit,
    /// method, hash, route, majorParameter }` (`route` already carries its
    /// own `majorParameter`).
    Ratelimited {
        route: RouteIdentifier,
        bucket_hash: Option<String>,
        limit: Option<u32>,
        method: Method,
        time_to_reset: Duration,
    },
    /// Free-form diagnostic text: bucket-hash migration, sweeper activity,
    /// retry attempts. A structured, subscribable event instead of stdout
    /// noise.
    Debug(String),
}

/// The sending half lives on [`crate::manager::Manager`]; callers who want
/// to observe events call [`crate::manager::Manager::subscribe`] to obtain
/// a [`broadcast::Receiver`].
pub type EventSender = broadcast::Sender<DispatchEvent>;

pub fn channel(capacity: usize) -> EventSender {
    let (tx, _rx) = broadcast::channel(capacity);
    tx
}

/// Sends without waiting for a receiver and swallows the "no receivers"
/// error, since events are opportunistic observability, not a required
/// delivery.
pub fn emit(sender: &EventSender, event: DispatchEvent) {
    let _ = sender.send(event);
}
