//! A rate-limit-aware HTTP request dispatcher for the Discord REST API.
//!
//! This crate owns bucket-hash learning, per-bucket serial FIFO queuing,
//! global rate-limit coordination, retrying, and request
//! assembly/response decoding. It deliberately does not know about
//! Discord's actual endpoints: the route catalog, the CDN URL builder, the
//! public REST facade, and token acquisition all sit above this crate and
//! are out of scope here (a handful of example routes live under
//! [`routes::examples`] purely so tests have something concrete to call).

pub mod bucket;
pub mod clock;
pub mod error;
pub mod events;
pub mod headers;
pub mod manager;
pub mod multipart;
pub mod request;
pub mod response;
pub mod routes;
pub mod transport;

pub use bucket::{BucketHandler, BucketState};
pub use clock::{Clock, TokioClock};
pub use error::{ApiError, ConfigurationError, DispatchError, HttpError, TransportError, ValidationError};
pub use events::DispatchEvent;
pub use manager::{Manager, ManagerOptions};
pub use request::{QueryParam, Request, RequestFile, RouteIdentifier};
pub use response::Decoded;
pub use transport::{IsahcTransport, Transport};
