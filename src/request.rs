use derive_setters::Setters;
use isahc::http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::error::{ConfigurationError, DispatchError};
use crate::manager::ManagerOptions;
use crate::multipart;

/// Identifies the bucket family a request belongs to, per §3. `route` is
/// the generalized template (e.g. `/channels/{channel.id}/messages`, with
/// snowflake segments collapsed) used as the fallback key before a bucket
/// hash has been learned; `major_parameter` is the value that keeps
/// per-resource buckets distinct (channel/guild/webhook id), defaulting to
/// the empty string when a route has none.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteIdentifier {
    pub route: String,
    pub major_parameter: String,
}

impl RouteIdentifier {
    pub fn new(route: impl Into<String>, major_parameter: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            major_parameter: major_parameter.into(),
        }
    }
}

/// A single query-string pair. `None` values are dropped during assembly,
/// matching §3's "null/undefined values are omitted" rule.
#[derive(Debug, Clone)]
pub struct QueryParam {
    pub name: String,
    pub value: Option<String>,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn optional(name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            value: value.map(Into::into),
        }
    }
}

/// A file to attach as part of a `multipart/form-data` body (§4.B).
#[derive(Debug, Clone)]
pub struct RequestFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl RequestFile {
    /// §4.B: "Each file appended as `(name, content, name)`" — the caller's
    /// `name` is used as both the multipart field name and the filename.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        Self {
            field_name: name.clone(),
            file_name: name,
            content_type: None,
            data,
        }
    }
}

/// A single HTTP request bound for the dispatcher, per §3 `Request`.
///
/// `auth` defaults to `true` (send the bot token); routes that must bypass
/// authorization (none in this crate's scope, since OAuth flows live in the
/// out-of-scope facade) can set it `false`. `reason` becomes the audit-log
/// header (§4.B).
#[derive(Debug, Clone, Setters)]
#[setters(strip_option)]
pub struct Request {
    #[setters(skip)]
    pub method: Method,
    #[setters(skip)]
    pub endpoint: String,

    pub query: Vec<QueryParam>,
    pub extra_headers: Vec<(String, String)>,
    pub data: Option<serde_json::Value>,
    pub files: Vec<RequestFile>,
    pub auth: bool,
    pub reason: Option<String>,
    /// Whether this request is subject to the global rate limit (§4.D).
    /// Interaction-callback and webhook-execution routes are not; every
    /// other route is. Defaults to `true`.
    pub bound_to_global: bool,
}

impl Request {
    fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            extra_headers: Vec::new(),
            data: None,
            files: Vec::new(),
            auth: true,
            reason: None,
            bound_to_global: true,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }
}

/// Output of request assembly (§4.B): everything the transport needs to
/// actually send bytes over the wire.
#[derive(Clone)]
pub struct AssembledRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

fn build_query(query: &[QueryParam]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for param in query {
        if let Some(value) = &param.value {
            serializer.append_pair(&param.name, value);
        }
    }
    serializer.finish()
}

/// Assembles a [`Request`] into wire-ready form: URL templating, query
/// encoding, auth header, audit-log reason header, and JSON-vs-multipart
/// body selection, per §4.B.
pub fn assemble(
    request: &Request,
    options: &ManagerOptions,
    token: Option<&str>,
) -> Result<AssembledRequest, DispatchError> {
    let mut url = format!(
        "{}/v{}{}",
        options.api_base.trim_end_matches('/'),
        options.version,
        request.endpoint
    );
    let query = build_query(&request.query);
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query);
    }

    // Merge order per §4.B: caller headers first, then body-type headers,
    // then the mandatory headers last, so nothing a caller sets can
    // clobber the manager's own auth/reason/user-agent (`HeaderMap::insert`
    // replaces any existing value for that name).
    let mut headers = HeaderMap::new();

    for (name, value) in &request.extra_headers {
        headers.insert(
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigurationError(e.to_string()))?,
            HeaderValue::from_str(value).map_err(|e| ConfigurationError(e.to_string()))?,
        );
    }

    let body = if !request.files.is_empty() {
        let (content_type, body) = multipart::encode(request.data.as_ref(), &request.files);
        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_str(&content_type).map_err(|e| ConfigurationError(e.to_string()))?,
        );
        body
    } else if let Some(data) = &request.data {
        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        );
        serde_json::to_vec(data).map_err(|e| ConfigurationError(e.to_string()))?
    } else {
        Vec::new()
    };

    headers.insert(
        HeaderName::from_static("user-agent"),
        HeaderValue::from_str(&format!(
            "DiscordBot ({}, {})",
            env!("CARGO_PKG_REPOSITORY"),
            options.user_agent_appendix
        ))
        .unwrap_or_else(|_| HeaderValue::from_static("DiscordBot")),
    );

    if request.auth {
        let token = token.ok_or_else(|| {
            ConfigurationError("no bot token configured for an authorized request".to_string())
        })?;
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bot {token}"))
                .map_err(|e| ConfigurationError(e.to_string()))?,
        );
    }

    if let Some(reason) = &request.reason {
        let encoded: String = url::form_urlencoded::byte_serialize(reason.as_bytes()).collect();
        headers.insert(
            HeaderName::from_static("x-audit-log-reason"),
            HeaderValue::from_str(&encoded).map_err(|e| ConfigurationError(e.to_string()))?,
        );
    }

    Ok(AssembledRequest {
        method: request.method.clone(),
        url,
        headers,
        body,
    })
}
