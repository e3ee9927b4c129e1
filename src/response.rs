use isahc::http::{Method, StatusCode};

use crate::error::{ApiError, DispatchError, HttpError};

/// A successfully decoded response body. This crate does not know the
/// per-endpoint response shape (that belongs to the out-of-scope route
/// catalog/facade layer), so it hands callers either a parsed JSON value or
/// the raw bytes, depending on the response's `Content-Type`.
#[derive(Debug, Clone)]
pub enum Decoded {
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    Empty,
}

impl Decoded {
    pub fn into_json(self) -> Result<serde_json::Value, DispatchError> {
        match self {
            Decoded::Json(v) => Ok(v),
            Decoded::Empty => Ok(serde_json::Value::Null),
            Decoded::Bytes(_) => Err(DispatchError::Decode(
                "response body was not JSON".to_string(),
            )),
        }
    }
}

/// Decodes a 2xx body per the `Content-Type` header, per §4.A.
pub fn decode_success(content_type: Option<&str>, body: Vec<u8>) -> Result<Decoded, DispatchError> {
    if body.is_empty() {
        return Ok(Decoded::Empty);
    }
    match content_type {
        Some(ct) if ct.starts_with("application/json") => {
            let value = serde_json::from_slice(&body)
                .map_err(|e| DispatchError::Decode(e.to_string()))?;
            Ok(Decoded::Json(value))
        }
        _ => Ok(Decoded::Bytes(body)),
    }
}

/// Discord's generic `{ message, code }` error body for non-429 4xx
/// responses, per §4.A/§4.C.
#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

pub fn decode_api_error(
    method: Method,
    url: String,
    status: StatusCode,
    body: &[u8],
) -> ApiError {
    let parsed: Option<ApiErrorBody> = serde_json::from_slice(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });
    let code = parsed.and_then(|b| b.code);
    ApiError {
        message,
        code,
        status,
        method,
        url,
    }
}

pub fn decode_http_error(method: Method, url: String, status: StatusCode) -> HttpError {
    HttpError {
        status,
        status_text: status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string(),
        method,
        url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_json_body() {
        let decoded = decode_success(
            Some("application/json; charset=utf-8"),
            br#"{"a":1}"#.to_vec(),
        )
        .unwrap();
        match decoded {
            Decoded::Json(v) => assert_eq!(v["a"], 1),
            _ => panic!("expected json"),
        }
    }

    #[test]
    fn empty_body_is_empty_regardless_of_content_type() {
        let decoded = decode_success(Some("application/json"), vec![]).unwrap();
        assert!(matches!(decoded, Decoded::Empty));
    }

    #[test]
    fn non_json_body_is_bytes() {
        let decoded = decode_success(Some("image/png"), vec![1, 2, 3]).unwrap();
        assert!(matches!(decoded, Decoded::Bytes(b) if b == vec![1, 2, 3]));
    }

    #[test]
    fn api_error_falls_back_to_status_text_without_body() {
        let err = decode_api_error(
            Method::GET,
            "https://discord.com/api/v10/x".into(),
            StatusCode::FORBIDDEN,
            b"not json",
        );
        assert_eq!(err.message, "Forbidden");
        assert_eq!(err.code, None);
    }

    #[test]
    fn api_error_prefers_body_message_and_code() {
        let err = decode_api_error(
            Method::GET,
            "https://discord.com/api/v10/x".into(),
            StatusCode::NOT_FOUND,
            br#"{"message":"Unknown Channel","code":10003}"#,
        );
        assert_eq!(err.message, "Unknown Channel");
        assert_eq!(err.code, Some(10003));
    }
}
